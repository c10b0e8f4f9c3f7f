//
// Copyright (c) The Nosconf Contributors
//
// SPDX-License-Identifier: MIT
//

use derive_new::new;
use tokio::time::Instant;
use tracing::{debug, debug_span, info};

use crate::error::Error;
use crate::proto;
use crate::transport::{Transport, rpc_request, rpc_with_deadline};

// Supported encodings, most preferred first.
const ENCODING_PREFERENCE: [Encoding; 2] = [Encoding::JsonIetf, Encoding::Json];

/// Wire encoding negotiated with the device.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Encoding {
    JsonIetf,
    Json,
}

/// YANG module advertised by the device.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ModelData {
    pub name: String,
    pub organization: String,
    pub version: String,
}

/// Capabilities captured once per connection.
#[derive(Clone, Debug, Eq, PartialEq, new)]
pub struct Capabilities {
    encoding: Encoding,
    models: Vec<ModelData>,
}

// ===== impl Encoding =====

impl Encoding {
    pub(crate) fn to_proto(self) -> proto::Encoding {
        match self {
            Encoding::JsonIetf => proto::Encoding::JsonIetf,
            Encoding::Json => proto::Encoding::Json,
        }
    }

    // Wraps JSON bytes into the typed value variant of this encoding.
    pub(crate) fn typed_value(self, bytes: Vec<u8>) -> proto::TypedValue {
        use proto::typed_value::Value;

        let value = match self {
            Encoding::JsonIetf => Value::JsonIetfVal(bytes),
            Encoding::Json => Value::JsonVal(bytes),
        };
        proto::TypedValue { value: Some(value) }
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Encoding::JsonIetf => write!(f, "JSON_IETF"),
            Encoding::Json => write!(f, "JSON"),
        }
    }
}

// ===== impl Capabilities =====

impl Capabilities {
    /// Queries the device capabilities and selects the wire encoding.
    ///
    /// Issues exactly one Capabilities RPC, so it should be called once per
    /// connection.
    pub async fn negotiate(
        transport: &dyn Transport,
        deadline: Instant,
    ) -> Result<Capabilities, Error> {
        let request = rpc_request(proto::CapabilityRequest {}, deadline);
        let response =
            rpc_with_deadline(deadline, transport.capabilities(request))
                .await?
                .into_inner();

        let capabilities = Capabilities::from_response(response)?;
        debug_span!("gnmi").in_scope(|| {
            info!(
                encoding = %capabilities.encoding,
                models = capabilities.models.len(),
                "negotiated capabilities"
            );
            for model in &capabilities.models {
                debug!(
                    name = %model.name,
                    organization = %model.organization,
                    version = %model.version,
                    "supported model"
                );
            }
        });

        Ok(capabilities)
    }

    pub(crate) fn from_response(
        response: proto::CapabilityResponse,
    ) -> Result<Capabilities, Error> {
        let encoding = ENCODING_PREFERENCE
            .into_iter()
            .find(|encoding| {
                response
                    .supported_encodings
                    .contains(&(encoding.to_proto() as i32))
            })
            .ok_or_else(|| {
                Error::UnsupportedEncoding(response.supported_encodings.clone())
            })?;

        let models = response
            .supported_models
            .into_iter()
            .map(|model| ModelData {
                name: model.name,
                organization: model.organization,
                version: model.version,
            })
            .collect();

        Ok(Capabilities { encoding, models })
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn models(&self) -> &[ModelData] {
        &self.models
    }

    pub fn module(&self, name: &str) -> Option<&ModelData> {
        self.models.iter().find(|model| model.name == name)
    }

    pub fn has_module(&self, name: &str) -> bool {
        self.module(name).is_some()
    }

    pub fn has_organization(&self, organization: &str) -> bool {
        self.models
            .iter()
            .any(|model| model.organization == organization)
    }
}

// ===== unit tests =====
