//
// Copyright (c) The Nosconf Contributors
//
// SPDX-License-Identifier: MIT
//

//! In-memory gNMI device used to exercise the client without a network.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tonic::{Request, Response, Status};

use crate::path::Path;
use crate::proto;
use crate::transport::Transport;

/// Fake device keeping its datastores as JSON values indexed by path.
///
/// Cloned handles share the same device, so a test can keep one handle while
/// the client owns another.
#[derive(Clone, Debug, Default)]
pub struct MockDevice {
    inner: Arc<Mutex<MockDeviceInner>>,
}

#[derive(Debug, Default)]
struct MockDeviceInner {
    capabilities: proto::CapabilityResponse,
    config: BTreeMap<String, Value>,
    state: BTreeMap<String, Value>,
    get_responses: VecDeque<Result<proto::GetResponse, Status>>,
    set_errors: VecDeque<Status>,
    get_requests: Vec<proto::GetRequest>,
    set_requests: Vec<proto::SetRequest>,
    capability_requests: usize,
    delay: Option<Duration>,
}

// ===== impl MockDevice =====

impl MockDevice {
    pub fn new(
        encodings: &[proto::Encoding],
        models: Vec<proto::ModelData>,
    ) -> MockDevice {
        let device = MockDevice::default();
        device.lock().capabilities = proto::CapabilityResponse {
            supported_models: models,
            supported_encodings: encodings
                .iter()
                .map(|encoding| *encoding as i32)
                .collect(),
            g_nmi_version: "0.8.0".to_owned(),
        };
        device
    }

    /// Device advertising JSON_IETF and a single NX-OS device model.
    pub fn nxos() -> MockDevice {
        MockDevice::new(
            &[proto::Encoding::Json, proto::Encoding::JsonIetf],
            vec![model("Cisco-NX-OS-device", "Cisco Systems, Inc.")],
        )
    }

    pub fn insert_config(&self, path: &str, value: Value) {
        self.lock().config.insert(canonical(path), value);
    }

    pub fn insert_state(&self, path: &str, value: Value) {
        self.lock().state.insert(canonical(path), value);
    }

    pub fn config(&self, path: &str) -> Option<Value> {
        self.lock().config.get(&canonical(path)).cloned()
    }

    /// Queues a canned reply for the next Get RPC.
    pub fn push_get_response(
        &self,
        response: Result<proto::GetResponse, Status>,
    ) {
        self.lock().get_responses.push_back(response);
    }

    /// Makes the next Set RPC fail.
    pub fn push_set_error(&self, status: Status) {
        self.lock().set_errors.push_back(status);
    }

    /// Delays every RPC reply.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    pub fn capability_requests(&self) -> usize {
        self.lock().capability_requests
    }

    pub fn get_requests(&self) -> Vec<proto::GetRequest> {
        self.lock().get_requests.clone()
    }

    pub fn set_requests(&self) -> Vec<proto::SetRequest> {
        self.lock().set_requests.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockDeviceInner> {
        self.inner.lock().unwrap()
    }

    async fn wait(&self) {
        let delay = self.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Transport for MockDevice {
    async fn capabilities(
        &self,
        _request: Request<proto::CapabilityRequest>,
    ) -> Result<Response<proto::CapabilityResponse>, Status> {
        self.wait().await;
        let mut inner = self.lock();
        inner.capability_requests += 1;
        Ok(Response::new(inner.capabilities.clone()))
    }

    async fn get(
        &self,
        request: Request<proto::GetRequest>,
    ) -> Result<Response<proto::GetResponse>, Status> {
        self.wait().await;
        let request = request.into_inner();
        let mut inner = self.lock();
        inner.get_requests.push(request.clone());
        if let Some(response) = inner.get_responses.pop_front() {
            return response.map(Response::new);
        }

        let datastore = match request.r#type() {
            proto::get_request::DataType::State
            | proto::get_request::DataType::Operational => &inner.state,
            _ => &inner.config,
        };
        let notification = request
            .path
            .iter()
            .map(|path| {
                let update = datastore
                    .get(&Path::from(path).to_string())
                    .map(|value| proto::Update {
                        path: Some(path.clone()),
                        val: Some(typed_value(request.encoding(), value)),
                        duplicates: 0,
                    });
                proto::Notification {
                    timestamp: 0,
                    prefix: None,
                    update: update.into_iter().collect(),
                    delete: Default::default(),
                    atomic: false,
                }
            })
            .collect();

        Ok(Response::new(proto::GetResponse {
            notification,
            error: None,
        }))
    }

    async fn set(
        &self,
        request: Request<proto::SetRequest>,
    ) -> Result<Response<proto::SetResponse>, Status> {
        use proto::update_result::Operation;

        self.wait().await;
        let request = request.into_inner();
        let mut inner = self.lock();
        inner.set_requests.push(request.clone());
        if let Some(status) = inner.set_errors.pop_front() {
            return Err(status);
        }

        let mut results = vec![];
        for path in &request.delete {
            let key = Path::from(path).to_string();
            let prefix = format!("{key}/");
            inner
                .config
                .retain(|entry, _| *entry != key && !entry.starts_with(&prefix));
            results.push(update_result(path, Operation::Delete));
        }
        for update in &request.replace {
            let (path, value) = decode_update(update)?;
            inner.config.insert(Path::from(&path).to_string(), value);
            results.push(update_result(&path, Operation::Replace));
        }
        for update in &request.update {
            let (path, value) = decode_update(update)?;
            let entry = inner
                .config
                .entry(Path::from(&path).to_string())
                .or_insert(Value::Null);
            merge(entry, value);
            results.push(update_result(&path, Operation::Update));
        }

        Ok(Response::new(proto::SetResponse {
            prefix: None,
            response: results,
            message: None,
            timestamp: 0,
        }))
    }
}

// ===== global functions =====

pub fn model(name: &str, organization: &str) -> proto::ModelData {
    proto::ModelData {
        name: name.to_owned(),
        organization: organization.to_owned(),
        version: "2024-01-01".to_owned(),
    }
}

/// Builds a Get response holding a single JSON_IETF update per value.
pub fn get_response(values: &[Option<&Value>]) -> proto::GetResponse {
    let notification = values
        .iter()
        .map(|value| proto::Notification {
            timestamp: 0,
            prefix: None,
            update: value
                .map(|value| proto::Update {
                    path: None,
                    val: Some(typed_value(proto::Encoding::JsonIetf, value)),
                    duplicates: 0,
                })
                .into_iter()
                .collect(),
            delete: Default::default(),
            atomic: false,
        })
        .collect();
    proto::GetResponse {
        notification,
        error: None,
    }
}

fn canonical(path: &str) -> String {
    Path::parse(path)
        .expect("invalid path in test fixture")
        .to_string()
}

fn typed_value(encoding: proto::Encoding, value: &Value) -> proto::TypedValue {
    use proto::typed_value::Value as TypedValue;

    let bytes = serde_json::to_vec(value).unwrap();
    let value = match encoding {
        proto::Encoding::JsonIetf => TypedValue::JsonIetfVal(bytes),
        _ => TypedValue::JsonVal(bytes),
    };
    proto::TypedValue { value: Some(value) }
}

fn decode_update(
    update: &proto::Update,
) -> Result<(proto::Path, Value), Status> {
    use proto::typed_value::Value as TypedValue;

    let path = update
        .path
        .clone()
        .ok_or_else(|| Status::invalid_argument("missing path"))?;
    let bytes = match update.val.as_ref().and_then(|val| val.value.as_ref()) {
        Some(TypedValue::JsonIetfVal(bytes) | TypedValue::JsonVal(bytes)) => {
            bytes
        }
        _ => return Err(Status::invalid_argument("unsupported value")),
    };
    let value = serde_json::from_slice(bytes)
        .map_err(|error| Status::invalid_argument(error.to_string()))?;
    Ok((path, value))
}

fn update_result(
    path: &proto::Path,
    op: proto::update_result::Operation,
) -> proto::UpdateResult {
    proto::UpdateResult {
        timestamp: 0,
        path: Some(path.clone()),
        message: None,
        op: op as i32,
    }
}

// Merges `value` onto `target` following gNMI update semantics.
fn merge(target: &mut Value, value: Value) {
    match (target, value) {
        (Value::Object(target), Value::Object(value)) => {
            for (key, value) in value {
                merge(target.entry(key).or_insert(Value::Null), value);
            }
        }
        (target, value) => *target = value,
    }
}
