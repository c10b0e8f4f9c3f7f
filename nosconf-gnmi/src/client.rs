//
// Copyright (c) The Nosconf Contributors
//
// SPDX-License-Identifier: MIT
//

use itertools::join;
use serde_json::Value;
use tokio::time::Instant;
use tonic::Code;
use tracing::{debug, debug_span, trace};

use crate::capabilities::{Capabilities, Encoding};
use crate::entity::Entity;
use crate::error::{Error, ResponseError};
use crate::path::Path;
use crate::proto;
use crate::transport::{Transport, rpc_request, rpc_with_deadline};

/// Kind of data requested by a Get RPC.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DataType {
    Config,
    State,
}

/// Operations sent together in a single Set RPC.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SetBatch {
    pub replace: Vec<(Path, Value)>,
    pub update: Vec<(Path, Value)>,
    pub delete: Vec<Path>,
}

/// gNMI client bound to a single device connection.
///
/// Writes are diff-suppressed: the current configuration is read back first
/// and only subtrees that differ from the desired value are sent.
pub struct Client {
    transport: Box<dyn Transport>,
    caps: Capabilities,
}

#[derive(Clone, Copy, Debug)]
enum WriteOp {
    Replace,
    Merge,
}

// ===== impl DataType =====

impl DataType {
    fn to_proto(self) -> proto::get_request::DataType {
        match self {
            DataType::Config => proto::get_request::DataType::Config,
            DataType::State => proto::get_request::DataType::State,
        }
    }
}

// ===== impl SetBatch =====

impl SetBatch {
    pub fn is_empty(&self) -> bool {
        self.replace.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    pub fn len(&self) -> usize {
        self.replace.len() + self.update.len() + self.delete.len()
    }

    fn paths(&self) -> String {
        join(
            self.delete
                .iter()
                .chain(self.replace.iter().map(|(path, _)| path))
                .chain(self.update.iter().map(|(path, _)| path)),
            ",",
        )
    }
}

// ===== impl Client =====

impl Client {
    /// Negotiates capabilities with the device behind `transport`.
    pub async fn connect<T>(
        transport: T,
        deadline: Instant,
    ) -> Result<Client, Error>
    where
        T: Transport + 'static,
    {
        let caps = Capabilities::negotiate(&transport, deadline)
            .await
            .inspect_err(|error| log_error("capabilities", "", error))?;
        Ok(Client {
            transport: Box::new(transport),
            caps,
        })
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// Reads the configuration of each entity in place.
    pub async fn get_config(
        &self,
        deadline: Instant,
        entities: &mut [&mut dyn Entity],
    ) -> Result<(), Error> {
        self.get(deadline, DataType::Config, entities).await
    }

    /// Reads the operational state of each entity in place.
    pub async fn get_state(
        &self,
        deadline: Instant,
        entities: &mut [&mut dyn Entity],
    ) -> Result<(), Error> {
        self.get(deadline, DataType::State, entities).await
    }

    /// Reads each entity in place using a single Get RPC.
    ///
    /// Returns [`Error::NotFound`] if any of the requested subtrees doesn't
    /// exist, in which case no entity is modified. No RPC is issued when
    /// there is nothing to read, since a Get without paths selects the whole
    /// device tree.
    pub async fn get(
        &self,
        deadline: Instant,
        data_type: DataType,
        entities: &mut [&mut dyn Entity],
    ) -> Result<(), Error> {
        if entities.is_empty() {
            return Ok(());
        }

        let paths = entities
            .iter()
            .map(|entity| entity.path())
            .collect::<Vec<_>>();
        let values = self.fetch(deadline, data_type, &paths).await?;

        let mut found = Vec::with_capacity(values.len());
        for (path, value) in paths.iter().zip(values) {
            match value {
                Some(value) => found.push(value),
                None => {
                    let error = Error::NotFound(path.clone());
                    log_error("get", path, &error);
                    return Err(error);
                }
            }
        }

        for ((entity, path), value) in entities.iter_mut().zip(&paths).zip(found)
        {
            entity
                .unmarshal(&self.caps, value)
                .map_err(|error| Error::Codec(path.clone(), error))
                .inspect_err(|error| log_error("get", path, error))?;
        }

        Ok(())
    }

    /// Replaces every entity whose configuration differs from the device.
    pub async fn update(
        &self,
        deadline: Instant,
        entities: &[&dyn Entity],
    ) -> Result<(), Error> {
        self.write(deadline, WriteOp::Replace, entities).await
    }

    /// Merges every entity whose configuration differs from the device.
    pub async fn patch(
        &self,
        deadline: Instant,
        entities: &[&dyn Entity],
    ) -> Result<(), Error> {
        self.write(deadline, WriteOp::Merge, entities).await
    }

    /// Removes the entities from the device configuration.
    ///
    /// Entities with a default value are replaced with it rather than
    /// deleted.
    pub async fn delete(
        &self,
        deadline: Instant,
        entities: &[&dyn Entity],
    ) -> Result<(), Error> {
        let mut batch = SetBatch::default();
        for entity in entities {
            let path = entity.path();
            let structured = parse_path(&path, "delete")?;

            let mut reset = entity.clone_entity();
            let has_default = match reset.as_defaultable() {
                Some(defaultable) => {
                    defaultable.set_default();
                    true
                }
                None => false,
            };
            if !has_default {
                batch.delete.push(structured);
                continue;
            }

            let value = reset
                .marshal(&self.caps)
                .map_err(|error| Error::Codec(path.clone(), error))
                .inspect_err(|error| log_error("delete", &path, error))?;
            batch.replace.push((structured, value));
        }

        self.set(deadline, batch).await
    }

    /// Sends the batched operations in one Set RPC.
    ///
    /// No RPC is issued when the batch is empty.
    pub async fn set(
        &self,
        deadline: Instant,
        batch: SetBatch,
    ) -> Result<(), Error> {
        if batch.is_empty() {
            debug_span!("gnmi").in_scope(|| {
                debug!("no changes to apply");
            });
            return Ok(());
        }

        let paths = batch.paths();
        let encoding = self.caps.encoding();
        let request = proto::SetRequest {
            prefix: None,
            delete: batch.delete.iter().map(proto::Path::from).collect(),
            replace: encode_updates(encoding, batch.replace)?,
            update: encode_updates(encoding, batch.update)?,
        };
        debug_span!("gnmi").in_scope(|| {
            debug!(
                replace = request.replace.len(),
                update = request.update.len(),
                delete = request.delete.len(),
                %paths,
                "sending Set() request"
            );
            trace!("{:?}", request);
        });

        let request = rpc_request(request, deadline);
        let response =
            rpc_with_deadline(deadline, self.transport.set(request))
                .await
                .map_err(Error::Transport)
                .inspect_err(|error| log_error("set", &paths, error))?
                .into_inner();

        debug_span!("gnmi").in_scope(|| {
            for result in &response.response {
                let path = result.path.as_ref().map(Path::from);
                debug!(
                    path = %path.unwrap_or_default(),
                    operation = ?result.op(),
                    "applied"
                );
            }
        });

        Ok(())
    }

    async fn write(
        &self,
        deadline: Instant,
        op: WriteOp,
        entities: &[&dyn Entity],
    ) -> Result<(), Error> {
        let operation = match op {
            WriteOp::Replace => "update",
            WriteOp::Merge => "patch",
        };

        let mut batch = SetBatch::default();
        for entity in entities {
            let path = entity.path();
            let structured = parse_path(&path, operation)?;
            let desired = entity
                .marshal(&self.caps)
                .map_err(|error| Error::Codec(path.clone(), error))
                .inspect_err(|error| log_error(operation, &path, error))?;

            // Compare against the current configuration, decoded into a copy
            // of the desired entity.
            let current = self
                .fetch(deadline, DataType::Config, std::slice::from_ref(&path))
                .await?
                .pop()
                .flatten();
            match current {
                Some(value) => {
                    let mut current = entity.clone_entity();
                    current
                        .unmarshal(&self.caps, value)
                        .map_err(|error| Error::Codec(path.clone(), error))
                        .inspect_err(|error| {
                            log_error(operation, &path, error)
                        })?;
                    if entity.eq_entity(current.as_ref()) {
                        debug_span!("gnmi").in_scope(|| {
                            debug!(%operation, %path, "unchanged, skipping");
                        });
                        continue;
                    }
                    debug_span!("gnmi").in_scope(|| {
                        debug!(%operation, %path, "configuration changed");
                    });
                }
                None => {
                    debug_span!("gnmi").in_scope(|| {
                        debug!(%operation, %path, "not found, creating");
                    });
                }
            }

            match op {
                WriteOp::Replace => batch.replace.push((structured, desired)),
                WriteOp::Merge => batch.update.push((structured, desired)),
            }
        }

        self.set(deadline, batch).await
    }

    // Issues one Get RPC and returns the value found for each path, `None`
    // meaning the path doesn't exist.
    async fn fetch(
        &self,
        deadline: Instant,
        data_type: DataType,
        paths: &[String],
    ) -> Result<Vec<Option<Value>>, Error> {
        let structured = paths
            .iter()
            .map(|path| parse_path(path, "get"))
            .collect::<Result<Vec<_>, _>>()?;
        let request = proto::GetRequest {
            prefix: None,
            path: structured.iter().map(proto::Path::from).collect(),
            r#type: data_type.to_proto() as i32,
            encoding: self.caps.encoding().to_proto() as i32,
            use_models: Default::default(),
        };
        debug_span!("gnmi").in_scope(|| {
            debug!(?data_type, paths = %join(paths, ","), "sending Get() request");
            trace!("{:?}", request);
        });

        let request = rpc_request(request, deadline);
        let response =
            match rpc_with_deadline(deadline, self.transport.get(request)).await
            {
                Ok(response) => response.into_inner(),
                Err(status) if status.code() == Code::NotFound => {
                    return Ok(vec![None; paths.len()]);
                }
                Err(status) => {
                    let error = Error::Transport(status);
                    log_error("get", &join(paths, ","), &error);
                    return Err(error);
                }
            };

        self.decode_get_response(paths, &structured, response)
            .inspect_err(|error| log_error("get", &join(paths, ","), error))
    }

    fn decode_get_response(
        &self,
        paths: &[String],
        structured: &[Path],
        response: proto::GetResponse,
    ) -> Result<Vec<Option<Value>>, Error> {
        // No notifications at all: none of the paths exist.
        if response.notification.is_empty() {
            return Ok(vec![None; paths.len()]);
        }
        if response.notification.len() != paths.len() {
            return Err(Error::Response(
                join(paths, ","),
                ResponseError::NotificationCount {
                    expected: paths.len(),
                    received: response.notification.len(),
                },
            ));
        }

        paths
            .iter()
            .zip(structured)
            .zip(response.notification)
            .map(|((path, requested), notification)| {
                self.decode_notification(path, requested, notification)
            })
            .collect()
    }

    fn decode_notification(
        &self,
        path: &str,
        requested: &Path,
        notification: proto::Notification,
    ) -> Result<Option<Value>, Error> {
        use proto::typed_value::Value as TypedValue;

        let update = match <[proto::Update; 1]>::try_from(notification.update) {
            Ok([update]) => update,
            Err(updates) if updates.is_empty() => return Ok(None),
            Err(updates) => {
                return Err(Error::Response(
                    path.to_owned(),
                    ResponseError::UpdateCount(updates.len()),
                ));
            }
        };

        // The device may split the answered path between the notification
        // prefix and the update. Origins aren't always echoed back.
        let mut answered = notification
            .prefix
            .as_ref()
            .map(|prefix| Path::from(prefix).elems)
            .unwrap_or_default();
        if let Some(update_path) = &update.path {
            answered.extend(Path::from(update_path).elems);
        }
        if !answered.is_empty() && answered != requested.elems {
            let answered = Path {
                origin: None,
                elems: answered,
            };
            return Err(Error::Response(
                path.to_owned(),
                ResponseError::PathMismatch(answered.to_string()),
            ));
        }
        let Some(value) = update.val.and_then(|val| val.value) else {
            return Ok(None);
        };

        let bytes = match (self.caps.encoding(), value) {
            (Encoding::JsonIetf, TypedValue::JsonIetfVal(bytes))
            | (Encoding::Json, TypedValue::JsonVal(bytes)) => bytes,
            (_, value) => {
                return Err(Error::Response(
                    path.to_owned(),
                    ResponseError::UnexpectedEncoding(value_kind(&value)),
                ));
            }
        };
        if bytes.is_empty() {
            return Ok(None);
        }

        let value: Value = serde_json::from_slice(&bytes).map_err(|error| {
            Error::Response(path.to_owned(), ResponseError::InvalidJson(error))
        })?;
        Ok((!value.is_null()).then_some(value))
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("capabilities", &self.caps)
            .finish_non_exhaustive()
    }
}

// ===== helper functions =====

fn parse_path(path: &str, operation: &'static str) -> Result<Path, Error> {
    Path::parse(path)
        .map_err(Error::Path)
        .inspect_err(|error| log_error(operation, path, error))
}

fn encode_updates(
    encoding: Encoding,
    updates: Vec<(Path, Value)>,
) -> Result<Vec<proto::Update>, Error> {
    updates
        .into_iter()
        .map(|(path, value)| {
            let bytes = serde_json::to_vec(&value)
                .map_err(|error| Error::Codec(path.to_string(), error))?;
            Ok(proto::Update {
                path: Some(proto::Path::from(&path)),
                val: Some(encoding.typed_value(bytes)),
                duplicates: 0,
            })
        })
        .collect()
}

fn value_kind(value: &proto::typed_value::Value) -> &'static str {
    use proto::typed_value::Value;

    match value {
        Value::StringVal(..) => "string_val",
        Value::IntVal(..) => "int_val",
        Value::UintVal(..) => "uint_val",
        Value::BoolVal(..) => "bool_val",
        Value::BytesVal(..) => "bytes_val",
        Value::JsonVal(..) => "json_val",
        Value::JsonIetfVal(..) => "json_ietf_val",
        Value::AsciiVal(..) => "ascii_val",
        Value::ProtoBytes(..) => "proto_bytes",
        Value::DoubleVal(..) => "double_val",
    }
}

fn log_error(operation: &'static str, paths: &str, error: &Error) {
    debug_span!("gnmi", %operation, %paths).in_scope(|| {
        error.log();
    });
}
