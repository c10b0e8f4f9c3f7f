//
// Copyright (c) The Nosconf Contributors
//
// SPDX-License-Identifier: MIT
//

use async_trait::async_trait;
use derive_new::new;
use nosconf_gnmi::{Capabilities, Client, Defaultable, Entity};
use nosconf_reconcile::{ResolveError, Resolver, Step};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tracing::debug;

use crate::config::{EntityConfig, Operation, StepConfig};

// Subtree written verbatim from the configuration file.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RawEntity {
    #[serde(skip)]
    path: String,
    #[serde(skip)]
    list_item: bool,
    #[serde(skip)]
    default: Option<Value>,
    value: Value,
}

// Step built from a `[[steps]]` table.
#[derive(Debug, new)]
pub struct ConfigStep {
    config: StepConfig,
}

// Versions dependencies by the digest of the file they name.
#[derive(Debug, Default)]
pub struct FileResolver;

// ===== impl RawEntity =====

impl RawEntity {
    fn new(config: &EntityConfig) -> RawEntity {
        RawEntity {
            path: config.path.clone(),
            list_item: config.list_item,
            default: config.default.clone(),
            value: config.value.clone(),
        }
    }
}

impl Entity for RawEntity {
    fn path(&self) -> String {
        self.path.clone()
    }

    fn is_list_item(&self) -> bool {
        self.list_item
    }

    fn as_defaultable(&mut self) -> Option<&mut dyn Defaultable> {
        match self.default.is_some() {
            true => Some(self),
            false => None,
        }
    }

    fn marshal(&self, _caps: &Capabilities) -> Result<Value, serde_json::Error> {
        Ok(self.value.clone())
    }

    // Only the leaves set in the configuration file are compared, the rest of
    // the device subtree is dropped.
    fn unmarshal(
        &mut self,
        _caps: &Capabilities,
        value: Value,
    ) -> Result<(), serde_json::Error> {
        self.value = project(&self.value, value);
        Ok(())
    }
}

impl Defaultable for RawEntity {
    fn set_default(&mut self) {
        if let Some(default) = &self.default {
            self.value = default.clone();
        }
    }
}

impl PartialEq for RawEntity {
    fn eq(&self, other: &RawEntity) -> bool {
        self.value == other.value
    }
}

// ===== impl ConfigStep =====

impl ConfigStep {
    fn entities(&self, operation: Operation) -> Vec<RawEntity> {
        self.config
            .entities
            .iter()
            .filter(|entity| entity.operation == operation)
            .map(RawEntity::new)
            .collect()
    }
}

#[async_trait]
impl Step for ConfigStep {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn config(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(&self.config)
    }

    fn deps(&self) -> Vec<String> {
        self.config.deps.clone()
    }

    async fn exec(
        &self,
        deadline: Instant,
        client: &Client,
    ) -> Result<(), nosconf_gnmi::Error> {
        for operation in [Operation::Update, Operation::Patch, Operation::Delete]
        {
            let entities = self.entities(operation);
            if entities.is_empty() {
                continue;
            }

            debug!(?operation, count = entities.len(), "applying entities");
            let entities = entities
                .iter()
                .map(|entity| entity as &dyn Entity)
                .collect::<Vec<_>>();
            match operation {
                Operation::Update => client.update(deadline, &entities).await?,
                Operation::Patch => client.patch(deadline, &entities).await?,
                Operation::Delete => client.delete(deadline, &entities).await?,
            }
        }

        Ok(())
    }
}

// ===== impl FileResolver =====

#[async_trait]
impl Resolver for FileResolver {
    async fn version(&self, dep: &str) -> Result<String, ResolveError> {
        let data = std::fs::read(dep)
            .map_err(|error| ResolveError::Io(dep.to_owned(), error))?;
        Ok(Sha256::digest(&data)
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect())
    }
}

// ===== helper functions =====

// Keeps the members of `value` whose keys also appear in `template`,
// recursively. Non-object templates keep the device value as is.
fn project(template: &Value, value: Value) -> Value {
    match (template, value) {
        (Value::Object(template), Value::Object(mut value)) => Value::Object(
            template
                .iter()
                .filter_map(|(key, template)| {
                    let value = value.remove(key)?;
                    Some((key.clone(), project(template, value)))
                })
                .collect(),
        ),
        (_, value) => value,
    }
}

// ===== global functions =====

pub(crate) fn build(steps: &[StepConfig]) -> Vec<Box<dyn Step>> {
    steps
        .iter()
        .cloned()
        .map(|config| Box::new(ConfigStep::new(config)) as Box<dyn Step>)
        .collect()
}

// ===== unit tests =====
