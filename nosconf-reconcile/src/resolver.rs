//
// Copyright (c) The Nosconf Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::ResolveError;

/// Looks up the current version of a step dependency.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn version(&self, dep: &str) -> Result<String, ResolveError>;
}

/// Resolver serving versions from a fixed table.
///
/// Cloned handles share the same table.
#[derive(Clone, Debug, Default)]
pub struct StaticResolver {
    versions: Arc<Mutex<BTreeMap<String, String>>>,
}

// ===== impl StaticResolver =====

impl StaticResolver {
    pub fn new(versions: BTreeMap<String, String>) -> StaticResolver {
        StaticResolver {
            versions: Arc::new(Mutex::new(versions)),
        }
    }

    pub fn set(&self, dep: &str, version: &str) {
        self.versions
            .lock()
            .unwrap()
            .insert(dep.to_owned(), version.to_owned());
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn version(&self, dep: &str) -> Result<String, ResolveError> {
        self.versions
            .lock()
            .unwrap()
            .get(dep)
            .cloned()
            .ok_or_else(|| ResolveError::Unknown(dep.to_owned()))
    }
}
