//
// Copyright (c) The Nosconf Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use derive_new::new;
use pickledb::PickleDb;

pub type Database = Arc<Mutex<PickleDb>>;
pub type DatabaseError = pickledb::error::Error;

/// Durable storage of per-step done markers.
pub trait MarkerStore: Send + Sync {
    /// Returns the hash recorded by the last successful run of the step.
    fn get(&self, step: &str) -> Option<String>;

    fn set(&self, step: &str, marker: &str) -> Result<(), DatabaseError>;
}

/// Volatile marker store.
///
/// Cloned handles share the same markers.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    markers: Arc<Mutex<BTreeMap<String, String>>>,
}

/// Marker store backed by the daemon's non-volatile database.
#[derive(Clone, new)]
pub struct DbStore {
    db: Database,
}

// ===== impl MemoryStore =====

impl MemoryStore {
    /// Returns a snapshot of all recorded markers.
    pub fn markers(&self) -> BTreeMap<String, String> {
        self.markers.lock().unwrap().clone()
    }
}

impl MarkerStore for MemoryStore {
    fn get(&self, step: &str) -> Option<String> {
        self.markers.lock().unwrap().get(step).cloned()
    }

    fn set(&self, step: &str, marker: &str) -> Result<(), DatabaseError> {
        self.markers
            .lock()
            .unwrap()
            .insert(step.to_owned(), marker.to_owned());
        Ok(())
    }
}

// ===== impl DbStore =====

impl MarkerStore for DbStore {
    fn get(&self, step: &str) -> Option<String> {
        let db = self.db.lock().unwrap();
        db.get::<String>(&key(step))
    }

    fn set(&self, step: &str, marker: &str) -> Result<(), DatabaseError> {
        let mut db = self.db.lock().unwrap();
        db.set(&key(step), &marker)
    }
}

impl std::fmt::Debug for DbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbStore").finish_non_exhaustive()
    }
}

// ===== helper functions =====

fn key(step: &str) -> String {
    format!("step-done-{step}")
}

// ===== unit tests =====
