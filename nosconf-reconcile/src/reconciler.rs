//
// Copyright (c) The Nosconf Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use nosconf_gnmi::Client;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tracing::{Instrument, debug, debug_span};

use crate::error::{Error, StepError, StepErrorKind};
use crate::resolver::Resolver;
use crate::step::Step;
use crate::store::MarkerStore;

// Time budget of a single step execution.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs steps against a device, skipping those whose inputs haven't changed
/// since their last successful run.
pub struct Reconciler {
    store: Box<dyn MarkerStore>,
    resolver: Box<dyn Resolver>,
    timeout: Duration,
}

/// Outcome of a successful pass.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Report {
    pub executed: Vec<String>,
    pub skipped: Vec<String>,
}

// ===== impl Reconciler =====

impl Reconciler {
    pub fn new<S, R>(store: S, resolver: R) -> Reconciler
    where
        S: MarkerStore + 'static,
        R: Resolver + 'static,
    {
        Reconciler {
            store: Box::new(store),
            resolver: Box::new(resolver),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Reconciler {
        self.timeout = timeout;
        self
    }

    /// Runs a reconciliation pass over `steps`, in order.
    ///
    /// Every step is attempted even if earlier ones fail. Steps that succeed
    /// have their done marker recorded regardless of the outcome of the
    /// others.
    pub async fn run(
        &self,
        client: &Client,
        steps: &[Box<dyn Step>],
    ) -> Result<Report, Error> {
        let mut report = Report::default();
        let mut errors = vec![];

        for step in steps {
            let name = step.name().to_owned();
            let span = debug_span!("step", %name);
            match self.run_step(client, step.as_ref()).instrument(span).await {
                Ok(true) => report.executed.push(name),
                Ok(false) => report.skipped.push(name),
                Err(error) => {
                    debug_span!("step", %name).in_scope(|| error.log());
                    errors.push(error);
                }
            }
        }

        if !errors.is_empty() {
            return Err(Error::Steps(errors));
        }

        debug!(
            executed = report.executed.len(),
            skipped = report.skipped.len(),
            "reconciliation pass completed"
        );
        Ok(report)
    }

    // Returns whether the step was executed.
    async fn run_step(
        &self,
        client: &Client,
        step: &dyn Step,
    ) -> Result<bool, StepError> {
        let name = step.name();
        let hash = self.hash(step).await?;

        if self.store.get(name).as_deref() == Some(hash.as_str()) {
            debug!("unchanged, skipping");
            return Ok(false);
        }

        debug!(%hash, "executing");
        let deadline = Instant::now() + self.timeout;
        step.exec(deadline, client)
            .await
            .map_err(|error| StepError::new(name, StepErrorKind::Exec(error)))?;

        self.store
            .set(name, &hash)
            .map_err(|error| StepError::new(name, StepErrorKind::Store(error)))?;
        debug!("done");

        Ok(true)
    }

    // Combines the step configuration with the current version of each of
    // its dependencies.
    async fn hash(&self, step: &dyn Step) -> Result<String, StepError> {
        let name = step.name();
        let config = step
            .config()
            .map_err(|error| StepError::new(name, StepErrorKind::Hash(error)))?;

        let mut versions = vec![];
        for dep in step.deps() {
            let version =
                self.resolver.version(&dep).await.map_err(|error| {
                    StepError::new(
                        name,
                        StepErrorKind::Dependency(dep.clone(), error),
                    )
                })?;
            versions.push((dep, version));
        }

        step_hash(&config, &versions)
            .map_err(|error| StepError::new(name, StepErrorKind::Hash(error)))
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

// ===== global functions =====

/// Computes the hex-encoded SHA-256 digest identifying a step's inputs.
///
/// Object keys are serialized in sorted order, so the digest doesn't depend
/// on how the configuration was built.
pub fn step_hash(
    config: &Value,
    deps: &[(String, String)],
) -> Result<String, serde_json::Error> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(config)?);
    for (dep, version) in deps {
        hasher.update(b"\n");
        hasher.update(dep.as_bytes());
        hasher.update(b"=");
        hasher.update(version.as_bytes());
    }

    Ok(hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect())
}

// ===== unit tests =====
