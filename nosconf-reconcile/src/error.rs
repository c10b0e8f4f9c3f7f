//
// Copyright (c) The Nosconf Contributors
//
// SPDX-License-Identifier: MIT
//

use itertools::Itertools;
use tracing::{error, warn};

use crate::store::DatabaseError;

// Reconciliation pass errors.
#[derive(Debug)]
pub enum Error {
    Steps(Vec<StepError>),
}

// Failure of a single step.
#[derive(Debug)]
pub struct StepError {
    pub name: String,
    pub kind: StepErrorKind,
}

#[derive(Debug)]
pub enum StepErrorKind {
    Hash(serde_json::Error),
    Dependency(String, ResolveError),
    Exec(nosconf_gnmi::Error),
    Store(DatabaseError),
}

// Dependency version lookup errors.
#[derive(Debug)]
pub enum ResolveError {
    Unknown(String),
    Io(String, std::io::Error),
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::Steps(errors) => {
                let steps = errors.iter().map(|error| &error.name).join(",");
                error!(%steps, "{}", self);
            }
        }
    }

    pub fn steps(&self) -> &[StepError] {
        match self {
            Error::Steps(errors) => errors,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Steps(errors) => {
                write!(f, "{} step(s) failed: ", errors.len())?;
                for (i, error) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{}", error)?;
                    if let Some(source) = std::error::Error::source(error) {
                        write!(f, ": {}", source)?;
                    }
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for Error {}

// ===== impl StepError =====

impl StepError {
    pub(crate) fn new(name: &str, kind: StepErrorKind) -> StepError {
        StepError {
            name: name.to_owned(),
            kind,
        }
    }

    pub fn log(&self) {
        match &self.kind {
            StepErrorKind::Hash(error) => {
                warn!(step = %self.name, %error, "{}", self);
            }
            StepErrorKind::Dependency(dep, error) => {
                let error = with_source(error);
                warn!(step = %self.name, %dep, %error, "{}", self);
            }
            StepErrorKind::Exec(error) => {
                warn!(step = %self.name, %error, "{}", self);
            }
            StepErrorKind::Store(error) => {
                error!(step = %self.name, %error, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            StepErrorKind::Hash(..) => {
                write!(f, "failed to hash config of step {}", self.name)
            }
            StepErrorKind::Dependency(dep, ..) => {
                write!(f, "failed to resolve {} for step {}", dep, self.name)
            }
            StepErrorKind::Exec(..) => {
                write!(f, "step {} failed", self.name)
            }
            StepErrorKind::Store(..) => {
                write!(f, "failed to record step {} as done", self.name)
            }
        }
    }
}

impl std::error::Error for StepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            StepErrorKind::Hash(error) => Some(error),
            StepErrorKind::Dependency(_, error) => Some(error),
            StepErrorKind::Exec(error) => Some(error),
            StepErrorKind::Store(error) => Some(error),
        }
    }
}

// ===== impl ResolveError =====

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveError::Unknown(dep) => {
                write!(f, "unknown dependency {dep}")
            }
            ResolveError::Io(dep, ..) => {
                write!(f, "failed to read dependency {dep}")
            }
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolveError::Io(_, error) => Some(error),
            _ => None,
        }
    }
}

// ===== global functions =====

fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
