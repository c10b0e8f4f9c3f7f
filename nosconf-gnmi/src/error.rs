//
// Copyright (c) The Nosconf Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::{debug, warn};

// gNMI client errors.
#[derive(Debug)]
pub enum Error {
    // RPC layer
    Transport(tonic::Status),
    UnsupportedEncoding(Vec<i32>),
    // Data layer
    NotFound(String),
    Path(PathError),
    Response(String, ResponseError),
    Codec(String, serde_json::Error),
}

// Path string syntax errors. Offsets are byte positions in the input.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PathError {
    Empty,
    EmptySegment(usize),
    EmptyName(usize),
    UnterminatedPredicate(usize),
    NestedPredicate(usize),
    UnexpectedBracket(usize),
    MissingEquals(usize),
    EmptyKey(usize),
    DuplicateKey(String),
    TrailingCharacters(usize),
    MisplacedOrigin(usize),
}

// Get responses whose shape doesn't match the request.
#[derive(Debug)]
pub enum ResponseError {
    NotificationCount { expected: usize, received: usize },
    UpdateCount(usize),
    UnexpectedEncoding(&'static str),
    PathMismatch(String),
    InvalidJson(serde_json::Error),
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::Transport(status) => {
                warn!(code = ?status.code(), message = %status.message(), "{}", self);
            }
            Error::UnsupportedEncoding(encodings) => {
                warn!(?encodings, "{}", self);
            }
            Error::NotFound(path) => {
                debug!(%path, "{}", self);
            }
            Error::Path(error) => {
                warn!(error = %error, "{}", self);
            }
            Error::Response(path, error) => {
                warn!(%path, error = %with_source(error), "{}", self);
            }
            Error::Codec(path, error) => {
                warn!(%path, %error, "{}", self);
            }
        }
    }

    // Returns whether the requested subtree doesn't exist on the device.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(..))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Transport(status) => {
                write!(f, "gNMI RPC failed: {}", status.message())
            }
            Error::UnsupportedEncoding(..) => {
                write!(f, "device doesn't support any JSON encoding")
            }
            Error::NotFound(path) => {
                write!(f, "no data found at {path}")
            }
            Error::Path(..) => {
                write!(f, "invalid path")
            }
            Error::Response(path, ..) => {
                write!(f, "unexpected Get response for {path}")
            }
            Error::Codec(path, ..) => {
                write!(f, "failed to encode or decode value of {path}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transport(status) => Some(status),
            Error::Path(error) => Some(error),
            Error::Response(_, error) => Some(error),
            Error::Codec(_, error) => Some(error),
            _ => None,
        }
    }
}

impl From<tonic::Status> for Error {
    fn from(status: tonic::Status) -> Error {
        Error::Transport(status)
    }
}

impl From<PathError> for Error {
    fn from(error: PathError) -> Error {
        Error::Path(error)
    }
}

// ===== impl PathError =====

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::Empty => write!(f, "empty path"),
            PathError::EmptySegment(pos) => {
                write!(f, "empty path segment at offset {pos}")
            }
            PathError::EmptyName(pos) => {
                write!(f, "missing element name at offset {pos}")
            }
            PathError::UnterminatedPredicate(pos) => {
                write!(f, "unterminated key predicate at offset {pos}")
            }
            PathError::NestedPredicate(pos) => {
                write!(f, "nested '[' at offset {pos}")
            }
            PathError::UnexpectedBracket(pos) => {
                write!(f, "unexpected ']' at offset {pos}")
            }
            PathError::MissingEquals(pos) => {
                write!(f, "key predicate without '=' at offset {pos}")
            }
            PathError::EmptyKey(pos) => {
                write!(f, "empty key name at offset {pos}")
            }
            PathError::DuplicateKey(key) => {
                write!(f, "duplicate key predicate '{key}'")
            }
            PathError::TrailingCharacters(pos) => {
                write!(f, "unexpected characters after ']' at offset {pos}")
            }
            PathError::MisplacedOrigin(pos) => {
                write!(f, "module prefix outside the first segment at offset {pos}")
            }
        }
    }
}

impl std::error::Error for PathError {}

// ===== impl ResponseError =====

impl std::fmt::Display for ResponseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseError::NotificationCount { expected, received } => {
                write!(
                    f,
                    "expected {expected} notification(s), received {received}"
                )
            }
            ResponseError::UpdateCount(count) => {
                write!(f, "expected a single update, received {count}")
            }
            ResponseError::UnexpectedEncoding(value) => {
                write!(f, "value encoded as {value} instead of the negotiated encoding")
            }
            ResponseError::PathMismatch(path) => {
                write!(f, "update answers {path} instead of the requested path")
            }
            ResponseError::InvalidJson(..) => {
                write!(f, "value isn't valid JSON")
            }
        }
    }
}

impl std::error::Error for ResponseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResponseError::InvalidJson(error) => Some(error),
            _ => None,
        }
    }
}

// ===== global functions =====

pub(crate) fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
