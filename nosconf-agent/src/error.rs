//
// Copyright (c) The Nosconf Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::error;

// Agent startup errors.
#[derive(Debug)]
pub enum Error {
    Endpoint(String, tonic::transport::Error),
    TlsCertificate(String, std::io::Error),
    Connect(tonic::transport::Error),
    Capabilities(nosconf_gnmi::Error),
}

// ===== impl Error =====

impl Error {
    pub(crate) fn log(&self) {
        match self {
            Error::Endpoint(address, error) => {
                error!(%address, error = %with_source(error), "{}", self);
            }
            Error::TlsCertificate(path, error) => {
                error!(%path, %error, "{}", self);
            }
            Error::Connect(error) => {
                error!(error = %with_source(error), "{}", self);
            }
            Error::Capabilities(error) => {
                error!(%error, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Endpoint(..) => write!(f, "invalid device endpoint"),
            Error::TlsCertificate(..) => {
                write!(f, "failed to read CA certificate")
            }
            Error::Connect(..) => write!(f, "failed to connect to device"),
            Error::Capabilities(..) => {
                write!(f, "failed to negotiate device capabilities")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Endpoint(_, error) => Some(error),
            Error::TlsCertificate(_, error) => Some(error),
            Error::Connect(error) => Some(error),
            Error::Capabilities(error) => Some(error),
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
