//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::{error, warn};

/// Errors shared by every crate in the workspace, per the error taxonomy:
/// Transport, Protocol, Semantic, Resource, Timeout and Fatal conditions
/// that aren't specific to CDAP or to RIB processing.
#[derive(Debug)]
pub enum Error {
    Transport(TransportError),
    Resource(ResourceError),
    Timeout(String),
    Fatal(String),
}

#[derive(Debug)]
pub enum TransportError {
    IoError(std::io::Error),
    ConnectionClosed,
}

#[derive(Debug)]
pub enum ResourceError {
    PendingLimitExceeded,
    NotFound(String),
}

impl Error {
    pub fn log(&self) {
        match self {
            Error::Transport(error) => error.log(),
            Error::Resource(error) => error.log(),
            Error::Timeout(what) => {
                warn!(%what, "{}", self);
            }
            Error::Fatal(reason) => {
                error!(%reason, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Transport(error) => error.fmt(f),
            Error::Resource(error) => error.fmt(f),
            Error::Timeout(..) => write!(f, "operation timed out"),
            Error::Fatal(..) => write!(f, "unrecoverable error"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transport(error) => Some(error),
            Error::Resource(error) => Some(error),
            _ => None,
        }
    }
}

impl From<TransportError> for Error {
    fn from(error: TransportError) -> Error {
        Error::Transport(error)
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Error {
        Error::Transport(TransportError::IoError(error))
    }
}

// ===== impl TransportError =====

impl TransportError {
    pub fn log(&self) {
        match self {
            TransportError::IoError(error) => {
                warn!(%error, "{}", self);
            }
            TransportError::ConnectionClosed => {
                warn!("{}", self);
            }
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::IoError(..) => write!(f, "I/O error"),
            TransportError::ConnectionClosed => {
                write!(f, "connection closed by peer")
            }
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::IoError(error) => Some(error),
            TransportError::ConnectionClosed => None,
        }
    }
}

// ===== impl ResourceError =====

impl ResourceError {
    pub fn log(&self) {
        match self {
            ResourceError::PendingLimitExceeded => {
                warn!("{}", self);
            }
            ResourceError::NotFound(what) => {
                warn!(%what, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for ResourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceError::PendingLimitExceeded => {
                write!(f, "pending operation limit exceeded")
            }
            ResourceError::NotFound(..) => write!(f, "resource not found"),
        }
    }
}

impl std::error::Error for ResourceError {}
