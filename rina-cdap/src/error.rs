//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::warn;

use crate::connection::fsm;
use crate::message::OpCode;

/// CDAP-layer errors: malformed wire data, invoke-id bookkeeping failures,
/// and connection FSM violations.
#[derive(Debug)]
pub enum Error {
    Decode(DecodeError),
    PendingLimitExceeded,
    UnknownInvokeId(u32),
    DuplicateInvokeId(u32),
    UnexpectedMessage(fsm::State, OpCode),
    NotConnected,
}

impl Error {
    pub fn log(&self) {
        match self {
            Error::Decode(error) => {
                warn!(%error, "{}", self);
            }
            Error::PendingLimitExceeded => {
                warn!("{}", self);
            }
            Error::UnknownInvokeId(id) => {
                warn!(invoke_id = id, "{}", self);
            }
            Error::DuplicateInvokeId(id) => {
                warn!(invoke_id = id, "{}", self);
            }
            Error::UnexpectedMessage(state, op_code) => {
                warn!(?state, %op_code, "{}", self);
            }
            Error::NotConnected => {
                warn!("{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Decode(..) => write!(f, "failed to decode CDAP message"),
            Error::PendingLimitExceeded => {
                write!(f, "pending invoke-id limit exceeded")
            }
            Error::UnknownInvokeId(..) => {
                write!(f, "response for unknown invoke-id")
            }
            Error::DuplicateInvokeId(..) => {
                write!(f, "duplicate invoke-id from peer")
            }
            Error::UnexpectedMessage(..) => {
                write!(f, "message not valid in current connection state")
            }
            Error::NotConnected => {
                write!(f, "connection is not in CONNECTED state")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Decode(error) => Some(error),
            _ => None,
        }
    }
}

impl From<DecodeError> for Error {
    fn from(error: DecodeError) -> Error {
        Error::Decode(error)
    }
}

#[derive(Debug)]
pub struct DecodeError(pub String);

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for DecodeError {}
