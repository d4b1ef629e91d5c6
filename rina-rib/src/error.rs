//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::warn;

use rina_cdap::message::OpCode;
use rina_utils::{Address, ApplicationName, PortId};

use crate::neighbor::fsm;

/// Errors raised while processing RIB/enrollment/DFT/LFDB/flow-allocation
/// events. CDAP-layer and kernel-channel errors are reported through
/// their own crates' `Error` types and logged there; this enum covers the
/// semantic and resource conditions specific to the RIB.
#[derive(Debug)]
pub enum Error {
    Cdap(rina_cdap::Error),
    Kernel(rina_kernel::Error),
    UnknownNeighbor(PortId),
    EnrollmentUnexpectedMessage(fsm::State, OpCode),
    EnrollmentAborted(ApplicationName, &'static str),
    EnrollmentTimeout(ApplicationName),
    FlowAllocationTimeout(ApplicationName),
    FlowRequestNotFound(ApplicationName),
    DftLookupFailed(ApplicationName),
    NoRouteToAddress(Address),
    DuplicatePortId(PortId),
}

impl Error {
    pub fn log(&self) {
        match self {
            Error::Cdap(error) => error.log(),
            Error::Kernel(error) => error.log(),
            Error::UnknownNeighbor(port_id) => {
                warn!(%port_id, "{}", self);
            }
            Error::EnrollmentUnexpectedMessage(state, op_code) => {
                warn!(?state, %op_code, "{}", self);
            }
            Error::EnrollmentAborted(name, reason) => {
                warn!(%name, %reason, "{}", self);
            }
            Error::EnrollmentTimeout(name) => {
                warn!(%name, "{}", self);
            }
            Error::FlowAllocationTimeout(name) => {
                warn!(%name, "{}", self);
            }
            Error::FlowRequestNotFound(name) => {
                warn!(%name, "{}", self);
            }
            Error::DftLookupFailed(name) => {
                warn!(%name, "{}", self);
            }
            Error::NoRouteToAddress(addr) => {
                warn!(%addr, "{}", self);
            }
            Error::DuplicatePortId(port_id) => {
                warn!(%port_id, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Cdap(..) => write!(f, "CDAP layer error"),
            Error::Kernel(..) => write!(f, "kernel channel error"),
            Error::UnknownNeighbor(..) => {
                write!(f, "message from unknown neighbor port-id")
            }
            Error::EnrollmentUnexpectedMessage(..) => {
                write!(f, "message not valid in current enrollment state")
            }
            Error::EnrollmentAborted(..) => write!(f, "enrollment aborted"),
            Error::EnrollmentTimeout(..) => write!(f, "enrollment timed out"),
            Error::FlowAllocationTimeout(..) => {
                write!(f, "flow allocation timed out")
            }
            Error::FlowRequestNotFound(..) => {
                write!(f, "no outstanding flow request for application")
            }
            Error::DftLookupFailed(..) => {
                write!(f, "no DFT entry for destination application")
            }
            Error::NoRouteToAddress(..) => {
                write!(f, "no PDUFT entry for destination address")
            }
            Error::DuplicatePortId(..) => {
                write!(f, "duplicate neighbor port-id")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Cdap(error) => Some(error),
            Error::Kernel(error) => Some(error),
            _ => None,
        }
    }
}

impl From<rina_cdap::Error> for Error {
    fn from(error: rina_cdap::Error) -> Error {
        Error::Cdap(error)
    }
}

impl From<rina_kernel::Error> for Error {
    fn from(error: rina_kernel::Error) -> Error {
        Error::Kernel(error)
    }
}
