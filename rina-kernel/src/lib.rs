//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

//
// Kernel-facing control channel and management I/O channel abstractions.
//

pub mod channel;
pub mod error;
pub mod message;

pub use channel::{ControlChannel, ManagementChannel};
pub use error::Error;
pub use message::{ControlMessage, DifType, IpcpId, IpcpRecord, ManagementSdu};
