//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

//
// CDAP (Common Distributed Application Protocol) message model, wire
// codec and per-connection state machine.
//

pub mod adata;
pub mod codec;
pub mod connection;
pub mod error;
pub mod invoke;
pub mod message;

pub use adata::AData;
pub use connection::Connection;
pub use error::Error;
pub use invoke::InvokeIdManager;
pub use message::{CdapMessage, ObjValue, OpCode};
