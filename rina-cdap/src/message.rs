//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

/// CDAP operation codes. Every `_R` variant is the response counterpart of
/// its non-`_R` request; [`OpCode::is_response`] distinguishes the two
/// without a separate flag.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, FromPrimitive, Hash, Ord,
    PartialEq, PartialOrd, Serialize, ToPrimitive,
)]
pub enum OpCode {
    MConnect,
    MConnectR,
    MRelease,
    MReleaseR,
    MCreate,
    MCreateR,
    MDelete,
    MDeleteR,
    MRead,
    MReadR,
    MCancelRead,
    MCancelReadR,
    MWrite,
    MWriteR,
    MStart,
    MStartR,
    MStop,
    MStopR,
}

impl OpCode {
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            OpCode::MConnectR
                | OpCode::MReleaseR
                | OpCode::MCreateR
                | OpCode::MDeleteR
                | OpCode::MReadR
                | OpCode::MCancelReadR
                | OpCode::MWriteR
                | OpCode::MStartR
                | OpCode::MStopR
        )
    }

    pub fn is_request(&self) -> bool {
        !self.is_response()
    }

    /// Returns the response op-code this request op-code expects, if any.
    pub fn response(&self) -> Option<OpCode> {
        Some(match self {
            OpCode::MConnect => OpCode::MConnectR,
            OpCode::MRelease => OpCode::MReleaseR,
            OpCode::MCreate => OpCode::MCreateR,
            OpCode::MDelete => OpCode::MDeleteR,
            OpCode::MRead => OpCode::MReadR,
            OpCode::MCancelRead => OpCode::MCancelReadR,
            OpCode::MWrite => OpCode::MWriteR,
            OpCode::MStart => OpCode::MStartR,
            OpCode::MStop => OpCode::MStopR,
            _ => return None,
        })
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OpCode::MConnect => "M_CONNECT",
            OpCode::MConnectR => "M_CONNECT_R",
            OpCode::MRelease => "M_RELEASE",
            OpCode::MReleaseR => "M_RELEASE_R",
            OpCode::MCreate => "M_CREATE",
            OpCode::MCreateR => "M_CREATE_R",
            OpCode::MDelete => "M_DELETE",
            OpCode::MDeleteR => "M_DELETE_R",
            OpCode::MRead => "M_READ",
            OpCode::MReadR => "M_READ_R",
            OpCode::MCancelRead => "M_CANCELREAD",
            OpCode::MCancelReadR => "M_CANCELREAD_R",
            OpCode::MWrite => "M_WRITE",
            OpCode::MWriteR => "M_WRITE_R",
            OpCode::MStart => "M_START",
            OpCode::MStartR => "M_START_R",
            OpCode::MStop => "M_STOP",
            OpCode::MStopR => "M_STOP_R",
        };
        write!(f, "{name}")
    }
}

/// The tagged union carried as a CDAP message's object value. Modeled as a
/// plain Rust sum type rather than the manually-tagged union the wire
/// format historically used (see `original_source/user/cdap.hpp`'s
/// `obj_value_t`), since Rust enums make the invalid states unrepresentable.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum ObjValue {
    None,
    I32(i32),
    I64(i64),
    Bytes(Vec<u8>),
    Float(f32),
    Double(f64),
    Bool(bool),
    String(String),
}

impl Default for ObjValue {
    fn default() -> ObjValue {
        ObjValue::None
    }
}

/// A single CDAP protocol message.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CdapMessage {
    pub op_code: OpCode,
    pub invoke_id: u32,
    pub obj_class: String,
    pub obj_name: String,
    pub obj_value: ObjValue,
    pub result: i32,
    pub result_reason: String,
    pub flags: MessageFlags,
}

/// Flags accompanying a CDAP message. Currently only distinguishes the
/// final fragment of a (potentially multi-part) response, matching the
/// `F_RD_INCOMPLETE` notion in the original protocol.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub struct MessageFlags {
    pub incomplete: bool,
}

impl CdapMessage {
    pub fn request(op_code: OpCode, obj_class: &str, obj_name: &str) -> CdapMessage {
        assert!(op_code.is_request(), "{op_code} is not a request op-code");
        CdapMessage {
            op_code,
            invoke_id: 0,
            obj_class: obj_class.to_owned(),
            obj_name: obj_name.to_owned(),
            obj_value: ObjValue::None,
            result: 0,
            result_reason: String::new(),
            flags: MessageFlags::default(),
        }
    }

    pub fn response_to(
        request: &CdapMessage,
        result: i32,
        result_reason: impl Into<String>,
    ) -> CdapMessage {
        let op_code = request
            .op_code
            .response()
            .expect("response_to called with a response message");
        CdapMessage {
            op_code,
            invoke_id: request.invoke_id,
            obj_class: request.obj_class.clone(),
            obj_name: request.obj_name.clone(),
            obj_value: ObjValue::None,
            result,
            result_reason: result_reason.into(),
            flags: MessageFlags::default(),
        }
    }

    pub fn with_obj_value(mut self, value: ObjValue) -> CdapMessage {
        self.obj_value = value;
        self
    }

    pub fn with_invoke_id(mut self, invoke_id: u32) -> CdapMessage {
        self.invoke_id = invoke_id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_op_codes_are_flagged() {
        assert!(OpCode::MConnectR.is_response());
        assert!(OpCode::MConnect.is_request());
        assert_eq!(OpCode::MStart.response(), Some(OpCode::MStartR));
        assert_eq!(OpCode::MConnectR.response(), None);
    }

    #[test]
    fn response_to_preserves_object_identity() {
        let req = CdapMessage::request(OpCode::MCreate, "dft", "/dft/a")
            .with_invoke_id(7);
        let resp = CdapMessage::response_to(&req, 0, "");
        assert_eq!(resp.op_code, OpCode::MCreateR);
        assert_eq!(resp.invoke_id, 7);
        assert_eq!(resp.obj_name, "/dft/a");
    }
}
