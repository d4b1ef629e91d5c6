//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

use crate::adata::AData;
use crate::error::DecodeError;
use crate::message::CdapMessage;

/// Encodes a CDAP message for transmission over a management flow.
///
/// The underlying schema-driven wire format (GPB-style, in the original
/// implementation) is an external collaborator this crate doesn't own;
/// `serde_json` stands in for it, since it gives the same "assume a
/// self-describing record format exists" boundary without inventing a
/// bespoke binary grammar nothing here actually requires.
pub fn encode(msg: &CdapMessage) -> Result<Vec<u8>, DecodeError> {
    serde_json::to_vec(msg).map_err(|err| DecodeError(err.to_string()))
}

pub fn decode(bytes: &[u8]) -> Result<CdapMessage, DecodeError> {
    serde_json::from_slice(bytes).map_err(|err| DecodeError(err.to_string()))
}

pub fn encode_adata(adata: &AData) -> Result<Vec<u8>, DecodeError> {
    serde_json::to_vec(adata).map_err(|err| DecodeError(err.to_string()))
}

pub fn decode_adata(bytes: &[u8]) -> Result<AData, DecodeError> {
    serde_json::from_slice(bytes).map_err(|err| DecodeError(err.to_string()))
}
