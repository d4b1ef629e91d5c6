//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

use rina_utils::Address;
use serde::{Deserialize, Serialize};

use crate::message::CdapMessage;

/// The `obj_class::adata` / `obj_name::adata` envelope used to tunnel a
/// CDAP message between two IPC Processes that are not directly adjacent,
/// via an intermediate neighbor acting purely as a relay.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AData {
    pub src_addr: Address,
    pub dst_addr: Address,
    pub cdap_message: CdapMessage,
}

impl AData {
    pub fn new(
        src_addr: Address,
        dst_addr: Address,
        cdap_message: CdapMessage,
    ) -> AData {
        AData {
            src_addr,
            dst_addr,
            cdap_message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::message::OpCode;

    #[test]
    fn adata_encodes_and_decodes() {
        let inner = CdapMessage::request(OpCode::MCreate, "dft", "/dft/x");
        let adata = AData::new(Address::new(1), Address::new(2), inner);
        let encoded = codec::encode_adata(&adata).unwrap();
        let decoded = codec::decode_adata(&encoded).unwrap();
        assert_eq!(decoded.src_addr, Address::new(1));
        assert_eq!(decoded.dst_addr, Address::new(2));
        assert_eq!(decoded.cdap_message.obj_name, "/dft/x");
    }
}
