//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

use rina_utils::{Address, ApplicationName, PortId};
use serde::{Deserialize, Serialize};

/// Identifies an IPC Process instance as tracked by the kernel.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq,
    PartialOrd, Serialize,
)]
pub struct IpcpId(pub u16);

/// The kernel-side record of an IPC Process, mirrored into the daemon on
/// `IPCP_UPDATE` notifications.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct IpcpRecord {
    pub ipcp_id: IpcpId,
    pub ipcp_name: ApplicationName,
    pub dif_name: String,
    pub dif_type: DifType,
    pub address: Address,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum DifType {
    Normal,
    Shim,
}

/// The control-channel message family exchanged between the daemon and
/// the kernel module, named after the `RLITE_KER_*` constants of the
/// reference implementation's control channel.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum ControlMessage {
    IpcpCreate {
        ipcp_name: ApplicationName,
        dif_name: String,
        dif_type: DifType,
    },
    IpcpDestroy {
        ipcp_id: IpcpId,
    },
    IpcpConfig {
        ipcp_id: IpcpId,
        address: Address,
    },
    IpcpUpdate {
        record: IpcpRecord,
    },
    ApplRegister {
        register: bool,
        appl_name: ApplicationName,
        dif_name: String,
        ipcp_id: IpcpId,
    },
    FaReq {
        local_appl: ApplicationName,
        remote_appl: ApplicationName,
        dif_name: String,
    },
    FaReqArrived {
        port_id: PortId,
        local_appl: ApplicationName,
        remote_appl: ApplicationName,
        ipcp_id: IpcpId,
    },
    FaResp {
        port_id: PortId,
        response: i32,
    },
    FaRespArrived {
        port_id: PortId,
        response: i32,
    },
    FlowDeallocated {
        port_id: PortId,
    },
    FlowFetch,
    Barrier {
        id: u32,
    },
    /// Replaces the kernel-side PDU Forwarding Table wholesale: flush the
    /// installed entries, then install `entries`. Named after `pduft_sync`
    /// in the reference implementation.
    PduftSync {
        entries: Vec<(Address, PortId)>,
    },
}

impl ControlMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ControlMessage::IpcpCreate { .. } => "IPCP_CREATE",
            ControlMessage::IpcpDestroy { .. } => "IPCP_DESTROY",
            ControlMessage::IpcpConfig { .. } => "IPCP_CONFIG",
            ControlMessage::IpcpUpdate { .. } => "IPCP_UPDATE",
            ControlMessage::ApplRegister { .. } => "APPL_REGISTER",
            ControlMessage::FaReq { .. } => "FA_REQ",
            ControlMessage::FaReqArrived { .. } => "FA_REQ_ARRIVED",
            ControlMessage::FaResp { .. } => "FA_RESP",
            ControlMessage::FaRespArrived { .. } => "FA_RESP_ARRIVED",
            ControlMessage::FlowDeallocated { .. } => "FLOW_DEALLOCATED",
            ControlMessage::FlowFetch => "FLOW_FETCH",
            ControlMessage::Barrier { .. } => "BARRIER",
            ControlMessage::PduftSync { .. } => "PDUFT_SYNC",
        }
    }
}

/// A management-channel SDU: a CDAP (or A-DATA-wrapped CDAP) payload
/// received or sent over a flow bound to the management I/O channel,
/// prefixed with the sending IPCP's address so the RIB dispatcher can
/// identify the neighbor without a separate lookup.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ManagementSdu {
    pub src_addr: Address,
    pub port_id: PortId,
    pub payload: Vec<u8>,
}
