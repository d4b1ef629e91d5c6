//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

//
// Commands a running `Instance` accepts from the administrative socket.
// Everything here addresses a single already-created IPCP; the decision
// to create or destroy the IPCP itself (`UIPCP_CREATE`/`UIPCP_DESTROY`)
// lives one layer up, in `rina-daemon`, since it spawns or tears down the
// task the `Instance` runs in rather than mutating one in place.
//

use rina_utils::{Address, ApplicationName, PortId};
use tokio::sync::{mpsc, oneshot};

use crate::error::Error;

#[derive(Clone, Debug)]
pub enum AdminCommand {
    /// `IPCP_REGISTER`: register or withdraw a local application name.
    Register {
        appl_name: ApplicationName,
        register: bool,
    },
    /// `IPCP_ENROLL`: start enrollment as initiator towards the peer
    /// already reachable over `port_id`.
    Enroll {
        neighbor_name: ApplicationName,
        port_id: PortId,
    },
    /// `IPCP_DFT_SET`: administrative override of a DFT entry, used to
    /// bootstrap name resolution ahead of enrollment-driven propagation.
    DftSet {
        appl_name: ApplicationName,
        address: Address,
    },
    /// `UIPCP_UPDATE`: assigns this IPCP's own address (address
    /// allocation is an administrative input; see spec's Open Questions).
    UpdateAddress { address: Address },
    /// Supplemented: `IPCP_NEIGHBORS_LIST`, read-only listing of enrolled
    /// neighbors plus candidates learned via DFT/LFDB gossip but not yet
    /// enrolled with.
    NeighborsList,
}

#[derive(Clone, Debug)]
pub enum AdminResponse {
    Result { result: i32 },
    Neighbors {
        enrolled: Vec<NeighborSummary>,
        candidates: Vec<CandidateSummary>,
    },
}

impl AdminResponse {
    pub fn ok() -> AdminResponse {
        AdminResponse::Result { result: 0 }
    }

    pub fn err() -> AdminResponse {
        AdminResponse::Result { result: -1 }
    }
}

#[derive(Clone, Debug)]
pub struct NeighborSummary {
    pub name: ApplicationName,
    pub port_id: PortId,
    pub address: Option<Address>,
    pub enrolled: bool,
}

#[derive(Clone, Debug)]
pub struct CandidateSummary {
    pub name: ApplicationName,
    pub address: Address,
}

/// One request/reply pair delivered to the instance's event loop.
pub struct AdminRequest {
    pub command: AdminCommand,
    pub reply: oneshot::Sender<AdminResponse>,
}

/// A cloneable handle used by the admin-socket listener to submit commands
/// to a running `Instance` without holding a reference to it directly.
#[derive(Clone)]
pub struct AdminHandle {
    tx: mpsc::UnboundedSender<AdminRequest>,
}

impl AdminHandle {
    pub fn new(tx: mpsc::UnboundedSender<AdminRequest>) -> AdminHandle {
        AdminHandle { tx }
    }

    pub async fn send(&self, command: AdminCommand) -> Result<AdminResponse, Error> {
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(AdminRequest { command, reply })
            .map_err(|_| Error::Kernel(rina_kernel::Error::ChannelClosed))?;
        reply_rx
            .await
            .map_err(|_| Error::Kernel(rina_kernel::Error::ChannelClosed))
    }
}

pub fn channel() -> (AdminHandle, mpsc::UnboundedReceiver<AdminRequest>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (AdminHandle::new(tx), rx)
}
