//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use rina_utils::{Address, ApplicationName, PortId};
use rina_utils::task::TimeoutTask;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::collections::FlowReqIndex;
use crate::debug::Debug;

/// Default time to wait for `fa_resp` before giving up on a flow
/// allocation request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// The `M_CREATE` payload carried on `/flows` to request a flow from a
/// remote IPCP. Field names are deliberately distinct from
/// `FlowRequest::local_appl`/`remote_appl` (which are relative to the
/// requester): here `requester_appl` and `target_appl` are relative to
/// the wire message itself, so the destination's handler can't confuse
/// which side is asking for the flow.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FlowRequestPayload {
    pub requester_appl: ApplicationName,
    pub target_appl: ApplicationName,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlowRequestState {
    Pending,
    Allocated,
    Denied,
}

/// An outstanding (or resolved) flow-allocation request, grounded on
/// `fa_req`/`fa_resp`/`flow_reqs` in the reference implementation.
#[derive(Debug)]
pub struct FlowRequest {
    pub local_appl: ApplicationName,
    pub remote_appl: ApplicationName,
    pub dst_addr: Address,
    pub port_id: Option<PortId>,
    pub state: FlowRequestState,
    pub timeout: Option<TimeoutTask>,
}

impl FlowRequest {
    pub fn new(
        local_appl: ApplicationName,
        remote_appl: ApplicationName,
        dst_addr: Address,
    ) -> FlowRequest {
        FlowRequest {
            local_appl,
            remote_appl,
            dst_addr,
            port_id: None,
            state: FlowRequestState::Pending,
            timeout: None,
        }
    }

    /// Arms the 5-second flow-allocation timeout, wiring it to notify the
    /// instance event loop via `timeout_tx` (rather than mutating RIB
    /// state from inside the timer's callback, which can't hold a
    /// borrow across an await point).
    pub fn arm_timeout(
        &mut self,
        idx: FlowReqIndex,
        timeout: Duration,
        timeout_tx: UnboundedSender<FlowReqIndex>,
    ) {
        self.timeout = Some(TimeoutTask::new(timeout, move || async move {
            let _ = timeout_tx.send(idx);
        }));
    }

    pub fn resolve(&mut self, port_id: PortId) {
        Debug::FlowAllocated(&self.remote_appl, port_id).log();
        self.port_id = Some(port_id);
        self.state = FlowRequestState::Allocated;
        self.timeout = None;
    }

    pub fn deny(&mut self) {
        self.state = FlowRequestState::Denied;
        self.timeout = None;
    }

    pub fn expire(&mut self) {
        Debug::FlowTimeout(&self.remote_appl).log();
        self.state = FlowRequestState::Denied;
        self.timeout = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_clears_pending_state() {
        let mut req = FlowRequest::new(
            ApplicationName::apn("rina.apps.client"),
            ApplicationName::apn("rina.apps.echo"),
            Address::new(2),
        );
        assert_eq!(req.state, FlowRequestState::Pending);
        req.resolve(PortId::new(5));
        assert_eq!(req.state, FlowRequestState::Allocated);
        assert_eq!(req.port_id, Some(PortId::new(5)));
    }

    #[test]
    fn expire_marks_denied() {
        let mut req = FlowRequest::new(
            ApplicationName::apn("rina.apps.client"),
            ApplicationName::apn("rina.apps.echo"),
            Address::new(2),
        );
        req.expire();
        assert_eq!(req.state, FlowRequestState::Denied);
    }
}
