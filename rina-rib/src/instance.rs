//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::time::Duration;

use rina_cdap::message::{CdapMessage, ObjValue, OpCode};
use rina_cdap::{AData, codec, connection};
use rina_kernel::{ControlChannel, ControlMessage, ManagementChannel, ManagementSdu};
use rina_utils::task::IntervalTask;
use rina_utils::{Address, ApplicationName, PortId};
use tokio::sync::mpsc;

use crate::admin::{
    self, AdminCommand, AdminHandle, AdminRequest, AdminResponse, CandidateSummary,
    NeighborSummary,
};
use crate::collections::{FlowReqIndex, FlowRequests};
use crate::debug::Debug;
use crate::dft::{Dft, DftEntry};
use crate::dispatcher::{self, RibObject};
use crate::error::Error;
use crate::flow::{FlowRequest, FlowRequestPayload, FlowRequestState};
use crate::lfdb::{Lfdb, LfdbEntry, LfdbKey};
use crate::neighbor::{self, Neighbor};
use crate::pduft;
use crate::spengine::{self, SpfScheduler, SpfTriggerMsg};

/// Everything the instance needs to know to run, gathered at construction
/// time from the administrative configuration (the `IPCP_CREATE` /
/// `IPCP_CONFIG` commands that bring this IPC Process up).
pub struct InstanceConfig {
    pub address: Address,
    pub name: ApplicationName,
    /// The DIF this instance belongs to. Identity metadata mirrored into
    /// persistent state and the admin socket's views of the instance; the
    /// RIB itself never branches on it; since an `Instance` only ever
    /// represents membership in one DIF, every neighbor and DFT entry it
    /// handles is implicitly already scoped to it.
    pub dif_name: String,
    pub max_pending: usize,
    pub spf_debounce: Duration,
    pub age_max: Duration,
    pub age_tick: Duration,
    pub flow_timeout: Duration,
    pub enrollment_timeout: Duration,
}

/// A running IPC Process: the RIB state (neighbors, DFT, LFDB, flow
/// requests) plus the channels to the kernel and to the neighbors it
/// exchanges CDAP traffic with.
///
/// Generic over the channel implementations the same way
/// `holo-isis::instance::Instance` is generic over its northbound/
/// southbound transport, so tests can plug in [`rina_kernel::channel::MockControlChannel`]
/// / [`rina_kernel::channel::MockManagementChannel`] without a real kernel module.
pub struct Instance<C, M> {
    pub config: InstanceConfig,
    pub neighbors: BTreeMap<PortId, Neighbor>,
    neighbor_ports: BTreeMap<Address, PortId>,
    pub dft: Dft,
    pub lfdb: Lfdb,
    pub flow_reqs: FlowRequests,
    /// Neighbors known about via DFT gossip but not yet enrolled with,
    /// keyed by the address they were last seen advertising from.
    /// Mirrors the reference implementation's `cand_neighbors`
    /// bookkeeping (see DESIGN.md).
    candidate_neighbors: BTreeMap<Address, ApplicationName>,
    spf: SpfScheduler,
    next_hops: BTreeMap<Address, Address>,
    kernel: C,
    mgmt: M,
    spf_trigger_tx: mpsc::UnboundedSender<SpfTriggerMsg>,
    spf_trigger_rx: mpsc::UnboundedReceiver<SpfTriggerMsg>,
    flow_timeout_tx: mpsc::UnboundedSender<FlowReqIndex>,
    flow_timeout_rx: mpsc::UnboundedReceiver<FlowReqIndex>,
    enrollment_timeout_tx: mpsc::UnboundedSender<PortId>,
    enrollment_timeout_rx: mpsc::UnboundedReceiver<PortId>,
    admin_rx: mpsc::UnboundedReceiver<AdminRequest>,
    age_tick_tx: mpsc::UnboundedSender<()>,
    age_tick_rx: mpsc::UnboundedReceiver<()>,
    /// Drives the periodic LFDB aging sweep; kept alive for as long as the
    /// instance runs rather than rearmed per-tick, unlike the debounced SPF
    /// timer or the per-neighbor enrollment timeout.
    age_timer: IntervalTask,
}

impl<C: ControlChannel, M: ManagementChannel> Instance<C, M> {
    /// Builds a new instance and the [`AdminHandle`] used to submit
    /// administrative commands to it once [`Instance::run`] is driving
    /// its event loop.
    pub fn new(config: InstanceConfig, kernel: C, mgmt: M) -> (Instance<C, M>, AdminHandle) {
        let (spf_trigger_tx, spf_trigger_rx) = mpsc::unbounded_channel();
        let (flow_timeout_tx, flow_timeout_rx) = mpsc::unbounded_channel();
        let (enrollment_timeout_tx, enrollment_timeout_rx) = mpsc::unbounded_channel();
        let (age_tick_tx, age_tick_rx) = mpsc::unbounded_channel();
        let (admin_handle, admin_rx) = admin::channel();
        let age_timer_tx = age_tick_tx.clone();
        let age_timer = IntervalTask::new(config.age_tick, false, move || {
            let tx = age_timer_tx.clone();
            async move {
                let _ = tx.send(());
            }
        });
        let instance = Instance {
            config,
            neighbors: BTreeMap::new(),
            neighbor_ports: BTreeMap::new(),
            dft: Dft::default(),
            lfdb: Lfdb::default(),
            flow_reqs: FlowRequests::default(),
            candidate_neighbors: BTreeMap::new(),
            spf: SpfScheduler::default(),
            next_hops: BTreeMap::new(),
            kernel,
            mgmt,
            spf_trigger_tx,
            spf_trigger_rx,
            flow_timeout_tx,
            flow_timeout_rx,
            enrollment_timeout_tx,
            enrollment_timeout_rx,
            admin_rx,
            age_tick_tx,
            age_tick_rx,
            age_timer,
        };
        (instance, admin_handle)
    }

    /// Arms or clears the per-step enrollment timeout for `port_id`
    /// depending on whether its neighbor just reached a terminal state
    /// (`Enrolled`, or `None` after an abort), per the per-step
    /// enrollment timeout rule.
    fn rearm_enrollment_timeout(&mut self, port_id: PortId) {
        let timeout = self.config.enrollment_timeout;
        let timeout_tx = self.enrollment_timeout_tx.clone();
        if let Ok(nbr) = self.neighbor_mut(port_id) {
            match nbr.state {
                neighbor::fsm::State::None | neighbor::fsm::State::Enrolled => {
                    nbr.clear_timeout();
                }
                _ => nbr.arm_timeout(timeout, timeout_tx),
            }
        }
    }

    /// Aborts a neighbor whose current enrollment step didn't complete
    /// within its timeout.
    fn expire_enrollment(&mut self, port_id: PortId) {
        if let Ok(nbr) = self.neighbor_mut(port_id) {
            if nbr.state != neighbor::fsm::State::Enrolled {
                Error::EnrollmentTimeout(nbr.name.clone()).log();
                nbr.abort("enrollment step timed out");
            }
        }
    }

    /// Creates a neighbor entry for a freshly allocated (N-1)-flow and
    /// kicks off enrollment as the initiator, returning the CDAP message
    /// that must be sent to start it.
    pub fn start_enrollment(
        &mut self,
        name: ApplicationName,
        port_id: PortId,
    ) -> Result<CdapMessage, Error> {
        let mut nbr = Neighbor::new(name, port_id, self.config.max_pending);
        let action = nbr.fsm(neighbor::fsm::Event::StartEnrollment)?;
        let invoke_id = nbr.conn.invoke_ids.allocate().map_err(Error::Cdap)?;
        nbr.conn
            .fsm(connection::fsm::Event::ConnectSent)
            .map_err(Error::Cdap)?;
        self.neighbors.insert(port_id, nbr);
        assert_eq!(action, Some(neighbor::fsm::Action::SendConnect));
        self.rearm_enrollment_timeout(port_id);
        Ok(CdapMessage::request(OpCode::MConnect, "enrollment", "/enrollment")
            .with_invoke_id(invoke_id))
    }

    /// Registers a neighbor reached passively (the peer initiated
    /// enrollment towards us), as seen on `M_CONNECT` arrival before the
    /// enrollment FSM runs.
    fn neighbor_mut(&mut self, port_id: PortId) -> Result<&mut Neighbor, Error> {
        self.neighbors
            .get_mut(&port_id)
            .ok_or(Error::UnknownNeighbor(port_id))
    }

    pub async fn handle_control_message(
        &mut self,
        msg: ControlMessage,
    ) -> Result<(), Error> {
        match msg {
            ControlMessage::FaReq {
                local_appl,
                remote_appl,
                ..
            } => {
                self.request_flow(local_appl, remote_appl).await?;
                Ok(())
            }
            ControlMessage::FaReqArrived {
                port_id,
                local_appl,
                remote_appl,
                ..
            } => {
                self.neighbors
                    .entry(port_id)
                    .or_insert_with(|| Neighbor::new(remote_appl, port_id, self.config.max_pending));
                let _ = local_appl;
                Ok(())
            }
            ControlMessage::FaRespArrived { port_id, response } => {
                if response == 0 {
                    if let Ok(nbr) = self.neighbor_mut(port_id) {
                        nbr.fsm(neighbor::fsm::Event::ConnectAccepted)?;
                    }
                }
                Ok(())
            }
            ControlMessage::FlowDeallocated { port_id } => {
                if let Some(mut nbr) = self.neighbors.remove(&port_id) {
                    Debug::NeighborDelete(&nbr.name, port_id).log();
                    if let Some(addr) = nbr.address {
                        self.neighbor_ports.remove(&addr);
                    }
                    nbr.abort("transport closed");
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Decodes an inbound management SDU as an A-DATA envelope and either
    /// processes the embedded CDAP message locally (when we're the
    /// destination) or relays it unmodified towards its next hop.
    pub async fn handle_management_sdu(
        &mut self,
        sdu: ManagementSdu,
    ) -> Result<(), Error> {
        let adata = codec::decode_adata(&sdu.payload).map_err(rina_cdap::Error::from)?;
        // `DEFAULT_ROUTE` marks traffic meant for whoever is directly on
        // the other end of this port (enrollment, and DFT/LFDB gossip
        // between already-adjacent neighbors); anything else carries a
        // real destination address that may be further away and needs
        // routing.
        if adata.dst_addr == self.config.address || adata.dst_addr == Address::DEFAULT_ROUTE {
            self.handle_cdap(sdu.src_addr, sdu.port_id, adata.cdap_message)
                .await
        } else {
            self.relay(adata, sdu.src_addr).await
        }
    }

    /// Resolves the outgoing port for a message bound for `dst_addr`: the
    /// neighbor at the first hop of the SPF-computed path, used both to
    /// relay transit traffic and to send a flow-allocation request towards
    /// a destination that may not be directly adjacent.
    fn outgoing_port(&self, dst_addr: Address) -> Result<PortId, Error> {
        let next_hop = self
            .next_hops
            .get(&dst_addr)
            .copied()
            .ok_or(Error::NoRouteToAddress(dst_addr))?;
        self.neighbor_ports
            .get(&next_hop)
            .copied()
            .ok_or(Error::NoRouteToAddress(next_hop))
    }

    async fn relay(&mut self, adata: AData, from_port: Address) -> Result<(), Error> {
        let out_port = self.outgoing_port(adata.dst_addr)?;
        let _ = from_port;
        let payload = codec::encode_adata(&adata).map_err(rina_cdap::Error::from)?;
        self.mgmt
            .send(ManagementSdu {
                src_addr: self.config.address,
                port_id: out_port,
                payload,
            })
            .await?;
        Ok(())
    }

    async fn handle_cdap(
        &mut self,
        src_addr: Address,
        port_id: PortId,
        msg: CdapMessage,
    ) -> Result<(), Error> {
        match dispatcher::dispatch(&msg.obj_class, &msg.obj_name) {
            Some(RibObject::Enrollment) => self.handle_enrollment(src_addr, port_id, msg).await,
            Some(RibObject::Dft) => self.handle_dft(port_id, msg).await,
            Some(RibObject::Lfdb) => self.handle_lfdb(port_id, msg).await,
            Some(RibObject::Flows) => self.handle_flow(port_id, msg).await,
            _ => {
                tracing::warn!(obj_class = %msg.obj_class, obj_name = %msg.obj_name, "unhandled CDAP object");
                Ok(())
            }
        }
    }

    async fn handle_enrollment(
        &mut self,
        src_addr: Address,
        port_id: PortId,
        msg: CdapMessage,
    ) -> Result<(), Error> {
        let state = self.neighbor_mut(port_id)?.state;
        // M_START is overloaded: the same op-code completes the responder
        // path's last leg (from I_WAIT_START) as well as kicking off the
        // responder's reply (from S_WAIT_START), so which FSM event it maps
        // to depends on the neighbor's current state rather than the
        // message alone.
        let event = match msg.op_code {
            OpCode::MConnect => neighbor::fsm::Event::ConnectAccepted,
            OpCode::MConnectR => neighbor::fsm::Event::MConnectRRcvd,
            OpCode::MStart if state == neighbor::fsm::State::IWaitStart => {
                neighbor::fsm::Event::MFinalStartRcvd
            }
            OpCode::MStart => neighbor::fsm::Event::MStartRcvd,
            OpCode::MStartR => neighbor::fsm::Event::MStartRRcvd,
            OpCode::MStop => neighbor::fsm::Event::MStopRcvd,
            OpCode::MStopR => neighbor::fsm::Event::MStopRRcvd,
            _ => neighbor::fsm::Event::Abort,
        };

        let nbr = self.neighbor_mut(port_id)?;
        nbr.address = Some(src_addr);
        self.neighbor_ports.insert(src_addr, port_id);
        self.candidate_neighbors.remove(&src_addr);

        // The CDAP connection FSM tracks the lower-level M_CONNECT/
        // M_CONNECT_R handshake, independently of the enrollment
        // choreography layered on top of it below: a responder answers
        // M_CONNECT with M_CONNECT_R as soon as it's seen, regardless of
        // what (if anything) the enrollment FSM itself does with the same
        // message.
        let conn_event = match msg.op_code {
            OpCode::MConnect => Some(connection::fsm::Event::ConnectRcvd),
            OpCode::MConnectR => Some(connection::fsm::Event::ConnectRRcvd),
            _ => None,
        };
        let mut conn_reply = None;
        if let Some(conn_event) = conn_event {
            match self.neighbor_mut(port_id)?.conn.fsm(conn_event) {
                Ok(Some(connection::fsm::Action::SendConnectR)) => {
                    conn_reply = Some(CdapMessage::response_to(&msg, 0, ""));
                }
                Ok(_) => {}
                Err(error) => {
                    error.log();
                    if let Ok(nbr) = self.neighbor_mut(port_id) {
                        nbr.abort("protocol violation");
                    }
                    return Ok(());
                }
            }
        }

        // Invoke-id bookkeeping is best-effort here: a mismatch is a sign
        // the peer is misbehaving, worth a warning, but not a reason to
        // abort an enrollment that the FSM itself still considers valid.
        let invoke_ids = &mut self.neighbor_mut(port_id)?.conn.invoke_ids;
        if msg.op_code.is_response() {
            if let Err(error) = invoke_ids.release_local(msg.invoke_id) {
                error.log();
            }
        } else if let Err(error) = invoke_ids.accept_remote(msg.invoke_id) {
            error.log();
        }

        // A protocol violation aborts the affected neighbor only; it must
        // never bubble up and tear down the whole instance.
        let action = match self.neighbor_mut(port_id)?.fsm(event) {
            Ok(action) => action,
            Err(error) => {
                error.log();
                if let Ok(nbr) = self.neighbor_mut(port_id) {
                    nbr.abort("protocol violation");
                }
                return Ok(());
            }
        };

        let replies: Vec<CdapMessage> = match action {
            Some(neighbor::fsm::Action::SendStart) => {
                let id = self.neighbor_mut(port_id)?.conn.invoke_ids.allocate().map_err(Error::Cdap)?;
                vec![CdapMessage::request(OpCode::MStart, "enrollment", "/enrollment").with_invoke_id(id)]
            }
            // Answers the inbound M_START with M_START_R before moving on
            // to M_STOP, the two replies the responder owes at this step.
            Some(neighbor::fsm::Action::SendStartRAndStop) => {
                let start_r = CdapMessage::response_to(&msg, 0, "");
                let id = self.neighbor_mut(port_id)?.conn.invoke_ids.allocate().map_err(Error::Cdap)?;
                let stop = CdapMessage::request(OpCode::MStop, "enrollment", "/enrollment").with_invoke_id(id);
                vec![start_r, stop]
            }
            Some(neighbor::fsm::Action::SendStopR) => {
                vec![CdapMessage::response_to(&msg, 0, "")]
            }
            Some(neighbor::fsm::Action::SendFinalStart) => vec![
                CdapMessage::request(OpCode::MStart, "enrollment", "/enrollment")
                    .with_invoke_id(msg.invoke_id),
            ],
            _ => Vec::new(),
        };

        if let Some(reply) = conn_reply {
            self.send_to(port_id, Address::DEFAULT_ROUTE, reply).await?;
        }
        for reply in replies {
            self.send_to(port_id, Address::DEFAULT_ROUTE, reply).await?;
        }

        if action == Some(neighbor::fsm::Action::EnrollmentComplete) {
            self.dft.set_local(
                self.config.name.clone(),
                self.config.address,
                chrono_now(),
            );
            self.lfdb.add_local(self.config.address, src_addr, 1);
            self.spf.mark_dirty(
                self.config.spf_debounce,
                self.spf_trigger_tx.clone(),
            );
            self.sync_neighbor(port_id).await?;
        }
        self.rearm_enrollment_timeout(port_id);
        Ok(())
    }

    /// Sends the full DFT and LFDB to a neighbor that has just reached
    /// `ENROLLED`, so it converges immediately instead of waiting on
    /// whatever incremental gossip happens to arrive afterwards.
    async fn sync_neighbor(&mut self, port_id: PortId) -> Result<(), Error> {
        let dft_entries: Vec<DftEntry> = self.dft.iter().cloned().collect();
        for entry in dft_entries {
            let body = serde_json::to_string(&entry).expect("DftEntry always serializes");
            let msg = CdapMessage::request(OpCode::MCreate, "dft", "/dft")
                .with_obj_value(ObjValue::String(body));
            self.send_to(port_id, Address::DEFAULT_ROUTE, msg).await?;
        }
        let lfdb_entries: Vec<LfdbEntry> = self.lfdb.iter().copied().collect();
        for entry in lfdb_entries {
            let body = serde_json::to_string(&entry).expect("LfdbEntry always serializes");
            let msg = CdapMessage::request(OpCode::MCreate, "lfdb", "/lfdb")
                .with_obj_value(ObjValue::String(body));
            self.send_to(port_id, Address::DEFAULT_ROUTE, msg).await?;
        }
        Ok(())
    }

    /// Sends `msg` to every enrolled neighbor, skipping the one reached
    /// over `except` when given (the sender of a message being forwarded,
    /// so it isn't reflected straight back at itself).
    async fn broadcast_to_enrolled(
        &mut self,
        except: Option<PortId>,
        msg: CdapMessage,
    ) -> Result<(), Error> {
        let targets: Vec<PortId> = self
            .neighbors
            .values()
            .filter(|nbr| nbr.is_enrolled() && Some(nbr.port_id) != except)
            .map(|nbr| nbr.port_id)
            .collect();
        for port_id in targets {
            self.send_to(port_id, Address::DEFAULT_ROUTE, msg.clone())
                .await?;
        }
        Ok(())
    }

    async fn handle_dft(&mut self, port_id: PortId, msg: CdapMessage) -> Result<(), Error> {
        let ObjValue::String(payload) = &msg.obj_value else {
            return Ok(());
        };
        let Ok(entry) = serde_json::from_str::<DftEntry>(payload) else {
            return Ok(());
        };
        let accepted = if msg.op_code == OpCode::MDelete {
            self.dft.remove(&entry.appl_name).is_some()
        } else {
            self.dft.merge_remote(entry.clone())
        };
        if !accepted {
            return Ok(());
        }
        if entry.address != self.config.address && !self.neighbor_ports.contains_key(&entry.address) {
            self.candidate_neighbors.insert(entry.address, entry.appl_name);
        }
        self.broadcast_to_enrolled(Some(port_id), msg).await
    }

    async fn handle_lfdb(&mut self, port_id: PortId, msg: CdapMessage) -> Result<(), Error> {
        let ObjValue::String(payload) = &msg.obj_value else {
            return Ok(());
        };
        let Ok(entry) = serde_json::from_str::<LfdbEntry>(payload) else {
            return Ok(());
        };
        let accepted = if msg.op_code == OpCode::MDelete {
            let key = LfdbKey {
                local_addr: entry.local_addr,
                remote_addr: entry.remote_addr,
            };
            self.lfdb.remove(&key).is_some()
        } else {
            self.lfdb.merge_remote(entry)
        };
        if !accepted {
            return Ok(());
        }
        self.spf.mark_dirty(self.config.spf_debounce, self.spf_trigger_tx.clone());
        self.broadcast_to_enrolled(Some(port_id), msg).await
    }

    async fn handle_flow(&mut self, port_id: PortId, msg: CdapMessage) -> Result<(), Error> {
        match msg.op_code {
            OpCode::MCreate => {
                let ObjValue::String(payload) = &msg.obj_value else {
                    return Ok(());
                };
                let Ok(request) = serde_json::from_str::<FlowRequestPayload>(payload) else {
                    return Ok(());
                };
                // No real kernel module backs this IPCP, so "delivering"
                // the flow is simulated: an application counts as
                // listening when it holds a DFT registration here.
                let result = if self.dft.lookup(&request.target_appl).is_some() {
                    0
                } else {
                    -1
                };
                Debug::FlowArrived(&request.target_appl).log();
                let reply = CdapMessage::response_to(&msg, result, "")
                    .with_obj_value(ObjValue::String(request.target_appl.to_canonical_string()));
                self.send_to(port_id, Address::DEFAULT_ROUTE, reply).await
            }
            OpCode::MCreateR => {
                let ObjValue::String(name) = &msg.obj_value else {
                    return Ok(());
                };
                let Ok(remote_appl) = ApplicationName::from_canonical_string(name) else {
                    return Ok(());
                };
                if let Ok(idx) = self.flow_reqs.lookup(&remote_appl) {
                    if let Some(req) = self.flow_reqs.get_mut(idx) {
                        if msg.result == 0 {
                            req.resolve(port_id);
                        } else {
                            req.deny();
                        }
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn send_to(
        &mut self,
        port_id: PortId,
        dst_addr: Address,
        msg: CdapMessage,
    ) -> Result<(), Error> {
        let adata = AData::new(self.config.address, dst_addr, msg);
        let payload = codec::encode_adata(&adata).map_err(rina_cdap::Error::from)?;
        self.mgmt
            .send(ManagementSdu {
                src_addr: self.config.address,
                port_id,
                payload,
            })
            .await?;
        Ok(())
    }

    /// Begins allocating a flow towards `remote_appl`, resolving its
    /// address through the DFT first. A destination that resolves to this
    /// IPCP's own address is a local loopback, handed back to the
    /// registrar immediately rather than sent over the wire; any other
    /// destination gets an `M_CREATE` routed towards it, possibly through
    /// one or more relays.
    pub async fn request_flow(
        &mut self,
        local_appl: ApplicationName,
        remote_appl: ApplicationName,
    ) -> Result<FlowReqIndex, Error> {
        let dst_addr = self
            .dft
            .lookup(&remote_appl)
            .ok_or_else(|| Error::DftLookupFailed(remote_appl.clone()))?;
        let req = FlowRequest::new(local_appl.clone(), remote_appl.clone(), dst_addr);
        let idx = self.flow_reqs.insert(req);

        if dst_addr == self.config.address {
            if let Some(req) = self.flow_reqs.get_mut(idx) {
                req.resolve(PortId::LOOPBACK);
            }
            return Ok(idx);
        }

        let out_port = self.outgoing_port(dst_addr)?;
        let payload = FlowRequestPayload {
            requester_appl: local_appl,
            target_appl: remote_appl,
        };
        let body =
            serde_json::to_string(&payload).expect("FlowRequestPayload always serializes");
        let msg = CdapMessage::request(OpCode::MCreate, "flows", "/flows")
            .with_obj_value(ObjValue::String(body));
        self.send_to(out_port, dst_addr, msg).await?;

        if let Some(req) = self.flow_reqs.get_mut(idx) {
            req.arm_timeout(idx, self.config.flow_timeout, self.flow_timeout_tx.clone());
        }
        Ok(idx)
    }

    /// Services one administrative command: `IPCP_REGISTER`, `IPCP_ENROLL`,
    /// `IPCP_DFT_SET`, `UIPCP_UPDATE` and the supplemented
    /// `IPCP_NEIGHBORS_LIST`.
    async fn handle_admin(&mut self, command: AdminCommand) -> AdminResponse {
        match command {
            AdminCommand::Register { appl_name, register } => {
                let now = chrono_now();
                if register {
                    self.dft.set_local(appl_name.clone(), self.config.address, now);
                } else {
                    self.dft.remove(&appl_name);
                }
                let entry = DftEntry {
                    appl_name,
                    address: self.config.address,
                    timestamp: now,
                };
                let op_code = if register { OpCode::MCreate } else { OpCode::MDelete };
                let body = serde_json::to_string(&entry).expect("DftEntry always serializes");
                let msg = CdapMessage::request(op_code, "dft", "/dft")
                    .with_obj_value(ObjValue::String(body));
                match self.broadcast_to_enrolled(None, msg).await {
                    Ok(()) => AdminResponse::ok(),
                    Err(error) => {
                        error.log();
                        AdminResponse::err()
                    }
                }
            }
            AdminCommand::Enroll { neighbor_name, port_id } => {
                match self.start_enrollment(neighbor_name, port_id) {
                    Ok(msg) => match self.send_to(port_id, Address::DEFAULT_ROUTE, msg).await {
                        Ok(()) => AdminResponse::ok(),
                        Err(error) => {
                            error.log();
                            AdminResponse::err()
                        }
                    },
                    Err(error) => {
                        error.log();
                        AdminResponse::err()
                    }
                }
            }
            AdminCommand::DftSet { appl_name, address } => {
                self.dft.set_local(appl_name, address, chrono_now());
                AdminResponse::ok()
            }
            AdminCommand::UpdateAddress { address } => {
                self.config.address = address;
                AdminResponse::ok()
            }
            AdminCommand::NeighborsList => {
                let enrolled = self
                    .neighbors
                    .values()
                    .map(|nbr| NeighborSummary {
                        name: nbr.name.clone(),
                        port_id: nbr.port_id,
                        address: nbr.address,
                        enrolled: nbr.is_enrolled(),
                    })
                    .collect();
                let candidates = self
                    .candidate_neighbors
                    .iter()
                    .map(|(address, name)| CandidateSummary {
                        name: name.clone(),
                        address: *address,
                    })
                    .collect();
                AdminResponse::Neighbors { enrolled, candidates }
            }
        }
    }

    fn expire_flow_request(&mut self, idx: FlowReqIndex) {
        if let Some(req) = self.flow_reqs.get_mut(idx) {
            if req.state == FlowRequestState::Pending {
                req.expire();
            }
        }
    }

    /// Runs SPF, rebuilds the PDUFT and returns the kernel sync message to
    /// send, or `None` if the topology wasn't actually dirty. Normally
    /// driven by the debounce timer inside [`Instance::run`]; exposed so
    /// tests can force a recomputation without waiting on it.
    pub fn run_spf(&mut self) -> Option<ControlMessage> {
        if !self.spf.is_dirty() {
            return None;
        }
        self.next_hops = spengine::run(self.config.address, &self.lfdb);
        Debug::SpfRun(self.next_hops.len()).log();
        self.spf.computed();
        let entries = pduft::build(&self.next_hops, &self.neighbor_ports);
        Some(pduft::sync_message(&entries))
    }

    /// Sweeps the LFDB for entries that haven't been refreshed within
    /// `age_max`, evicting them and broadcasting their removal to every
    /// enrolled neighbor, the same replication rule any other accepted
    /// LFDB change follows.
    async fn age_tick(&mut self) -> Result<(), Error> {
        let expired = self.lfdb.age_tick(self.config.age_tick, self.config.age_max);
        if expired.is_empty() {
            return Ok(());
        }
        self.spf.mark_dirty(self.config.spf_debounce, self.spf_trigger_tx.clone());
        for entry in expired {
            let body = serde_json::to_string(&entry).expect("LfdbEntry always serializes");
            let msg = CdapMessage::request(OpCode::MDelete, "lfdb", "/lfdb")
                .with_obj_value(ObjValue::String(body));
            self.broadcast_to_enrolled(None, msg).await?;
        }
        Ok(())
    }

    /// Drives the instance event loop: kernel control messages, management
    /// SDUs, the SPF debounce timer, the LFDB aging sweep and
    /// flow-allocation/enrollment timeouts.
    pub async fn run(&mut self) -> Result<(), Error> {
        loop {
            tokio::select! {
                msg = self.kernel.recv() => {
                    // Only the channel read itself (Transport) is fatal to
                    // this instance; errors from processing the message's
                    // content are contained here and must not end the task.
                    if let Err(error) = self.handle_control_message(msg?).await {
                        error.log();
                    }
                }
                sdu = self.mgmt.recv() => {
                    if let Err(error) = self.handle_management_sdu(sdu?).await {
                        error.log();
                    }
                }
                Some(_trigger) = self.spf_trigger_rx.recv() => {
                    if let Some(sync) = self.run_spf() {
                        self.kernel.send(sync).await?;
                    }
                }
                Some(idx) = self.flow_timeout_rx.recv() => {
                    self.expire_flow_request(idx);
                }
                Some(port_id) = self.enrollment_timeout_rx.recv() => {
                    self.expire_enrollment(port_id);
                }
                Some(()) = self.age_tick_rx.recv() => {
                    if let Err(error) = self.age_tick().await {
                        error.log();
                    }
                }
                Some(req) = self.admin_rx.recv() => {
                    let response = self.handle_admin(req.command).await;
                    let _ = req.reply.send(response);
                }
            }
        }
    }
}

fn chrono_now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

#[cfg(test)]
mod tests {
    use rina_kernel::channel::{MockControlChannel, MockManagementChannel};

    use super::*;

    fn config(address: u64) -> InstanceConfig {
        InstanceConfig {
            address: Address::new(address),
            name: ApplicationName::apn("rina.ipcp.test"),
            dif_name: "test.dif".to_owned(),
            max_pending: 16,
            spf_debounce: Duration::from_millis(1),
            age_max: Duration::from_secs(300),
            age_tick: Duration::from_secs(10),
            flow_timeout: Duration::from_secs(5),
            enrollment_timeout: Duration::from_secs(10),
        }
    }

    #[tokio::test]
    async fn start_enrollment_arms_initiator_fsm() {
        let (kernel, _) = MockControlChannel::pair();
        let (mgmt, _) = MockManagementChannel::pair();
        let (mut instance, _admin) = Instance::new(config(1), kernel, mgmt);
        let msg = instance
            .start_enrollment(ApplicationName::apn("rina.ipcp.peer"), PortId::new(1))
            .unwrap();
        assert_eq!(msg.op_code, OpCode::MConnect);
        assert_ne!(msg.invoke_id, 0, "a freshly allocated invoke-id is never 0");
        assert!(instance.neighbors.contains_key(&PortId::new(1)));
    }

    #[tokio::test]
    async fn spf_is_not_dirty_without_topology_changes() {
        let (kernel, _) = MockControlChannel::pair();
        let (mgmt, _) = MockManagementChannel::pair();
        let (mut instance, _admin) = Instance::new(config(1), kernel, mgmt);
        assert!(instance.run_spf().is_none());
    }

    #[tokio::test]
    async fn admin_register_sets_local_dft_entry() {
        let (kernel, _) = MockControlChannel::pair();
        let (mgmt, _) = MockManagementChannel::pair();
        let (mut instance, _admin) = Instance::new(config(1), kernel, mgmt);
        let name = ApplicationName::apn("rina.apps.echo");
        let response = instance
            .handle_admin(AdminCommand::Register {
                appl_name: name.clone(),
                register: true,
            })
            .await;
        assert!(matches!(response, AdminResponse::Result { result: 0 }));
        assert_eq!(instance.dft.lookup(&name), Some(Address::new(1)));
    }

    #[tokio::test]
    async fn admin_neighbors_list_reports_candidates() {
        let (kernel, _) = MockControlChannel::pair();
        let (mgmt, _) = MockManagementChannel::pair();
        let (mut instance, _admin) = Instance::new(config(1), kernel, mgmt);
        instance
            .candidate_neighbors
            .insert(Address::new(9), ApplicationName::apn("rina.ipcp.far"));
        let response = instance.handle_admin(AdminCommand::NeighborsList).await;
        match response {
            AdminResponse::Neighbors { enrolled, candidates } => {
                assert!(enrolled.is_empty());
                assert_eq!(candidates.len(), 1);
                assert_eq!(candidates[0].address, Address::new(9));
            }
            _ => panic!("expected a Neighbors response"),
        }
    }
}
