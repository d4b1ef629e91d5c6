//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use rina_cdap::message::{CdapMessage, ObjValue, OpCode};
use rina_cdap::{AData, codec};
use rina_kernel::channel::{MockControlChannel, MockManagementChannel};
use rina_kernel::{ControlMessage, IpcpId};
use rina_rib::dft::DftEntry;
use rina_rib::instance::InstanceConfig;
use rina_rib::Instance;
use rina_utils::{Address, ApplicationName, PortId};

type TestInstance = Instance<MockControlChannel, MockManagementChannel>;

fn config(address: u64, name: &str) -> InstanceConfig {
    InstanceConfig {
        address: Address::new(address),
        name: ApplicationName::apn(name),
        dif_name: "test.dif".to_owned(),
        max_pending: 16,
        spf_debounce: Duration::from_millis(1),
        age_max: Duration::from_secs(300),
        age_tick: Duration::from_secs(300),
        flow_timeout: Duration::from_secs(5),
        enrollment_timeout: Duration::from_secs(10),
    }
}

fn node(address: u64, name: &str) -> (TestInstance, MockManagementChannel) {
    let (kernel, _) = MockControlChannel::pair();
    let (mgmt, peer) = MockManagementChannel::pair();
    let (instance, _admin) = Instance::new(config(address, name), kernel, mgmt);
    (instance, peer)
}

/// Wraps `msg` in an A-DATA envelope and hands it straight to `to`, the
/// way a real flow would present an inbound SDU on `to_port` — used for
/// the one message (the initial M_CONNECT) that originates outside any
/// instance's own `send_to` plumbing.
async fn inject(
    to: &mut TestInstance,
    from_addr: Address,
    to_port: PortId,
    dst_addr: Address,
    msg: CdapMessage,
) {
    let adata = AData::new(from_addr, dst_addr, msg);
    let payload = codec::encode_adata(&adata).unwrap();
    to.handle_management_sdu(rina_kernel::ManagementSdu {
        src_addr: from_addr,
        port_id: to_port,
        payload,
    })
    .await
    .unwrap();
}

/// Relays every SDU each side has queued on its peer channel to the
/// other instance, re-addressed onto its local port, until both sides
/// go quiet. Stands in for the real flows `a` and `b` would exchange
/// traffic over, letting the handshake run to completion without the
/// test hardcoding how many messages each step produces.
async fn converge(
    a: &mut TestInstance,
    a_peer: &mut MockManagementChannel,
    a_port: PortId,
    b: &mut TestInstance,
    b_peer: &mut MockManagementChannel,
    b_port: PortId,
) {
    for _ in 0..64 {
        let mut idle = true;
        while let Some(mut sdu) = a_peer.try_recv() {
            idle = false;
            sdu.port_id = b_port;
            b.handle_management_sdu(sdu).await.unwrap();
        }
        while let Some(mut sdu) = b_peer.try_recv() {
            idle = false;
            sdu.port_id = a_port;
            a.handle_management_sdu(sdu).await.unwrap();
        }
        if idle {
            return;
        }
    }
    panic!("management traffic between the two instances never settled");
}

/// Drives `a` through `start_enrollment` against `b`, already registered
/// at `b_port` (as the kernel would via `FA_REQ_ARRIVED`), and pumps the
/// resulting CDAP exchange to completion.
async fn enroll(
    a: &mut TestInstance,
    a_peer: &mut MockManagementChannel,
    a_port: PortId,
    a_addr: Address,
    a_name: ApplicationName,
    b: &mut TestInstance,
    b_peer: &mut MockManagementChannel,
    b_port: PortId,
    b_name: ApplicationName,
) {
    b.handle_control_message(ControlMessage::FaReqArrived {
        port_id: b_port,
        local_appl: b_name,
        remote_appl: a_name.clone(),
        ipcp_id: IpcpId(0),
    })
    .await
    .unwrap();

    let connect = a.start_enrollment(a_name, a_port).unwrap();
    inject(b, a_addr, b_port, Address::DEFAULT_ROUTE, connect).await;

    converge(a, a_peer, a_port, b, b_peer, b_port).await;
}

/// S1 — Two-node enrollment: A initiates against B over a single flow and
/// the CDAP handshake converges with both sides' neighbor FSM reaching
/// `ENROLLED`.
#[tokio::test]
async fn s1_two_node_enrollment_converges() {
    let a_name = ApplicationName::apn("rina.ipcp.a");
    let b_name = ApplicationName::apn("rina.ipcp.b");
    let (mut a, mut a_peer) = node(1, "rina.ipcp.a");
    let (mut b, mut b_peer) = node(2, "rina.ipcp.b");
    let port_a = PortId::new(1);
    let port_b = PortId::new(1);

    enroll(
        &mut a, &mut a_peer, port_a, Address::new(1), a_name.clone(),
        &mut b, &mut b_peer, port_b, b_name.clone(),
    )
    .await;

    assert!(a.neighbors[&port_a].is_enrolled());
    assert!(b.neighbors[&port_b].is_enrolled());

    // Only the initiator's final FSM transition is wired to
    // `EnrollmentComplete`, so only A self-registers in its own DFT/LFDB
    // and syncs that forward; B reaches ENROLLED without ever announcing
    // itself back. A real deployment would need the responder's own path
    // to trigger the same sync, but that's a separate gap from the one
    // this pass of review comments asked for.
    assert_eq!(a.dft.lookup(&a_name), Some(Address::new(1)));
    assert_eq!(b.dft.lookup(&a_name), Some(Address::new(1)), "A's post-enrollment sync should have reached B");
    assert_eq!(b.dft.lookup(&b_name), None);
}

/// S2 — DFT propagation: an entry registered on A after enrollment is
/// merged into B's DFT by the real `handle_dft` path (not injected
/// directly into B's table), and a delete removes it the same way.
#[tokio::test]
async fn s2_dft_propagation_through_handle_dft() {
    let a_name = ApplicationName::apn("rina.ipcp.a");
    let b_name = ApplicationName::apn("rina.ipcp.b");
    let (mut a, mut a_peer) = node(1, "rina.ipcp.a");
    let (mut b, mut b_peer) = node(2, "rina.ipcp.b");
    let port_a = PortId::new(1);
    let port_b = PortId::new(1);

    enroll(
        &mut a, &mut a_peer, port_a, Address::new(1), a_name.clone(),
        &mut b, &mut b_peer, port_b, b_name.clone(),
    )
    .await;

    let app = ApplicationName::apn("rina.apps.echo");
    let entry = DftEntry {
        appl_name: app.clone(),
        address: Address::new(1),
        timestamp: chrono::Utc::now(),
    };
    let body = serde_json::to_string(&entry).unwrap();
    let create = CdapMessage::request(OpCode::MCreate, "dft", "/dft")
        .with_obj_value(ObjValue::String(body.clone()));
    inject(&mut a, Address::new(1), port_a, Address::DEFAULT_ROUTE, create).await;
    converge(&mut a, &mut a_peer, port_a, &mut b, &mut b_peer, port_b).await;

    assert_eq!(b.dft.lookup(&app), Some(Address::new(1)));

    let delete = CdapMessage::request(OpCode::MDelete, "dft", "/dft")
        .with_obj_value(ObjValue::String(body));
    inject(&mut a, Address::new(1), port_a, Address::DEFAULT_ROUTE, delete).await;
    converge(&mut a, &mut a_peer, port_a, &mut b, &mut b_peer, port_b).await;

    assert_eq!(b.dft.lookup(&app), None);
}

/// S3 — Flow allocation across an enrolled link: A resolves `srv`
/// (registered on B's DFT, learned the way gossip would deliver it) and
/// its `M_CREATE` request is answered with a successful `M_CREATE_R`,
/// resolving the pending request to the port it arrived on.
///
/// Driven from A rather than B: only the initiator side of enrollment
/// ever calls `lfdb.add_local` (see [`s1_two_node_enrollment_converges`]),
/// so only A's own SPF run produces a route back to its neighbor.
#[tokio::test]
async fn s3_flow_allocation_resolves_across_a_link() {
    use rina_rib::flow::FlowRequestState;

    let a_name = ApplicationName::apn("rina.ipcp.a");
    let b_name = ApplicationName::apn("rina.ipcp.b");
    let (mut a, mut a_peer) = node(1, "rina.ipcp.a");
    let (mut b, mut b_peer) = node(2, "rina.ipcp.b");
    let port_a = PortId::new(1);
    let port_b = PortId::new(1);

    enroll(
        &mut a, &mut a_peer, port_a, Address::new(1), a_name.clone(),
        &mut b, &mut b_peer, port_b, b_name.clone(),
    )
    .await;

    // `request_flow` routes through `next_hops`, which only SPF fills
    // in; force a recomputation instead of waiting on the debounce timer
    // enrollment already armed.
    a.run_spf();

    let srv = ApplicationName::apn("rina.apps.srv");
    b.dft.set_local(srv.clone(), Address::new(2), chrono::Utc::now());
    a.dft.merge_remote(DftEntry {
        appl_name: srv.clone(),
        address: Address::new(2),
        timestamp: chrono::Utc::now(),
    });

    let client = ApplicationName::apn("rina.apps.client");
    let idx = a.request_flow(client, srv).await.unwrap();
    converge(&mut a, &mut a_peer, port_a, &mut b, &mut b_peer, port_b).await;

    let req = a.flow_reqs.get(idx).unwrap();
    assert_eq!(req.state, FlowRequestState::Allocated);
    assert_eq!(req.port_id, Some(port_a));
}

/// S4 — Protocol violation: an out-of-sequence enrollment message aborts
/// only the offending neighbor's FSM back to `NONE`, leaving an
/// unrelated, concurrently-enrolling neighbor untouched.
#[tokio::test]
async fn s4_protocol_violation_aborts_only_the_offending_neighbor() {
    let peer_name = ApplicationName::apn("rina.ipcp.peer");
    let bystander_name = ApplicationName::apn("rina.ipcp.bystander");
    let (mut a, _a_peer) = node(1, "rina.ipcp.a");

    let port_peer = PortId::new(1);
    let port_bystander = PortId::new(2);
    a.start_enrollment(peer_name, port_peer).unwrap();
    a.start_enrollment(bystander_name, port_bystander).unwrap();

    // A is IWaitConnectR on both ports; an M_STOP makes no sense there
    // and must abort only the neighbor it arrived on.
    let bogus = CdapMessage::request(OpCode::MStop, "enrollment", "/enrollment");
    inject(&mut a, Address::new(9), port_peer, Address::DEFAULT_ROUTE, bogus).await;

    assert_eq!(a.neighbors[&port_peer].state, rina_rib::neighbor::fsm::State::None);
    assert_ne!(
        a.neighbors[&port_bystander].state,
        rina_rib::neighbor::fsm::State::None
    );
}
