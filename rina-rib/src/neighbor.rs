//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use rina_cdap::connection::Connection;
use rina_utils::task::TimeoutTask;
use rina_utils::{Address, ApplicationName, PortId};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::debug::Debug;
use crate::error::Error;

/// Enrollment state machine.
///
/// State names match the reference implementation's `Neighbor::state_t`
/// exactly; the dialogue each path walks through is:
///
/// Initiator: `NONE` -(send M_CONNECT)-> `I_WAIT_CONNECT_R`
///   -(recv M_CONNECT_R, send M_START)-> `I_WAIT_START_R`
///   -(recv M_START_R)-> `I_WAIT_STOP`
///   -(recv M_STOP, send M_STOP_R)-> `I_WAIT_START`
///   -(recv M_START)-> `ENROLLED`
///
/// Responder: `NONE` -(CDAP connect accepted)-> `S_WAIT_START`
///   -(recv M_START, send M_START_R + M_STOP)-> `S_WAIT_STOP_R`
///   -(recv M_STOP_R, send final M_START)-> `ENROLLED`
///
/// Any message that doesn't match the current state's expected next step
/// triggers [`fsm::Action::Abort`], matching the original's "any mismatch
/// triggers abort()" behavior.
pub mod fsm {
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub enum State {
        None,
        IWaitConnectR,
        SWaitStart,
        IWaitStartR,
        SWaitStopR,
        IWaitStop,
        IWaitStart,
        Enrolled,
    }

    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub enum Event {
        StartEnrollment,
        ConnectAccepted,
        MConnectRRcvd,
        MStartRcvd,
        MStartRRcvd,
        MStopRcvd,
        MStopRRcvd,
        MFinalStartRcvd,
        Abort,
    }

    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub enum Action {
        SendConnect,
        SendStart,
        SendStartRAndStop,
        SendStopR,
        SendFinalStart,
        EnrollmentComplete,
        TeardownEnrollment,
    }
}

/// A neighboring IPC Process reachable over a (N-1)-flow, with its
/// enrollment state and CDAP connection.
#[derive(Debug)]
pub struct Neighbor {
    pub name: ApplicationName,
    pub port_id: PortId,
    pub address: Option<Address>,
    pub conn: Connection,
    pub state: fsm::State,
    timeout: Option<TimeoutTask>,
}

impl Neighbor {
    pub fn new(
        name: ApplicationName,
        port_id: PortId,
        max_pending: usize,
    ) -> Neighbor {
        Debug::NeighborCreate(&name, port_id).log();
        Neighbor {
            name,
            port_id,
            address: None,
            conn: Connection::new(max_pending),
            state: fsm::State::None,
            timeout: None,
        }
    }

    /// (Re)arms the per-step enrollment timeout, notifying the instance
    /// event loop via `timeout_tx` rather than mutating RIB state from
    /// inside the timer's callback (which can't hold a borrow across an
    /// await point). Mirrors `FlowRequest::arm_timeout`.
    pub fn arm_timeout(&mut self, timeout: Duration, timeout_tx: UnboundedSender<PortId>) {
        let port_id = self.port_id;
        self.timeout = Some(TimeoutTask::new(timeout, move || async move {
            let _ = timeout_tx.send(port_id);
        }));
    }

    pub fn clear_timeout(&mut self) {
        self.timeout = None;
    }

    /// Drives the enrollment FSM, logging the transition and returning the
    /// side-effecting action the caller (the RIB) must perform.
    pub fn fsm(
        &mut self,
        event: fsm::Event,
    ) -> Result<Option<fsm::Action>, Error> {
        let (new_state, action) = self.fsm_event(event)?;
        Debug::NeighborFsmTransition(&self.name, self.state, new_state).log();
        debug!(name = %self.name, ?event, old = ?self.state, new = ?new_state, "enrollment FSM");
        self.state = new_state;
        Ok(action)
    }

    fn fsm_event(
        &self,
        event: fsm::Event,
    ) -> Result<(fsm::State, Option<fsm::Action>), Error> {
        use fsm::{Action, Event, State};
        match (self.state, event) {
            // Initiator path.
            (State::None, Event::StartEnrollment) => {
                Ok((State::IWaitConnectR, Some(Action::SendConnect)))
            }
            (State::IWaitConnectR, Event::MConnectRRcvd) => {
                Ok((State::IWaitStartR, Some(Action::SendStart)))
            }
            (State::IWaitStartR, Event::MStartRRcvd) => {
                Ok((State::IWaitStop, None))
            }
            (State::IWaitStop, Event::MStopRcvd) => {
                Ok((State::IWaitStart, Some(Action::SendStopR)))
            }
            (State::IWaitStart, Event::MFinalStartRcvd) => {
                Ok((State::Enrolled, Some(Action::EnrollmentComplete)))
            }
            // Responder path.
            (State::None, Event::ConnectAccepted) => {
                Ok((State::SWaitStart, None))
            }
            (State::SWaitStart, Event::MStartRcvd) => {
                Ok((State::SWaitStopR, Some(Action::SendStartRAndStop)))
            }
            (State::SWaitStopR, Event::MStopRRcvd) => {
                Ok((State::Enrolled, Some(Action::SendFinalStart)))
            }
            // Abort unwinds to NONE from any state.
            (_, Event::Abort) => {
                Ok((State::None, Some(Action::TeardownEnrollment)))
            }
            (state, event) => Err(Error::EnrollmentUnexpectedMessage(
                state,
                event_op_code_hint(event),
            )),
        }
    }

    /// Centralizes enrollment teardown, mirroring `Neighbor::abort()` in
    /// the reference implementation rather than inlining the unwind at
    /// every call site that detects a protocol violation. Leaves no
    /// outstanding invoke-ids or armed timers behind.
    pub fn abort(&mut self, reason: &'static str) {
        if self.state != fsm::State::None {
            tracing::warn!(name = %self.name, %reason, "aborting enrollment");
            let _ = self.fsm(fsm::Event::Abort);
        }
        let _ = self.conn.fsm(rina_cdap::connection::fsm::Event::TransportClosed);
        self.conn.invoke_ids.clear();
        self.clear_timeout();
    }

    pub fn is_enrolled(&self) -> bool {
        self.state == fsm::State::Enrolled
    }
}

fn event_op_code_hint(event: fsm::Event) -> rina_cdap::message::OpCode {
    use fsm::Event;
    use rina_cdap::message::OpCode;
    match event {
        Event::StartEnrollment | Event::ConnectAccepted => OpCode::MConnect,
        Event::MConnectRRcvd => OpCode::MConnectR,
        Event::MStartRcvd | Event::MFinalStartRcvd => OpCode::MStart,
        Event::MStartRRcvd => OpCode::MStartR,
        Event::MStopRcvd => OpCode::MStop,
        Event::MStopRRcvd => OpCode::MStopR,
        Event::Abort => OpCode::MRelease,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neighbor() -> Neighbor {
        Neighbor::new(
            ApplicationName::apn("rina.apps.peer"),
            PortId::new(1),
            16,
        )
    }

    #[test]
    fn initiator_path_reaches_enrolled() {
        let mut nbr = neighbor();
        assert_eq!(
            nbr.fsm(fsm::Event::StartEnrollment).unwrap(),
            Some(fsm::Action::SendConnect)
        );
        assert_eq!(nbr.state, fsm::State::IWaitConnectR);

        nbr.fsm(fsm::Event::MConnectRRcvd).unwrap();
        assert_eq!(nbr.state, fsm::State::IWaitStartR);

        nbr.fsm(fsm::Event::MStartRRcvd).unwrap();
        assert_eq!(nbr.state, fsm::State::IWaitStop);

        nbr.fsm(fsm::Event::MStopRcvd).unwrap();
        assert_eq!(nbr.state, fsm::State::IWaitStart);

        nbr.fsm(fsm::Event::MFinalStartRcvd).unwrap();
        assert_eq!(nbr.state, fsm::State::Enrolled);
        assert!(nbr.is_enrolled());
    }

    #[test]
    fn responder_path_reaches_enrolled() {
        let mut nbr = neighbor();
        nbr.fsm(fsm::Event::ConnectAccepted).unwrap();
        assert_eq!(nbr.state, fsm::State::SWaitStart);

        let action = nbr.fsm(fsm::Event::MStartRcvd).unwrap();
        assert_eq!(action, Some(fsm::Action::SendStartRAndStop));
        assert_eq!(nbr.state, fsm::State::SWaitStopR);

        let action = nbr.fsm(fsm::Event::MStopRRcvd).unwrap();
        assert_eq!(action, Some(fsm::Action::SendFinalStart));
        assert_eq!(nbr.state, fsm::State::Enrolled);
    }

    #[test]
    fn mismatched_message_is_rejected() {
        let mut nbr = neighbor();
        nbr.fsm(fsm::Event::StartEnrollment).unwrap();
        // A responder-only event makes no sense in the initiator path.
        assert!(nbr.fsm(fsm::Event::MStartRcvd).is_err());
    }

    #[test]
    fn abort_unwinds_to_none_from_any_state() {
        let mut nbr = neighbor();
        nbr.fsm(fsm::Event::StartEnrollment).unwrap();
        nbr.fsm(fsm::Event::MConnectRRcvd).unwrap();
        assert_ne!(nbr.state, fsm::State::None);
        nbr.abort("protocol violation");
        assert_eq!(nbr.state, fsm::State::None);
    }
}
