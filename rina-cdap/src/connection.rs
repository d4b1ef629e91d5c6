//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::debug;

use crate::error::Error;
use crate::invoke::InvokeIdManager;
use crate::message::OpCode;

/// The default bound on concurrently pending invoke-ids per direction,
/// per connection.
pub const DEFAULT_MAX_PENDING: usize = 64;

/// CDAP connection state machine.
pub mod fsm {
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub enum State {
        None,
        AwaitCon,
        Connected,
        AwaitClose,
    }

    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub enum Event {
        ConnectSent,
        ConnectRcvd,
        ConnectRSent,
        ConnectRRcvd,
        ReleaseSent,
        ReleaseRcvd,
        ReleaseRSent,
        ReleaseRRcvd,
        TransportClosed,
    }

    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub enum Action {
        SendConnectR,
        SendReleaseR,
        Teardown,
    }
}

/// A single stateful CDAP connection to one neighbor.
#[derive(Debug)]
pub struct Connection {
    pub state: fsm::State,
    pub invoke_ids: InvokeIdManager,
}

impl Connection {
    pub fn new(max_pending: usize) -> Connection {
        Connection {
            state: fsm::State::None,
            invoke_ids: InvokeIdManager::new(max_pending),
        }
    }

    /// Drives the connection FSM in response to an incoming or outgoing
    /// event, returning the action (if any) the caller must perform.
    pub fn fsm(
        &mut self,
        event: fsm::Event,
    ) -> Result<Option<fsm::Action>, Error> {
        let (new_state, action) = self.fsm_event(event)?;
        debug!(old_state = ?self.state, new_state = ?new_state, ?event, "CDAP connection state change");
        self.state = new_state;
        Ok(action)
    }

    fn fsm_event(
        &self,
        event: fsm::Event,
    ) -> Result<(fsm::State, Option<fsm::Action>), Error> {
        use fsm::{Action, Event, State};
        match (self.state, event) {
            // Active role: we send M_CONNECT and await M_CONNECT_R.
            (State::None, Event::ConnectSent) => {
                Ok((State::AwaitCon, None))
            }
            // Passive role: peer sends M_CONNECT, we must answer.
            (State::None, Event::ConnectRcvd) => {
                Ok((State::AwaitCon, Some(Action::SendConnectR)))
            }
            (State::AwaitCon, Event::ConnectRSent) => {
                Ok((State::Connected, None))
            }
            (State::AwaitCon, Event::ConnectRRcvd) => {
                Ok((State::Connected, None))
            }
            // Active role: we send M_RELEASE and await M_RELEASE_R.
            (State::Connected, Event::ReleaseSent) => {
                Ok((State::AwaitClose, None))
            }
            // Passive role: peer sends M_RELEASE, we must answer.
            (State::Connected, Event::ReleaseRcvd) => {
                Ok((State::AwaitClose, Some(Action::SendReleaseR)))
            }
            (State::AwaitClose, Event::ReleaseRSent) => {
                Ok((State::None, Some(Action::Teardown)))
            }
            (State::AwaitClose, Event::ReleaseRRcvd) => {
                Ok((State::None, Some(Action::Teardown)))
            }
            // The transport can drop out from under us in any state.
            (_, Event::TransportClosed) => {
                Ok((State::None, Some(Action::Teardown)))
            }
            (state, event) => Err(Error::UnexpectedMessage(
                state,
                event_op_code_hint(event),
            )),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == fsm::State::Connected
    }
}

/// Best-effort mapping from an FSM event back to the op-code that would
/// have triggered it, purely to make [`Error::UnexpectedMessage`] more
/// informative; any request op-code standing in for "some unrelated
/// message in this state" is fine here since the exact op-code isn't
/// known at the FSM layer.
fn event_op_code_hint(event: fsm::Event) -> OpCode {
    use fsm::Event;
    match event {
        Event::ConnectSent | Event::ConnectRcvd => OpCode::MConnect,
        Event::ConnectRSent | Event::ConnectRRcvd => OpCode::MConnectR,
        Event::ReleaseSent | Event::ReleaseRcvd => OpCode::MRelease,
        Event::ReleaseRSent | Event::ReleaseRRcvd => OpCode::MReleaseR,
        Event::TransportClosed => OpCode::MRelease,
    }
}
