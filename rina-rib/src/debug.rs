//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

use rina_utils::{Address, ApplicationName, PortId};
use tracing::debug;

use crate::neighbor::fsm;

/// RIB-level debug events. Centralizing them here (rather than scattering
/// `tracing::debug!` calls through `instance.rs`/`neighbor.rs`/`dft.rs`)
/// keeps the set of loggable events reviewable in one place.
#[derive(Debug)]
pub enum Debug<'a> {
    NeighborCreate(&'a ApplicationName, PortId),
    NeighborDelete(&'a ApplicationName, PortId),
    NeighborFsmTransition(&'a ApplicationName, fsm::State, fsm::State),
    DftUpdate(&'a ApplicationName, Address),
    LfdbUpdate(Address, Address),
    LfdbAge(Address, Address),
    SpfScheduled,
    SpfRun(usize),
    PduftSync(usize),
    FlowAllocated(&'a ApplicationName, PortId),
    FlowTimeout(&'a ApplicationName),
    FlowArrived(&'a ApplicationName),
}

impl Debug<'_> {
    pub fn log(&self) {
        match self {
            Debug::NeighborCreate(name, port_id) => {
                debug!(%name, %port_id, "neighbor created");
            }
            Debug::NeighborDelete(name, port_id) => {
                debug!(%name, %port_id, "neighbor deleted");
            }
            Debug::NeighborFsmTransition(name, old, new) => {
                debug!(%name, ?old, ?new, "neighbor enrollment state change");
            }
            Debug::DftUpdate(name, addr) => {
                debug!(%name, %addr, "DFT entry updated");
            }
            Debug::LfdbUpdate(local, remote) => {
                debug!(%local, %remote, "LFDB entry updated");
            }
            Debug::LfdbAge(local, remote) => {
                debug!(%local, %remote, "LFDB entry aged out");
            }
            Debug::SpfScheduled => {
                debug!("SPF computation scheduled");
            }
            Debug::SpfRun(vertex_count) => {
                debug!(%vertex_count, "SPF computation finished");
            }
            Debug::PduftSync(entry_count) => {
                debug!(%entry_count, "PDUFT synchronized");
            }
            Debug::FlowAllocated(name, port_id) => {
                debug!(%name, %port_id, "flow allocated");
            }
            Debug::FlowTimeout(name) => {
                debug!(%name, "flow allocation request timed out");
            }
            Debug::FlowArrived(name) => {
                debug!(%name, "flow request arrived");
            }
        }
    }
}
