//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;

use rina_kernel::ControlMessage;
use rina_utils::{Address, PortId};

use crate::debug::Debug;

/// One installed forwarding entry: PDUs destined for `dest_addr` go out
/// over the (N-1)-flow bound to `next_hop_port`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PduftEntry {
    pub dest_addr: Address,
    pub next_hop_port: PortId,
}

/// Builds the PDUFT by resolving each SPEngine next-hop address to the
/// port-id of the neighbor currently bound to it, dropping destinations
/// whose next-hop neighbor isn't (or is no longer) enrolled.
pub fn build(
    next_hops: &BTreeMap<Address, Address>,
    neighbor_ports: &BTreeMap<Address, PortId>,
) -> Vec<PduftEntry> {
    next_hops
        .iter()
        .filter_map(|(&dest_addr, &next_hop_addr)| {
            neighbor_ports.get(&next_hop_addr).map(|&next_hop_port| {
                PduftEntry {
                    dest_addr,
                    next_hop_port,
                }
            })
        })
        .collect()
}

/// Produces the flush-then-install control message for the kernel,
/// matching `pduft_sync`'s wholesale-replace semantics (the simpler of
/// the two acceptable strategies for keeping the kernel's PDUFT in sync
/// with the RIB's computed routing table).
pub fn sync_message(entries: &[PduftEntry]) -> ControlMessage {
    Debug::PduftSync(entries.len()).log();
    ControlMessage::PduftSync {
        entries: entries
            .iter()
            .map(|e| (e.dest_addr, e.next_hop_port))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_next_hop_neighbor_is_dropped() {
        let mut next_hops = BTreeMap::new();
        next_hops.insert(Address::new(9), Address::new(2));

        let neighbor_ports = BTreeMap::new();
        let entries = build(&next_hops, &neighbor_ports);
        assert!(entries.is_empty());
    }

    #[test]
    fn resolved_next_hop_produces_entry() {
        let mut next_hops = BTreeMap::new();
        next_hops.insert(Address::new(9), Address::new(2));

        let mut neighbor_ports = BTreeMap::new();
        neighbor_ports.insert(Address::new(2), PortId::new(7));

        let entries = build(&next_hops, &neighbor_ports);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].dest_addr, Address::new(9));
        assert_eq!(entries[0].next_hop_port, PortId::new(7));
    }
}
