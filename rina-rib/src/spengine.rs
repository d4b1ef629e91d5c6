//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::time::Duration;

use rina_utils::Address;
use rina_utils::task::TimeoutTask;
use tokio::sync::mpsc::UnboundedSender;

use crate::debug::Debug;
use crate::lfdb::{Lfdb, LfdbState};

/// Default debounce window between a topology change and the SPF
/// computation it triggers, per the RIB's debounced-recomputation design
/// (a dirty flag plus a single deadline timer, rather than the full
/// short-wait/long-wait delay state machine a larger IGP like IS-IS uses).
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Computes the shortest-path tree rooted at `source` over the graph
/// described by `lfdb`, returning a `dest -> next_hop` routing table.
///
/// Ties in total distance are broken by preferring the path whose first
/// hop has the lower address, so the result is deterministic regardless
/// of LFDB iteration order.
pub fn run(source: Address, lfdb: &Lfdb) -> BTreeMap<Address, Address> {
    let mut graph: BTreeMap<Address, Vec<(Address, u32)>> = BTreeMap::new();
    for entry in lfdb.iter().filter(|e| e.state == LfdbState::Up) {
        graph
            .entry(entry.local_addr)
            .or_default()
            .push((entry.remote_addr, entry.cost));
    }

    // dist, first_hop (None for the source itself).
    let mut dist: BTreeMap<Address, (u32, Option<Address>)> = BTreeMap::new();
    dist.insert(source, (0, None));

    let mut heap = BinaryHeap::new();
    heap.push(Reverse((0u32, source, None::<Address>)));

    while let Some(Reverse((cur_dist, cur, cur_first_hop))) = heap.pop() {
        match dist.get(&cur) {
            Some((best, _)) if *best < cur_dist => continue,
            _ => {}
        }

        let Some(edges) = graph.get(&cur) else {
            continue;
        };
        for &(neighbor, cost) in edges {
            let next_dist = cur_dist.saturating_add(cost);
            let next_first_hop = cur_first_hop.or(Some(neighbor));

            let better = match dist.get(&neighbor) {
                None => true,
                Some((best, best_first_hop)) => {
                    next_dist < *best
                        || (next_dist == *best
                            && next_first_hop
                                .zip(*best_first_hop)
                                .is_some_and(|(a, b)| a < b))
                }
            };
            if better {
                dist.insert(neighbor, (next_dist, next_first_hop));
                heap.push(Reverse((next_dist, neighbor, next_first_hop)));
            }
        }
    }

    dist.into_iter()
        .filter_map(|(dest, (_, first_hop))| {
            first_hop.map(|next_hop| (dest, next_hop))
        })
        .collect()
}

/// A no-op marker sent through the debounce timer to wake the instance
/// event loop into running SPF.
#[derive(Debug)]
pub struct SpfTriggerMsg;

/// Tracks whether a topology change has been seen since the last SPF run
/// and, if so, the single in-flight debounce timer counting down to the
/// next computation.
#[derive(Debug, Default)]
pub struct SpfScheduler {
    dirty: bool,
    timer: Option<TimeoutTask>,
}

impl SpfScheduler {
    /// Marks the topology dirty and, if no computation is already
    /// scheduled, arms the debounce timer.
    pub fn mark_dirty(
        &mut self,
        debounce: Duration,
        trigger_tx: UnboundedSender<SpfTriggerMsg>,
    ) {
        self.dirty = true;
        if self.timer.is_none() {
            Debug::SpfScheduled.log();
            self.timer = Some(TimeoutTask::new(debounce, move || async move {
                let _ = trigger_tx.send(SpfTriggerMsg);
            }));
        }
    }

    /// Called once the instance has run SPF in response to the timer
    /// firing: clears the dirty flag and releases the timer handle.
    pub fn computed(&mut self) {
        self.dirty = false;
        self.timer = None;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::new(n)
    }

    #[test]
    fn shortest_path_picks_minimum_cost() {
        let mut lfdb = Lfdb::default();
        lfdb.add_local(addr(1), addr(2), 10);
        lfdb.add_local(addr(1), addr(3), 1);
        lfdb.add_local(addr(3), addr(2), 1);

        let table = run(addr(1), &lfdb);
        // Direct 1->2 costs 10; via 3 costs 1+1=2.
        assert_eq!(table.get(&addr(2)), Some(&addr(3)));
        assert_eq!(table.get(&addr(3)), Some(&addr(3)));
    }

    #[test]
    fn ties_prefer_lower_first_hop_address() {
        let mut lfdb = Lfdb::default();
        lfdb.add_local(addr(1), addr(5), 1);
        lfdb.add_local(addr(1), addr(2), 1);
        lfdb.add_local(addr(5), addr(9), 1);
        lfdb.add_local(addr(2), addr(9), 1);

        let table = run(addr(1), &lfdb);
        assert_eq!(table.get(&addr(9)), Some(&addr(2)));
    }

    #[test]
    fn unreachable_destination_is_absent() {
        let mut lfdb = Lfdb::default();
        lfdb.add_local(addr(1), addr(2), 1);

        let table = run(addr(1), &lfdb);
        assert!(!table.contains_key(&addr(99)));
    }

    #[test]
    fn down_entries_are_excluded_from_the_graph() {
        use crate::lfdb::LfdbKey;

        let mut lfdb = Lfdb::default();
        lfdb.add_local(addr(1), addr(2), 1);
        lfdb.remove(&LfdbKey {
            local_addr: addr(1),
            remote_addr: addr(2),
        });
        lfdb.merge_remote(crate::lfdb::LfdbEntry {
            local_addr: addr(1),
            remote_addr: addr(2),
            cost: 1,
            seqnum: 1,
            state: LfdbState::Down,
            age: Duration::ZERO,
        });

        let table = run(addr(1), &lfdb);
        assert!(!table.contains_key(&addr(2)));
    }
}
