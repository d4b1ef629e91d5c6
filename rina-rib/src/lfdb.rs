//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::time::Duration;

use rina_utils::Address;
use serde::{Deserialize, Serialize};

use crate::debug::Debug;

/// Default assumed cost of an (N-1)-flow when none is configured.
pub const DEFAULT_COST: u32 = 1;
/// Default maximum age of an LFDB entry before it's discarded.
pub const DEFAULT_AGE_MAX: Duration = Duration::from_secs(300);
/// Default aging sweep interval.
pub const DEFAULT_AGE_TICK: Duration = Duration::from_secs(10);

/// Whether an (N-1)-flow an LFDB entry describes is currently usable.
/// SPEngine only considers `Up` edges when building the routing graph;
/// `Down` entries are kept around (rather than removed outright) so a
/// flapping link doesn't repeatedly discard and relearn state.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum LfdbState {
    #[default]
    Up,
    Down,
}

/// A directed edge in the lower-flow topology graph: `local_addr` can
/// reach `remote_addr` over an (N-1)-flow at the given `cost`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct LfdbEntry {
    pub local_addr: Address,
    pub remote_addr: Address,
    pub cost: u32,
    pub seqnum: u64,
    pub state: LfdbState,
    pub age: Duration,
}

/// Key identifying an LFDB entry: the unordered flow doesn't matter here
/// since each direction is advertised (and aged) independently, mirroring
/// the reference implementation's `lfdb` map keyed by a string encoding
/// of both endpoint addresses.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct LfdbKey {
    pub local_addr: Address,
    pub remote_addr: Address,
}

/// The Lower Flow Database: the link-state topology of the DIF, as seen
/// through (N-1)-flow advertisements.
#[derive(Debug, Default)]
pub struct Lfdb {
    entries: BTreeMap<LfdbKey, LfdbEntry>,
}

impl Lfdb {
    /// Adds or refreshes a locally-originated edge (this IPCP to a
    /// directly connected neighbor), bumping the sequence number so the
    /// update propagates.
    pub fn add_local(
        &mut self,
        local_addr: Address,
        remote_addr: Address,
        cost: u32,
    ) -> LfdbEntry {
        let key = LfdbKey {
            local_addr,
            remote_addr,
        };
        let seqnum = self
            .entries
            .get(&key)
            .map(|e| e.seqnum + 1)
            .unwrap_or(1);
        let entry = LfdbEntry {
            local_addr,
            remote_addr,
            cost,
            seqnum,
            state: LfdbState::Up,
            age: Duration::ZERO,
        };
        Debug::LfdbUpdate(local_addr, remote_addr).log();
        self.entries.insert(key, entry);
        entry
    }

    /// Merges an entry learned from a neighbor. Accepted only if its
    /// sequence number is strictly newer than what's held; returns `true`
    /// when the entry was applied and should be flooded onward to every
    /// neighbor other than the one it was received from (loop
    /// prevention).
    pub fn merge_remote(&mut self, entry: LfdbEntry) -> bool {
        let key = LfdbKey {
            local_addr: entry.local_addr,
            remote_addr: entry.remote_addr,
        };
        match self.entries.get(&key) {
            Some(existing) if existing.seqnum >= entry.seqnum => false,
            _ => {
                Debug::LfdbUpdate(entry.local_addr, entry.remote_addr).log();
                self.entries.insert(key, entry);
                true
            }
        }
    }

    pub fn remove(&mut self, key: &LfdbKey) -> Option<LfdbEntry> {
        self.entries.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LfdbEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Advances every entry's age by one tick, discarding (and returning)
    /// those that exceed `age_max`.
    pub fn age_tick(
        &mut self,
        tick: Duration,
        age_max: Duration,
    ) -> Vec<LfdbEntry> {
        let mut expired = Vec::new();
        self.entries.retain(|_, entry| {
            entry.age += tick;
            if entry.age >= age_max {
                Debug::LfdbAge(entry.local_addr, entry.remote_addr).log();
                expired.push(*entry);
                false
            } else {
                true
            }
        });
        expired
    }

    /// Resets the age of a refreshed entry to zero (re-advertisement
    /// keeps it alive without bumping the sequence number).
    pub fn refresh_age(&mut self, key: &LfdbKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.age = Duration::ZERO;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_add_increments_seqnum_on_refresh() {
        let mut lfdb = Lfdb::default();
        let e1 = lfdb.add_local(Address::new(1), Address::new(2), DEFAULT_COST);
        let e2 = lfdb.add_local(Address::new(1), Address::new(2), DEFAULT_COST);
        assert_eq!(e1.seqnum, 1);
        assert_eq!(e2.seqnum, 2);
    }

    #[test]
    fn stale_remote_seqnum_is_rejected() {
        let mut lfdb = Lfdb::default();
        lfdb.add_local(Address::new(1), Address::new(2), DEFAULT_COST);
        let stale = LfdbEntry {
            local_addr: Address::new(1),
            remote_addr: Address::new(2),
            cost: DEFAULT_COST,
            seqnum: 1,
            state: LfdbState::Up,
            age: Duration::ZERO,
        };
        assert!(!lfdb.merge_remote(stale));
    }

    #[test]
    fn entries_expire_after_age_max() {
        let mut lfdb = Lfdb::default();
        lfdb.add_local(Address::new(1), Address::new(2), DEFAULT_COST);
        let expired = lfdb.age_tick(Duration::from_secs(5), Duration::from_secs(10));
        assert!(expired.is_empty());
        let expired = lfdb.age_tick(Duration::from_secs(10), Duration::from_secs(10));
        assert_eq!(expired.len(), 1);
        assert_eq!(lfdb.len(), 0);
    }
}
