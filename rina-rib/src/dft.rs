//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rina_utils::{Address, ApplicationName};
use serde::{Deserialize, Serialize};

use crate::debug::Debug;

/// A single name-to-address mapping in the Directory Forwarding Table.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DftEntry {
    pub appl_name: ApplicationName,
    pub address: Address,
    pub timestamp: DateTime<Utc>,
}

/// The Directory Forwarding Table: resolves application names to the
/// address of the IPC Process they're registered with.
///
/// Updates from neighbors are merged last-writer-wins by `timestamp`,
/// matching the DFT replication rule: a remote update older than (or
/// equal to) the locally held entry is discarded.
#[derive(Debug, Default)]
pub struct Dft {
    entries: BTreeMap<ApplicationName, DftEntry>,
}

impl Dft {
    pub fn lookup(&self, appl_name: &ApplicationName) -> Option<Address> {
        self.entries.get(appl_name).map(|e| e.address)
    }

    /// Sets a locally-originated entry, always accepted and stamped with
    /// the current time.
    pub fn set_local(
        &mut self,
        appl_name: ApplicationName,
        address: Address,
        now: DateTime<Utc>,
    ) {
        Debug::DftUpdate(&appl_name, address).log();
        self.entries.insert(
            appl_name.clone(),
            DftEntry {
                appl_name,
                address,
                timestamp: now,
            },
        );
    }

    /// Merges a remote entry. Returns `true` if it was accepted (the
    /// caller should then propagate it further), `false` if it was
    /// discarded as stale.
    pub fn merge_remote(&mut self, entry: DftEntry) -> bool {
        match self.entries.get(&entry.appl_name) {
            Some(existing) if existing.timestamp >= entry.timestamp => false,
            _ => {
                Debug::DftUpdate(&entry.appl_name, entry.address).log();
                self.entries.insert(entry.appl_name.clone(), entry);
                true
            }
        }
    }

    pub fn remove(&mut self, appl_name: &ApplicationName) -> Option<DftEntry> {
        self.entries.remove(appl_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DftEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn local_set_is_always_accepted() {
        let mut dft = Dft::default();
        let name = ApplicationName::apn("rina.apps.echo");
        dft.set_local(name.clone(), Address::new(1), ts(10));
        assert_eq!(dft.lookup(&name), Some(Address::new(1)));
    }

    #[test]
    fn stale_remote_update_is_discarded() {
        let mut dft = Dft::default();
        let name = ApplicationName::apn("rina.apps.echo");
        dft.set_local(name.clone(), Address::new(1), ts(10));

        let stale = DftEntry {
            appl_name: name.clone(),
            address: Address::new(2),
            timestamp: ts(5),
        };
        assert!(!dft.merge_remote(stale));
        assert_eq!(dft.lookup(&name), Some(Address::new(1)));
    }

    #[test]
    fn newer_remote_update_wins() {
        let mut dft = Dft::default();
        let name = ApplicationName::apn("rina.apps.echo");
        dft.set_local(name.clone(), Address::new(1), ts(10));

        let newer = DftEntry {
            appl_name: name.clone(),
            address: Address::new(2),
            timestamp: ts(20),
        };
        assert!(dft.merge_remote(newer));
        assert_eq!(dft.lookup(&name), Some(Address::new(2)));
    }
}
