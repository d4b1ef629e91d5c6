//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;

use crate::error::Error;

/// Invoke-ids wrap at 2^30 rather than the full 32-bit range, skipping 0
/// (0 is never a valid allocated id).
const INVOKE_ID_WRAP: u32 = 1 << 30;

/// Tracks in-flight invoke-ids for one CDAP connection, in both
/// directions: ids this side allocated for its own requests
/// (`pending_local`) and ids the remote side used for requests it sent us
/// (`pending_remote`), mirroring `CDAPConn::pending_invoke_ids` /
/// `pending_invoke_ids_remote` in the original implementation.
#[derive(Debug)]
pub struct InvokeIdManager {
    next_local: u32,
    pending_local: BTreeSet<u32>,
    pending_remote: BTreeSet<u32>,
    max_pending: usize,
}

impl InvokeIdManager {
    pub fn new(max_pending: usize) -> InvokeIdManager {
        InvokeIdManager {
            next_local: 1,
            pending_local: BTreeSet::new(),
            pending_remote: BTreeSet::new(),
            max_pending,
        }
    }

    /// Allocates a fresh invoke-id for an outgoing request, registering it
    /// as pending until the matching response arrives.
    pub fn allocate(&mut self) -> Result<u32, Error> {
        if self.pending_local.len() >= self.max_pending {
            return Err(Error::PendingLimitExceeded);
        }
        let id = self.next_local;
        self.next_local = if self.next_local >= INVOKE_ID_WRAP {
            1
        } else {
            self.next_local + 1
        };
        self.pending_local.insert(id);
        Ok(id)
    }

    /// Marks a local invoke-id as resolved once its response is processed.
    pub fn release_local(&mut self, invoke_id: u32) -> Result<(), Error> {
        if self.pending_local.remove(&invoke_id) {
            Ok(())
        } else {
            Err(Error::UnknownInvokeId(invoke_id))
        }
    }

    /// Registers an invoke-id seen on an incoming request, so a later
    /// duplicate with the same id can be rejected.
    pub fn accept_remote(&mut self, invoke_id: u32) -> Result<(), Error> {
        if self.pending_remote.len() >= self.max_pending {
            return Err(Error::PendingLimitExceeded);
        }
        if !self.pending_remote.insert(invoke_id) {
            return Err(Error::DuplicateInvokeId(invoke_id));
        }
        Ok(())
    }

    /// Marks a remote invoke-id as resolved once we've sent our response.
    pub fn release_remote(&mut self, invoke_id: u32) -> Result<(), Error> {
        if self.pending_remote.remove(&invoke_id) {
            Ok(())
        } else {
            Err(Error::UnknownInvokeId(invoke_id))
        }
    }

    /// Drops every outstanding id in both directions, used when the
    /// connection they belong to is aborted rather than closed cleanly.
    pub fn clear(&mut self) {
        self.pending_local.clear();
        self.pending_remote.clear();
    }

    pub fn pending_local_count(&self) -> usize {
        self.pending_local.len()
    }

    pub fn pending_remote_count(&self) -> usize {
        self.pending_remote.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocated_ids_are_unique_and_increasing() {
        let mut mgr = InvokeIdManager::new(16);
        let a = mgr.allocate().unwrap();
        let b = mgr.allocate().unwrap();
        assert_ne!(a, b);
        assert_eq!(mgr.pending_local_count(), 2);
    }

    #[test]
    fn release_of_unknown_id_fails() {
        let mut mgr = InvokeIdManager::new(16);
        assert!(mgr.release_local(99).is_err());
    }

    #[test]
    fn clear_drops_ids_in_both_directions() {
        let mut mgr = InvokeIdManager::new(16);
        mgr.allocate().unwrap();
        mgr.accept_remote(7).unwrap();
        mgr.clear();
        assert_eq!(mgr.pending_local_count(), 0);
        assert_eq!(mgr.pending_remote_count(), 0);
    }

    #[test]
    fn pending_limit_is_enforced() {
        let mut mgr = InvokeIdManager::new(1);
        mgr.allocate().unwrap();
        assert!(mgr.allocate().is_err());
    }

    #[test]
    fn duplicate_remote_invoke_id_is_rejected() {
        let mut mgr = InvokeIdManager::new(16);
        mgr.accept_remote(5).unwrap();
        assert!(mgr.accept_remote(5).is_err());
    }

    #[test]
    fn allocation_wraps_at_2_30_skipping_zero() {
        let mut mgr = InvokeIdManager::new(16);
        mgr.next_local = INVOKE_ID_WRAP;
        let id = mgr.allocate().unwrap();
        assert_eq!(id, INVOKE_ID_WRAP);
        let next = mgr.allocate().unwrap();
        assert_eq!(next, 1);
    }
}
