//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

use serde::{Deserialize, Serialize};

/// An IPC Process address within a DIF.
///
/// Addresses are allocated by the DIF's administrative input (e.g. the
/// configuration front-end driving `IPCP_DFT_SET`-style commands); this
/// crate does not implement an allocation algorithm.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq,
    PartialOrd, Serialize,
)]
pub struct Address(u64);

impl Address {
    /// Sentinel value meaning "no address has been assigned yet".
    pub const UNALLOCATED: Address = Address(0);

    /// Sentinel value meaning "route via the default next hop" rather
    /// than a specific destination.
    pub const DEFAULT_ROUTE: Address = Address(u64::MAX);

    pub const fn new(value: u64) -> Address {
        Address(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    pub const fn is_allocated(&self) -> bool {
        self.0 != Self::UNALLOCATED.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Address {
        Address(value)
    }
}

/// Identifies a flow endpoint local to an IPC Process.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq,
    PartialOrd, Serialize,
)]
pub struct PortId(u32);

impl PortId {
    /// Sentinel standing in for a local-loopback flow: a flow whose
    /// destination application resolves to this same IPCP, so no
    /// data-plane port is ever assigned by the kernel.
    pub const LOOPBACK: PortId = PortId(u32::MAX);

    pub const fn new(value: u32) -> PortId {
        PortId(value)
    }

    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for PortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PortId {
    fn from(value: u32) -> PortId {
        PortId(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unallocated_address_is_not_allocated() {
        assert!(!Address::UNALLOCATED.is_allocated());
        assert!(Address::new(42).is_allocated());
    }
}
