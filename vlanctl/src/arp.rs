//! Shared IP-to-MAC resolution table
//!
//! Populated opportunistically from every IPv4 frame the controller sees,
//! regardless of switch or VLAN. Entries are overwritten in place and never
//! expire; a host that changes its MAC is re-learned on its next
//! transmission.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, RwLock};

use smoltcp::wire::EthernetAddress;

/// Global address-resolution state, shared across all switch sessions.
///
/// Clones share the same underlying table. Reads and overwrites are safe
/// from concurrent event streams; last writer wins per address.
#[derive(Clone, Debug, Default)]
pub struct ArpCache {
    inner: Arc<RwLock<HashMap<Ipv4Addr, EthernetAddress>>>,
}

impl ArpCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observed IP-to-MAC mapping, overwriting any prior entry.
    pub fn observe(&self, ip: Ipv4Addr, mac: EthernetAddress) {
        self.inner.write().unwrap().insert(ip, mac);
    }

    /// Look up the MAC address for an IP address.
    pub fn resolve(&self, ip: Ipv4Addr) -> Option<EthernetAddress> {
        self.inner.read().unwrap().get(&ip).copied()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
