//! Per-switch learning tables
//!
//! One forwarding database covers every connected switch, keyed by
//! (switch, VLAN) so no nested maps are juggled. VLAN id 0 is reserved for
//! the untagged/trunk partition; it is a distinct partition, not a real
//! VLAN. Trunk ports are always part of a VLAN's flood scope because they
//! carry traffic for every VLAN.
//!
//! Entries are overwritten on every learn (last write wins) and only
//! removed when a switch disconnects. There is no aging.

use std::collections::{HashMap, HashSet};

use smoltcp::wire::EthernetAddress;

/// Datapath identifier of a switch
pub type SwitchId = u64;

/// Switch-scoped port number
pub type PortId = u32;

/// Reserved partition id for untagged/trunk traffic
pub const UNTAGGED: u16 = 0;

fn partition(vlan: Option<u16>) -> u16 {
    vlan.unwrap_or(UNTAGGED)
}

/// Forwarding database: learned MAC-to-port mappings per switch and VLAN.
#[derive(Debug, Default)]
pub struct Fdb {
    tables: HashMap<(SwitchId, u16), HashMap<EthernetAddress, PortId>>,
}

impl Fdb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `mac` was seen on `port`, overwriting any prior entry
    /// in the same partition.
    pub fn learn(&mut self, switch: SwitchId, vlan: Option<u16>, mac: EthernetAddress, port: PortId) {
        self.tables
            .entry((switch, partition(vlan)))
            .or_default()
            .insert(mac, port);
    }

    /// Look up the port a MAC address was learned on.
    pub fn lookup(&self, switch: SwitchId, vlan: Option<u16>, mac: EthernetAddress) -> Option<PortId> {
        self.tables
            .get(&(switch, partition(vlan)))?
            .get(&mac)
            .copied()
    }

    /// All ports with at least one learned address in a partition.
    pub fn ports_in(&self, switch: SwitchId, vlan: Option<u16>) -> HashSet<PortId> {
        self.tables
            .get(&(switch, partition(vlan)))
            .map(|table| table.values().copied().collect())
            .unwrap_or_default()
    }

    /// Flood scope for a partition: the union of the partition's ports and
    /// the untagged/trunk ports, excluding the ingress port. Sorted for
    /// deterministic emission order.
    pub fn flood_ports(&self, switch: SwitchId, vlan: Option<u16>, ingress: PortId) -> Vec<PortId> {
        let mut ports = self.ports_in(switch, vlan);
        ports.extend(self.ports_in(switch, None));
        ports.remove(&ingress);

        let mut ports: Vec<PortId> = ports.into_iter().collect();
        ports.sort_unstable();
        ports
    }

    /// Discard all learning state for a switch.
    pub fn drop_switch(&mut self, switch: SwitchId) {
        self.tables.retain(|(sw, _), _| *sw != switch);
    }

    /// Total number of learned entries across all switches.
    pub fn len(&self) -> usize {
        self.tables.values().map(|t| t.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
