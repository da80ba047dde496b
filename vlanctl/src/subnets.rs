//! Static VLAN-to-subnet classification
//!
//! The subnet table is fixed at startup; there is no dynamic route exchange.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

/// Ordered VLAN-to-subnet table. Classification is a linear scan; the first
/// subnet containing an address wins.
#[derive(Debug, Clone)]
pub struct SubnetTable {
    entries: Vec<(u16, Ipv4Net)>,
}

impl SubnetTable {
    pub fn new(entries: Vec<(u16, Ipv4Net)>) -> Self {
        Self { entries }
    }

    /// The VLAN whose subnet contains `ip`, if any.
    pub fn vlan_for(&self, ip: Ipv4Addr) -> Option<u16> {
        self.entries
            .iter()
            .find(|(_, net)| net.contains(&ip))
            .map(|(vlan, _)| *vlan)
    }

    /// Whether a destination belongs to a different VLAN than the source.
    ///
    /// A destination matching no configured subnet is not considered
    /// cross-VLAN; such traffic stays on the ordinary intra-VLAN path.
    pub fn is_cross_vlan(&self, dst: Ipv4Addr, src_vlan: u16) -> bool {
        matches!(self.vlan_for(dst), Some(vlan) if vlan != src_vlan)
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

    fn reference_table() -> SubnetTable {
        SubnetTable::new(vec![
            (10, "10.0.1.0/24".parse().unwrap()),
            (20, "10.0.2.0/24".parse().unwrap()),
        ])
    }

    #[test]
    fn test_vlan_for() {
        let table = reference_table();

        assert_eq!(table.vlan_for(Ipv4Addr::new(10, 0, 1, 5)), Some(10));
        assert_eq!(table.vlan_for(Ipv4Addr::new(10, 0, 2, 5)), Some(20));
        assert_eq!(table.vlan_for(Ipv4Addr::new(192, 168, 1, 1)), None);
    }

    #[test]
    fn test_is_cross_vlan() {
        let table = reference_table();

        assert!(table.is_cross_vlan(Ipv4Addr::new(10, 0, 2, 1), 10));
        assert!(!table.is_cross_vlan(Ipv4Addr::new(10, 0, 1, 50), 10));
        // Unmatched destinations are never cross-VLAN
        assert!(!table.is_cross_vlan(Ipv4Addr::new(192, 168, 1, 1), 10));
    }

    #[test]
    fn test_first_match_wins() {
        let table = SubnetTable::new(vec![
            (10, "10.0.0.0/16".parse().unwrap()),
            (20, "10.0.2.0/24".parse().unwrap()),
        ]);

        // 10.0.2.5 is inside both subnets; the earlier entry wins
        assert_eq!(table.vlan_for(Ipv4Addr::new(10, 0, 2, 5)), Some(10));
    }
}
