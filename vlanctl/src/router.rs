//! Inter-VLAN routing
//!
//! Rewrites VLAN membership and the destination link-layer address for
//! traffic crossing subnets, and installs the highest-priority exact-match
//! rules so subsequent frames of the same flow bypass the controller.
//!
//! Fallback behavior is asymmetric on purpose: an unresolved destination
//! address triggers a retagged flood of the destination VLAN, while a
//! resolved address with no learned port is dropped without flooding. See
//! DESIGN.md before changing this.

use std::net::Ipv4Addr;

use smoltcp::wire::EthernetAddress;
use tracing::{error, info, warn};

use crate::arp::ArpCache;
use crate::fdb::{Fdb, PortId, SwitchId};
use crate::messaging::{Action, Command, FlowMatch, FlowPriority};
use crate::packet::ETHERTYPE_IPV4;
use crate::subnets::SubnetTable;

/// Stateless router over the shared learning and resolution tables.
#[derive(Debug, Clone)]
pub struct VlanRouter {
    subnets: SubnetTable,
    /// Reserved virtual-router address. Declared by the deployment but not
    /// written into rewritten frames; see DESIGN.md.
    #[allow(dead_code)]
    router_mac: EthernetAddress,
}

impl VlanRouter {
    pub fn new(subnets: SubnetTable, router_mac: EthernetAddress) -> Self {
        Self {
            subnets,
            router_mac,
        }
    }

    /// Route a cross-subnet frame.
    ///
    /// Returns the commands to emit; an empty vector means the frame was
    /// dropped (the end host's transport is expected to retransmit).
    pub fn route(
        &self,
        fdb: &Fdb,
        arp: &ArpCache,
        switch: SwitchId,
        in_port: PortId,
        data: &[u8],
        src_vlan: u16,
        dst_ip: Ipv4Addr,
    ) -> Vec<Command> {
        let Some(dst_vlan) = self.subnets.vlan_for(dst_ip) else {
            error!(switch, ip = %dst_ip, "No subnet matches destination, dropping");
            return Vec::new();
        };

        info!(switch, src_vlan, dst_vlan, ip = %dst_ip, "Inter-VLAN routing");

        let Some(dst_mac) = arp.resolve(dst_ip) else {
            warn!(switch, ip = %dst_ip, dst_vlan, "Destination unresolved, flooding destination VLAN");
            return self.flood_to_vlan(fdb, switch, in_port, data, dst_vlan);
        };

        let Some(out_port) = fdb.lookup(switch, Some(dst_vlan), dst_mac) else {
            // Known globally but not on this switch/VLAN: drop, no flood
            error!(switch, mac = %dst_mac, dst_vlan, "No port learned for resolved address, dropping");
            return Vec::new();
        };

        let actions = vec![
            Action::PopVlan,
            Action::PushVlan { vlan: dst_vlan },
            Action::SetEthDst { mac: dst_mac },
            Action::Output { port: out_port },
        ];

        vec![
            Command::PacketOut {
                switch,
                in_port,
                actions: actions.clone(),
                data: data.to_vec(),
            },
            Command::InstallFlow {
                switch,
                priority: FlowPriority::InterVlan,
                matching: FlowMatch {
                    in_port: Some(in_port),
                    eth_type: Some(ETHERTYPE_IPV4),
                    vlan: Some(src_vlan),
                    ipv4_dst: Some(dst_ip),
                    ..Default::default()
                },
                actions,
            },
        ]
    }

    /// Flood a frame to every port of the destination VLAN (plus trunk
    /// ports), retagged for that VLAN. No rule is installed; the
    /// destination is still unknown to the address table.
    fn flood_to_vlan(
        &self,
        fdb: &Fdb,
        switch: SwitchId,
        in_port: PortId,
        data: &[u8],
        dst_vlan: u16,
    ) -> Vec<Command> {
        fdb.flood_ports(switch, Some(dst_vlan), in_port)
            .into_iter()
            .map(|port| Command::PacketOut {
                switch,
                in_port,
                actions: vec![
                    Action::PopVlan,
                    Action::PushVlan { vlan: dst_vlan },
                    Action::Output { port },
                ],
                data: data.to_vec(),
            })
            .collect()
    }
}
