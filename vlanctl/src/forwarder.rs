//! Forwarding decision engine
//!
//! Consumes the decoded control-channel event stream, maintains the
//! learning tables, and synthesizes packet deliveries and flow
//! installations. One engine instance serves every connected switch;
//! events must arrive linearized per switch (the run loop consumes a
//! single queue, which satisfies this for all switches).

use smoltcp::wire::EthernetAddress;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

use crate::arp::ArpCache;
use crate::fdb::{Fdb, PortId, SwitchId};
use crate::messaging::{Action, Command, CommandRouter, Event, FlowMatch, FlowPriority};
use crate::packet::{self, ETHERTYPE_LLDP};
use crate::router::VlanRouter;
use crate::subnets::SubnetTable;

/// The switching/routing decision engine.
pub struct Forwarder {
    fdb: Fdb,
    arp: ArpCache,
    subnets: SubnetTable,
    router: VlanRouter,
}

impl Forwarder {
    pub fn new(subnets: SubnetTable, router_mac: EthernetAddress) -> Self {
        Self {
            fdb: Fdb::new(),
            arp: ArpCache::new(),
            subnets: subnets.clone(),
            router: VlanRouter::new(subnets, router_mac),
        }
    }

    /// Shared handle to the global address-resolution table.
    pub fn arp_cache(&self) -> ArpCache {
        self.arp.clone()
    }

    /// Process one event, returning the commands to emit.
    pub fn handle_event(&mut self, event: Event) -> Vec<Command> {
        match event {
            Event::SwitchConnected { switch } => self.switch_connected(switch),
            Event::PacketIn {
                switch,
                in_port,
                data,
            } => self.packet_in(switch, in_port, &data),
            Event::SwitchDisconnected { switch } => {
                self.switch_disconnected(switch);
                Vec::new()
            }
        }
    }

    /// Drive the engine from an event queue, dispatching commands to the
    /// per-switch sessions. Runs until the queue closes.
    pub async fn run(mut self, mut events: UnboundedReceiver<Event>, commands: CommandRouter) {
        while let Some(event) = events.recv().await {
            for command in self.handle_event(event) {
                commands.dispatch(command);
            }
        }
    }

    fn switch_connected(&mut self, switch: SwitchId) -> Vec<Command> {
        info!(switch, "Switch connected, installing table-miss rule");

        // A reconnecting switch starts with a clean table
        self.fdb.drop_switch(switch);

        vec![Command::InstallFlow {
            switch,
            priority: FlowPriority::TableMiss,
            matching: FlowMatch::default(),
            actions: vec![Action::ToController],
        }]
    }

    fn switch_disconnected(&mut self, switch: SwitchId) {
        info!(switch, "Switch disconnected, dropping learning state");
        self.fdb.drop_switch(switch);
    }

    fn packet_in(&mut self, switch: SwitchId, in_port: PortId, data: &[u8]) -> Vec<Command> {
        let frame = match packet::decode(data) {
            Ok(frame) => frame,
            Err(error) => {
                debug!(switch, in_port, %error, "Ignoring undecodable frame");
                return Vec::new();
            }
        };

        // Link discovery traffic is not this engine's concern
        if frame.ethertype == ETHERTYPE_LLDP {
            return Vec::new();
        }

        // Learn on every frame so a moved host is re-learned on its next
        // transmission
        self.fdb.learn(switch, frame.vlan, frame.src, in_port);

        if let Some(ip) = frame.ipv4 {
            self.arp.observe(ip.src, frame.src);
            debug!(ip = %ip.src, mac = %frame.src, "Learned address mapping");

            if let Some(vlan) = frame.vlan
                && self.subnets.is_cross_vlan(ip.dst, vlan)
            {
                return self
                    .router
                    .route(&self.fdb, &self.arp, switch, in_port, data, vlan, ip.dst);
            }
        }

        debug!(
            switch,
            in_port,
            src = %frame.src,
            dst = %frame.dst,
            vlan = ?frame.vlan,
            "Packet in"
        );

        match self.fdb.lookup(switch, frame.vlan, frame.dst) {
            Some(port) => {
                // Install the exact-match rule first so the switch handles
                // the flow without the controller from here on
                vec![
                    Command::InstallFlow {
                        switch,
                        priority: FlowPriority::IntraVlan,
                        matching: FlowMatch {
                            in_port: Some(in_port),
                            eth_dst: Some(frame.dst),
                            vlan: frame.vlan,
                            ..Default::default()
                        },
                        actions: vec![Action::Output { port }],
                    },
                    Command::PacketOut {
                        switch,
                        in_port,
                        actions: vec![Action::Output { port }],
                        data: data.to_vec(),
                    },
                ]
            }
            None => {
                // Unknown destination: flood the VLAN (and trunk ports);
                // every such frame revisits the controller until the
                // destination is learned
                self.fdb
                    .flood_ports(switch, frame.vlan, in_port)
                    .into_iter()
                    .map(|port| Command::PacketOut {
                        switch,
                        in_port,
                        actions: vec![Action::Output { port }],
                        data: data.to_vec(),
                    })
                    .collect()
            }
        }
    }
}
