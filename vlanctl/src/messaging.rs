//! Control-channel message model and command routing
//!
//! The engine consumes already-decoded [`Event`]s and emits structured
//! [`Command`]s; the transport adapter is responsible for carrying them.
//! Everything here is serde-serializable (MAC addresses as colon-hex
//! strings) so an adapter can ship messages as JSON lines.
//!
//! [`CommandRouter`] maps a switch id to the outbound channel of its
//! control session. Dispatch is fire-and-forget: a command for a switch
//! with no live session is dropped, never an error.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use smoltcp::wire::EthernetAddress;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::fdb::{PortId, SwitchId};

/// Inbound events from the control-channel adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    SwitchConnected {
        switch: SwitchId,
    },
    PacketIn {
        switch: SwitchId,
        in_port: PortId,
        data: Vec<u8>,
    },
    SwitchDisconnected {
        switch: SwitchId,
    },
}

/// Outbound commands to the control-channel adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Install a persistent flow rule on a switch.
    InstallFlow {
        switch: SwitchId,
        priority: FlowPriority,
        #[serde(rename = "match")]
        matching: FlowMatch,
        actions: Vec<Action>,
    },
    /// One-shot packet delivery; no rule is installed.
    PacketOut {
        switch: SwitchId,
        in_port: PortId,
        actions: Vec<Action>,
        data: Vec<u8>,
    },
}

impl Command {
    /// The switch this command is addressed to.
    pub fn switch(&self) -> SwitchId {
        match self {
            Command::InstallFlow { switch, .. } | Command::PacketOut { switch, .. } => *switch,
        }
    }
}

/// Flow-rule priority classes, strictly ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowPriority {
    /// Default rule: punt unmatched traffic to the controller.
    TableMiss,
    /// Learned intra-VLAN exact match.
    IntraVlan,
    /// Inter-VLAN routing exact match.
    InterVlan,
}

impl FlowPriority {
    /// Numeric priority as installed on the switch.
    pub fn value(self) -> u16 {
        match self {
            FlowPriority::TableMiss => 0,
            FlowPriority::IntraVlan => 1,
            FlowPriority::InterVlan => 2,
        }
    }
}

/// Match fields of a flow rule. Unset fields are wildcards; the default
/// value matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_port: Option<PortId>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "mac_opt")]
    pub eth_dst: Option<EthernetAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eth_type: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_dst: Option<Ipv4Addr>,
}

/// A single switch action, applied in list order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Emit the frame on a port.
    Output { port: PortId },
    /// Punt the frame to the controller.
    ToController,
    /// Strip the outer 802.1Q tag.
    PopVlan,
    /// Push an 802.1Q tag with the given VLAN id.
    PushVlan { vlan: u16 },
    /// Rewrite the destination link-layer address.
    SetEthDst {
        #[serde(with = "mac")]
        mac: EthernetAddress,
    },
}

/// Registry of per-switch outbound command channels.
#[derive(Clone, Debug, Default)]
pub struct CommandRouter {
    sessions: Arc<RwLock<HashMap<SwitchId, UnboundedSender<Command>>>>,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a switch session's outbound channel, replacing any prior
    /// registration for the same switch.
    pub fn register(&self, switch: SwitchId, tx: UnboundedSender<Command>) {
        self.sessions.write().unwrap().insert(switch, tx);
    }

    /// Remove a switch session. Queued commands for it are dropped.
    pub fn unregister(&self, switch: SwitchId) {
        self.sessions.write().unwrap().remove(&switch);
    }

    /// Send a command to its switch's session, if one is live.
    pub fn dispatch(&self, command: Command) {
        let switch = command.switch();
        let sessions = self.sessions.read().unwrap();
        match sessions.get(&switch) {
            Some(tx) => {
                // Fire-and-forget; a send to a closing session is not an error
                let _ = tx.send(command);
            }
            None => {
                debug!(switch, "Dropping command for switch without a session");
            }
        }
    }
}

mod mac {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use smoltcp::wire::EthernetAddress;

    use crate::packet::{format_mac, parse_mac};

    pub fn serialize<S: Serializer>(mac: &EthernetAddress, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_mac(mac))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<EthernetAddress, D::Error> {
        let text = String::deserialize(d)?;
        parse_mac(&text).ok_or_else(|| D::Error::custom(format!("invalid MAC address: {text}")))
    }
}

mod mac_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use smoltcp::wire::EthernetAddress;

    use crate::packet::format_mac;

    pub fn serialize<S: Serializer>(
        mac: &Option<EthernetAddress>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match mac {
            Some(mac) => s.serialize_str(&format_mac(mac)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<EthernetAddress>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|text| {
                crate::packet::parse_mac(&text).ok_or_else(|| {
                    serde::de::Error::custom(format!("invalid MAC address: {text}"))
                })
            })
            .transpose()
    }
}
