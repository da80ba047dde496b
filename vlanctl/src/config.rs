//! Static controller configuration
//!
//! The VLAN-to-subnet table and the virtual-router address are fixed at
//! startup; there is no runtime mutation. Subnets are kept as strings in
//! the file and parsed into [`ipnet::Ipv4Net`] at load time.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use smoltcp::wire::EthernetAddress;

use crate::packet::parse_mac;
use crate::subnets::SubnetTable;

/// One VLAN-to-subnet binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubnetBinding {
    pub vlan: u16,
    /// Subnet in `a.b.c.d/len` notation
    pub subnet: String,
}

/// Controller configuration, loaded from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// VLAN-to-subnet table for inter-VLAN routing
    pub subnets: Vec<SubnetBinding>,
    /// Reserved virtual-router MAC address
    pub router_mac: String,
    /// Control-channel listen socket
    pub socket: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            subnets: vec![
                SubnetBinding {
                    vlan: 10,
                    subnet: "10.0.1.0/24".to_string(),
                },
                SubnetBinding {
                    vlan: 20,
                    subnet: "10.0.2.0/24".to_string(),
                },
            ],
            router_mac: "00:00:00:00:00:01".to_string(),
            socket: PathBuf::from("/run/vlanctl.sock"),
        }
    }
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        // Surface bad subnets and MACs at startup, not per packet
        config.subnet_table()?;
        config.router_mac()?;
        Ok(config)
    }

    /// Build the subnet classification table.
    pub fn subnet_table(&self) -> Result<SubnetTable> {
        let mut entries = Vec::with_capacity(self.subnets.len());
        for binding in &self.subnets {
            if binding.vlan == 0 {
                bail!("VLAN 0 is reserved for untagged traffic");
            }
            let net: Ipv4Net = binding
                .subnet
                .parse()
                .with_context(|| format!("Invalid subnet '{}' for VLAN {}", binding.subnet, binding.vlan))?;
            entries.push((binding.vlan, net));
        }
        Ok(SubnetTable::new(entries))
    }

    /// Parse the virtual-router MAC address.
    pub fn router_mac(&self) -> Result<EthernetAddress> {
        match parse_mac(&self.router_mac) {
            Some(mac) => Ok(mac),
            None => bail!("Invalid router MAC address '{}'", self.router_mac),
        }
    }
}
