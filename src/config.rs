//! Typed network configuration: option parsing, validation, and IPAM merge.
//!
//! Locally created and cluster-recovered networks share this parse path, so
//! both satisfy identical invariants.

use crate::cluster::IpamSubnet;
use crate::error::{DriverError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

/// Option key for the host parent interface.
pub const OPT_PARENT: &str = "parent";
/// Option key for the macvlan operating mode.
pub const OPT_MODE: &str = "macvlan_mode";
/// Option key for the interface MTU.
pub const OPT_MTU: &str = "mtu";
/// Option key marking the network as internal (no external routing).
pub const OPT_INTERNAL: &str = "internal";

/// Macvlan operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MacvlanMode {
    #[default]
    Bridge,
    Vepa,
    Private,
    Passthru,
}

impl std::fmt::Display for MacvlanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MacvlanMode::Bridge => write!(f, "bridge"),
            MacvlanMode::Vepa => write!(f, "vepa"),
            MacvlanMode::Private => write!(f, "private"),
            MacvlanMode::Passthru => write!(f, "passthru"),
        }
    }
}

impl std::str::FromStr for MacvlanMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bridge" => Ok(MacvlanMode::Bridge),
            "vepa" => Ok(MacvlanMode::Vepa),
            "private" => Ok(MacvlanMode::Private),
            "passthru" => Ok(MacvlanMode::Passthru),
            _ => Err(format!("unknown macvlan mode: {}", s)),
        }
    }
}

/// Validated configuration snapshot for one network.
///
/// Captured at create or recovery time and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfiguration {
    /// Network ID
    pub id: String,

    /// Host parent interface the macvlan interfaces attach to
    pub parent: Option<String>,

    /// Macvlan operating mode
    pub mode: MacvlanMode,

    /// Interface MTU override
    pub mtu: Option<u32>,

    /// Internal network: no external routing via the parent
    pub internal: bool,

    /// IPv4 address pools
    pub ipv4_subnets: Vec<IpamSubnet>,

    /// IPv6 address pools
    pub ipv6_subnets: Vec<IpamSubnet>,
}

impl NetworkConfiguration {
    /// Parse and validate a generic options map into a typed configuration.
    ///
    /// Unknown option keys are ignored. Known keys with unparseable values
    /// fail with `DriverError::InvalidNetworkOption`.
    pub fn parse(id: &str, options: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self {
            id: id.to_string(),
            parent: None,
            mode: MacvlanMode::default(),
            mtu: None,
            internal: false,
            ipv4_subnets: Vec::new(),
            ipv6_subnets: Vec::new(),
        };

        for (key, value) in options {
            match key.as_str() {
                OPT_PARENT => config.parent = Some(value.clone()),
                OPT_MODE => {
                    config.mode = value.parse().map_err(|reason| {
                        DriverError::InvalidNetworkOption { option: OPT_MODE.to_string(), reason }
                    })?;
                }
                OPT_MTU => {
                    config.mtu =
                        Some(value.parse().map_err(|_| DriverError::InvalidNetworkOption {
                            option: OPT_MTU.to_string(),
                            reason: format!("expected an integer, got {:?}", value),
                        })?);
                }
                OPT_INTERNAL => {
                    config.internal =
                        value.parse().map_err(|_| DriverError::InvalidNetworkOption {
                            option: OPT_INTERNAL.to_string(),
                            reason: format!("expected true or false, got {:?}", value),
                        })?;
                }
                _ => {}
            }
        }

        Ok(config)
    }

    /// Merge cluster-provided address pools into the configuration.
    ///
    /// Cluster IPAM takes precedence: existing pools are dropped and the
    /// given ones installed, classified as IPv4 or IPv6 by their address
    /// part. An entry with an empty or unparseable CIDR fails the whole
    /// merge with `DriverError::InvalidSubnet`.
    pub fn merge_ipam(&mut self, subnets: &[IpamSubnet]) -> Result<()> {
        self.ipv4_subnets.clear();
        self.ipv6_subnets.clear();

        for entry in subnets {
            let addr_part = entry.subnet.split('/').next().unwrap_or("");
            let addr: IpAddr = addr_part.parse().map_err(|_| DriverError::InvalidSubnet {
                network: self.id.clone(),
                subnet: entry.subnet.clone(),
            })?;

            match addr {
                IpAddr::V4(_) => self.ipv4_subnets.push(entry.clone()),
                IpAddr::V6(_) => self.ipv6_subnets.push(entry.clone()),
            }
        }

        Ok(())
    }
}
