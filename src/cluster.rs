//! Cluster control-plane client abstraction.
//!
//! When the driver participates in a cluster, network definitions live in the
//! control plane and a node can be asked about a network it has never seen
//! locally (a secondary node, or the first lookup after a restart).
//! Implementations of [`ClusterClient`] answer those metadata queries; the
//! driver only cares whether a usable answer came back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One address pool of a network's IPAM configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpamSubnet {
    /// Pool CIDR (e.g., "10.0.0.0/24")
    pub subnet: String,

    /// Gateway address within the pool, when the cluster assigned one
    pub gateway: Option<String>,
}

/// Network metadata as returned by the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkMetadata {
    /// Network ID as known to the cluster
    pub id: String,

    /// IPAM address pools
    pub ipam: Vec<IpamSubnet>,

    /// Generic driver options (parent, macvlan_mode, mtu, ...)
    pub options: HashMap<String, String>,
}

/// Client for querying network metadata from the cluster control plane.
///
/// A query may block for a network round trip; timeout and retry policy
/// belong to implementations, not to this crate. Callers treat any error
/// uniformly as "cannot recover" — no finer classification is required.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Fetch metadata for the network with the given id.
    async fn network_info(&self, id: &str) -> anyhow::Result<NetworkMetadata>;
}
