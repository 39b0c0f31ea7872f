//! Macvlan driver core: in-memory registries for networks and endpoints,
//! with lazy reconstruction of network state from a cluster control plane.
//!
//! Two cooperating registries:
//! - [`Driver`] maps network ids to [`Network`] instances for the lifetime
//!   of the driver, and can resolve a local miss through the cluster
//!   ([`Driver::resolve_network`], a read-through cache).
//! - each [`Network`] maps endpoint ids to [`Endpoint`] instances and holds
//!   the network's [`Sandbox`] handle under its own lock.
//!
//! Actual network plumbing, namespace creation, IPAM allocation, and the
//! control-plane wire protocol live behind collaborator traits; this crate
//! only tracks state.

pub mod cluster;
pub mod config;
pub mod driver;
pub mod error;
pub mod network;

// Re-export commonly used items
pub use cluster::{ClusterClient, IpamSubnet, NetworkMetadata};
pub use config::{MacvlanMode, NetworkConfiguration};
pub use driver::Driver;
pub use error::{DriverError, Result};
pub use network::{validate_ids, Endpoint, Network, Sandbox};
