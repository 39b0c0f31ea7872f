//! Driver-wide network registry with cluster read-through recovery.
//!
//! The registry is the authoritative local store of every network this
//! driver instance manages. A lookup miss can fall through to the cluster
//! control plane ([`Driver::resolve_network`]): the network is reconstructed
//! from cluster metadata and installed locally, a read-through cache.
//!
//! Recovery is at-least-once, not exactly-once: two concurrent misses for
//! the same id may both query the cluster and both install. Both
//! reconstructions derive from the same external source of truth, so the
//! last install winning is harmless, and no per-key coalescing is done.

use crate::cluster::ClusterClient;
use crate::config::NetworkConfiguration;
use crate::error::{DriverError, Result};
use crate::network::Network;
use metrics::counter;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

/// A driver instance and its registry of managed networks.
///
/// Cheap to clone; clones share the same registry. Each instance is an
/// explicit value owned by whoever constructed it, never a process-global,
/// so tests can run any number of independent drivers.
#[derive(Clone)]
pub struct Driver {
    name: String,
    networks: Arc<RwLock<HashMap<String, Arc<Network>>>>,
    client: Option<Arc<dyn ClusterClient>>,
}

impl Driver {
    /// Create a standalone driver with no cluster control plane.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), networks: Arc::new(RwLock::new(HashMap::new())), client: None }
    }

    /// Create a driver attached to a cluster control plane.
    pub fn with_client(name: impl Into<String>, client: Arc<dyn ClusterClient>) -> Self {
        Self {
            name: name.into(),
            networks: Arc::new(RwLock::new(HashMap::new())),
            client: Some(client),
        }
    }

    /// Driver instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a network, silently replacing any existing entry with the
    /// same id (last writer wins).
    #[instrument(skip(self, network), fields(network_id = %network.id()))]
    pub async fn add_network(&self, network: Arc<Network>) {
        let mut networks = self.networks.write().await;
        networks.insert(network.id().to_string(), network);

        counter!("macvlan.networks.add").increment(1);
    }

    /// Remove a network from the registry. No-op when the id is not
    /// registered. Endpoints of the network are NOT deleted; the caller
    /// removes them first or accepts orphaning them.
    #[instrument(skip(self), fields(network_id = %id))]
    pub async fn delete_network(&self, id: &str) {
        let mut networks = self.networks.write().await;
        networks.remove(id);

        counter!("macvlan.networks.delete").increment(1);
    }

    /// Snapshot of all registered networks, in unspecified order.
    pub async fn list_networks(&self) -> Vec<Arc<Network>> {
        let networks = self.networks.read().await;
        networks.values().cloned().collect()
    }

    /// Look up a network by id, local registry only.
    ///
    /// Fails with `DriverError::InvalidNetworkId` for an empty id and
    /// `DriverError::NetworkNotFound` for a well-formed miss. This is the
    /// one accessor that tells a malformed id apart from a legitimate
    /// miss; callers use that to decide whether a cluster lookup is worth
    /// attempting.
    #[instrument(skip(self), fields(network_id = %id))]
    pub async fn get_network(&self, id: &str) -> Result<Arc<Network>> {
        if id.is_empty() {
            return Err(DriverError::InvalidNetworkId { id: id.to_string() });
        }

        let networks = self.networks.read().await;
        networks
            .get(id)
            .cloned()
            .ok_or_else(|| DriverError::NetworkNotFound { id: id.to_string() })
    }

    /// Look up a network, falling through to the cluster on a local miss.
    ///
    /// `None` means the network does not exist anywhere: neither locally
    /// nor (as far as this attempt could tell) in the cluster.
    #[instrument(skip(self), fields(network_id = %id))]
    pub async fn resolve_network(&self, id: &str) -> Option<Arc<Network>> {
        {
            let networks = self.networks.read().await;
            if let Some(network) = networks.get(id) {
                counter!("macvlan.networks.lookup.hit").increment(1);
                return Some(network.clone());
            }
        }
        counter!("macvlan.networks.lookup.miss").increment(1);

        // The cluster round trip runs with no lock held so lookups of
        // other networks are never serialized behind it.
        let network = self.restore_from_cluster(id).await?;

        {
            let mut networks = self.networks.write().await;
            networks.insert(network.id().to_string(), network.clone());
        }
        debug!("installed network {} recovered from cluster", network.id());

        Some(network)
    }

    /// Reconstruct a network from cluster metadata.
    ///
    /// Stateless and re-entrant; a failed attempt is simply retried by the
    /// next lookup. Every failure mode — no client, query error (which
    /// covers both "not found" and transport trouble), invalid options,
    /// invalid IPAM — collapses into `None`; the caller cannot and should
    /// not tell them apart here.
    async fn restore_from_cluster(&self, id: &str) -> Option<Arc<Network>> {
        let client = self.client.as_ref()?;

        let metadata = match client.network_info(id).await {
            Ok(metadata) => metadata,
            Err(err) => {
                debug!("cluster lookup for network {} failed: {}", id, err);
                counter!("macvlan.recovery.miss").increment(1);
                return None;
            }
        };

        // Same parse/validate path as locally created networks, so a
        // recovered network satisfies identical invariants.
        let mut config = match NetworkConfiguration::parse(id, &metadata.options) {
            Ok(config) => config,
            Err(err) => {
                warn!("discarding cluster options for network {}: {}", id, err);
                counter!("macvlan.recovery.invalid").increment(1);
                return None;
            }
        };
        if let Err(err) = config.merge_ipam(&metadata.ipam) {
            warn!("discarding cluster IPAM for network {}: {}", id, err);
            counter!("macvlan.recovery.invalid").increment(1);
            return None;
        }

        counter!("macvlan.recovery.restored").increment(1);
        debug!("restored network {} from cluster", id);

        Some(Arc::new(Network::new(id, &self.name, config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_network(id: &str) -> Arc<Network> {
        let config = NetworkConfiguration::parse(id, &HashMap::new()).unwrap();
        Arc::new(Network::new(id, "macvlan", config))
    }

    #[tokio::test]
    async fn test_add_and_get_network() {
        let driver = Driver::new("macvlan");
        let network = test_network("net1");

        driver.add_network(network.clone()).await;

        let found = driver.get_network("net1").await.unwrap();
        assert!(Arc::ptr_eq(&found, &network));
    }

    #[tokio::test]
    async fn test_get_network_empty_id_is_invalid() {
        let driver = Driver::new("macvlan");

        let err = driver.get_network("").await.unwrap_err();
        assert!(matches!(err, DriverError::InvalidNetworkId { .. }));
    }

    #[tokio::test]
    async fn test_get_network_miss_is_not_found() {
        let driver = Driver::new("macvlan");

        let err = driver.get_network("net1").await.unwrap_err();
        assert!(matches!(err, DriverError::NetworkNotFound { id } if id == "net1"));
    }

    #[tokio::test]
    async fn test_delete_network_is_idempotent() {
        let driver = Driver::new("macvlan");
        driver.add_network(test_network("net1")).await;

        driver.delete_network("net1").await;
        driver.delete_network("net1").await;

        assert!(matches!(
            driver.get_network("net1").await.unwrap_err(),
            DriverError::NetworkNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_add_network_overwrites() {
        let driver = Driver::new("macvlan");

        let first = test_network("net1");
        let second = test_network("net1");

        driver.add_network(first).await;
        driver.add_network(second.clone()).await;

        let found = driver.get_network("net1").await.unwrap();
        assert!(Arc::ptr_eq(&found, &second));

        // Still a single entry for the id.
        assert_eq!(driver.list_networks().await.len(), 1);
    }

    #[tokio::test]
    async fn test_list_networks_snapshot() {
        let driver = Driver::new("macvlan");
        driver.add_network(test_network("net1")).await;
        driver.add_network(test_network("net2")).await;

        let mut ids: Vec<String> =
            driver.list_networks().await.iter().map(|n| n.id().to_string()).collect();
        ids.sort();

        assert_eq!(ids, vec!["net1".to_string(), "net2".to_string()]);
    }

    #[tokio::test]
    async fn test_resolve_network_without_client_returns_none() {
        let driver = Driver::new("macvlan");

        assert!(driver.resolve_network("net1").await.is_none());
        assert!(driver.list_networks().await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_insert_and_list() {
        let driver = Driver::new("macvlan");

        let mut handles = vec![];

        for i in 0..32 {
            let driver_clone = driver.clone();
            handles.push(tokio::spawn(async move {
                driver_clone.add_network(test_network(&format!("net-{}", i))).await;
            }));
        }

        // Listers racing the writers must only ever observe fully
        // inserted entries.
        for _ in 0..8 {
            let driver_clone = driver.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..16 {
                    for network in driver_clone.list_networks().await {
                        assert!(network.id().starts_with("net-"));
                    }
                }
            }));
        }

        for handle in handles {
            handle.await.expect("task failed");
        }

        assert_eq!(driver.list_networks().await.len(), 32);
        for i in 0..32 {
            let found = driver.get_network(&format!("net-{}", i)).await.unwrap();
            assert_eq!(found.id(), format!("net-{}", i));
        }
    }

    #[tokio::test]
    async fn test_independent_driver_instances() {
        let left = Driver::new("macvlan-a");
        let right = Driver::new("macvlan-b");

        left.add_network(test_network("net1")).await;

        assert!(right.get_network("net1").await.is_err());
    }
}
