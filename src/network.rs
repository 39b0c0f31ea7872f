//! Per-network state: the endpoint registry and the sandbox handle.
//!
//! Each [`Network`] carries its own lock, colocated with the endpoint table
//! and sandbox field it guards. The lock is never exposed; all access goes
//! through the network's methods.

use crate::config::NetworkConfiguration;
use crate::error::{DriverError, Result};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Handle to an isolated network namespace.
///
/// Created and torn down entirely by the plumbing layer; the registry only
/// stores the handle and hands it back.
pub trait Sandbox: Send + Sync + fmt::Debug {
    /// Stable key identifying the namespace (e.g., its bind-mount path).
    fn key(&self) -> &str;
}

/// A single attachment point in a network (e.g., a container's interface).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Endpoint ID, unique within its network
    pub id: String,

    /// MAC address assigned to the interface
    pub mac: Option<String>,

    /// IPv4 address in CIDR form
    pub addr: Option<String>,

    /// IPv6 address in CIDR form
    pub addr_v6: Option<String>,
}

impl Endpoint {
    /// Create an endpoint with only its id set.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), mac: None, addr: None, addr_v6: None }
    }
}

struct NetworkState {
    endpoints: HashMap<String, Arc<Endpoint>>,
    sandbox: Option<Arc<dyn Sandbox>>,
}

/// A managed network domain: immutable identity and configuration, plus the
/// mutable endpoint table and sandbox handle under one lock.
///
/// Shared as `Arc<Network>`. Deleting the network from the driver registry
/// does NOT cascade to its endpoints; callers delete endpoints first or
/// accept that a still-held `Arc<Network>` keeps its orphaned endpoints
/// reachable.
pub struct Network {
    id: String,
    driver: String,
    config: NetworkConfiguration,
    state: RwLock<NetworkState>,
}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network")
            .field("id", &self.id)
            .field("driver", &self.driver)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Network {
    /// Create a network with an empty endpoint table and no sandbox.
    pub fn new(
        id: impl Into<String>,
        driver: impl Into<String>,
        config: NetworkConfiguration,
    ) -> Self {
        Self {
            id: id.into(),
            driver: driver.into(),
            config,
            state: RwLock::new(NetworkState { endpoints: HashMap::new(), sandbox: None }),
        }
    }

    /// Network ID. Immutable for the life of the network.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name of the owning driver.
    ///
    /// A back reference by name, not an ownership edge; resolve it through
    /// the owning driver's registry when the instance is needed.
    pub fn driver(&self) -> &str {
        &self.driver
    }

    /// Configuration snapshot captured at create or recovery time.
    pub fn config(&self) -> &NetworkConfiguration {
        &self.config
    }

    /// Register an endpoint, replacing any existing entry with the same id.
    pub async fn add_endpoint(&self, endpoint: Arc<Endpoint>) {
        let mut state = self.state.write().await;
        state.endpoints.insert(endpoint.id.clone(), endpoint);

        counter!("macvlan.endpoints.add").increment(1);
    }

    /// Remove an endpoint. No-op when the id is not registered.
    pub async fn delete_endpoint(&self, id: &str) {
        let mut state = self.state.write().await;
        state.endpoints.remove(id);

        counter!("macvlan.endpoints.delete").increment(1);
    }

    /// Unvalidated endpoint lookup for hot paths that already know the id
    /// is well formed.
    pub async fn endpoint(&self, id: &str) -> Option<Arc<Endpoint>> {
        let state = self.state.read().await;
        state.endpoints.get(id).cloned()
    }

    /// Look up an endpoint by id.
    ///
    /// Fails with `DriverError::InvalidEndpointId` for an empty id; returns
    /// `Ok(None)` for a well-formed id with no entry. Callers branch on
    /// this asymmetry, so a legitimate miss must never be an error.
    pub async fn get_endpoint(&self, id: &str) -> Result<Option<Arc<Endpoint>>> {
        if id.is_empty() {
            return Err(DriverError::InvalidEndpointId { id: id.to_string() });
        }

        let state = self.state.read().await;
        let result = state.endpoints.get(id).cloned();

        if result.is_some() {
            counter!("macvlan.endpoints.lookup.hit").increment(1);
        } else {
            counter!("macvlan.endpoints.lookup.miss").increment(1);
            debug!("endpoint {} not found in network {}", id, self.id);
        }

        Ok(result)
    }

    /// Current sandbox handle, if one has been attached.
    pub async fn sandbox(&self) -> Option<Arc<dyn Sandbox>> {
        let state = self.state.read().await;
        state.sandbox.clone()
    }

    /// Attach a sandbox handle, replacing any previous one.
    ///
    /// Serialized with endpoint mutation under the same lock so a reader
    /// never races a writer on either field.
    pub async fn set_sandbox(&self, sandbox: Arc<dyn Sandbox>) {
        let mut state = self.state.write().await;
        state.sandbox = Some(sandbox);
    }
}

/// Validate a network/endpoint id pair supplied by an external handler.
pub fn validate_ids(nid: &str, eid: &str) -> Result<()> {
    if nid.is_empty() {
        return Err(DriverError::InvalidNetworkId { id: nid.to_string() });
    }
    if eid.is_empty() {
        return Err(DriverError::InvalidEndpointId { id: eid.to_string() });
    }
    Ok(())
}
