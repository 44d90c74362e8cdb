//! Connection Cache
//!
//! Keeps one live store connection per (cluster address, collection) for
//! the life of the process.

use crate::domain::entities::ClusterSettings;
use crate::domain::errors::StoreError;
use crate::domain::ports::{StoreConnection, StoreConnector};
use dashmap::DashMap;
use std::sync::Arc;

/// Connections of one cluster, keyed by collection name.
type ClusterConnections = DashMap<String, Arc<dyn StoreConnection>>;

/// Process-lifetime connection cache.
///
/// Two-level map: cluster address, then collection name. Entries are never
/// evicted. Concurrent first accesses to the same key may each open a
/// connection, but only the first one inserted is retained and returned to
/// everybody.
pub struct ConnectionCache {
    connector: Arc<dyn StoreConnector>,
    clusters: DashMap<String, Arc<ClusterConnections>>,
}

impl ConnectionCache {
    /// Create an empty cache opening connections through `connector`.
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            connector,
            clusters: DashMap::new(),
        }
    }

    /// Get or create the sub-map for a cluster address.
    fn cluster(&self, address: &str) -> Arc<ClusterConnections> {
        self.clusters
            .entry(address.to_string())
            .or_insert_with(|| Arc::new(DashMap::new()))
            .clone()
    }

    /// Connection for `settings.address` and `settings.default_collection`.
    ///
    /// Connect failures are returned unchanged and leave nothing cached.
    pub async fn get_or_create(&self, settings: &ClusterSettings) -> Result<Arc<dyn StoreConnection>, StoreError> {
        let cluster = self.cluster(&settings.address);
        let collection = &settings.default_collection;

        let cached = cluster.get(collection).map(|entry| Arc::clone(entry.value()));
        if let Some(conn) = cached {
            return Ok(conn);
        }

        let fresh = self.connector.connect(settings).await?;
        let retained = cluster
            .entry(collection.clone())
            .or_insert_with(|| Arc::clone(&fresh))
            .clone();

        if Arc::ptr_eq(&retained, &fresh) {
            tracing::debug!(
                "cached connection to {} for collection {}",
                settings.address,
                collection
            );
        } else {
            tracing::debug!(
                "discarding duplicate connection to {} for collection {}",
                settings.address,
                collection
            );
        }

        Ok(retained)
    }

    /// Whether a connection is cached for the pair.
    pub fn contains(&self, address: &str, collection: &str) -> bool {
        self.clusters
            .get(address)
            .map(|cluster| cluster.contains_key(collection))
            .unwrap_or(false)
    }

    /// Number of distinct cluster addresses seen.
    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    /// Total number of cached connections.
    pub fn connection_count(&self) -> usize {
        self.clusters.iter().map(|cluster| cluster.len()).sum()
    }
}
