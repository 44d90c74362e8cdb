//! Store Connector Port
//!
//! Opens connections to a document-store cluster.

use crate::domain::entities::ClusterSettings;
use crate::domain::errors::StoreError;
use crate::domain::ports::StoreConnection;
use async_trait::async_trait;
use std::sync::Arc;

/// Factory for live store connections.
///
/// This is an outbound port: the connection cache calls it on the first
/// access to an (address, collection) pair and keeps the handle for the
/// life of the process.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Open a connection described by `settings`.
    ///
    /// `settings.default_collection` is the physical collection the
    /// connection is opened for. Fails with [`StoreError::Connect`] when
    /// the cluster is unreachable.
    async fn connect(&self, settings: &ClusterSettings) -> Result<Arc<dyn StoreConnection>, StoreError>;
}
