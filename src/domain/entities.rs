//! Domain Entities - Core business objects
//!
//! Cluster endpoints and the per-entity routing configuration.

use crate::domain::errors::RouterError;
use crate::domain::ports::EntityMapping;
use crate::domain::services::PartitionNamer;
use crate::domain::value_objects::PartitionMode;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

/// Default number of primary shards for program-managed collections.
pub const DEFAULT_SHARD_COUNT: u32 = 5;

/// Default connection limit per cluster.
pub const DEFAULT_CONNECTION_LIMIT: u32 = 80;

/// Basic-auth credentials for a cluster.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// One logical cluster endpoint.
///
/// Settings are immutable once an entity has captured them. The collection a
/// connection is opened for is derived with [`ClusterSettings::with_collection`]
/// instead of being written back into the captured copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSettings {
    /// Base URL of the cluster (e.g. `http://localhost:9200`)
    pub address: String,
    /// Optional basic-auth credentials
    pub credentials: Option<Credentials>,
    /// Collection used when nothing more specific applies
    pub default_collection: String,
    /// Optional HTTP proxy URL
    pub proxy: Option<String>,
    /// Maximum pooled connections per host
    pub connection_limit: u32,
}

impl ClusterSettings {
    /// Create settings for `address` with no credentials and no proxy.
    pub fn new(address: impl Into<String>, default_collection: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            credentials: None,
            default_collection: default_collection.into(),
            proxy: None,
            connection_limit: DEFAULT_CONNECTION_LIMIT,
        }
    }

    /// Set credentials.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Set proxy URL.
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Set connection limit.
    pub fn connection_limit(mut self, limit: u32) -> Self {
        self.connection_limit = limit;
        self
    }

    /// Copy of these settings targeting `collection`.
    pub fn with_collection(&self, collection: &str) -> Self {
        Self {
            default_collection: collection.to_string(),
            ..self.clone()
        }
    }

    /// Whether an address has been configured.
    pub fn has_address(&self) -> bool {
        !self.address.trim().is_empty()
    }
}

/// Routing configuration of one logical entity type.
///
/// Created once when the entity is registered and shared for the life of
/// the process. Only two things change after construction: the partition
/// mode (elevated from `None` to `NewAlias` once an alias is present) and
/// the settings snapshot taken on the first resolution.
pub struct EntityConfig {
    name: String,
    settings: Option<ClusterSettings>,
    alias: String,
    partition_mode: Mutex<PartitionMode>,
    shard_count: u32,
    mapping: Arc<dyn EntityMapping>,
    captured: OnceLock<ClusterSettings>,
}

impl EntityConfig {
    /// Create a configuration with no alias, no own settings and the
    /// default shard count.
    pub fn new(name: impl Into<String>, mapping: Arc<dyn EntityMapping>) -> Self {
        Self {
            name: name.into(),
            settings: None,
            alias: String::new(),
            partition_mode: Mutex::new(PartitionMode::None),
            shard_count: DEFAULT_SHARD_COUNT,
            mapping,
            captured: OnceLock::new(),
        }
    }

    /// Use these cluster settings instead of the process-wide default.
    pub fn settings(mut self, settings: ClusterSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Set the alias. An empty alias disables partitioning.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Set the partition mode.
    pub fn partition_mode(mut self, mode: PartitionMode) -> Self {
        *self.partition_mode.get_mut() = mode;
        self
    }

    /// Set the shard count used when creating collections.
    pub fn shard_count(mut self, shards: u32) -> Self {
        self.shard_count = shards;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias_name(&self) -> &str {
        &self.alias
    }

    pub fn shards(&self) -> u32 {
        self.shard_count
    }

    pub fn mapping(&self) -> &Arc<dyn EntityMapping> {
        &self.mapping
    }

    /// Current partition mode.
    pub fn mode(&self) -> PartitionMode {
        *self.partition_mode.lock()
    }

    /// Physical collection this entity maps to at `at`.
    ///
    /// Normalizes the stored partition mode first: forced to `None` without
    /// an alias, elevated from `None` to `NewAlias` with one. Repeated calls
    /// leave the mode unchanged.
    pub fn collection_at(&self, at: DateTime<Utc>, default_name: &str) -> String {
        let mode = {
            let mut mode = self.partition_mode.lock();
            let effective = PartitionNamer::effective_mode(&self.alias, *mode);
            if effective != *mode {
                tracing::debug!(
                    "entity {} partition mode {} -> {}",
                    self.name,
                    *mode,
                    effective
                );
                *mode = effective;
            }
            effective
        };
        PartitionNamer::collection_name(&self.alias, mode, at, default_name)
    }

    /// Settings snapshot taken on first resolution.
    ///
    /// The entity's own settings take precedence over `fallback`. Fails when
    /// neither yields a cluster address; nothing is captured in that case.
    pub fn captured_settings(&self, fallback: Option<&ClusterSettings>) -> Result<&ClusterSettings, RouterError> {
        if let Some(settings) = self.captured.get() {
            return Ok(settings);
        }

        let source = self
            .settings
            .as_ref()
            .or(fallback)
            .filter(|s| s.has_address())
            .ok_or_else(|| {
                RouterError::Configuration(format!("entity {}: cluster address cannot be empty", self.name))
            })?;

        Ok(self.captured.get_or_init(|| source.clone()))
    }
}

impl std::fmt::Debug for EntityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityConfig")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("alias", &self.alias)
            .field("partition_mode", &self.mode())
            .field("shard_count", &self.shard_count)
            .finish_non_exhaustive()
    }
}
