//! Index Resolver - Main application use case
//!
//! Turns a logical entity and a point in time into a ready-to-use
//! connection to the right physical collection: lazy connect, lazy create
//! and one-time mapping.

use crate::domain::entities::{ClusterSettings, EntityConfig};
use crate::domain::errors::RouterError;
use crate::domain::ports::StoreConnection;
use crate::domain::value_objects::CollectionSpec;
use crate::infrastructure::{ConnectionCache, MappingRegistry};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// A physical collection ready for data operations.
#[derive(Clone)]
pub struct ResolvedCollection {
    /// Cached connection opened for `collection`
    pub connection: Arc<dyn StoreConnection>,
    /// Physical collection name
    pub collection: String,
}

impl std::fmt::Debug for ResolvedCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedCollection")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

/// Index resolver - routes entities to physical collections.
///
/// Shares one [`ConnectionCache`] and one [`MappingRegistry`] with every
/// other resolver built from the same instances. The active collection is
/// passed down each call and never written back into an entity, so one
/// entity may be resolved concurrently with different explicit names.
pub struct IndexResolver {
    connections: Arc<ConnectionCache>,
    mappings: Arc<MappingRegistry>,
    default_settings: Option<ClusterSettings>,
}

impl IndexResolver {
    /// Create a new resolver.
    ///
    /// `default_settings` is used by entities that carry no settings of
    /// their own, and its default collection is where unaliased entities
    /// live.
    pub fn new(
        connections: Arc<ConnectionCache>,
        mappings: Arc<MappingRegistry>,
        default_settings: Option<ClusterSettings>,
    ) -> Self {
        Self {
            connections,
            mappings,
            default_settings,
        }
    }

    pub fn default_settings(&self) -> Option<&ClusterSettings> {
        self.default_settings.as_ref()
    }

    pub fn mappings(&self) -> &MappingRegistry {
        &self.mappings
    }

    pub fn connections(&self) -> &ConnectionCache {
        &self.connections
    }

    /// Resolve the collection for `entity` now.
    ///
    /// An empty `explicit` selects the program-managed collection of the
    /// current partition. See [`IndexResolver::resolve_at`].
    pub async fn resolve(&self, entity: &EntityConfig, explicit: &str) -> Result<ResolvedCollection, RouterError> {
        self.resolve_at(entity, explicit, Utc::now()).await
    }

    /// Resolve the collection for `entity` as of `at`.
    ///
    /// # Arguments
    /// * `entity` - Entity configuration
    /// * `explicit` - Collection name overriding the partition policy, or empty
    /// * `at` - Point in time used to pick the partition
    ///
    /// # Errors
    /// * [`RouterError::Configuration`] when no cluster address or collection name is known
    /// * [`RouterError::NotFound`] when `explicit` names a missing collection
    /// * [`RouterError::Store`] when the store client fails
    pub async fn resolve_at(
        &self,
        entity: &EntityConfig,
        explicit: &str,
        at: DateTime<Utc>,
    ) -> Result<ResolvedCollection, RouterError> {
        let settings = entity.captured_settings(self.default_settings.as_ref())?;
        let current = entity.collection_at(at, self.default_collection(settings));
        if current.is_empty() {
            return Err(RouterError::Configuration(format!(
                "entity {}: no alias and no default collection",
                entity.name()
            )));
        }

        let explicit = explicit.trim();
        if !explicit.is_empty() && explicit != current {
            self.resolve_explicit(entity, settings, explicit).await
        } else {
            self.resolve_managed(entity, settings, current).await
        }
    }

    /// Collection used by entities without an alias.
    fn default_collection<'a>(&'a self, captured: &'a ClusterSettings) -> &'a str {
        self.default_settings
            .as_ref()
            .map(|s| s.default_collection.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(captured.default_collection.as_str())
    }

    /// Caller-named collection: must already exist, never created.
    async fn resolve_explicit(
        &self,
        entity: &EntityConfig,
        settings: &ClusterSettings,
        collection: &str,
    ) -> Result<ResolvedCollection, RouterError> {
        let connection = self
            .connections
            .get_or_create(&settings.with_collection(collection))
            .await?;

        if !self.mappings.is_applied(collection) {
            if !connection.exists(collection).await? {
                tracing::warn!(
                    "entity {}: explicit collection {} does not exist",
                    entity.name(),
                    collection
                );
                return Err(RouterError::NotFound {
                    collection: collection.to_string(),
                });
            }
            self.apply_mapping(entity, connection.as_ref(), collection).await?;
        }

        Ok(ResolvedCollection {
            connection,
            collection: collection.to_string(),
        })
    }

    /// Program-managed collection: created with its alias on first use.
    async fn resolve_managed(
        &self,
        entity: &EntityConfig,
        settings: &ClusterSettings,
        collection: String,
    ) -> Result<ResolvedCollection, RouterError> {
        let connection = self
            .connections
            .get_or_create(&settings.with_collection(&collection))
            .await?;

        if !self.mappings.is_applied(&collection) {
            if !connection.exists(&collection).await? {
                self.create_collection(entity, connection.as_ref(), &collection)
                    .await?;
            }
            self.apply_mapping(entity, connection.as_ref(), &collection).await?;
        }

        Ok(ResolvedCollection {
            connection,
            collection,
        })
    }

    async fn create_collection(
        &self,
        entity: &EntityConfig,
        connection: &dyn StoreConnection,
        collection: &str,
    ) -> Result<(), RouterError> {
        let alias = entity.alias_name();
        let alias = (!alias.is_empty() && alias != collection).then(|| alias.to_string());
        let spec = CollectionSpec::new(entity.shards(), alias);

        if let Err(e) = connection.create(collection, &spec).await {
            // Another caller may have created it since our existence check.
            if !connection.exists(collection).await? {
                return Err(e.into());
            }
            tracing::debug!(
                "entity {}: collection {} created concurrently: {}",
                entity.name(),
                collection,
                e
            );
            return Ok(());
        }

        tracing::info!(
            "entity {}: created collection {} (shards={}, alias={:?})",
            entity.name(),
            collection,
            spec.shards,
            spec.alias
        );
        Ok(())
    }

    async fn apply_mapping(
        &self,
        entity: &EntityConfig,
        connection: &dyn StoreConnection,
        collection: &str,
    ) -> Result<(), RouterError> {
        let mapping = entity.mapping();
        self.mappings
            .ensure_applied(collection, move || mapping.apply(connection, collection))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::memory_store::MemoryStore;
    use crate::domain::errors::StoreError;
    use crate::domain::ports::{EntityMapping, JsonMapping};
    use crate::domain::value_objects::PartitionMode;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_test::traced_test;

    // ===== Helpers =====

    #[derive(Default)]
    struct CountingMapping {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl EntityMapping for CountingMapping {
        async fn apply(&self, _connection: &dyn StoreConnection, _collection: &str) -> Result<(), StoreError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(())
        }
    }

    fn resolver(store: &MemoryStore) -> IndexResolver {
        IndexResolver::new(
            Arc::new(ConnectionCache::new(Arc::new(store.clone()))),
            Arc::new(MappingRegistry::new()),
            Some(ClusterSettings::new("http://es:9200", "default")),
        )
    }

    fn nov_2023() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 11, 2, 8, 0, 0).unwrap()
    }

    fn orders(mapping: Arc<dyn EntityMapping>) -> EntityConfig {
        EntityConfig::new("orders", mapping)
            .alias("orders")
            .partition_mode(PartitionMode::Monthly)
            .shard_count(3)
    }

    // ===== Program-managed Path =====

    #[tokio::test]
    async fn test_monthly_entity_creates_partition_with_alias() {
        let store = MemoryStore::new();
        let resolver = resolver(&store);
        let mapping = Arc::new(CountingMapping::default());
        let entity = orders(mapping.clone());

        let resolved = resolver.resolve_at(&entity, "", nov_2023()).await.unwrap();

        assert_eq!(resolved.collection, "orders_202311");
        let creates = store.state.creates.lock().unwrap().clone();
        assert_eq!(
            creates,
            vec![(
                "orders_202311".to_string(),
                CollectionSpec {
                    shards: 3,
                    replicas: 0,
                    alias: Some("orders".to_string())
                }
            )]
        );
        assert_eq!(mapping.runs.load(Ordering::SeqCst), 1);
        assert!(resolver.mappings().is_applied("orders_202311"));
    }

    #[tokio::test]
    async fn test_second_resolution_reuses_everything() {
        let store = MemoryStore::new();
        let resolver = resolver(&store);
        let mapping = Arc::new(CountingMapping::default());
        let entity = orders(mapping.clone());

        let first = resolver.resolve_at(&entity, "", nov_2023()).await.unwrap();
        let later = Utc.with_ymd_and_hms(2023, 11, 28, 23, 0, 0).unwrap();
        let second = resolver.resolve_at(&entity, "", later).await.unwrap();

        assert!(Arc::ptr_eq(&first.connection, &second.connection));
        assert_eq!(store.state.create_count(), 1);
        assert_eq!(store.state.exists_calls.load(Ordering::SeqCst), 1);
        assert_eq!(mapping.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_new_month_creates_new_partition() {
        let store = MemoryStore::new();
        let resolver = resolver(&store);
        let mapping = Arc::new(CountingMapping::default());
        let entity = orders(mapping.clone());

        resolver.resolve_at(&entity, "", nov_2023()).await.unwrap();
        let december = Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap();
        let resolved = resolver.resolve_at(&entity, "", december).await.unwrap();

        assert_eq!(resolved.collection, "orders_202312");
        assert_eq!(store.state.create_count(), 2);
        assert_eq!(mapping.runs.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.connections().connection_count(), 2);
    }

    #[tokio::test]
    async fn test_existing_collection_is_mapped_not_created() {
        let store = MemoryStore::new().with_collection("orders_202311");
        let resolver = resolver(&store);
        let mapping = Arc::new(CountingMapping::default());
        let entity = orders(mapping.clone());

        resolver.resolve_at(&entity, "", nov_2023()).await.unwrap();

        assert_eq!(store.state.create_count(), 0);
        assert_eq!(mapping.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_alias_equal_to_collection_is_omitted() {
        let store = MemoryStore::new();
        let resolver = resolver(&store);
        let entity = EntityConfig::new("events", Arc::new(JsonMapping::default())).alias("events");

        let resolved = resolver.resolve_at(&entity, "", nov_2023()).await.unwrap();

        assert_eq!(resolved.collection, "events");
        assert_eq!(entity.mode(), PartitionMode::NewAlias);
        let creates = store.state.creates.lock().unwrap().clone();
        assert_eq!(creates[0].1.alias, None);
    }

    #[tokio::test]
    async fn test_unaliased_entity_uses_default_collection() {
        let store = MemoryStore::new();
        let resolver = resolver(&store);
        let entity = EntityConfig::new("misc", Arc::new(JsonMapping::default()))
            .partition_mode(PartitionMode::Daily);

        let resolved = resolver.resolve_at(&entity, "", nov_2023()).await.unwrap();

        assert_eq!(resolved.collection, "default");
        assert_eq!(entity.mode(), PartitionMode::None);
        let creates = store.state.creates.lock().unwrap().clone();
        assert_eq!(creates[0].1.alias, None);
    }

    #[tokio::test]
    async fn test_explicit_equal_to_current_takes_managed_path() {
        let store = MemoryStore::new();
        let resolver = resolver(&store);
        let entity = orders(Arc::new(JsonMapping::default()));

        let resolved = resolver
            .resolve_at(&entity, "orders_202311", nov_2023())
            .await
            .unwrap();

        assert_eq!(resolved.collection, "orders_202311");
        assert_eq!(store.state.create_count(), 1);
    }

    // ===== Explicit Path =====

    #[tokio::test]
    async fn test_explicit_missing_collection_is_not_found() {
        let store = MemoryStore::new();
        let resolver = resolver(&store);
        let mapping = Arc::new(CountingMapping::default());
        let entity = orders(mapping.clone());

        let result = resolver
            .resolve_at(&entity, "missing-collection", nov_2023())
            .await;

        assert_eq!(
            result.unwrap_err(),
            RouterError::NotFound {
                collection: "missing-collection".to_string()
            }
        );
        assert_eq!(store.state.create_count(), 0);
        assert_eq!(mapping.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_explicit_existing_collection_is_mapped_once() {
        let store = MemoryStore::new().with_collection("orders_202001");
        let resolver = resolver(&store);
        let mapping = Arc::new(CountingMapping::default());
        let entity = orders(mapping.clone());

        let first = resolver
            .resolve_at(&entity, "orders_202001", nov_2023())
            .await
            .unwrap();
        let second = resolver
            .resolve_at(&entity, " orders_202001 ", nov_2023())
            .await
            .unwrap();

        assert_eq!(first.collection, "orders_202001");
        assert!(Arc::ptr_eq(&first.connection, &second.connection));
        assert_eq!(mapping.runs.load(Ordering::SeqCst), 1);
        assert_eq!(store.state.exists_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.state.create_count(), 0);
    }

    #[tokio::test]
    async fn test_explicit_does_not_disturb_managed_resolution() {
        let store = MemoryStore::new().with_collection("orders_202001");
        let resolver = resolver(&store);
        let entity = orders(Arc::new(JsonMapping::default()));

        resolver
            .resolve_at(&entity, "orders_202001", nov_2023())
            .await
            .unwrap();
        let managed = resolver.resolve_at(&entity, "", nov_2023()).await.unwrap();

        assert_eq!(managed.collection, "orders_202311");
    }

    // ===== Failure Paths =====

    #[tokio::test]
    async fn test_missing_address_is_configuration_error() {
        let store = MemoryStore::new();
        let resolver = IndexResolver::new(
            Arc::new(ConnectionCache::new(Arc::new(store.clone()))),
            Arc::new(MappingRegistry::new()),
            None,
        );
        let entity = orders(Arc::new(JsonMapping::default()));

        let result = resolver.resolve_at(&entity, "", nov_2023()).await;
        assert!(matches!(result, Err(RouterError::Configuration(_))));
        assert_eq!(store.state.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_entity_settings_used_without_default() {
        let store = MemoryStore::new();
        let resolver = IndexResolver::new(
            Arc::new(ConnectionCache::new(Arc::new(store.clone()))),
            Arc::new(MappingRegistry::new()),
            None,
        );
        let entity = orders(Arc::new(JsonMapping::default()))
            .settings(ClusterSettings::new("http://own:9200", "own"));

        resolver.resolve_at(&entity, "", nov_2023()).await.unwrap();
        assert!(resolver.connections().contains("http://own:9200", "orders_202311"));
    }

    #[tokio::test]
    async fn test_unaliased_entity_without_collection_name_fails() {
        let store = MemoryStore::new();
        let resolver = IndexResolver::new(
            Arc::new(ConnectionCache::new(Arc::new(store.clone()))),
            Arc::new(MappingRegistry::new()),
            Some(ClusterSettings::new("http://es:9200", "")),
        );
        let entity = EntityConfig::new("misc", Arc::new(JsonMapping::default()));

        let result = resolver.resolve_at(&entity, "", nov_2023()).await;
        assert!(matches!(result, Err(RouterError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_connectivity_error_propagates() {
        let store = MemoryStore::new();
        store.state.unreachable.store(true, Ordering::SeqCst);
        let resolver = resolver(&store);
        let entity = orders(Arc::new(JsonMapping::default()));

        let result = resolver.resolve_at(&entity, "", nov_2023()).await;
        assert!(matches!(
            result,
            Err(RouterError::Store(StoreError::Connect { .. }))
        ));
    }

    // ===== Concurrency =====

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_resolution_creates_and_maps_once() {
        let store = MemoryStore::new();
        let resolver = Arc::new(resolver(&store));
        let mapping = Arc::new(CountingMapping::default());
        let entity = Arc::new(orders(mapping.clone()));

        let tasks = (0..16).map(|_| {
            let resolver = resolver.clone();
            let entity = entity.clone();
            tokio::spawn(async move { resolver.resolve_at(&entity, "", nov_2023()).await })
        });

        for result in join_all(tasks).await {
            assert_eq!(result.unwrap().unwrap().collection, "orders_202311");
        }
        assert_eq!(store.state.create_count(), 1);
        assert_eq!(mapping.runs.load(Ordering::SeqCst), 1);
    }

    // ===== Logging =====

    #[tokio::test]
    #[traced_test]
    async fn test_creation_is_logged() {
        let store = MemoryStore::new();
        let resolver = resolver(&store);
        let entity = orders(Arc::new(JsonMapping::default()));

        resolver.resolve_at(&entity, "", nov_2023()).await.unwrap();

        assert!(logs_contain("created collection orders_202311"));
        assert!(logs_contain("mapping applied to collection orders_202311"));
    }
}
