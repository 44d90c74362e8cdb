//! index-router - Partition provisioning tool
//!
//! Composition root: resolves the current partition of one entity against
//! the configured cluster, creating the collection and its alias if needed.

use index_router::{
    load_config, ConnectionCache, EntityConfig, HttpStoreConnector, IndexResolver, JsonMapping,
    MappingRegistry,
};
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let settings = cfg
        .default_settings
        .clone()
        .ok_or_else(|| anyhow::anyhow!("INDEX_ROUTER_ADDRESS is required"))?;

    tracing::info!(
        "starting index-router cluster={} alias={:?} partition={}",
        settings.address,
        cfg.alias,
        cfg.partition_mode
    );

    // ===== COMPOSITION ROOT =====

    let connections = Arc::new(ConnectionCache::new(Arc::new(HttpStoreConnector::new())));
    let mappings = Arc::new(MappingRegistry::new());
    let resolver = IndexResolver::new(connections, mappings, Some(settings));

    let entity = EntityConfig::new(
        if cfg.alias.is_empty() { "default" } else { cfg.alias.as_str() },
        Arc::new(JsonMapping::default()),
    )
    .alias(cfg.alias.clone())
    .partition_mode(cfg.partition_mode)
    .shard_count(cfg.shard_count);

    let resolved = resolver.resolve(&entity, "").await?;
    tracing::info!("current collection: {}", resolved.collection);
    println!("{}", resolved.collection);

    Ok(())
}
