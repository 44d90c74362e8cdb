use crate::domain::entities::{ClusterSettings, DEFAULT_CONNECTION_LIMIT, DEFAULT_SHARD_COUNT};
use crate::domain::value_objects::PartitionMode;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // Process-wide cluster settings
    pub default_settings: Option<ClusterSettings>,

    // Entity provisioned by the binary
    pub alias: String,
    pub partition_mode: PartitionMode,
    pub shard_count: u32,

    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_settings: None,
            alias: String::new(),
            partition_mode: PartitionMode::None,
            shard_count: DEFAULT_SHARD_COUNT,
            debug: false,
        }
    }
}

pub fn load_config() -> anyhow::Result<Config> {
    let default_settings = std::env::var("INDEX_ROUTER_ADDRESS")
        .ok()
        .filter(|a| !a.trim().is_empty())
        .map(|address| {
            let default_index = std::env::var("INDEX_ROUTER_DEFAULT_INDEX")
                .unwrap_or_else(|_| "default".to_string());

            let connection_limit = std::env::var("INDEX_ROUTER_CONNECTION_LIMIT")
                .unwrap_or_else(|_| DEFAULT_CONNECTION_LIMIT.to_string())
                .parse()
                .unwrap_or(DEFAULT_CONNECTION_LIMIT);

            let mut settings =
                ClusterSettings::new(address, default_index).connection_limit(connection_limit);

            // Credentials only apply when a username is set
            if let Ok(username) = std::env::var("INDEX_ROUTER_USERNAME") {
                let password = std::env::var("INDEX_ROUTER_PASSWORD").unwrap_or_default();
                settings = settings.credentials(username, password);
            }

            if let Ok(proxy) = std::env::var("INDEX_ROUTER_PROXY") {
                settings = settings.proxy(proxy);
            }

            settings
        });

    let alias = std::env::var("INDEX_ROUTER_ALIAS").unwrap_or_default();

    let partition = std::env::var("INDEX_ROUTER_PARTITION").unwrap_or_default();
    let partition_mode = PartitionMode::parse(&partition)
        .ok_or_else(|| anyhow::anyhow!("unknown partition mode: {}", partition))?;

    let shard_count = std::env::var("INDEX_ROUTER_SHARDS")
        .unwrap_or_else(|_| DEFAULT_SHARD_COUNT.to_string())
        .parse()
        .unwrap_or(DEFAULT_SHARD_COUNT);

    let debug = std::env::var("DEBUG").is_ok();

    Ok(Config {
        default_settings,
        alias,
        partition_mode,
        shard_count,
        debug,
    })
}
