//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use serde::{Deserialize, Serialize};

/// Partitioning policy for the physical collections of one entity.
///
/// Decides how often a new physical collection is created behind the
/// entity's alias. `None` means the entity has no alias and lives in the
/// process-wide default collection; `NewAlias` is the transitional state of
/// an aliased entity that is not time-partitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PartitionMode {
    /// No alias: use the default collection
    #[default]
    None,
    /// Single collection named after the alias
    NewAlias,
    /// One collection per hour (`alias_YYYYMMDDHH`)
    Hourly,
    /// One collection per day (`alias_YYYYMMDD`)
    Daily,
    /// One collection per month (`alias_YYYYMM`)
    Monthly,
    /// One collection per year (`alias_YYYY`)
    Yearly,
}

impl PartitionMode {
    /// Parse a partition mode from its configuration name.
    ///
    /// Returns `None` for names that do not denote a mode.
    ///
    /// # Examples
    /// ```
    /// use index_router::PartitionMode;
    ///
    /// assert_eq!(PartitionMode::parse("daily"), Some(PartitionMode::Daily));
    /// assert_eq!(PartitionMode::parse("weekly"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" | "default" => Some(Self::None),
            "new" | "newalias" | "new_alias" => Some(Self::NewAlias),
            "hour" | "hourly" => Some(Self::Hourly),
            "day" | "daily" => Some(Self::Daily),
            "month" | "monthly" => Some(Self::Monthly),
            "year" | "yearly" => Some(Self::Yearly),
            _ => None,
        }
    }

    /// Convert to configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::NewAlias => "new",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// `chrono` format of the partition suffix, if the mode is time-based.
    pub fn suffix_format(&self) -> Option<&'static str> {
        match self {
            Self::Hourly => Some("%Y%m%d%H"),
            Self::Daily => Some("%Y%m%d"),
            Self::Monthly => Some("%Y%m"),
            Self::Yearly => Some("%Y"),
            Self::None | Self::NewAlias => None,
        }
    }
}

impl std::fmt::Display for PartitionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settings a new physical collection is created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    /// Number of primary shards
    pub shards: u32,
    /// Number of replicas
    pub replicas: u32,
    /// Alias pointing at the new collection, if any
    pub alias: Option<String>,
}

impl CollectionSpec {
    /// Program-managed collections are always created without replicas.
    pub fn new(shards: u32, alias: Option<String>) -> Self {
        Self {
            shards,
            replicas: 0,
            alias,
        }
    }
}
