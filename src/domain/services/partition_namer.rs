//! Partition Namer Service
//!
//! Pure domain logic mapping (alias, partition mode, timestamp) to the name
//! of a physical collection. No I/O, no shared state.

use crate::domain::value_objects::PartitionMode;
use chrono::{DateTime, Utc};

/// Naming policy for time-partitioned collections.
pub struct PartitionNamer;

impl PartitionNamer {
    /// Normalize a partition mode against the alias it is used with.
    ///
    /// Without an alias partitioning is disabled and the mode is `None`. An
    /// aliased entity still in `None` moves to `NewAlias`. Every other
    /// combination is returned unchanged, so applying this twice is the same
    /// as applying it once.
    pub fn effective_mode(alias: &str, mode: PartitionMode) -> PartitionMode {
        if alias.is_empty() {
            PartitionMode::None
        } else if mode == PartitionMode::None {
            PartitionMode::NewAlias
        } else {
            mode
        }
    }

    /// Name of the physical collection for `at`.
    ///
    /// # Arguments
    /// * `alias` - Stable logical name of the entity (empty disables partitioning)
    /// * `mode` - Partition mode, normalized with [`PartitionNamer::effective_mode`]
    /// * `at` - Point in time the collection must cover
    /// * `default_name` - Collection used when the entity has no alias
    ///
    /// # Example
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use index_router::{PartitionMode, PartitionNamer};
    ///
    /// let at = Utc.with_ymd_and_hms(2024, 3, 5, 13, 0, 0).unwrap();
    /// let name = PartitionNamer::collection_name("logs", PartitionMode::Daily, at, "default");
    /// assert_eq!(name, "logs_20240305");
    /// ```
    pub fn collection_name(alias: &str, mode: PartitionMode, at: DateTime<Utc>, default_name: &str) -> String {
        match Self::effective_mode(alias, mode) {
            PartitionMode::None => default_name.to_string(),
            PartitionMode::NewAlias => alias.to_string(),
            timed => match timed.suffix_format() {
                Some(format) => format!("{}_{}", alias, at.format(format)),
                None => default_name.to_string(),
            },
        }
    }
}
