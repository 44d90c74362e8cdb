//! index-router Library
//!
//! Routes logical entities to time-partitioned physical collections of a
//! document store, caching connections and applying each collection's
//! mapping exactly once.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use adapters::outbound::{HttpStoreConnection, HttpStoreConnector};
pub use application::{Document, EntityRepository, IndexResolver, ResolvedCollection, SearchPage};
pub use config::load_config;
pub use domain::entities::{ClusterSettings, Credentials, EntityConfig};
pub use domain::errors::{RouterError, StoreError};
pub use domain::ports::{EntityMapping, JsonMapping, StoreConnection, StoreConnector};
pub use domain::services::PartitionNamer;
pub use domain::value_objects::{CollectionSpec, PartitionMode};
pub use infrastructure::{ConnectionCache, MappingRegistry};
