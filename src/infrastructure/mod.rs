//! Infrastructure Layer
//!
//! Process-lifetime caches shared by every resolver.

pub mod connection_cache;
pub mod mapping_registry;

pub use connection_cache::ConnectionCache;
pub use mapping_registry::MappingRegistry;
