//! Application Layer
//!
//! Use cases built on the domain and infrastructure layers.

mod entity_repository;
mod index_resolver;

pub use entity_repository::{Document, EntityRepository, SearchPage};
pub use index_resolver::{IndexResolver, ResolvedCollection};
