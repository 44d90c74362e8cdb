//! Entity Mapping Port
//!
//! The per-entity schema routine applied once to each physical collection.

use crate::domain::errors::StoreError;
use crate::domain::ports::StoreConnection;
use async_trait::async_trait;
use serde_json::Value;

/// Schema routine of one logical entity.
///
/// Implementations are assumed expensive and not idempotent; the mapping
/// registry guarantees `apply` runs at most once per physical collection.
#[async_trait]
pub trait EntityMapping: Send + Sync {
    /// Define the field structure of `collection`.
    async fn apply(&self, connection: &dyn StoreConnection, collection: &str) -> Result<(), StoreError>;
}

/// Mapping given as a JSON document, sent through [`StoreConnection::put_mapping`].
///
/// An empty object means the entity relies on dynamic mapping and nothing
/// is sent.
#[derive(Debug, Clone, Default)]
pub struct JsonMapping(pub Value);

impl JsonMapping {
    pub fn new(mapping: Value) -> Self {
        Self(mapping)
    }

    fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }
}

#[async_trait]
impl EntityMapping for JsonMapping {
    async fn apply(&self, connection: &dyn StoreConnection, collection: &str) -> Result<(), StoreError> {
        if self.is_empty() {
            return Ok(());
        }
        connection.put_mapping(collection, &self.0).await
    }
}
