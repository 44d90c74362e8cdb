//! Store Connection Port
//!
//! Defines the operations the router and the data sources issue against a
//! document store. The wire protocol and query DSL stay behind this trait.

use crate::domain::errors::StoreError;
use crate::domain::value_objects::CollectionSpec;
use async_trait::async_trait;
use serde_json::Value;

/// One action of a bulk request.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOperation {
    /// Index a document, generating an id when `id` is `None`
    Index { id: Option<String>, document: Value },
    /// Delete a document by id
    Delete { id: String },
}

/// Bulk item the store rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkFailure {
    pub id: Option<String>,
    pub status: u16,
    pub reason: String,
}

/// Decoded search or scroll response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    /// Total number of matching documents
    pub total: u64,
    /// `_source` of each returned hit
    pub hits: Vec<Value>,
    /// Cursor for the next page, when a scroll was requested
    pub scroll_id: Option<String>,
}

/// Live connection to a document-store cluster.
///
/// Handles are cached per (address, collection) by the connection cache and
/// shared between callers, so implementations must be usable concurrently.
#[async_trait]
pub trait StoreConnection: Send + Sync {
    /// Check whether a collection (or alias) exists.
    async fn exists(&self, collection: &str) -> Result<bool, StoreError>;

    /// Create a collection. Fails if it already exists.
    async fn create(&self, collection: &str, spec: &CollectionSpec) -> Result<(), StoreError>;

    /// Apply a field mapping to a collection.
    async fn put_mapping(&self, collection: &str, mapping: &Value) -> Result<(), StoreError>;

    /// Index one document and return its id.
    async fn index(
        &self,
        collection: &str,
        id: Option<&str>,
        document: &Value,
        refresh: bool,
    ) -> Result<String, StoreError>;

    /// Run several index/delete actions in one request.
    ///
    /// Item-level rejections are returned, request-level failures are errors.
    async fn bulk(
        &self,
        collection: &str,
        operations: &[BulkOperation],
        refresh: bool,
    ) -> Result<Vec<BulkFailure>, StoreError>;

    /// Merge `fields` into an existing document.
    async fn update(&self, collection: &str, id: &str, fields: &Value, refresh: bool) -> Result<(), StoreError>;

    /// Fetch the source of one document.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Fetch the sources of several documents; missing ids are skipped.
    async fn multi_get(&self, collection: &str, ids: &[String]) -> Result<Vec<Value>, StoreError>;

    /// Run a query. `scroll` opens a scroll with the given keep-alive.
    async fn search(&self, collection: &str, query: &Value, scroll: Option<&str>) -> Result<SearchResponse, StoreError>;

    /// Fetch the next page of an open scroll.
    async fn scroll(&self, scroll_id: &str, keep_alive: &str) -> Result<SearchResponse, StoreError>;

    /// Release open scrolls.
    async fn clear_scroll(&self, scroll_ids: &[String]) -> Result<(), StoreError>;
}
