//! Entity Repository
//!
//! Typed CRUD and search over one logical entity. Every call resolves the
//! physical collection first, so data always lands in the partition that is
//! current at the time of the call (or in the explicitly named collection).

use crate::application::{IndexResolver, ResolvedCollection};
use crate::domain::entities::EntityConfig;
use crate::domain::errors::{RouterError, StoreError};
use crate::domain::ports::{BulkFailure, BulkOperation, SearchResponse};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;

/// A document stored for an entity.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    /// Document id, or `None` to let the store generate one.
    fn id(&self) -> Option<String>;
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage<T> {
    pub total: u64,
    pub hits: Vec<T>,
    pub scroll_id: Option<String>,
}

/// Data source for documents of type `T`.
///
/// The `index` argument of each method is an explicit collection name;
/// pass `""` for the program-managed collection.
pub struct EntityRepository<T> {
    resolver: Arc<IndexResolver>,
    entity: Arc<EntityConfig>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Document> EntityRepository<T> {
    pub fn new(resolver: Arc<IndexResolver>, entity: Arc<EntityConfig>) -> Self {
        Self {
            resolver,
            entity,
            _marker: PhantomData,
        }
    }

    pub fn entity(&self) -> &EntityConfig {
        &self.entity
    }

    async fn resolve(&self, index: &str) -> Result<ResolvedCollection, RouterError> {
        self.resolver.resolve(&self.entity, index).await
    }

    /// Index one document and return its id.
    pub async fn save(&self, doc: &T, refresh: bool, index: &str) -> Result<String, RouterError> {
        let target = self.resolve(index).await?;
        let body = encode(doc)?;
        let id = target
            .connection
            .index(&target.collection, doc.id().as_deref(), &body, refresh)
            .await?;
        Ok(id)
    }

    /// Index many documents in one bulk request.
    ///
    /// Returns the items the store rejected.
    pub async fn save_many(&self, docs: &[T], refresh: bool, index: &str) -> Result<Vec<BulkFailure>, RouterError> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }
        let target = self.resolve(index).await?;
        let operations = docs
            .iter()
            .map(|doc| {
                Ok(BulkOperation::Index {
                    id: doc.id(),
                    document: encode(doc)?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let failures = target
            .connection
            .bulk(&target.collection, &operations, refresh)
            .await?;
        if !failures.is_empty() {
            tracing::warn!(
                "entity {}: {} of {} documents rejected by {}",
                self.entity.name(),
                failures.len(),
                docs.len(),
                target.collection
            );
        }
        Ok(failures)
    }

    /// Overwrite selected fields of a document.
    pub async fn increment_modify(
        &self,
        id: &str,
        fields: Map<String, Value>,
        refresh: bool,
        index: &str,
    ) -> Result<(), RouterError> {
        let target = self.resolve(index).await?;
        target
            .connection
            .update(&target.collection, id, &Value::Object(fields), refresh)
            .await?;
        Ok(())
    }

    /// Fetch one document.
    pub async fn get(&self, id: &str, index: &str) -> Result<Option<T>, RouterError> {
        let target = self.resolve(index).await?;
        match target.connection.get(&target.collection, id).await? {
            Some(source) => Ok(Some(decode(source)?)),
            None => Ok(None),
        }
    }

    /// Fetch several documents; ids that do not exist are skipped.
    pub async fn get_many(&self, ids: &[String], index: &str) -> Result<Vec<T>, RouterError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let target = self.resolve(index).await?;
        let sources = target.connection.multi_get(&target.collection, ids).await?;
        Ok(sources.into_iter().map(decode).collect::<Result<_, _>>()?)
    }

    /// Delete documents by id.
    pub async fn delete(&self, ids: &[String], refresh: bool, index: &str) -> Result<Vec<BulkFailure>, RouterError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let target = self.resolve(index).await?;
        let operations: Vec<_> = ids
            .iter()
            .map(|id| BulkOperation::Delete { id: id.clone() })
            .collect();
        Ok(target
            .connection
            .bulk(&target.collection, &operations, refresh)
            .await?)
    }

    /// Delete documents; those without an id are ignored.
    pub async fn delete_documents(&self, docs: &[T], refresh: bool, index: &str) -> Result<Vec<BulkFailure>, RouterError> {
        let ids: Vec<String> = docs.iter().filter_map(Document::id).collect();
        self.delete(&ids, refresh, index).await
    }

    /// Run a query. `scroll` is a keep-alive such as `"1m"` and opens a scroll.
    pub async fn search(&self, query: &Value, scroll: Option<&str>, index: &str) -> Result<SearchPage<T>, RouterError> {
        let target = self.resolve(index).await?;
        let response = target
            .connection
            .search(&target.collection, query, scroll)
            .await?;
        Ok(page(response)?)
    }

    /// Fetch the next page of a scroll opened by [`EntityRepository::search`].
    pub async fn scroll(&self, scroll_id: &str, keep_alive: &str, index: &str) -> Result<SearchPage<T>, RouterError> {
        let target = self.resolve(index).await?;
        let response = target.connection.scroll(scroll_id, keep_alive).await?;
        Ok(page(response)?)
    }

    /// Release open scrolls.
    pub async fn clear_scroll(&self, scroll_ids: &[String], index: &str) -> Result<(), RouterError> {
        let target = self.resolve(index).await?;
        target.connection.clear_scroll(scroll_ids).await?;
        Ok(())
    }
}

fn encode<T: Serialize>(doc: &T) -> Result<Value, StoreError> {
    serde_json::to_value(doc).map_err(|e| StoreError::Request(format!("cannot encode document: {}", e)))
}

fn decode<T: DeserializeOwned>(source: Value) -> Result<T, StoreError> {
    serde_json::from_value(source).map_err(|e| StoreError::Decode(e.to_string()))
}

fn page<T: DeserializeOwned>(response: SearchResponse) -> Result<SearchPage<T>, StoreError> {
    Ok(SearchPage {
        total: response.total,
        hits: response.hits.into_iter().map(decode).collect::<Result<_, _>>()?,
        scroll_id: response.scroll_id,
    })
}
