//! In-memory document store used by unit tests.
//!
//! Records every connect, create and mapping call so tests can assert how
//! often the router touched the store.

use crate::domain::entities::ClusterSettings;
use crate::domain::errors::StoreError;
use crate::domain::ports::{BulkFailure, BulkOperation, SearchResponse, StoreConnection, StoreConnector};
use crate::domain::value_objects::CollectionSpec;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub(crate) struct MemoryState {
    pub collections: Mutex<HashMap<String, CollectionSpec>>,
    pub documents: Mutex<HashMap<String, BTreeMap<String, Value>>>,
    pub creates: Mutex<Vec<(String, CollectionSpec)>>,
    pub mappings: Mutex<Vec<String>>,
    pub connects: AtomicUsize,
    pub exists_calls: AtomicUsize,
    pub unreachable: AtomicBool,
    next_id: AtomicUsize,
}

impl MemoryState {
    pub fn create_count(&self) -> usize {
        self.creates.lock().unwrap().len()
    }
}

#[derive(Default, Clone)]
pub(crate) struct MemoryStore {
    pub state: Arc<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-create a collection as if someone else had made it.
    pub fn with_collection(self, name: &str) -> Self {
        self.state
            .collections
            .lock()
            .unwrap()
            .insert(name.to_string(), CollectionSpec::new(1, None));
        self
    }
}

#[async_trait]
impl StoreConnector for MemoryStore {
    async fn connect(&self, settings: &ClusterSettings) -> Result<Arc<dyn StoreConnection>, StoreError> {
        if self.state.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Connect {
                address: settings.address.clone(),
                reason: "unreachable".to_string(),
            });
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        // Widen the window in which concurrent first accesses race.
        tokio::task::yield_now().await;
        Ok(Arc::new(MemoryConnection {
            state: self.state.clone(),
        }))
    }
}

pub(crate) struct MemoryConnection {
    state: Arc<MemoryState>,
}

impl MemoryConnection {
    fn resolve_target(&self, collection: &str) -> String {
        let collections = self.state.collections.lock().unwrap();
        if collections.contains_key(collection) {
            return collection.to_string();
        }
        collections
            .iter()
            .find(|(_, spec)| spec.alias.as_deref() == Some(collection))
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| collection.to_string())
    }
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    async fn exists(&self, collection: &str) -> Result<bool, StoreError> {
        self.state.exists_calls.fetch_add(1, Ordering::SeqCst);
        let collections = self.state.collections.lock().unwrap();
        Ok(collections.contains_key(collection)
            || collections
                .values()
                .any(|spec| spec.alias.as_deref() == Some(collection)))
    }

    async fn create(&self, collection: &str, spec: &CollectionSpec) -> Result<(), StoreError> {
        let mut collections = self.state.collections.lock().unwrap();
        if collections.contains_key(collection) {
            return Err(StoreError::Status {
                status: 400,
                body: format!("resource_already_exists_exception: {}", collection),
            });
        }
        collections.insert(collection.to_string(), spec.clone());
        self.state
            .creates
            .lock()
            .unwrap()
            .push((collection.to_string(), spec.clone()));
        Ok(())
    }

    async fn put_mapping(&self, collection: &str, _mapping: &Value) -> Result<(), StoreError> {
        self.state.mappings.lock().unwrap().push(collection.to_string());
        Ok(())
    }

    async fn index(&self, collection: &str, id: Option<&str>, document: &Value, _refresh: bool) -> Result<String, StoreError> {
        let id = match id {
            Some(id) => id.to_string(),
            None => format!("gen-{}", self.state.next_id.fetch_add(1, Ordering::SeqCst)),
        };
        let target = self.resolve_target(collection);
        self.state
            .documents
            .lock()
            .unwrap()
            .entry(target)
            .or_default()
            .insert(id.clone(), document.clone());
        Ok(id)
    }

    async fn bulk(&self, collection: &str, operations: &[BulkOperation], refresh: bool) -> Result<Vec<BulkFailure>, StoreError> {
        let mut failures = Vec::new();
        for op in operations {
            match op {
                BulkOperation::Index { id, document } => {
                    self.index(collection, id.as_deref(), document, refresh).await?;
                }
                BulkOperation::Delete { id } => {
                    let target = self.resolve_target(collection);
                    let removed = self
                        .state
                        .documents
                        .lock()
                        .unwrap()
                        .get_mut(&target)
                        .and_then(|docs| docs.remove(id));
                    if removed.is_none() {
                        failures.push(BulkFailure {
                            id: Some(id.clone()),
                            status: 404,
                            reason: "not_found".to_string(),
                        });
                    }
                }
            }
        }
        Ok(failures)
    }

    async fn update(&self, collection: &str, id: &str, fields: &Value, _refresh: bool) -> Result<(), StoreError> {
        let target = self.resolve_target(collection);
        let mut documents = self.state.documents.lock().unwrap();
        let doc = documents
            .get_mut(&target)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::Status {
                status: 404,
                body: format!("document {} missing", id),
            })?;
        if let (Value::Object(doc), Value::Object(fields)) = (doc, fields) {
            for (k, v) in fields {
                doc.insert(k.clone(), v.clone());
            }
        }
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let target = self.resolve_target(collection);
        Ok(self
            .state
            .documents
            .lock()
            .unwrap()
            .get(&target)
            .and_then(|docs| docs.get(id).cloned()))
    }

    async fn multi_get(&self, collection: &str, ids: &[String]) -> Result<Vec<Value>, StoreError> {
        let mut found = Vec::new();
        for id in ids {
            if let Some(doc) = self.get(collection, id).await? {
                found.push(doc);
            }
        }
        Ok(found)
    }

    async fn search(&self, collection: &str, _query: &Value, scroll: Option<&str>) -> Result<SearchResponse, StoreError> {
        let target = self.resolve_target(collection);
        let hits: Vec<Value> = self
            .state
            .documents
            .lock()
            .unwrap()
            .get(&target)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default();
        Ok(SearchResponse {
            total: hits.len() as u64,
            hits,
            scroll_id: scroll.map(|_| "scroll-1".to_string()),
        })
    }

    async fn scroll(&self, _scroll_id: &str, _keep_alive: &str) -> Result<SearchResponse, StoreError> {
        Ok(SearchResponse::default())
    }

    async fn clear_scroll(&self, _scroll_ids: &[String]) -> Result<(), StoreError> {
        Ok(())
    }
}
