//! Mapping Registry
//!
//! Records which physical collections already had their schema applied and
//! makes sure the schema routine runs at most once per collection.

use crate::domain::errors::StoreError;
use dashmap::DashSet;
use std::future::Future;
use tokio::sync::Mutex;

/// Process-lifetime set of mapped collections.
///
/// Membership is checked without locking. Applying a mapping takes one
/// registry-wide lock, re-checks membership, runs the routine and records
/// the collection before releasing the lock, so no caller sees a collection
/// as mapped before its routine has finished.
pub struct MappingRegistry {
    applied: DashSet<String>,
    apply_lock: Mutex<()>,
}

impl MappingRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            applied: DashSet::new(),
            apply_lock: Mutex::new(()),
        }
    }

    /// Whether `collection` has been mapped.
    pub fn is_applied(&self, collection: &str) -> bool {
        self.applied.contains(collection)
    }

    /// Run `apply` for `collection` unless it already ran.
    ///
    /// Returns `true` when this call ran the routine. A failed routine is
    /// not recorded; its error is returned and a later call may retry.
    pub async fn ensure_applied<F, Fut>(&self, collection: &str, apply: F) -> Result<bool, StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), StoreError>>,
    {
        if self.is_applied(collection) {
            return Ok(false);
        }

        let _guard = self.apply_lock.lock().await;
        if self.is_applied(collection) {
            return Ok(false);
        }

        apply().await?;
        self.applied.insert(collection.to_string());
        tracing::info!("mapping applied to collection {}", collection);
        Ok(true)
    }

    /// Number of mapped collections.
    pub fn len(&self) -> usize {
        self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}

impl Default for MappingRegistry {
    fn default() -> Self {
        Self::new()
    }
}
