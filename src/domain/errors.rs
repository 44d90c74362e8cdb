//! Domain Errors
//!
//! Failures surfaced by index resolution and by the store ports.

/// Failures reported by a document-store client.
///
/// Connect, existence-check, create, mapping and document calls all fail
/// with this type; the router propagates it unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The cluster could not be reached
    #[error("cannot connect to {address}: {reason}")]
    Connect { address: String, reason: String },
    /// The request could not be sent or its response not read
    #[error("request failed: {0}")]
    Request(String),
    /// The store answered with an unexpected status
    #[error("store returned status {status}: {body}")]
    Status { status: u16, body: String },
    /// The response body was not what the caller expected
    #[error("cannot decode response: {0}")]
    Decode(String),
}

/// Failures of index resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    /// No cluster address or collection name can be determined
    #[error("configuration error: {0}")]
    Configuration(String),
    /// An explicitly named collection does not exist in the store
    #[error("collection {collection} does not exist")]
    NotFound { collection: String },
    /// The store client failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RouterError {
    /// Whether this error comes from the store client rather than the router.
    pub fn is_store(&self) -> bool {
        matches!(self, RouterError::Store(_))
    }
}
