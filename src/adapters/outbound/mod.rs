mod http_store;
#[cfg(test)]
pub(crate) mod memory_store;

pub use http_store::{HttpStoreConnection, HttpStoreConnector};
