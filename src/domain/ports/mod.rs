mod entity_mapping;
mod store_connection;
mod store_connector;

pub use entity_mapping::{EntityMapping, JsonMapping};
pub use store_connection::{BulkFailure, BulkOperation, SearchResponse, StoreConnection};
pub use store_connector::StoreConnector;
