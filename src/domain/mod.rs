//! Domain Layer
//!
//! Routing configuration, naming policy and the ports to the document store.

pub mod entities;
pub mod errors;
pub mod ports;
pub mod services;
pub mod value_objects;
