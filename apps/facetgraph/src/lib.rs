//! # facetgraph
//!
//! REST server and CLI over the `facetgraph-core` engine.
//!
//! The library half exists so integration tests can build the router
//! without binding a socket.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;

pub use config::{AppConfig, BackendKind, ConfigError, ServerConfig, StorageConfig};
pub use error::AppError;
