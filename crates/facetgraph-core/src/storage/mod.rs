//! # Persistent Storage
//!
//! Disk-backed implementations of `GraphBackend`.

mod redb_graph;

pub use redb_graph::{RedbGraph, STORAGE_FORMAT_VERSION};
