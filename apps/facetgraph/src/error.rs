//! Application-level errors for the CLI and server entry points.

use crate::config::ConfigError;
use facetgraph_core::GraphError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Socket, file or serialization failure outside the engine.
    #[error("I/O error: {0}")]
    Io(String),

    /// `check` found problems in the stored graph.
    #[error("graph integrity check failed: {0} issue(s)")]
    Integrity(usize),
}
