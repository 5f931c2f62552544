//! # Configuration
//!
//! Settings are layered, lowest priority first:
//! 1. Built-in defaults
//! 2. A TOML file (`--config PATH`, or `./facetgraph.toml` if present)
//! 3. `FACETGRAPH_*` environment variables
//! 4. CLI flags (applied by the `cli` module)
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! rate_limit = 100
//!
//! [storage]
//! backend = "redb"
//! path = "facetgraph.redb"
//!
//! [policy]
//! unique_entity_names = true
//! ```

use facetgraph_core::{GraphError, GraphPolicy, Session};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "facetgraph.toml";

/// Default request body limit (2 MB).
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// SECTIONS
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub policy: GraphPolicy,
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Requests per second across all clients; 0 disables the limiter.
    pub rate_limit: u32,
    /// Allowed CORS origins. Empty means localhost only; `["*"]` allows all.
    pub cors_origins: Vec<String>,
    /// Maximum request body size in bytes.
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            rate_limit: 100,
            cors_origins: Vec::new(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl ServerConfig {
    /// `host:port` for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Which `GraphBackend` the session runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Volatile, in-process tables.
    Memory,
    /// ACID redb database at `storage.path`.
    Redb,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redb" => Ok(Self::Redb),
            other => Err(ConfigError::Invalid(format!(
                "unknown storage backend '{}' (expected \"memory\" or \"redb\")",
                other
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Redb => f.write_str("redb"),
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Redb,
            path: PathBuf::from("facetgraph.redb"),
        }
    }
}

// =============================================================================
// LOADING
// =============================================================================

impl AppConfig {
    /// Load from `path`, or from `./facetgraph.toml` if it exists, or from
    /// defaults; then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a specific TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "loaded config file");
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `FACETGRAPH_*` overrides read through `lookup`.
    ///
    /// A variable that is set but does not parse is an error rather than
    /// being ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("FACETGRAPH_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("FACETGRAPH_PORT") {
            self.server.port = parse_var("FACETGRAPH_PORT", &port)?;
        }
        if let Some(limit) = lookup("FACETGRAPH_RATE_LIMIT") {
            self.server.rate_limit = parse_var("FACETGRAPH_RATE_LIMIT", &limit)?;
        }
        if let Some(origins) = lookup("FACETGRAPH_CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(backend) = lookup("FACETGRAPH_BACKEND") {
            self.storage.backend = backend.parse()?;
        }
        if let Some(path) = lookup("FACETGRAPH_DB_PATH") {
            self.storage.path = PathBuf::from(path);
        }
        if let Some(flag) = lookup("FACETGRAPH_UNIQUE_ENTITY_NAMES") {
            self.policy.unique_entity_names = parse_var("FACETGRAPH_UNIQUE_ENTITY_NAMES", &flag)?;
        }
        if let Some(flag) = lookup("FACETGRAPH_UNIQUE_RELATION_NAMES") {
            self.policy.unique_relation_names =
                parse_var("FACETGRAPH_UNIQUE_RELATION_NAMES", &flag)?;
        }
        if let Some(flag) = lookup("FACETGRAPH_UNIQUE_FACET_TYPES") {
            self.policy.unique_facet_types = parse_var("FACETGRAPH_UNIQUE_FACET_TYPES", &flag)?;
        }
        Ok(())
    }

    /// Reject settings that cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must not be 0".to_string()));
        }
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server.host must not be empty".to_string()));
        }
        if self.server.body_limit == 0 {
            return Err(ConfigError::Invalid(
                "server.body_limit must not be 0".to_string(),
            ));
        }
        if self.storage.backend == BackendKind::Redb && self.storage.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "storage.path is required for the redb backend".to_string(),
            ));
        }
        Ok(())
    }

    /// Open a session on the configured backend with the configured policy.
    pub fn open_session(&self) -> Result<Session, GraphError> {
        let session = match self.storage.backend {
            BackendKind::Memory => Session::new(),
            BackendKind::Redb => Session::with_redb(&self.storage.path)?,
        };
        Ok(session.with_policy(self.policy))
    }
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} has an invalid value: '{}'", key, raw)))
}

// =============================================================================
// TESTS
// =============================================================================
