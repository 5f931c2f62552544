//! # facetgraph CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `status` - Show record counts
//! - `export` - Write the graph snapshot as JSON
//! - `check` - Verify graph integrity
//! - `init` - Initialize a new database
//!
//! Global flags override the config file and `FACETGRAPH_*` variables.

mod commands;

use crate::config::{AppConfig, BackendKind};
use crate::error::AppError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// facetgraph - entities, reified relations and typed facets over an acyclic graph.
#[derive(Parser, Debug)]
#[command(name = "facetgraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML config file (default: ./facetgraph.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the graph database
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend: "memory" or "redb"
    #[arg(short = 'B', long, global = true)]
    pub backend: Option<BackendKind>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show record counts
    Status,

    /// Export the graph snapshot as JSON
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Verify referential integrity and acyclicity
    Check,

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Resolve the effective configuration: file, then environment, then flags.
    pub fn resolve_config(&self) -> Result<AppConfig, AppError> {
        let mut config = AppConfig::load(self.config.as_deref())?;

        if let Some(path) = &self.database {
            config.storage.path = path.clone();
        }
        if let Some(backend) = self.backend {
            config.storage.backend = backend;
        }
        if let Some(Commands::Server { host, port }) = &self.command {
            if let Some(host) = host {
                config.server.host = host.clone();
            }
            if let Some(port) = port {
                config.server.port = *port;
            }
        }

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), AppError> {
    let config = cli.resolve_config()?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { .. }) => cmd_server(&config).await,
        Some(Commands::Status) | None => cmd_status(&config, json_mode),
        Some(Commands::Export { output }) => cmd_export(&config, &output),
        Some(Commands::Check) => cmd_check(&config, json_mode),
        Some(Commands::Init { force }) => cmd_init(&config, force),
    }
}
