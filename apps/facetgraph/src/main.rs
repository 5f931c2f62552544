//! # facetgraph
//!
//! The binary for the facetgraph entity/relation/facet engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for inspecting, exporting and checking a graph
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │              apps/facetgraph (THE BINARY)        │
//! │                                                  │
//! │   ┌─────────────┐          ┌─────────────┐       │
//! │   │    CLI      │          │  HTTP API   │       │
//! │   │   (clap)    │          │   (axum)    │       │
//! │   └──────┬──────┘          └──────┬──────┘       │
//! │          └────────────┬───────────┘              │
//! │                       ▼                          │
//! │              ┌─────────────────┐                 │
//! │              │ facetgraph-core │                 │
//! │              └─────────────────┘                 │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! facetgraph server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! facetgraph status
//! facetgraph export -o graph.json
//! facetgraph check
//! ```

use clap::Parser;
use facetgraph::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // FACETGRAPH_LOG_FORMAT=json switches to machine-parseable output.
    let log_format =
        std::env::var("FACETGRAPH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "facetgraph=info,facetgraph_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  facetgraph v{}

  Entities • Relations • Facets
"#,
        env!("CARGO_PKG_VERSION")
    );
}
