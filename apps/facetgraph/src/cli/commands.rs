//! # CLI Command Implementations

use crate::api;
use crate::config::{AppConfig, BackendKind};
use crate::error::AppError;
use facetgraph_core::GraphAssembler;
use std::path::{Path, PathBuf};

/// Validate an output path.
///
/// The parent directory must exist and be a directory; the returned path is
/// the canonical parent joined with the original file name.
fn validate_output_path(path: &Path) -> Result<PathBuf, AppError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        AppError::Io(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(AppError::Io(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| AppError::Io("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &AppConfig) -> Result<(), AppError> {
    let session = config.open_session()?;

    println!("facetgraph server starting...");
    println!();
    println!("Configuration:");
    println!("  Host:       {}", config.server.host);
    println!("  Port:       {}", config.server.port);
    println!("  Backend:    {}", config.storage.backend);
    if config.storage.backend == BackendKind::Redb {
        println!("  Database:   {}", config.storage.path.display());
    }
    println!("  Rate limit: {} req/s", config.server.rate_limit);
    println!();
    println!("Endpoints:");
    println!("  POST   /entities                 - Create an entity");
    println!("  GET    /entities                 - List entities");
    println!("  GET    /entities/{{id}}            - Entity with facets and relations");
    println!("  PUT    /entities/{{id}}            - Rename or describe an entity");
    println!("  DELETE /entities/{{id}}            - Cascade delete");
    println!("  POST   /entities/{{id}}/relations  - Create a relation");
    println!("  POST   /entities/{{id}}/facets     - Attach a facet");
    println!("  GET    /relations/{{id}}           - Relation with facets");
    println!("  POST   /relations/{{id}}/facets    - Attach a facet");
    println!("  GET    /facets/{{id}}              - Facet");
    println!("  GET    /graph                    - Graph snapshot");
    println!("  GET    /health                   - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(&config.server, session).await
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show record counts.
pub fn cmd_status(config: &AppConfig, json_mode: bool) -> Result<(), AppError> {
    let session = config.open_session()?;
    let counts = session.counts()?;

    if json_mode {
        let output = serde_json::json!({
            "backend": config.storage.backend,
            "database": config.storage.path.to_string_lossy(),
            "entities": counts.entities,
            "relations": counts.relations,
            "facets": counts.facets,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("facetgraph status");
    println!("=================");
    println!("Backend:   {}", config.storage.backend);
    if config.storage.backend == BackendKind::Redb {
        println!("Database:  {}", config.storage.path.display());
    }
    println!();
    println!("Entities:  {}", counts.entities);
    println!("Relations: {}", counts.relations);
    println!("Facets:    {}", counts.facets);

    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Write the graph snapshot to `output` as pretty-printed JSON.
pub fn cmd_export(config: &AppConfig, output: &Path) -> Result<(), AppError> {
    let output = validate_output_path(output)?;
    let session = config.open_session()?;
    let snapshot = session.snapshot()?;

    let json = serde_json::to_vec_pretty(&snapshot)
        .map_err(|e| AppError::Io(format!("Serialize snapshot: {}", e)))?;
    std::fs::write(&output, json)
        .map_err(|e| AppError::Io(format!("Write '{}': {}", output.display(), e)))?;

    println!(
        "Exported {} entities and {} relations to {}",
        snapshot.nodes.len(),
        snapshot.edges.len(),
        output.display()
    );
    Ok(())
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Verify the stored graph and fail if any issue is found.
pub fn cmd_check(config: &AppConfig, json_mode: bool) -> Result<(), AppError> {
    let session = config.open_session()?;
    let snapshot = session.snapshot()?;
    let issues = GraphAssembler::verify(&snapshot);

    if json_mode {
        let output = serde_json::json!({
            "ok": issues.is_empty(),
            "entities": snapshot.nodes.len(),
            "relations": snapshot.edges.len(),
            "issues": issues,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
    } else if issues.is_empty() {
        println!(
            "OK: {} entities, {} relations, no cycles",
            snapshot.nodes.len(),
            snapshot.edges.len()
        );
    } else {
        for issue in &issues {
            println!("{:?}", issue);
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        tracing::warn!(count = issues.len(), "integrity check found issues");
        Err(AppError::Integrity(issues.len()))
    }
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty database.
pub fn cmd_init(config: &AppConfig, force: bool) -> Result<(), AppError> {
    if config.storage.backend == BackendKind::Memory {
        println!("Memory backend needs no initialization");
        return Ok(());
    }

    let path = &config.storage.path;
    if path.exists() {
        if !force {
            return Err(AppError::Io(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(path)
            .map_err(|e| AppError::Io(format!("Remove '{}': {}", path.display(), e)))?;
    }

    let _session = config.open_session()?;
    println!("Initialized new redb database at {}", path.display());
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
