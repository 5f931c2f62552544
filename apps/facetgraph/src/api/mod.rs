//! # facetgraph HTTP API Module
//!
//! ## Endpoints
//!
//! - `POST /entities`, `GET /entities`
//! - `GET|PUT|DELETE /entities/{id}`
//! - `POST /entities/{id}/relations` - source is the path entity
//! - `POST /entities/{id}/facets`
//! - `GET|PUT|DELETE /relations/{id}`
//! - `POST /relations/{id}/facets`
//! - `GET|PUT|DELETE /facets/{id}`
//! - `GET /graph` - snapshot of nodes and edges
//! - `GET /status` - record counts
//! - `GET /health` - health check
//!
//! CORS origins, the rate limit and the body limit come from `[server]` in
//! the config (see `crate::config`).

mod handlers;
mod middleware;
mod types;

pub use handlers::*;
pub use middleware::{GlobalRateLimiter, create_rate_limiter};
pub use types::{
    ApiError, DeleteResponse, ErrorResponse, FacetRequest, FacetUpdateRequest, HealthResponse,
    RelationRequest, StatusResponse,
};

use crate::config::ServerConfig;
use crate::error::AppError;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use facetgraph_core::Session;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state. `Session` serializes writes itself, so it is shared
/// without an outer lock.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Session>,
}

impl AppState {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(session),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

const CORS_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

/// Build the CORS layer from `server.cors_origins`.
///
/// - `["*"]`: all origins
/// - empty, or no parseable origin: localhost only
/// - otherwise: the listed origins
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o.trim() == "*") {
        tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            let trimmed = origin.trim();
            match trimmed.parse::<HeaderValue>() {
                Ok(hv) => {
                    tracing::info!("CORS: Allowing origin: {}", trimmed);
                    Some(hv)
                }
                Err(e) => {
                    tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect();

    if allowed.is_empty() {
        tracing::info!("CORS: No origins configured, defaulting to localhost only");
        return build_localhost_cors();
    }

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(CORS_METHODS)
        .allow_headers([header::CONTENT_TYPE])
}

fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(CORS_METHODS)
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Rate limiting (if enabled)
pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    let cors = build_cors_layer(&server.cors_origins);

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/graph", get(graph_handler))
        .route(
            "/entities",
            post(create_entity_handler).get(list_entities_handler),
        )
        .route(
            "/entities/{id}",
            get(get_entity_handler)
                .put(update_entity_handler)
                .delete(delete_entity_handler),
        )
        .route("/entities/{id}/relations", post(create_relation_handler))
        .route("/entities/{id}/facets", post(add_entity_facet_handler))
        .route(
            "/relations/{id}",
            get(get_relation_handler)
                .put(update_relation_handler)
                .delete(delete_relation_handler),
        )
        .route("/relations/{id}/facets", post(add_relation_facet_handler))
        .route(
            "/facets/{id}",
            get(get_facet_handler)
                .put(update_facet_handler)
                .delete(delete_facet_handler),
        );

    match create_rate_limiter(server.rate_limit) {
        Some(limiter) => {
            tracing::info!("Rate limiting enabled: {} requests/second", server.rate_limit);
            router = router.layer(axum_middleware::from_fn_with_state(
                limiter,
                middleware::rate_limit_middleware,
            ));
        }
        None => tracing::info!("Rate limiting disabled"),
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(server.body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Bind and serve until Ctrl+C.
pub async fn run_server(server: &ServerConfig, session: Session) -> Result<(), AppError> {
    let addr = server.bind_address();
    let router = create_router(AppState::new(session), server);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("facetgraph HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Io(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
