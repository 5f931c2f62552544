//! # API Request/Response Types
//!
//! JSON bodies for the HTTP API, and the mapping from engine errors to
//! status codes.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use facetgraph_core::{Document, EntityId, GraphError, StoreCounts, empty_document};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH / STATUS
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Record counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub entities: usize,
    pub relations: usize,
    pub facets: usize,
    pub persistent: bool,
}

impl StatusResponse {
    pub fn new(counts: StoreCounts, persistent: bool) -> Self {
        Self {
            entities: counts.entities,
            relations: counts.relations,
            facets: counts.facets,
            persistent,
        }
    }
}

// =============================================================================
// RELATIONS
// =============================================================================

/// Body of `POST /entities/{id}/relations`; the path id is the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationRequest {
    pub target_entity_id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

// =============================================================================
// FACETS
// =============================================================================

/// Body of `POST /entities/{id}/facets` and `POST /relations/{id}/facets`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacetRequest {
    #[serde(rename = "type")]
    pub facet_type: String,
    /// Omitted configuration is stored as an empty map.
    #[serde(default = "empty_document")]
    pub configuration: Document,
}

/// Body of `PUT /facets/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacetUpdateRequest {
    pub configuration: Document,
}

// =============================================================================
// DELETE / ERROR
// =============================================================================

/// Outcome of deleting a relation or facet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An error rendered as `{"error": ...}` with a matching status code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<GraphError> for ApiError {
    fn from(err: GraphError) -> Self {
        let status = match &err {
            GraphError::NotFound { .. } => StatusCode::NOT_FOUND,
            GraphError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            GraphError::CycleDetected { .. } | GraphError::Conflict(_) => StatusCode::CONFLICT,
            GraphError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GraphError::TransactionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_errors_map_to_status_codes() {
        let cases = [
            (
                GraphError::InvalidArgument("x".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                GraphError::CycleDetected {
                    from: EntityId::new(),
                    to: EntityId::new(),
                },
                StatusCode::CONFLICT,
            ),
            (GraphError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                GraphError::StoreUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                GraphError::TransactionFailed("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status, expected);
        }
    }

    #[test]
    fn facet_request_defaults_configuration() {
        let request: FacetRequest =
            serde_json::from_str(r#"{"type": "property"}"#).expect("parse");
        assert_eq!(request.facet_type, "property");
        assert_eq!(request.configuration, empty_document());
    }
}
