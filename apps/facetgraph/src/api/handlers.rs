//! # API Endpoint Handlers
//!
//! Every handler runs exactly one session operation. Ids arrive as path
//! strings and are parsed here so a malformed id is a 400, not a 404.
//!
//! Session calls take locks and may hit disk, so they run on the blocking
//! pool rather than on an async worker.

use super::{
    AppState,
    types::{
        ApiError, DeleteResponse, FacetRequest, FacetUpdateRequest, HealthResponse,
        RelationRequest, StatusResponse,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use facetgraph_core::{
    CascadeReport, Entity, EntityId, EntityPatch, Facet, FacetId, GraphError, GraphSnapshot,
    NewEntity, NewFacet, NewRelation, Owner, Relation, RelationId, RelationPatch, Session,
};
use std::str::FromStr;
use std::sync::Arc;

type ApiResult<T> = Result<T, ApiError>;

/// Run a session operation on the blocking thread pool.
async fn blocking<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Session) -> Result<T, GraphError> + Send + 'static,
    T: Send + 'static,
{
    let session = Arc::clone(&state.session);
    tokio::task::spawn_blocking(move || f(&session))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "session task failed");
            ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: format!("Session task failed: {}", e),
            }
        })?
        .map_err(ApiError::from)
}

fn parse_id<T: FromStr>(raw: &str, what: &str) -> ApiResult<T> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid {} id: '{}'", what, raw)))
}

// =============================================================================
// HEALTH / STATUS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Record counts.
pub async fn status_handler(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    let counts = blocking(&state, |session| session.counts()).await?;
    Ok(Json(StatusResponse::new(counts, state.session.is_persistent())))
}

// =============================================================================
// ENTITIES
// =============================================================================

pub async fn create_entity_handler(
    State(state): State<AppState>,
    Json(request): Json<NewEntity>,
) -> ApiResult<(StatusCode, Json<Entity>)> {
    let entity = blocking(&state, move |session| session.create_entity(request)).await?;
    Ok((StatusCode::CREATED, Json(entity)))
}

pub async fn list_entities_handler(State(state): State<AppState>) -> ApiResult<Json<Vec<Entity>>> {
    Ok(Json(blocking(&state, |session| session.entities()).await?))
}

/// Entity with its facets and both relation directions.
pub async fn get_entity_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Entity>> {
    let id: EntityId = parse_id(&id, "entity")?;
    Ok(Json(blocking(&state, move |session| session.entity(id)).await?))
}

pub async fn update_entity_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<EntityPatch>,
) -> ApiResult<Json<Entity>> {
    let id: EntityId = parse_id(&id, "entity")?;
    Ok(Json(
        blocking(&state, move |session| session.update_entity(id, patch)).await?,
    ))
}

/// Cascade delete; the body lists everything that was removed.
pub async fn delete_entity_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CascadeReport>> {
    let id: EntityId = parse_id(&id, "entity")?;
    Ok(Json(
        blocking(&state, move |session| session.delete_entity(id)).await?,
    ))
}

/// Create a relation whose source is the entity in the path.
pub async fn create_relation_handler(
    State(state): State<AppState>,
    Path(source): Path<String>,
    Json(request): Json<RelationRequest>,
) -> ApiResult<(StatusCode, Json<Relation>)> {
    let source: EntityId = parse_id(&source, "entity")?;
    let mut new = NewRelation::new(source, request.target_entity_id, request.name);
    new.description = request.description;

    let relation = blocking(&state, move |session| session.create_relation(new)).await?;
    Ok((StatusCode::CREATED, Json(relation)))
}

pub async fn add_entity_facet_handler(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Json(request): Json<FacetRequest>,
) -> ApiResult<(StatusCode, Json<Facet>)> {
    let owner: EntityId = parse_id(&owner, "entity")?;
    add_facet(&state, owner.into(), request).await
}

// =============================================================================
// RELATIONS
// =============================================================================

pub async fn get_relation_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Relation>> {
    let id: RelationId = parse_id(&id, "relation")?;
    Ok(Json(blocking(&state, move |session| session.relation(id)).await?))
}

pub async fn update_relation_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<RelationPatch>,
) -> ApiResult<Json<Relation>> {
    let id: RelationId = parse_id(&id, "relation")?;
    Ok(Json(
        blocking(&state, move |session| session.update_relation(id, patch)).await?,
    ))
}

pub async fn delete_relation_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let id: RelationId = parse_id(&id, "relation")?;
    let deleted = blocking(&state, move |session| session.delete_relation(id)).await?;
    Ok(Json(DeleteResponse { deleted }))
}

pub async fn add_relation_facet_handler(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Json(request): Json<FacetRequest>,
) -> ApiResult<(StatusCode, Json<Facet>)> {
    let owner: RelationId = parse_id(&owner, "relation")?;
    add_facet(&state, owner.into(), request).await
}

// =============================================================================
// FACETS
// =============================================================================

async fn add_facet(
    state: &AppState,
    owner: Owner,
    request: FacetRequest,
) -> ApiResult<(StatusCode, Json<Facet>)> {
    let new = NewFacet::new(owner, request.facet_type, request.configuration);
    let facet = blocking(state, move |session| session.add_facet(new)).await?;
    Ok((StatusCode::CREATED, Json(facet)))
}

pub async fn get_facet_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Facet>> {
    let id: FacetId = parse_id(&id, "facet")?;
    Ok(Json(blocking(&state, move |session| session.facet(id)).await?))
}

/// Replace a facet's configuration wholesale.
pub async fn update_facet_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<FacetUpdateRequest>,
) -> ApiResult<Json<Facet>> {
    let id: FacetId = parse_id(&id, "facet")?;
    let configuration = request.configuration;
    Ok(Json(
        blocking(&state, move |session| session.update_facet(id, configuration)).await?,
    ))
}

pub async fn delete_facet_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let id: FacetId = parse_id(&id, "facet")?;
    let deleted = blocking(&state, move |session| session.delete_facet(id)).await?;
    Ok(Json(DeleteResponse { deleted }))
}

// =============================================================================
// GRAPH
// =============================================================================

/// The whole graph as nodes and edges, taken from one read transaction.
pub async fn graph_handler(State(state): State<AppState>) -> ApiResult<Json<GraphSnapshot>> {
    Ok(Json(blocking(&state, |session| session.snapshot()).await?))
}
