//! Integration tests for the facetgraph HTTP API.
//!
//! Uses axum-test to exercise the router without binding a socket.

#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::StatusCode;
use axum_test::TestServer;
use facetgraph::ServerConfig;
use facetgraph::api::{AppState, DeleteResponse, ErrorResponse, HealthResponse, create_router};
use facetgraph_core::{Entity, Facet, GraphPolicy, GraphSnapshot, Relation, Session};
use serde_json::{Value, json};

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn server_config() -> ServerConfig {
    ServerConfig {
        rate_limit: 0,
        ..ServerConfig::default()
    }
}

fn create_test_server_with(session: Session) -> TestServer {
    let router = create_router(AppState::new(session), &server_config());
    TestServer::new(router).unwrap()
}

fn create_test_server() -> TestServer {
    create_test_server_with(Session::new())
}

async fn create_entity(server: &TestServer, name: &str) -> Entity {
    let response = server
        .post("/entities")
        .json(&json!({ "name": name }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

async fn create_relation(server: &TestServer, source: &Entity, target: &Entity, name: &str) -> Relation {
    let response = server
        .post(&format!("/entities/{}/relations", source.id))
        .json(&json!({ "target_entity_id": target.id, "name": name }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

// =============================================================================
// HEALTH / STATUS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_test_server();
    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_status_counts_records() {
    let server = create_test_server();
    let a = create_entity(&server, "A").await;
    let b = create_entity(&server, "B").await;
    create_relation(&server, &a, &b, "uses").await;

    let status: Value = server.get("/status").await.json();
    assert_eq!(status["entities"], 2);
    assert_eq!(status["relations"], 1);
    assert_eq!(status["facets"], 0);
    assert_eq!(status["persistent"], false);
}

// =============================================================================
// ENTITIES
// =============================================================================

#[tokio::test]
async fn test_entity_crud() {
    let server = create_test_server();

    let response = server
        .post("/entities")
        .json(&json!({ "name": "Driver", "description": "Person behind the wheel" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let created: Entity = response.json();
    assert_eq!(created.name, "Driver");
    assert_eq!(created.description.as_deref(), Some("Person behind the wheel"));

    let fetched: Entity = server.get(&format!("/entities/{}", created.id)).await.json();
    assert_eq!(fetched.id, created.id);

    let response = server
        .put(&format!("/entities/{}", created.id))
        .json(&json!({ "name": "Operator" }))
        .await;
    response.assert_status_ok();
    let updated: Entity = response.json();
    assert_eq!(updated.name, "Operator");
    assert_eq!(updated.description, created.description);

    let listed: Vec<Entity> = server.get("/entities").await.json();
    assert_eq!(listed.len(), 1);

    server
        .delete(&format!("/entities/{}", created.id))
        .await
        .assert_status_ok();
    server
        .get(&format!("/entities/{}", created.id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_name_is_bad_request() {
    let server = create_test_server();
    let response = server.post("/entities").json(&json!({ "name": "  " })).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let error: ErrorResponse = response.json();
    assert!(!error.error.is_empty());
}

#[tokio::test]
async fn test_malformed_id_is_bad_request() {
    let server = create_test_server();
    server
        .get("/entities/not-a-uuid")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .get("/facets/42")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_duplicate_name_conflicts_under_strict_policy() {
    let server = create_test_server_with(Session::new().with_policy(GraphPolicy::strict()));
    create_entity(&server, "A").await;

    server
        .post("/entities")
        .json(&json!({ "name": "A" }))
        .await
        .assert_status(StatusCode::CONFLICT);
}

// =============================================================================
// RELATIONS
// =============================================================================

#[tokio::test]
async fn test_relation_lifecycle() {
    let server = create_test_server();
    let a = create_entity(&server, "A").await;
    let b = create_entity(&server, "B").await;
    let relation = create_relation(&server, &a, &b, "uses").await;
    assert_eq!(relation.source, a.id);
    assert_eq!(relation.target, b.id);

    let source: Entity = server.get(&format!("/entities/{}", a.id)).await.json();
    assert_eq!(source.outgoing.len(), 1);
    let target: Entity = server.get(&format!("/entities/{}", b.id)).await.json();
    assert_eq!(target.incoming.len(), 1);

    let renamed: Relation = server
        .put(&format!("/relations/{}", relation.id))
        .json(&json!({ "name": "depends on" }))
        .await
        .json();
    assert_eq!(renamed.name, "depends on");

    let deleted: DeleteResponse = server
        .delete(&format!("/relations/{}", relation.id))
        .await
        .json();
    assert!(deleted.deleted);

    let again: DeleteResponse = server
        .delete(&format!("/relations/{}", relation.id))
        .await
        .json();
    assert!(!again.deleted);
}

#[tokio::test]
async fn test_cycle_is_conflict() {
    let server = create_test_server();
    let a = create_entity(&server, "A").await;
    let b = create_entity(&server, "B").await;
    let c = create_entity(&server, "C").await;
    create_relation(&server, &a, &b, "r").await;
    create_relation(&server, &b, &c, "r").await;

    let response = server
        .post(&format!("/entities/{}/relations", c.id))
        .json(&json!({ "target_entity_id": a.id, "name": "back" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    let status: Value = server.get("/status").await.json();
    assert_eq!(status["relations"], 2);
}

#[tokio::test]
async fn test_self_loop_is_bad_request() {
    let server = create_test_server();
    let a = create_entity(&server, "A").await;

    server
        .post(&format!("/entities/{}/relations", a.id))
        .json(&json!({ "target_entity_id": a.id, "name": "self" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_racing_opposite_relations_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let session = Session::with_redb(dir.path().join("graph.redb")).unwrap();
    let server = create_test_server_with(session);
    let a = create_entity(&server, "A").await;
    let b = create_entity(&server, "B").await;

    let forward = server
        .post(&format!("/entities/{}/relations", a.id))
        .json(&json!({ "target_entity_id": b.id, "name": "ab" }));
    let backward = server
        .post(&format!("/entities/{}/relations", b.id))
        .json(&json!({ "target_entity_id": a.id, "name": "ba" }));
    let (forward, backward) = tokio::join!(forward, backward);

    let mut statuses = [forward.status_code(), backward.status_code()];
    statuses.sort_by_key(|status| status.as_u16());
    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::CONFLICT]);

    let status: Value = server.get("/status").await.json();
    assert_eq!(status["relations"], 1);
    assert_eq!(status["persistent"], true);
}

#[tokio::test]
async fn test_relation_to_missing_entity_is_not_found() {
    let server = create_test_server();
    let a = create_entity(&server, "A").await;

    server
        .post(&format!("/entities/{}/relations", a.id))
        .json(&json!({ "target_entity_id": "00000000-0000-4000-8000-000000000000", "name": "r" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

// =============================================================================
// FACETS
// =============================================================================

#[tokio::test]
async fn test_facet_on_entity_and_relation() {
    let server = create_test_server();
    let a = create_entity(&server, "A").await;
    let b = create_entity(&server, "B").await;
    let relation = create_relation(&server, &a, &b, "uses").await;

    let response = server
        .post(&format!("/entities/{}/facets", a.id))
        .json(&json!({ "type": "property", "configuration": { "fields": ["age", "name"] } }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let property: Facet = response.json();
    assert_eq!(property.facet_type, "property");

    let response = server
        .post(&format!("/relations/{}/facets", relation.id))
        .json(&json!({ "type": "criteria", "configuration": { "min_age": 18 } }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let fetched: Relation = server.get(&format!("/relations/{}", relation.id)).await.json();
    assert_eq!(fetched.facets.len(), 1);
    assert_eq!(fetched.facets[0].configuration, json!({ "min_age": 18 }));

    let updated: Facet = server
        .put(&format!("/facets/{}", property.id))
        .json(&json!({ "configuration": { "fields": [] } }))
        .await
        .json();
    assert_eq!(updated.configuration, json!({ "fields": [] }));

    let deleted: DeleteResponse = server
        .delete(&format!("/facets/{}", property.id))
        .await
        .json();
    assert!(deleted.deleted);
    server
        .get(&format!("/facets/{}", property.id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_facet_on_missing_owner_is_not_found() {
    let server = create_test_server();

    server
        .post("/relations/00000000-0000-4000-8000-000000000000/facets")
        .json(&json!({ "type": "criteria", "configuration": {} }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_response_bodies_use_view_field_names() {
    let server = create_test_server();
    let a = create_entity(&server, "A").await;
    let b = create_entity(&server, "B").await;
    let relation = create_relation(&server, &a, &b, "uses").await;

    let facet: Value = server
        .post(&format!("/relations/{}/facets", relation.id))
        .json(&json!({ "type": "criteria", "configuration": { "min_age": 18 } }))
        .await
        .json();
    assert_eq!(facet["type"], "criteria");
    assert_eq!(facet["owner"], json!({ "relation": relation.id }));
    assert_eq!(facet["configuration"], json!({ "min_age": 18 }));

    let edge: Value = server.get(&format!("/relations/{}", relation.id)).await.json();
    assert_eq!(edge["source"], json!(a.id));
    assert_eq!(edge["target"], json!(b.id));
    assert_eq!(edge["facets"][0]["id"], facet["id"]);

    let source: Value = server.get(&format!("/entities/{}", a.id)).await.json();
    assert_eq!(source["outgoing"][0]["id"], json!(relation.id));
    assert!(source["incoming"].as_array().unwrap().is_empty());
}

// =============================================================================
// GRAPH / CASCADE
// =============================================================================

#[tokio::test]
async fn test_graph_snapshot() {
    let server = create_test_server();
    let driver = create_entity(&server, "Driver").await;
    let license = create_entity(&server, "License").await;
    create_relation(&server, &driver, &license, "holds").await;
    server
        .post(&format!("/entities/{}/facets", driver.id))
        .json(&json!({ "type": "property", "configuration": { "age": "int" } }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server.get("/graph").await;
    response.assert_status_ok();
    let snapshot: GraphSnapshot = response.json();

    assert_eq!(snapshot.nodes.len(), 2);
    assert_eq!(snapshot.nodes[0].name, "Driver");
    assert_eq!(snapshot.nodes[0].facets.len(), 1);
    assert_eq!(snapshot.edges.len(), 1);
    assert_eq!(snapshot.edges[0].source, driver.id);
    assert_eq!(snapshot.edges[0].target, license.id);
}

#[tokio::test]
async fn test_entity_delete_cascades() {
    let server = create_test_server();
    let a = create_entity(&server, "A").await;
    let b = create_entity(&server, "B").await;
    let relation = create_relation(&server, &a, &b, "uses").await;
    server
        .post(&format!("/relations/{}/facets", relation.id))
        .json(&json!({ "type": "criteria" }))
        .await
        .assert_status(StatusCode::CREATED);

    let report: Value = server
        .delete(&format!("/entities/{}", b.id))
        .await
        .json();
    assert_eq!(report["entity_removed"], true);
    assert_eq!(report["relations"].as_array().unwrap().len(), 1);
    assert_eq!(report["facets"].as_array().unwrap().len(), 1);

    server
        .get(&format!("/relations/{}", relation.id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    let source: Entity = server.get(&format!("/entities/{}", a.id)).await.json();
    assert!(source.outgoing.is_empty());
}

#[tokio::test]
async fn test_delete_missing_entity_reports_nothing_removed() {
    let server = create_test_server();
    let response = server
        .delete("/entities/00000000-0000-4000-8000-000000000000")
        .await;

    response.assert_status_ok();
    let report: Value = response.json();
    assert_eq!(report["entity_removed"], false);
    assert!(report["relations"].as_array().unwrap().is_empty());
}
