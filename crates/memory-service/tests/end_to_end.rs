//! End-to-end smoke test over the Remote Access Surface router (§4.F,
//! §8 scenario 6: open a session, `tools/call add_memories`, then
//! `tools/call search_memory` and see the new memory come back). Grounded
//! in the teacher's `tower::ServiceExt::oneshot` request-through-router
//! test style (`api-server/tests/api_handlers_tests.rs`).

use axum::body::Body;
use axum::http::{Request, StatusCode};
use memory_core::{Scope, ScopeResolver};
use memory_engine::planner::{extraction_prompt, graph_extraction_prompt, reconcile_prompt};
use memory_engine::{EngineConfig, InMemoryHistoryStore, MemoryEngine};
use memory_graph_store::InMemoryGraphStore;
use memory_llm_gateway::{DeterministicProvider, Gateway};
use memory_mcp::{router, AppState, SessionTable};
use memory_vector_store::{DistanceMetric, InMemoryVectorStore};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn test_scope() -> Scope {
    Scope { user_id: Some("u1".to_string()), ..Default::default() }
}

fn build_app(provider: Arc<DeterministicProvider>) -> AppState {
    let gateway = Arc::new(Gateway::new(provider.clone(), provider));
    let engine = Arc::new(MemoryEngine::new(
        Arc::new(InMemoryVectorStore::new(DistanceMetric::Cosine)),
        Some(Arc::new(InMemoryGraphStore::new())),
        gateway,
        Arc::new(InMemoryHistoryStore::new()),
        ScopeResolver::new(Scope::default()),
        EngineConfig::default(),
    ));
    AppState {
        engine,
        sessions: Arc::new(SessionTable::new(Duration::from_secs(1800))),
        default_scope: Scope::default(),
    }
}

async fn rpc_call(app: axum::Router, session_id: &str, method: &str, params: Value) -> Value {
    let body = json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params});
    let request = Request::builder()
        .method("POST")
        .uri(format!("/messages/?session_id={session_id}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let provider = Arc::new(DeterministicProvider::new(4));
    let app = router(build_app(provider));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn add_then_search_round_trips_through_the_rpc_surface() {
    let provider = Arc::new(DeterministicProvider::new(4));
    let extraction_input =
        memory_engine::AddInput::Text("I love pizza with pepperoni".to_string());
    provider.script(
        extraction_prompt(&extraction_input),
        "{\"facts\": [\"Loves pizza with pepperoni.\"]}",
    );
    let candidates = vec!["Loves pizza with pepperoni.".to_string()];
    provider.script(
        reconcile_prompt(&candidates, &[]),
        "{\"decisions\": [{\"candidate_index\": 0, \"op\": \"add\", \"target_id\": null, \"text\": \"Loves pizza with pepperoni.\"}]}",
    );
    provider.script(graph_extraction_prompt(&candidates), "{\"triples\": []}");

    let state = build_app(provider);
    let sessions = state.sessions.clone();
    let session = sessions.open(test_scope());
    let app = router(state);

    let add_response = rpc_call(
        app.clone(),
        &session.id.to_string(),
        "tools/call",
        json!({"name": "add_memories", "arguments": {"text": "I love pizza with pepperoni"}}),
    )
    .await;
    let outcomes = add_response["result"]["outcomes"].as_array().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0]["op"], "added");

    let search_response = rpc_call(
        app,
        &session.id.to_string(),
        "tools/call",
        json!({"name": "search_memory", "arguments": {"query": "food I like"}}),
    )
    .await;
    let memories = search_response["result"]["memories"].as_array().unwrap();
    assert_eq!(memories.len(), 1);
    assert!(memories[0]["text"].as_str().unwrap().contains("pizza"));
}

#[tokio::test]
async fn unknown_session_id_is_rejected() {
    let provider = Arc::new(DeterministicProvider::new(4));
    let app = router(build_app(provider));

    let response = rpc_call(app, &uuid::Uuid::new_v4().to_string(), "tools/list", json!({})).await;
    assert!(response["error"].is_object());
}
