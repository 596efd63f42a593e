//! Router construction and handlers for the Remote Access Surface (§4.F,
//! §6.2): session open over SSE, JSON-RPC dispatch over `POST /messages/`,
//! `GET /tools`, `GET /health`. Grounded in the teacher's `axum`
//! `AppState`/handler-function shape (`api-server::handlers`) generalized
//! from a CQRS task API onto the fixed four-tool, one-method-table surface
//! this spec calls for, rather than the teacher's heavier CQRS router.

use crate::rpc::{invalid_request, map_memory_error, RpcRequest, RpcResponse, INVALID_PARAMS};
use crate::session::{Session, SessionId, SessionTable};
use crate::tools::{call_tool, tool_schemas, ToolError};
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::Stream;
use memory_core::Scope;
use memory_engine::MemoryEngine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MemoryEngine>,
    pub sessions: Arc<SessionTable>,
    pub default_scope: Scope,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/:client/sse/:user_id", get(open_session))
        .route("/messages/", post(post_message))
        .route("/tools", get(list_tools))
        .route("/health", get(health))
        .with_state(state)
}

async fn open_session(
    State(state): State<AppState>,
    Path((client, user_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let scope = state.default_scope.merge_request(&Scope {
        user_id: Some(user_id.clone()),
        ..Default::default()
    });
    let session = state.sessions.open(scope);
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    state.sessions.attach_sender(session.id, tx);

    info!(client, user_id, session_id = %session.id, "opened MCP session");

    let endpoint_event = Event::default()
        .event("endpoint")
        .data(format!("/messages/?session_id={}", session.id));

    let stream = futures::stream::once(async move { Ok::<_, Infallible>(endpoint_event) })
        .chain(UnboundedReceiverStream::new(rx).map(|data| Ok(Event::default().event("message").data(data))));

    Sse::new(stream as std::pin::Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>)
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    session_id: SessionId,
}

async fn post_message(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    Json(request): Json<RpcRequest>,
) -> impl IntoResponse {
    let Some(session) = state.sessions.touch(query.session_id) else {
        let error = invalid_request("unknown or expired session_id");
        return Json(RpcResponse::err(request.id, error));
    };

    let response = dispatch(&state, &session, request.clone()).await;
    if let Some(tx) = &session.sse_tx {
        if let Ok(encoded) = serde_json::to_string(&response) {
            let _ = tx.send(encoded);
        }
    }
    Json(response)
}

async fn dispatch(state: &AppState, session: &Session, request: RpcRequest) -> RpcResponse {
    if request.jsonrpc != "2.0" && !request.jsonrpc.is_empty() {
        return RpcResponse::err(request.id, invalid_request("jsonrpc must be \"2.0\""));
    }

    match request.method.as_str() {
        "initialize" => RpcResponse::ok(
            request.id,
            json!({
                "protocolVersion": "2024-11-05",
                "serverInfo": {"name": "memory-engine", "version": env!("CARGO_PKG_VERSION")},
                "capabilities": {"tools": {}},
            }),
        ),
        "tools/list" => RpcResponse::ok(request.id, json!({ "tools": tool_schemas() })),
        "tools/call" => handle_tools_call(state, session, request).await,
        other => RpcResponse::err(request.id, invalid_request(format!("unknown method: {other}"))),
    }
}

async fn handle_tools_call(state: &AppState, session: &Session, request: RpcRequest) -> RpcResponse {
    let name = match request.params.get("name").and_then(Value::as_str) {
        Some(name) => name.to_string(),
        None => return RpcResponse::err(request.id, invalid_request("params.name is required")),
    };
    let arguments = request.params.get("arguments").cloned().unwrap_or_else(|| json!({}));

    match call_tool(&state.engine, &session.scope, &name, arguments).await {
        Ok(result) => RpcResponse::ok(request.id, result),
        Err(ToolError::Engine(err)) => {
            warn!(tool = %name, error = %err, "tool call failed");
            RpcResponse::err(request.id, map_memory_error(&err))
        }
        Err(ToolError::UnknownTool(name)) => {
            RpcResponse::err(request.id, invalid_request(format!("unknown tool: {name}")))
        }
        Err(ToolError::InvalidArguments(reason)) => RpcResponse::err(
            request.id,
            crate::rpc::RpcError { code: INVALID_PARAMS, message: reason, data: None },
        ),
    }
}

async fn list_tools() -> Json<Value> {
    Json(json!({ "tools": tool_schemas() }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "deps": {"vector": "ok", "graph": "ok", "llm": "ok"},
        "sessions": state.sessions.len(),
    }))
}

use futures::StreamExt as _;
