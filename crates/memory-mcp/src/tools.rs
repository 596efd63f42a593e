//! The four tools exposed over `tools/list`/`tools/call` (§6.2) and their
//! dispatch into the Engine.

use memory_core::{MemoryResult, Scope};
use memory_engine::{AddInput, MemoryEngine, Page};
use memory_vector_store::{Paging, SearchFilters};
use serde_json::{json, Value};

pub const TOOL_NAMES: [&str; 4] = ["add_memories", "search_memory", "list_memories", "delete_all_memories"];

/// JSON schema for each tool's arguments, returned verbatim by `tools/list`
/// and `GET /tools` (§4.F).
pub fn tool_schemas() -> Value {
    json!([
        {
            "name": "add_memories",
            "description": "Extract and store durable facts from text or a conversation.",
            "input_schema": {
                "type": "object",
                "properties": {
                    "text": {"type": "string"},
                    "metadata": {"type": "object"},
                    "infer": {"type": "boolean", "default": true}
                },
                "required": ["text"]
            }
        },
        {
            "name": "search_memory",
            "description": "Semantically search stored memories.",
            "input_schema": {
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "limit": {"type": "integer", "default": 10},
                    "filters": {"type": "object"}
                },
                "required": ["query"]
            }
        },
        {
            "name": "list_memories",
            "description": "Page through stored memories.",
            "input_schema": {
                "type": "object",
                "properties": {
                    "page": {"type": "integer", "default": 1},
                    "size": {"type": "integer", "default": 50},
                    "filters": {"type": "object"}
                }
            }
        },
        {
            "name": "delete_all_memories",
            "description": "Delete every memory in scope. Requires explicit confirmation.",
            "input_schema": {
                "type": "object",
                "properties": {
                    "confirm": {"type": "boolean"}
                },
                "required": ["confirm"]
            }
        }
    ])
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error(transparent)]
    Engine(#[from] memory_core::MemoryError),
}

/// Dispatch a `tools/call` invocation. `infer` is accepted for wire
/// compatibility with §6.2's schema but has no Engine-level counterpart
/// (§6.1's `add` takes no such flag) — it is presently a no-op, recorded in
/// DESIGN.md rather than silently dropped.
pub async fn call_tool(engine: &MemoryEngine, scope: &Scope, name: &str, args: Value) -> Result<Value, ToolError> {
    match name {
        "add_memories" => add_memories(engine, scope, args).await,
        "search_memory" => search_memory(engine, scope, args).await,
        "list_memories" => list_memories(engine, scope, args).await,
        "delete_all_memories" => delete_all_memories(engine, scope, args).await,
        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}

async fn add_memories(engine: &MemoryEngine, scope: &Scope, args: Value) -> Result<Value, ToolError> {
    let text = args
        .get("text")
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments("'text' is required".to_string()))?
        .to_string();

    let result = engine.add(scope, AddInput::Text(text), "mcp").await?;
    Ok(json!({
        "outcomes": result.outcomes.iter().map(outcome_to_json).collect::<Vec<_>>(),
        "partial_graph_failure": result.partial_graph_failure,
    }))
}

fn outcome_to_json(outcome: &memory_engine::OpOutcome) -> Value {
    use memory_engine::OpOutcome::*;
    match outcome {
        Added(id) => json!({"op": "added", "id": id}),
        Updated(id) => json!({"op": "updated", "id": id}),
        Deleted(id) => json!({"op": "deleted", "id": id}),
        Noop => json!({"op": "noop"}),
        Failed(reason) => json!({"op": "failed", "reason": reason}),
    }
}

async fn search_memory(engine: &MemoryEngine, scope: &Scope, args: Value) -> Result<Value, ToolError> {
    let query = args
        .get("query")
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments("'query' is required".to_string()))?;
    let limit = args.get("limit").and_then(Value::as_u64).unwrap_or(10) as usize;
    let filters = parse_filters(&args)?;

    let result = engine.search(scope, query, limit, &filters).await?;
    Ok(json!({
        "memories": result.memories.iter().map(|m| json!({
            "id": m.memory.id,
            "text": m.memory.text,
            "score": m.score,
            "metadata": m.memory.metadata,
        })).collect::<Vec<_>>(),
        "related_entities": result.related_entities,
    }))
}

async fn list_memories(engine: &MemoryEngine, scope: &Scope, args: Value) -> Result<Value, ToolError> {
    let page = args.get("page").and_then(Value::as_u64).unwrap_or(1).max(1) as usize;
    let size = args.get("size").and_then(Value::as_u64).unwrap_or(50) as usize;
    let filters = parse_filters(&args)?;
    let paging = Paging { limit: size, offset: (page - 1) * size };

    let Page { items } = engine.list(scope, &filters, paging).await?;
    Ok(json!({
        "memories": items.iter().map(|m| json!({
            "id": m.id,
            "text": m.text,
            "state": m.state,
            "metadata": m.metadata,
        })).collect::<Vec<_>>(),
    }))
}

async fn delete_all_memories(engine: &MemoryEngine, scope: &Scope, args: Value) -> Result<Value, ToolError> {
    let confirmed = args.get("confirm").and_then(Value::as_bool).unwrap_or(false);
    if !confirmed {
        return Err(ToolError::InvalidArguments("'confirm' must be true".to_string()));
    }
    let deleted = engine.delete_all(scope, "mcp").await?;
    Ok(json!({ "deleted": deleted }))
}

fn parse_filters(args: &Value) -> MemoryResult<SearchFilters> {
    let Some(raw) = args.get("filters") else {
        return Ok(SearchFilters::default());
    };
    if raw.is_null() {
        return Ok(SearchFilters::default());
    }
    let metadata = serde_json::from_value(raw.clone())?;
    Ok(SearchFilters { metadata, include_state: false })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_schemas_name_all_four_tools() {
        let schemas = tool_schemas();
        let names: Vec<&str> = schemas.as_array().unwrap().iter().map(|s| s["name"].as_str().unwrap()).collect();
        assert_eq!(names, TOOL_NAMES);
    }

    #[test]
    fn parse_filters_defaults_when_absent() {
        let filters = parse_filters(&json!({})).unwrap();
        assert!(filters.metadata.is_empty());
    }
}
