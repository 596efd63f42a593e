//! JSON-RPC 2.0 envelope types and the §7/§6.2 error-code mapping.

use memory_core::MemoryError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

pub const INVALID_REQUEST: i32 = -32600;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
/// Base of the app-defined Engine error range (§6.2: `-32000…-32099`).
const ENGINE_ERROR_BASE: i32 = -32000;

impl RpcResponse {
    pub fn ok(id: Option<Value>, result: Value) -> Self {
        Self { jsonrpc: "2.0", id, result: Some(result), error: None }
    }

    pub fn err(id: Option<Value>, error: RpcError) -> Self {
        Self { jsonrpc: "2.0", id, result: None, error: Some(error) }
    }
}

/// Map one `MemoryError` onto a JSON-RPC error per §7 / §6.2. `InvalidScope`
/// and validation failures map onto `-32602` (invalid params); everything
/// else engine-side gets a distinct code in the `-32000..-32099` app range
/// so a client can distinguish failure kinds without string-matching
/// `message`.
pub fn map_memory_error(err: &MemoryError) -> RpcError {
    let (code, offset) = match err {
        MemoryError::InvalidScope(_) => (INVALID_PARAMS, None),
        MemoryError::Validation(_) => (INVALID_PARAMS, None),
        MemoryError::NotFound(_) => (ENGINE_ERROR_BASE, Some(1)),
        MemoryError::InvalidStateTransition(_) => (ENGINE_ERROR_BASE, Some(2)),
        MemoryError::Embed(_) => (ENGINE_ERROR_BASE, Some(3)),
        MemoryError::Plan(_) => (ENGINE_ERROR_BASE, Some(4)),
        MemoryError::Store(_) => (ENGINE_ERROR_BASE, Some(5)),
        MemoryError::Timeout(_) => (ENGINE_ERROR_BASE, Some(6)),
        MemoryError::Overloaded(_) => (ENGINE_ERROR_BASE, Some(7)),
        MemoryError::PartialFailure(_) => (ENGINE_ERROR_BASE, Some(8)),
        MemoryError::Serialization(_) => (INVALID_PARAMS, None),
        MemoryError::Other(_) => (INTERNAL_ERROR, None),
    };
    RpcError {
        code: offset.map(|o| code + o).unwrap_or(code),
        message: err.to_string(),
        data: None,
    }
}

pub fn invalid_request(message: impl Into<String>) -> RpcError {
    RpcError { code: INVALID_REQUEST, message: message.into(), data: None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_scope_maps_to_invalid_params() {
        let error = map_memory_error(&MemoryError::InvalidScope("bad".to_string()));
        assert_eq!(error.code, INVALID_PARAMS);
    }

    #[test]
    fn engine_error_kinds_get_distinct_app_range_codes() {
        let not_found = map_memory_error(&MemoryError::NotFound("x".to_string()));
        let overloaded = map_memory_error(&MemoryError::Overloaded("x".to_string()));
        assert_ne!(not_found.code, overloaded.code);
        assert!((ENGINE_ERROR_BASE..ENGINE_ERROR_BASE + 100).contains(&not_found.code));
        assert!((ENGINE_ERROR_BASE..ENGINE_ERROR_BASE + 100).contains(&overloaded.code));
    }
}
