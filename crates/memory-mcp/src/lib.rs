//! Remote Access Surface (§4.F, §6.2): a session-oriented SSE + JSON-RPC 2.0
//! endpoint that dispatches `tools/call` into the [`memory_engine::MemoryEngine`]
//! under the caller's [`memory_core::Scope`].

pub mod rpc;
pub mod server;
pub mod session;
pub mod tools;

pub use rpc::{RpcError, RpcRequest, RpcResponse};
pub use server::{router, AppState};
pub use session::{Session, SessionId, SessionTable};
pub use tools::{call_tool, tool_schemas, ToolError, TOOL_NAMES};
