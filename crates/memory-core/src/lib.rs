//! Memory Core — shared types, scope resolution, and the error taxonomy for
//! the memory engine.
//!
//! This crate has no knowledge of any particular backing store or transport:
//! it is the vocabulary every other crate in the workspace speaks.

pub mod error;
pub mod history;
pub mod memory;
pub mod scope;

pub use error::{MemoryError, MemoryResult};
pub use history::{replay_final_text, HistoryEvent, HistoryOp};
pub use memory::{content_hash, Memory, MemoryId, MemoryState, Metadata, MetadataValue};
pub use scope::{Scope, ScopeResolver};
