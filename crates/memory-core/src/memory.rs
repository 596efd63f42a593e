//! Core `Memory` entity and its lifecycle state machine (§3, §4.E.4).

use crate::error::{MemoryError, MemoryResult};
use crate::scope::Scope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

/// Opaque unique identifier for a memory.
pub type MemoryId = Uuid;

/// Content hash used for dedup (invariant 3). Two memories collide iff their
/// digests are equal.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Lifecycle state of a memory (§4.E.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryState {
    Active,
    Paused,
    Archived,
    Deleted,
}

impl MemoryState {
    /// Whether `self -> next` is a permitted edge per §4.E.4.
    pub fn can_transition_to(self, next: MemoryState) -> bool {
        use MemoryState::*;
        matches!(
            (self, next),
            (Active, Paused)
                | (Paused, Active)
                | (Active, Archived)
                | (Active, Deleted)
                | (Paused, Archived)
                | (Paused, Deleted)
                | (Archived, Deleted)
        )
    }
}

/// Scalar or list metadata value. Matches the teacher's
/// `HashMap<String, serde_json::Value>` metadata convention but closes the
/// type down to what §3 actually permits (scalar or list), so a store's
/// "exact-match on scalar, set-membership on list" filter contract (§4.C)
/// is total rather than partial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Scalar(serde_json::Value),
    List(Vec<serde_json::Value>),
}

pub type Metadata = HashMap<String, MetadataValue>;

/// A durable, deduplicated textual fact with an embedding and metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: MemoryId,
    pub text: String,
    pub embedding: Vec<f32>,
    pub scope: Scope,
    pub metadata: Metadata,
    pub hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub state: MemoryState,
}

impl Memory {
    pub fn new(
        scope: Scope,
        text: String,
        embedding: Vec<f32>,
        metadata: Metadata,
        now: DateTime<Utc>,
    ) -> MemoryResult<Self> {
        if text.trim().is_empty() {
            return Err(MemoryError::Validation("memory text must not be empty".to_string()));
        }
        let hash = content_hash(&text);
        Ok(Self {
            id: Uuid::new_v4(),
            text,
            embedding,
            scope,
            metadata,
            hash,
            created_at: now,
            updated_at: now,
            state: MemoryState::Active,
        })
    }

    /// Apply a coherent text+embedding update (invariant 2): hash and
    /// embedding are recomputed atomically with the text from the caller's
    /// perspective.
    pub fn apply_text_update(&mut self, new_text: String, new_embedding: Vec<f32>, now: DateTime<Utc>) {
        self.hash = content_hash(&new_text);
        self.text = new_text;
        self.embedding = new_embedding;
        self.updated_at = now;
    }

    pub fn transition(&mut self, next: MemoryState, now: DateTime<Utc>) -> MemoryResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(MemoryError::InvalidStateTransition(format!(
                "{:?} -> {:?} is not a permitted transition",
                self.state, next
            )));
        }
        self.state = next;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope {
            user_id: Some("u1".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn rejects_empty_text() {
        let err = Memory::new(scope(), "   ".to_string(), vec![], Metadata::new(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, MemoryError::Validation(_)));
    }

    #[test]
    fn hash_is_stable_for_identical_trimmed_text() {
        assert_eq!(content_hash("loves pizza"), content_hash("  loves pizza  "));
    }

    #[test]
    fn text_update_recomputes_hash_and_embedding_together() {
        let mut m = Memory::new(scope(), "a".to_string(), vec![1.0], Metadata::new(), Utc::now()).unwrap();
        let old_hash = m.hash.clone();
        m.apply_text_update("b".to_string(), vec![2.0], Utc::now());
        assert_ne!(m.hash, old_hash);
        assert_eq!(m.hash, content_hash("b"));
        assert_eq!(m.embedding, vec![2.0]);
    }

    #[test]
    fn state_machine_permits_only_documented_edges() {
        let mut m = Memory::new(scope(), "a".to_string(), vec![], Metadata::new(), Utc::now()).unwrap();
        assert!(m.transition(MemoryState::Paused, Utc::now()).is_ok());
        assert!(m.transition(MemoryState::Active, Utc::now()).is_ok());
        assert!(m.transition(MemoryState::Archived, Utc::now()).is_ok());
        let err = m.transition(MemoryState::Active, Utc::now()).unwrap_err();
        assert!(matches!(err, MemoryError::InvalidStateTransition(_)));
    }

    #[test]
    fn deleted_is_terminal() {
        let mut m = Memory::new(scope(), "a".to_string(), vec![], Metadata::new(), Utc::now()).unwrap();
        m.transition(MemoryState::Deleted, Utc::now()).unwrap();
        let err = m.transition(MemoryState::Active, Utc::now()).unwrap_err();
        assert!(matches!(err, MemoryError::InvalidStateTransition(_)));
    }
}
