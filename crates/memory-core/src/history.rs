//! Append-only history log (§3, §4.E.5). Folding a memory's history from the
//! empty state reconstructs its current state (invariant 3 in §8).

use crate::memory::MemoryId;
use crate::scope::Scope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryOp {
    Add,
    Update,
    Delete,
}

/// One state transition of one memory. Never mutated after it is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub event_id: Uuid,
    pub memory_id: MemoryId,
    pub scope: Scope,
    pub op: HistoryOp,
    pub prev_text: Option<String>,
    pub new_text: Option<String>,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEvent {
    pub fn new(
        memory_id: MemoryId,
        scope: Scope,
        op: HistoryOp,
        prev_text: Option<String>,
        new_text: Option<String>,
        actor: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            memory_id,
            scope,
            op,
            prev_text,
            new_text,
            actor: actor.into(),
            timestamp,
        }
    }
}

/// Fold a history in chronological order into the final text of the memory,
/// or `None` if the last event is a `Delete`. Used by property tests (§8,
/// invariant 3) to check history replay independent of any store.
pub fn replay_final_text(events: &[HistoryEvent]) -> Option<String> {
    let mut current: Option<String> = None;
    for event in events {
        match event.op {
            HistoryOp::Add | HistoryOp::Update => current = event.new_text.clone(),
            HistoryOp::Delete => current = None,
        }
    }
    current
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
    fn replay_reconstructs_final_text() {
        let id = Uuid::new_v4();
        let events = vec![
            HistoryEvent::new(
                id,
                scope(),
                HistoryOp::Add,
                None,
                Some("loves pizza".to_string()),
                "engine",
                Utc::now(),
            ),
            HistoryEvent::new(
                id,
                scope(),
                HistoryOp::Update,
                Some("loves pizza".to_string()),
                Some("allergic to pepperoni".to_string()),
                "engine",
                Utc::now(),
            ),
        ];
        assert_eq!(
            replay_final_text(&events),
            Some("allergic to pepperoni".to_string())
        );
    }

    #[test]
    fn replay_after_delete_is_none() {
        let id = Uuid::new_v4();
        let events = vec![
            HistoryEvent::new(id, scope(), HistoryOp::Add, None, Some("x".to_string()), "engine", Utc::now()),
            HistoryEvent::new(id, scope(), HistoryOp::Delete, Some("x".to_string()), None, "engine", Utc::now()),
        ];
        assert_eq!(replay_final_text(&events), None);
    }
}
