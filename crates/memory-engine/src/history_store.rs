//! Append-only history log storage (§3, §4.E.5, §9: "replace with an
//! append-only log of plain records keyed by `(memory_id, timestamp)`;
//! reconstructions are folds, never pointer walks").

use async_trait::async_trait;
use memory_core::{HistoryEvent, MemoryId, MemoryResult, Scope};

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append one event. Never mutated after write (§3).
    async fn append(&self, event: HistoryEvent) -> MemoryResult<()>;

    /// All events for `id` in `scope`, chronological order.
    async fn list(&self, scope: &Scope, id: MemoryId) -> MemoryResult<Vec<HistoryEvent>>;
}

/// `dashmap`-backed append-only log for tests and small deployments,
/// grounded in the same cache-as-store-of-record idiom as
/// `InMemoryVectorStore`/`InMemoryGraphStore`.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    events: dashmap::DashMap<MemoryId, Vec<HistoryEvent>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, event: HistoryEvent) -> MemoryResult<()> {
        self.events.entry(event.memory_id).or_default().push(event);
        Ok(())
    }

    async fn list(&self, scope: &Scope, id: MemoryId) -> MemoryResult<Vec<HistoryEvent>> {
        Ok(self
            .events
            .get(&id)
            .map(|events| {
                events
                    .iter()
                    .filter(|e| e.scope.matches(scope))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Postgres-backed log, grounded in `database::vector_store`'s
/// pool-wrapping/`sqlx::query` style; partitioned by scope and indexed by
/// `(memory_id, timestamp)` per §6.3.
pub struct PostgresHistoryStore {
    pool: sqlx::PgPool,
}

impl PostgresHistoryStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

fn op_label(op: memory_core::HistoryOp) -> &'static str {
    match op {
        memory_core::HistoryOp::Add => "add",
        memory_core::HistoryOp::Update => "update",
        memory_core::HistoryOp::Delete => "delete",
    }
}

fn parse_op(label: &str) -> MemoryResult<memory_core::HistoryOp> {
    match label {
        "add" => Ok(memory_core::HistoryOp::Add),
        "update" => Ok(memory_core::HistoryOp::Update),
        "delete" => Ok(memory_core::HistoryOp::Delete),
        other => Err(memory_core::MemoryError::Other(format!("unknown history op: {other}"))),
    }
}

#[async_trait]
impl HistoryStore for PostgresHistoryStore {
    async fn append(&self, event: HistoryEvent) -> MemoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO memory_history (
                event_id, memory_id, org_id, project_id, user_id, agent_id, run_id, app_id,
                op, prev_text, new_text, actor, timestamp
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(event.event_id)
        .bind(event.memory_id)
        .bind(&event.scope.org_id)
        .bind(&event.scope.project_id)
        .bind(&event.scope.user_id)
        .bind(&event.scope.agent_id)
        .bind(&event.scope.run_id)
        .bind(&event.scope.app_id)
        .bind(op_label(event.op))
        .bind(&event.prev_text)
        .bind(&event.new_text)
        .bind(&event.actor)
        .bind(event.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| memory_core::MemoryError::Store(e.to_string()))?;
        Ok(())
    }

    async fn list(&self, scope: &Scope, id: MemoryId) -> MemoryResult<Vec<HistoryEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, memory_id, org_id, project_id, user_id, agent_id, run_id, app_id,
                   op, prev_text, new_text, actor, timestamp
            FROM memory_history
            WHERE memory_id = $1
              AND org_id IS NOT DISTINCT FROM $2 AND project_id IS NOT DISTINCT FROM $3
              AND user_id IS NOT DISTINCT FROM $4 AND agent_id IS NOT DISTINCT FROM $5
              AND run_id IS NOT DISTINCT FROM $6 AND app_id IS NOT DISTINCT FROM $7
            ORDER BY timestamp ASC
            "#,
        )
        .bind(id)
        .bind(&scope.org_id)
        .bind(&scope.project_id)
        .bind(&scope.user_id)
        .bind(&scope.agent_id)
        .bind(&scope.run_id)
        .bind(&scope.app_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| memory_core::MemoryError::Store(e.to_string()))?;

        use sqlx::Row;
        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let op_label: String = row.try_get("op").map_err(|e| memory_core::MemoryError::Store(e.to_string()))?;
            events.push(HistoryEvent {
                event_id: row.try_get("event_id").map_err(|e| memory_core::MemoryError::Store(e.to_string()))?,
                memory_id: row.try_get("memory_id").map_err(|e| memory_core::MemoryError::Store(e.to_string()))?,
                scope: Scope {
                    org_id: row.try_get("org_id").ok(),
                    project_id: row.try_get("project_id").ok(),
                    user_id: row.try_get("user_id").ok(),
                    agent_id: row.try_get("agent_id").ok(),
                    run_id: row.try_get("run_id").ok(),
                    app_id: row.try_get("app_id").ok(),
                },
                op: parse_op(&op_label)?,
                prev_text: row.try_get("prev_text").ok(),
                new_text: row.try_get("new_text").ok(),
                actor: row.try_get("actor").map_err(|e| memory_core::MemoryError::Store(e.to_string()))?,
                timestamp: row.try_get("timestamp").map_err(|e| memory_core::MemoryError::Store(e.to_string()))?,
            });
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn scope() -> Scope {
        Scope { user_id: Some("u1".to_string()), ..Default::default() }
    }

    #[tokio::test]
    async fn list_returns_events_in_append_order() {
        let store = InMemoryHistoryStore::new();
        let id = Uuid::new_v4();
        store
            .append(HistoryEvent::new(id, scope(), memory_core::HistoryOp::Add, None, Some("a".into()), "engine", Utc::now()))
            .await
            .unwrap();
        store
            .append(HistoryEvent::new(id, scope(), memory_core::HistoryOp::Update, Some("a".into()), Some("b".into()), "engine", Utc::now()))
            .await
            .unwrap();

        let events = store.list(&scope(), id).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(memory_core::replay_final_text(&events), Some("b".to_string()));
    }

    #[tokio::test]
    async fn list_never_crosses_scopes() {
        let store = InMemoryHistoryStore::new();
        let id = Uuid::new_v4();
        let other = Scope { user_id: Some("u2".to_string()), ..Default::default() };
        store
            .append(HistoryEvent::new(id, other, memory_core::HistoryOp::Add, None, Some("a".into()), "engine", Utc::now()))
            .await
            .unwrap();

        let events = store.list(&scope(), id).await.unwrap();
        assert!(events.is_empty());
    }
}
