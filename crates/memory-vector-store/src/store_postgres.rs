//! `PostgresVectorStore`: pgvector-backed implementation, grounded in
//! `database::vector_store::DatabaseVectorStore`'s pool-wrapping shape and
//! `sqlx::query`/`query_as` style. Embeddings are stored in a pgvector
//! `vector` column via the `pgvector` crate's `sqlx` integration, which the
//! teacher's own `agent-memory::embedding_integration` code implies
//! (`embedding <=> $1`) without the retrieved pack declaring the crate
//! explicitly — added here as the standard real-world way to bind
//! `Vec<f32>` to that column type (see `DESIGN.md`).

use crate::{DistanceMetric, MemoryPatch, Paging, SearchFilters, VectorStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use memory_core::{content_hash, Memory, MemoryId, MemoryError, MemoryResult, MemoryState, Metadata, Scope};
use pgvector::Vector;
use sqlx::{FromRow, PgPool, Row};
use tracing::{debug, error, instrument};
use uuid::Uuid;

/// Row shape of the `memories` table (§6.3).
#[derive(FromRow)]
struct MemoryRow {
    id: Uuid,
    text: String,
    embedding: Vector,
    org_id: Option<String>,
    project_id: Option<String>,
    user_id: Option<String>,
    agent_id: Option<String>,
    run_id: Option<String>,
    app_id: Option<String>,
    metadata: serde_json::Value,
    hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    state: String,
}

impl MemoryRow {
    fn scope(&self) -> Scope {
        Scope {
            org_id: self.org_id.clone(),
            project_id: self.project_id.clone(),
            user_id: self.user_id.clone(),
            agent_id: self.agent_id.clone(),
            run_id: self.run_id.clone(),
            app_id: self.app_id.clone(),
        }
    }

    fn into_memory(self) -> MemoryResult<Memory> {
        let state = parse_state(&self.state)?;
        let metadata: Metadata = serde_json::from_value(self.metadata)?;
        Ok(Memory {
            id: self.id,
            text: self.text,
            embedding: self.embedding.to_vec(),
            scope: self.scope(),
            metadata,
            hash: self.hash,
            created_at: self.created_at,
            updated_at: self.updated_at,
            state,
        })
    }
}

fn state_label(state: MemoryState) -> &'static str {
    match state {
        MemoryState::Active => "active",
        MemoryState::Paused => "paused",
        MemoryState::Archived => "archived",
        MemoryState::Deleted => "deleted",
    }
}

fn parse_state(label: &str) -> MemoryResult<MemoryState> {
    match label {
        "active" => Ok(MemoryState::Active),
        "paused" => Ok(MemoryState::Paused),
        "archived" => Ok(MemoryState::Archived),
        "deleted" => Ok(MemoryState::Deleted),
        other => Err(MemoryError::Other(format!("unknown memory state in store: {other}"))),
    }
}

pub struct PostgresVectorStore {
    pool: PgPool,
    metric: DistanceMetric,
}

impl PostgresVectorStore {
    pub fn new(pool: PgPool, metric: DistanceMetric) -> Self {
        Self { pool, metric }
    }

    /// Mirrors `DatabaseVectorStore::verify_pgvector`: checks the extension
    /// is enabled before the service accepts traffic.
    pub async fn verify_pgvector(&self) -> MemoryResult<bool> {
        let enabled: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_extension WHERE extname = 'vector')")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MemoryError::Store(e.to_string()))?;
        if enabled {
            debug!("pgvector extension is enabled");
        } else {
            error!("pgvector extension is not enabled");
        }
        Ok(enabled)
    }
}

fn distance_operator(metric: DistanceMetric) -> &'static str {
    match metric {
        DistanceMetric::Cosine => "<=>",
        DistanceMetric::InnerProduct => "<#>",
    }
}

#[async_trait]
impl VectorStore for PostgresVectorStore {
    #[instrument(skip(self, memory), fields(id = %memory.id))]
    async fn insert(&self, memory: Memory) -> MemoryResult<()> {
        let vector = Vector::from(memory.embedding.clone());
        let metadata = serde_json::to_value(&memory.metadata)?;
        sqlx::query(
            r#"
            INSERT INTO memories (
                id, text, embedding, org_id, project_id, user_id, agent_id, run_id, app_id,
                metadata, hash, created_at, updated_at, state
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (id) DO UPDATE SET
                text = EXCLUDED.text,
                embedding = EXCLUDED.embedding,
                metadata = EXCLUDED.metadata,
                hash = EXCLUDED.hash,
                updated_at = EXCLUDED.updated_at,
                state = EXCLUDED.state
            "#,
        )
        .bind(memory.id)
        .bind(&memory.text)
        .bind(vector)
        .bind(&memory.scope.org_id)
        .bind(&memory.scope.project_id)
        .bind(&memory.scope.user_id)
        .bind(&memory.scope.agent_id)
        .bind(&memory.scope.run_id)
        .bind(&memory.scope.app_id)
        .bind(metadata)
        .bind(&memory.hash)
        .bind(memory.created_at)
        .bind(memory.updated_at)
        .bind(state_label(memory.state))
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Store(e.to_string()))?;

        debug!("inserted memory");
        Ok(())
    }

    #[instrument(skip(self, patch), fields(%id))]
    async fn update(&self, scope: &Scope, id: MemoryId, patch: MemoryPatch) -> MemoryResult<Memory> {
        let mut current = self.get(scope, id).await?;
        let now = Utc::now();

        match (patch.text.clone(), patch.embedding.clone()) {
            (Some(text), Some(embedding)) => current.apply_text_update(text, embedding, now),
            (None, None) => {}
            _ => {
                return Err(MemoryError::Validation(
                    "text and embedding must be updated together (invariant 2)".to_string(),
                ))
            }
        }
        if let Some(metadata) = patch.metadata {
            current.metadata = metadata;
            current.updated_at = now;
        }
        if let Some(state) = patch.state {
            current.state = state;
            current.updated_at = now;
        }

        let vector = Vector::from(current.embedding.clone());
        let metadata = serde_json::to_value(&current.metadata)?;
        sqlx::query(
            r#"
            UPDATE memories SET
                text = $1, embedding = $2, metadata = $3, hash = $4, updated_at = $5, state = $7
            WHERE id = $6
            "#,
        )
        .bind(&current.text)
        .bind(vector)
        .bind(metadata)
        .bind(&current.hash)
        .bind(current.updated_at)
        .bind(id)
        .bind(state_label(current.state))
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Store(e.to_string()))?;

        Ok(current)
    }

    #[instrument(skip(self), fields(%id))]
    async fn delete(&self, scope: &Scope, id: MemoryId) -> MemoryResult<()> {
        self.get(scope, id).await?;
        sqlx::query("DELETE FROM memories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::Store(e.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self), fields(%id))]
    async fn get(&self, scope: &Scope, id: MemoryId) -> MemoryResult<Memory> {
        let row: Option<MemoryRow> = sqlx::query_as("SELECT * FROM memories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MemoryError::Store(e.to_string()))?;

        let row = row.ok_or_else(|| MemoryError::NotFound(id.to_string()))?;
        if !row.scope().matches(scope) {
            return Err(MemoryError::NotFound(id.to_string()));
        }
        row.into_memory()
    }

    #[instrument(skip(self, query_vector, filters), fields(k))]
    async fn search(
        &self,
        scope: &Scope,
        query_vector: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> MemoryResult<Vec<(Memory, f32)>> {
        if k == 0 || *scope == Scope::default() {
            return Ok(Vec::new());
        }

        let op = distance_operator(self.metric);
        let state_clause = if filters.include_state { "" } else { "AND state = 'active'" };
        let sql = format!(
            r#"
            SELECT *, (embedding {op} $1) AS distance
            FROM memories
            WHERE org_id IS NOT DISTINCT FROM $2
              AND project_id IS NOT DISTINCT FROM $3
              AND user_id IS NOT DISTINCT FROM $4
              AND agent_id IS NOT DISTINCT FROM $5
              AND run_id IS NOT DISTINCT FROM $6
              AND app_id IS NOT DISTINCT FROM $7
              {state_clause}
            ORDER BY embedding {op} $1
            LIMIT $8
            "#
        );

        let vector = Vector::from(query_vector.to_vec());
        let rows = sqlx::query(&sql)
            .bind(vector)
            .bind(&scope.org_id)
            .bind(&scope.project_id)
            .bind(&scope.user_id)
            .bind(&scope.agent_id)
            .bind(&scope.run_id)
            .bind(&scope.app_id)
            .bind(k as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MemoryError::Store(e.to_string()))?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let memory_row = MemoryRow::from_row(&row).map_err(|e| MemoryError::Store(e.to_string()))?;
            let distance: f64 = row.try_get("distance").map_err(|e| MemoryError::Store(e.to_string()))?;
            let memory = memory_row.into_memory()?;
            if !filters.matches(&memory.metadata) {
                continue;
            }
            let score = match self.metric {
                DistanceMetric::Cosine => 1.0 - distance as f32,
                DistanceMetric::InnerProduct => -(distance as f32),
            };
            results.push((memory, score));
        }
        Ok(results)
    }

    #[instrument(skip(self, filters))]
    async fn list(&self, scope: &Scope, filters: &SearchFilters, paging: Paging) -> MemoryResult<Vec<Memory>> {
        if *scope == Scope::default() {
            return Ok(Vec::new());
        }
        let state_clause = if filters.include_state { "" } else { "AND state = 'active'" };
        let limit = if paging.limit == 0 { i64::MAX } else { paging.limit as i64 };
        let sql = format!(
            r#"
            SELECT * FROM memories
            WHERE org_id IS NOT DISTINCT FROM $1
              AND project_id IS NOT DISTINCT FROM $2
              AND user_id IS NOT DISTINCT FROM $3
              AND agent_id IS NOT DISTINCT FROM $4
              AND run_id IS NOT DISTINCT FROM $5
              AND app_id IS NOT DISTINCT FROM $6
              {state_clause}
            ORDER BY created_at DESC, id ASC
            LIMIT $7 OFFSET $8
            "#
        );

        let rows: Vec<MemoryRow> = sqlx::query_as(&sql)
            .bind(&scope.org_id)
            .bind(&scope.project_id)
            .bind(&scope.user_id)
            .bind(&scope.agent_id)
            .bind(&scope.run_id)
            .bind(&scope.app_id)
            .bind(limit)
            .bind(paging.offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MemoryError::Store(e.to_string()))?;

        rows.into_iter()
            .map(MemoryRow::into_memory)
            .filter(|m| m.as_ref().map(|m| filters.matches(&m.metadata)).unwrap_or(true))
            .collect()
    }
}
