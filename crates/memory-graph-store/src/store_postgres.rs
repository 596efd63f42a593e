//! `PostgresGraphStore`: rows in `knowledge_graph_entities` /
//! `knowledge_graph_relationships` scoped by denormalized scope columns,
//! grounded in `agent-memory::graph_engine::KnowledgeGraphEngine`'s
//! check-existence-then-`UPDATE`-or-`INSERT` upsert pattern and
//! `sqlx::query`/`query_as` style.

use crate::normalize::normalize;
use crate::{Entity, GraphStore, Neighborhood, Relationship, MAX_NEIGHBORHOOD_DEPTH};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use memory_core::{MemoryError, MemoryResult, Scope};
use sqlx::{FromRow, PgPool};
use std::collections::HashSet;
use tracing::{debug, instrument};

#[derive(FromRow)]
struct EntityRow {
    name: String,
    entity_type: String,
    org_id: Option<String>,
    project_id: Option<String>,
    user_id: Option<String>,
    agent_id: Option<String>,
    run_id: Option<String>,
    app_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl EntityRow {
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

    fn into_entity(self) -> Entity {
        Entity {
            name: self.name.clone(),
            entity_type: self.entity_type.clone(),
            scope: self.scope(),
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct RelationshipRow {
    source_entity: String,
    predicate: String,
    target_entity: String,
    org_id: Option<String>,
    project_id: Option<String>,
    user_id: Option<String>,
    agent_id: Option<String>,
    run_id: Option<String>,
    app_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl RelationshipRow {
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

    fn into_relationship(self) -> Relationship {
        Relationship {
            source: self.source_entity.clone(),
            predicate: self.predicate.clone(),
            target: self.target_entity.clone(),
            scope: self.scope(),
            created_at: self.created_at,
        }
    }
}

pub struct PostgresGraphStore {
    pool: PgPool,
}

impl PostgresGraphStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GraphStore for PostgresGraphStore {
    #[instrument(skip(self), fields(name))]
    async fn upsert_entity(&self, scope: &Scope, name: &str, entity_type: &str) -> MemoryResult<Entity> {
        let normalized = normalize(name);
        let existing: Option<EntityRow> = sqlx::query_as(
            r#"
            SELECT * FROM knowledge_graph_entities
            WHERE name = $1
              AND org_id IS NOT DISTINCT FROM $2 AND project_id IS NOT DISTINCT FROM $3
              AND user_id IS NOT DISTINCT FROM $4 AND agent_id IS NOT DISTINCT FROM $5
              AND run_id IS NOT DISTINCT FROM $6 AND app_id IS NOT DISTINCT FROM $7
            "#,
        )
        .bind(&normalized)
        .bind(&scope.org_id)
        .bind(&scope.project_id)
        .bind(&scope.user_id)
        .bind(&scope.agent_id)
        .bind(&scope.run_id)
        .bind(&scope.app_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MemoryError::Store(e.to_string()))?;

        if let Some(row) = existing {
            debug!("entity already present");
            return Ok(row.into_entity());
        }

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO knowledge_graph_entities
                (name, entity_type, org_id, project_id, user_id, agent_id, run_id, app_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&normalized)
        .bind(entity_type)
        .bind(&scope.org_id)
        .bind(&scope.project_id)
        .bind(&scope.user_id)
        .bind(&scope.agent_id)
        .bind(&scope.run_id)
        .bind(&scope.app_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Store(e.to_string()))?;

        Ok(Entity {
            name: normalized,
            entity_type: entity_type.to_string(),
            scope: scope.clone(),
            created_at: now,
        })
    }

    #[instrument(skip(self))]
    async fn upsert_relationship(
        &self,
        scope: &Scope,
        source_name: &str,
        predicate: &str,
        target_name: &str,
    ) -> MemoryResult<Relationship> {
        self.upsert_entity(scope, source_name, "unknown").await?;
        self.upsert_entity(scope, target_name, "unknown").await?;

        let source = normalize(source_name);
        let pred = normalize(predicate);
        let target = normalize(target_name);

        let existing: Option<RelationshipRow> = sqlx::query_as(
            r#"
            SELECT * FROM knowledge_graph_relationships
            WHERE source_entity = $1 AND predicate = $2 AND target_entity = $3
              AND org_id IS NOT DISTINCT FROM $4 AND project_id IS NOT DISTINCT FROM $5
              AND user_id IS NOT DISTINCT FROM $6 AND agent_id IS NOT DISTINCT FROM $7
              AND run_id IS NOT DISTINCT FROM $8 AND app_id IS NOT DISTINCT FROM $9
            "#,
        )
        .bind(&source)
        .bind(&pred)
        .bind(&target)
        .bind(&scope.org_id)
        .bind(&scope.project_id)
        .bind(&scope.user_id)
        .bind(&scope.agent_id)
        .bind(&scope.run_id)
        .bind(&scope.app_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MemoryError::Store(e.to_string()))?;

        if let Some(row) = existing {
            return Ok(row.into_relationship());
        }

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO knowledge_graph_relationships
                (source_entity, predicate, target_entity, org_id, project_id, user_id, agent_id, run_id, app_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&source)
        .bind(&pred)
        .bind(&target)
        .bind(&scope.org_id)
        .bind(&scope.project_id)
        .bind(&scope.user_id)
        .bind(&scope.agent_id)
        .bind(&scope.run_id)
        .bind(&scope.app_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Store(e.to_string()))?;

        Ok(Relationship { source, predicate: pred, target, scope: scope.clone(), created_at: now })
    }

    #[instrument(skip(self))]
    async fn delete_entity(&self, scope: &Scope, name: &str) -> MemoryResult<()> {
        let normalized = normalize(name);
        sqlx::query(
            r#"
            DELETE FROM knowledge_graph_relationships
            WHERE (source_entity = $1 OR target_entity = $1)
              AND org_id IS NOT DISTINCT FROM $2 AND project_id IS NOT DISTINCT FROM $3
              AND user_id IS NOT DISTINCT FROM $4 AND agent_id IS NOT DISTINCT FROM $5
              AND run_id IS NOT DISTINCT FROM $6 AND app_id IS NOT DISTINCT FROM $7
            "#,
        )
        .bind(&normalized)
        .bind(&scope.org_id)
        .bind(&scope.project_id)
        .bind(&scope.user_id)
        .bind(&scope.agent_id)
        .bind(&scope.run_id)
        .bind(&scope.app_id)
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Store(e.to_string()))?;

        sqlx::query(
            r#"
            DELETE FROM knowledge_graph_entities
            WHERE name = $1
              AND org_id IS NOT DISTINCT FROM $2 AND project_id IS NOT DISTINCT FROM $3
              AND user_id IS NOT DISTINCT FROM $4 AND agent_id IS NOT DISTINCT FROM $5
              AND run_id IS NOT DISTINCT FROM $6 AND app_id IS NOT DISTINCT FROM $7
            "#,
        )
        .bind(&normalized)
        .bind(&scope.org_id)
        .bind(&scope.project_id)
        .bind(&scope.user_id)
        .bind(&scope.agent_id)
        .bind(&scope.run_id)
        .bind(&scope.app_id)
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Store(e.to_string()))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_relationship(
        &self,
        scope: &Scope,
        source: &str,
        predicate: &str,
        target: &str,
    ) -> MemoryResult<()> {
        sqlx::query(
            r#"
            DELETE FROM knowledge_graph_relationships
            WHERE source_entity = $1 AND predicate = $2 AND target_entity = $3
              AND org_id IS NOT DISTINCT FROM $4 AND project_id IS NOT DISTINCT FROM $5
              AND user_id IS NOT DISTINCT FROM $6 AND agent_id IS NOT DISTINCT FROM $7
              AND run_id IS NOT DISTINCT FROM $8 AND app_id IS NOT DISTINCT FROM $9
            "#,
        )
        .bind(normalize(source))
        .bind(normalize(predicate))
        .bind(normalize(target))
        .bind(&scope.org_id)
        .bind(&scope.project_id)
        .bind(&scope.user_id)
        .bind(&scope.agent_id)
        .bind(&scope.run_id)
        .bind(&scope.app_id)
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Store(e.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self, seeds))]
    async fn neighborhood(&self, scope: &Scope, seeds: &[String], depth: usize) -> MemoryResult<Neighborhood> {
        let depth = depth.min(MAX_NEIGHBORHOOD_DEPTH);
        let mut visited_entities: HashSet<String> = seeds.iter().map(|s| normalize(s)).collect();
        let mut visited_edges: Vec<RelationshipRow> = Vec::new();
        let mut frontier = visited_entities.clone();

        for _ in 0..depth {
            if frontier.is_empty() {
                break;
            }
            let names: Vec<String> = frontier.into_iter().collect();
            let rows: Vec<RelationshipRow> = sqlx::query_as(
                r#"
                SELECT * FROM knowledge_graph_relationships
                WHERE (source_entity = ANY($1) OR target_entity = ANY($1))
                  AND org_id IS NOT DISTINCT FROM $2 AND project_id IS NOT DISTINCT FROM $3
                  AND user_id IS NOT DISTINCT FROM $4 AND agent_id IS NOT DISTINCT FROM $5
                  AND run_id IS NOT DISTINCT FROM $6 AND app_id IS NOT DISTINCT FROM $7
                "#,
            )
            .bind(&names)
            .bind(&scope.org_id)
            .bind(&scope.project_id)
            .bind(&scope.user_id)
            .bind(&scope.agent_id)
            .bind(&scope.run_id)
            .bind(&scope.app_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MemoryError::Store(e.to_string()))?;

            let mut next_frontier = HashSet::new();
            for row in rows {
                if !visited_entities.contains(&row.source_entity) {
                    next_frontier.insert(row.source_entity.clone());
                }
                if !visited_entities.contains(&row.target_entity) {
                    next_frontier.insert(row.target_entity.clone());
                }
                visited_edges.push(row);
            }
            visited_entities.extend(next_frontier.iter().cloned());
            frontier = next_frontier;
        }

        let names: Vec<String> = visited_entities.into_iter().collect();
        let entity_rows: Vec<EntityRow> = sqlx::query_as(
            r#"
            SELECT * FROM knowledge_graph_entities
            WHERE name = ANY($1)
              AND org_id IS NOT DISTINCT FROM $2 AND project_id IS NOT DISTINCT FROM $3
              AND user_id IS NOT DISTINCT FROM $4 AND agent_id IS NOT DISTINCT FROM $5
              AND run_id IS NOT DISTINCT FROM $6 AND app_id IS NOT DISTINCT FROM $7
            "#,
        )
        .bind(&names)
        .bind(&scope.org_id)
        .bind(&scope.project_id)
        .bind(&scope.user_id)
        .bind(&scope.agent_id)
        .bind(&scope.run_id)
        .bind(&scope.app_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MemoryError::Store(e.to_string()))?;

        Ok(Neighborhood {
            entities: entity_rows.into_iter().map(EntityRow::into_entity).collect(),
            relationships: visited_edges.into_iter().map(RelationshipRow::into_relationship).collect(),
        })
    }

    #[instrument(skip(self, text))]
    async fn search_by_text(&self, scope: &Scope, text: &str, k: usize) -> MemoryResult<Vec<Entity>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let pattern = format!("%{}%", normalize(text).replace('_', "%"));
        let rows: Vec<EntityRow> = sqlx::query_as(
            r#"
            SELECT * FROM knowledge_graph_entities
            WHERE name LIKE $1
              AND org_id IS NOT DISTINCT FROM $2 AND project_id IS NOT DISTINCT FROM $3
              AND user_id IS NOT DISTINCT FROM $4 AND agent_id IS NOT DISTINCT FROM $5
              AND run_id IS NOT DISTINCT FROM $6 AND app_id IS NOT DISTINCT FROM $7
            ORDER BY created_at DESC
            LIMIT $8
            "#,
        )
        .bind(&pattern)
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

        Ok(rows.into_iter().map(EntityRow::into_entity).collect())
    }
}
