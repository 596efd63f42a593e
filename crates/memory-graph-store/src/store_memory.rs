//! `InMemoryGraphStore`: a `dashmap`-backed adjacency-map implementation for
//! tests, grounded in `agent-memory::graph_engine::KnowledgeGraphEngine`'s
//! cache shape (`entity_cache`/`relationship_cache`) but made the store of
//! record instead of a read-through cache in front of Postgres.

use crate::normalize::normalize;
use crate::{Entity, GraphStore, Neighborhood, Relationship, MAX_NEIGHBORHOOD_DEPTH};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use memory_core::{MemoryResult, Scope};
use std::collections::HashSet;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct EntityKey(String, String);

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct EdgeKey(String, String, String, String);

fn scope_key(scope: &Scope) -> String {
    scope.collection_key()
}

/// Adjacency-map graph store: entities keyed by `(scope, name)`,
/// relationships keyed by `(scope, source, predicate, target)`.
#[derive(Default)]
pub struct InMemoryGraphStore {
    entities: DashMap<EntityKey, Entity>,
    relationships: DashMap<EdgeKey, Relationship>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entity_key(scope: &Scope, name: &str) -> EntityKey {
        EntityKey(scope_key(scope), normalize(name))
    }

    fn edge_key(scope: &Scope, source: &str, predicate: &str, target: &str) -> EdgeKey {
        EdgeKey(
            scope_key(scope),
            normalize(source),
            normalize(predicate),
            normalize(target),
        )
    }

    fn lexical_score(query: &str, name: &str) -> f32 {
        let query_tokens: HashSet<&str> = query.split_whitespace().collect();
        let name_tokens: HashSet<&str> = name.split('_').collect();
        if query_tokens.is_empty() || name_tokens.is_empty() {
            return 0.0;
        }
        let overlap = query_tokens.intersection(&name_tokens).count();
        overlap as f32 / name_tokens.len() as f32
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn upsert_entity(&self, scope: &Scope, name: &str, entity_type: &str) -> MemoryResult<Entity> {
        let key = Self::entity_key(scope, name);
        let normalized_name = key.1.clone();
        let entity = self
            .entities
            .entry(key)
            .or_insert_with(|| Entity {
                name: normalized_name,
                entity_type: entity_type.to_string(),
                scope: scope.clone(),
                created_at: Utc::now(),
            })
            .clone();
        Ok(entity)
    }

    async fn upsert_relationship(
        &self,
        scope: &Scope,
        source_name: &str,
        predicate: &str,
        target_name: &str,
    ) -> MemoryResult<Relationship> {
        self.upsert_entity(scope, source_name, "unknown").await?;
        self.upsert_entity(scope, target_name, "unknown").await?;

        let key = Self::edge_key(scope, source_name, predicate, target_name);
        let relationship = self
            .relationships
            .entry(key.clone())
            .or_insert_with(|| Relationship {
                source: key.1.clone(),
                predicate: key.2.clone(),
                target: key.3.clone(),
                scope: scope.clone(),
                created_at: Utc::now(),
            })
            .clone();
        Ok(relationship)
    }

    async fn delete_entity(&self, scope: &Scope, name: &str) -> MemoryResult<()> {
        let key = Self::entity_key(scope, name);
        self.entities.remove(&key);
        self.relationships
            .retain(|edge_key, _| !(edge_key.0 == key.0 && (edge_key.1 == key.1 || edge_key.3 == key.1)));
        Ok(())
    }

    async fn delete_relationship(
        &self,
        scope: &Scope,
        source: &str,
        predicate: &str,
        target: &str,
    ) -> MemoryResult<()> {
        let key = Self::edge_key(scope, source, predicate, target);
        self.relationships.remove(&key);
        Ok(())
    }

    async fn neighborhood(&self, scope: &Scope, seeds: &[String], depth: usize) -> MemoryResult<Neighborhood> {
        let depth = depth.min(MAX_NEIGHBORHOOD_DEPTH);
        let scope_k = scope_key(scope);
        let mut frontier: HashSet<String> = seeds.iter().map(|s| normalize(s)).collect();
        let mut visited_entities: HashSet<String> = frontier.clone();
        let mut visited_edges: HashSet<EdgeKey> = HashSet::new();

        for _ in 0..depth {
            let mut next_frontier = HashSet::new();
            for edge in self.relationships.iter() {
                if edge.key().0 != scope_k {
                    continue;
                }
                let (source, target) = (&edge.key().1, &edge.key().3);
                let touches = frontier.contains(source) || frontier.contains(target);
                if !touches {
                    continue;
                }
                visited_edges.insert(edge.key().clone());
                if !visited_entities.contains(source) {
                    next_frontier.insert(source.clone());
                }
                if !visited_entities.contains(target) {
                    next_frontier.insert(target.clone());
                }
            }
            visited_entities.extend(next_frontier.iter().cloned());
            frontier = next_frontier;
            if frontier.is_empty() {
                break;
            }
        }

        let entities = self
            .entities
            .iter()
            .filter(|e| e.key().0 == scope_k && visited_entities.contains(&e.key().1))
            .map(|e| e.value().clone())
            .collect();
        let relationships = visited_edges
            .iter()
            .filter_map(|key| self.relationships.get(key).map(|r| r.value().clone()))
            .collect();

        Ok(Neighborhood { entities, relationships })
    }

    async fn search_by_text(&self, scope: &Scope, text: &str, k: usize) -> MemoryResult<Vec<Entity>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let scope_k = scope_key(scope);
        let query = normalize(text).replace('_', " ");

        let mut scored: Vec<(Entity, f32)> = self
            .entities
            .iter()
            .filter(|e| e.key().0 == scope_k)
            .map(|e| {
                let score = Self::lexical_score(&query, &e.key().1);
                (e.value().clone(), score)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.created_at.cmp(&a.0.created_at))
        });
        scored.truncate(k);
        Ok(scored.into_iter().map(|(e, _)| e).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope { user_id: Some("u1".to_string()), ..Default::default() }
    }

    fn other_scope() -> Scope {
        Scope { user_id: Some("u2".to_string()), ..Default::default() }
    }

    #[tokio::test]
    async fn upsert_relationship_is_idempotent() {
        let store = InMemoryGraphStore::new();
        store.upsert_relationship(&scope(), "John", "Works At", "TechCorp").await.unwrap();
        store.upsert_relationship(&scope(), "John", "Works At", "TechCorp").await.unwrap();

        let neighborhood = store.neighborhood(&scope(), &["john".to_string()], 1).await.unwrap();
        assert_eq!(neighborhood.relationships.len(), 1);
    }

    #[tokio::test]
    async fn upsert_relationship_creates_both_endpoints() {
        let store = InMemoryGraphStore::new();
        store.upsert_relationship(&scope(), "John", "works_at", "TechCorp").await.unwrap();

        let neighborhood = store.neighborhood(&scope(), &["john".to_string()], 1).await.unwrap();
        let names: HashSet<_> = neighborhood.entities.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains("john"));
        assert!(names.contains("techcorp"));
    }

    #[tokio::test]
    async fn delete_entity_cascades_to_edges() {
        let store = InMemoryGraphStore::new();
        store.upsert_relationship(&scope(), "John", "works_at", "TechCorp").await.unwrap();
        store.delete_entity(&scope(), "John").await.unwrap();

        let neighborhood = store.neighborhood(&scope(), &["techcorp".to_string()], 1).await.unwrap();
        assert!(neighborhood.relationships.is_empty());
    }

    #[tokio::test]
    async fn neighborhood_never_crosses_scopes() {
        let store = InMemoryGraphStore::new();
        store.upsert_relationship(&scope(), "John", "works_at", "TechCorp").await.unwrap();
        store.upsert_relationship(&other_scope(), "Jane", "works_at", "OtherCorp").await.unwrap();

        let neighborhood = store.neighborhood(&scope(), &["john".to_string()], 2).await.unwrap();
        let names: HashSet<_> = neighborhood.entities.iter().map(|e| e.name.as_str()).collect();
        assert!(!names.contains("jane"));
        assert!(!names.contains("othercorp"));
    }

    #[tokio::test]
    async fn neighborhood_depth_is_clamped() {
        let store = InMemoryGraphStore::new();
        store.upsert_relationship(&scope(), "a", "rel", "b").await.unwrap();
        store.upsert_relationship(&scope(), "b", "rel", "c").await.unwrap();
        store.upsert_relationship(&scope(), "c", "rel", "d").await.unwrap();
        store.upsert_relationship(&scope(), "d", "rel", "e").await.unwrap();

        let neighborhood = store.neighborhood(&scope(), &["a".to_string()], 10).await.unwrap();
        let names: HashSet<_> = neighborhood.entities.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains("c"));
        assert!(!names.contains("e"));
    }

    #[tokio::test]
    async fn search_by_text_tie_breaks_by_recency() {
        let store = InMemoryGraphStore::new();
        store.upsert_entity(&scope(), "rust", "technology").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        store.upsert_entity(&scope(), "rust lang", "technology").await.unwrap();

        let results = store.search_by_text(&scope(), "rust", 5).await.unwrap();
        assert_eq!(results[0].name, "rust_lang");
    }

    #[tokio::test]
    async fn search_by_text_k_zero_returns_empty() {
        let store = InMemoryGraphStore::new();
        store.upsert_entity(&scope(), "rust", "technology").await.unwrap();
        let results = store.search_by_text(&scope(), "rust", 0).await.unwrap();
        assert!(results.is_empty());
    }
}
