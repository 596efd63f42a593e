//! `InMemoryVectorStore`: a `dashmap`-backed implementation for unit tests
//! and deployments too small to run Postgres, grounded in
//! `agent-memory::embedding_integration`'s store-then-score pattern but
//! scoring in-process via [`crate::similarity`] instead of a SQL operator.

use crate::{DistanceMetric, MemoryPatch, Paging, SearchFilters, VectorStore};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use memory_core::{Memory, MemoryId, MemoryError, MemoryResult, MemoryState, Scope};
use tokio::sync::Mutex;
use std::sync::Arc;

/// Per-memory-ID write latch keeps concurrent writes to the same id
/// serialized (§4.C guarantee) without a single global lock.
pub struct InMemoryVectorStore {
    rows: DashMap<MemoryId, Memory>,
    latches: DashMap<MemoryId, Arc<Mutex<()>>>,
    metric: DistanceMetric,
}

impl InMemoryVectorStore {
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            rows: DashMap::new(),
            latches: DashMap::new(),
            metric,
        }
    }

    fn latch(&self, id: MemoryId) -> Arc<Mutex<()>> {
        self.latches.entry(id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    fn get_in_scope(&self, scope: &Scope, id: MemoryId) -> MemoryResult<Memory> {
        self.rows
            .get(&id)
            .filter(|m| m.scope.matches(scope))
            .map(|m| m.clone())
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new(DistanceMetric::Cosine)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn insert(&self, memory: Memory) -> MemoryResult<()> {
        let latch = self.latch(memory.id);
        let _guard = latch.lock().await;
        self.rows.insert(memory.id, memory);
        Ok(())
    }

    async fn update(&self, scope: &Scope, id: MemoryId, patch: MemoryPatch) -> MemoryResult<Memory> {
        let latch = self.latch(id);
        let _guard = latch.lock().await;

        let mut entry = self
            .rows
            .get_mut(&id)
            .filter(|m| m.scope.matches(scope))
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))?;

        let now = Utc::now();
        if let (Some(text), Some(embedding)) = (patch.text.clone(), patch.embedding.clone()) {
            entry.apply_text_update(text, embedding, now);
        } else if patch.text.is_some() || patch.embedding.is_some() {
            return Err(MemoryError::Validation(
                "text and embedding must be updated together (invariant 2)".to_string(),
            ));
        }
        if let Some(metadata) = patch.metadata {
            entry.metadata = metadata;
            entry.updated_at = now;
        }
        if let Some(state) = patch.state {
            entry.state = state;
            entry.updated_at = now;
        }
        Ok(entry.clone())
    }

    async fn delete(&self, scope: &Scope, id: MemoryId) -> MemoryResult<()> {
        let latch = self.latch(id);
        let _guard = latch.lock().await;
        self.get_in_scope(scope, id)?;
        self.rows.remove(&id);
        Ok(())
    }

    async fn get(&self, scope: &Scope, id: MemoryId) -> MemoryResult<Memory> {
        self.get_in_scope(scope, id)
    }

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

        let mut scored: Vec<(Memory, f32)> = self
            .rows
            .iter()
            .filter(|entry| entry.scope.matches(scope))
            .filter(|entry| filters.include_state || entry.state == MemoryState::Active)
            .filter(|entry| filters.matches(&entry.metadata))
            .map(|entry| {
                let score = self.metric.score(query_vector, &entry.embedding);
                (entry.clone(), score)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.created_at.cmp(&a.0.created_at))
                .then_with(|| a.0.id.cmp(&b.0.id))
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn list(&self, scope: &Scope, filters: &SearchFilters, paging: Paging) -> MemoryResult<Vec<Memory>> {
        if *scope == Scope::default() {
            return Ok(Vec::new());
        }

        let mut rows: Vec<Memory> = self
            .rows
            .iter()
            .filter(|entry| entry.scope.matches(scope))
            .filter(|entry| filters.include_state || entry.state == MemoryState::Active)
            .filter(|entry| filters.matches(&entry.metadata))
            .map(|entry| entry.clone())
            .collect();

        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        let limit = if paging.limit == 0 { rows.len() } else { paging.limit };
        Ok(rows.into_iter().skip(paging.offset).take(limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_core::Metadata;

    fn scope() -> Scope {
        Scope { user_id: Some("u1".to_string()), ..Default::default() }
    }

    fn other_scope() -> Scope {
        Scope { user_id: Some("u2".to_string()), ..Default::default() }
    }

    fn memory(scope: Scope, text: &str, embedding: Vec<f32>) -> Memory {
        Memory::new(scope, text.to_string(), embedding, Metadata::new(), Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn search_with_k_zero_returns_empty() {
        let store = InMemoryVectorStore::default();
        store.insert(memory(scope(), "a", vec![1.0, 0.0])).await.unwrap();
        let results = store.search(&scope(), &[1.0, 0.0], 0, &SearchFilters::default()).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn search_in_empty_scope_returns_empty() {
        let store = InMemoryVectorStore::default();
        store.insert(memory(scope(), "a", vec![1.0, 0.0])).await.unwrap();
        let results = store
            .search(&Scope::default(), &[1.0, 0.0], 5, &SearchFilters::default())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn search_never_crosses_scopes() {
        let store = InMemoryVectorStore::default();
        store.insert(memory(scope(), "mine", vec![1.0, 0.0])).await.unwrap();
        store.insert(memory(other_scope(), "theirs", vec![1.0, 0.0])).await.unwrap();

        let results = store.search(&scope(), &[1.0, 0.0], 10, &SearchFilters::default()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.text, "mine");
    }

    #[tokio::test]
    async fn non_active_memories_excluded_unless_opted_in() {
        let store = InMemoryVectorStore::default();
        let mut m = memory(scope(), "paused one", vec![1.0, 0.0]);
        m.transition(MemoryState::Paused, Utc::now()).unwrap();
        store.insert(m).await.unwrap();

        let excluded = store.search(&scope(), &[1.0, 0.0], 10, &SearchFilters::default()).await.unwrap();
        assert!(excluded.is_empty());

        let filters = SearchFilters { include_state: true, ..Default::default() };
        let included = store.search(&scope(), &[1.0, 0.0], 10, &filters).await.unwrap();
        assert_eq!(included.len(), 1);
    }

    #[tokio::test]
    async fn update_requires_text_and_embedding_together() {
        let store = InMemoryVectorStore::default();
        let m = memory(scope(), "a", vec![1.0, 0.0]);
        let id = m.id;
        store.insert(m).await.unwrap();

        let err = store
            .update(&scope(), id, MemoryPatch { text: Some("b".to_string()), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::Validation(_)));
    }

    #[tokio::test]
    async fn list_orders_by_created_at_desc_then_id_asc() {
        let store = InMemoryVectorStore::default();
        let first = memory(scope(), "first", vec![1.0]);
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = memory(scope(), "second", vec![1.0]);
        store.insert(first).await.unwrap();
        store.insert(second).await.unwrap();

        let rows = store.list(&scope(), &SearchFilters::default(), Paging::default()).await.unwrap();
        assert_eq!(rows[0].text, "second");
        assert_eq!(rows[1].text, "first");
    }

    #[tokio::test]
    async fn get_on_unknown_id_is_not_found() {
        let store = InMemoryVectorStore::default();
        let err = store.get(&scope(), MemoryId::new_v4()).await.unwrap_err();
        assert!(matches!(err, MemoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_can_change_state_without_touching_text() {
        let store = InMemoryVectorStore::default();
        let m = memory(scope(), "a", vec![1.0]);
        let id = m.id;
        store.insert(m).await.unwrap();

        let patch = MemoryPatch { state: Some(MemoryState::Paused), ..Default::default() };
        let updated = store.update(&scope(), id, patch).await.unwrap();
        assert_eq!(updated.state, MemoryState::Paused);
        assert_eq!(updated.text, "a");
    }
}
