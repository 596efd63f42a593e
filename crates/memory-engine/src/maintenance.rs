//! The maintenance pass (SPEC_FULL.md §4.E "[ADDED] Maintenance pass"):
//! exponential decay of a ranking weight plus archiving memories whose
//! weight falls below a floor. Grounded in
//! `agent_memory::decay::MemoryDecayEngine::apply_exponential_decay`, scaled
//! down to the single schedule this spec calls for and driven off
//! `updated_at` rather than a separate `last_accessed` column.

use memory_core::{Memory, MemoryResult, MemoryState, Scope};
use memory_vector_store::{Paging, SearchFilters, VectorStore};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Fraction of weight lost per day of inactivity.
    pub base_decay_rate: f64,
    /// Weight below which an active memory is archived.
    pub archive_floor: f32,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            base_decay_rate: 0.05,
            archive_floor: 0.2,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    pub scored: usize,
    pub archived: usize,
}

/// Exponential decay weight in `(0.0, 1.0]`, grounded in
/// `apply_exponential_decay`'s `POWER(1 - rate, elapsed_days)` formula.
pub fn decay_weight(updated_at: chrono::DateTime<chrono::Utc>, now: chrono::DateTime<chrono::Utc>, config: &MaintenanceConfig) -> f32 {
    let elapsed_days = (now - updated_at).num_seconds().max(0) as f64 / 86_400.0;
    (1.0 - config.base_decay_rate).powf(elapsed_days) as f32
}

/// Run one maintenance pass over every active memory in `scope`: scores each
/// by decay weight and archives those below the floor. Explicitly invoked,
/// never a background timer (§1 Non-goals exclude process supervision).
pub async fn run_maintenance(
    vector: &Arc<dyn VectorStore>,
    scope: &Scope,
    config: &MaintenanceConfig,
) -> MemoryResult<MaintenanceReport> {
    let now = chrono::Utc::now();
    let memories: Vec<Memory> = vector
        .list(scope, &SearchFilters::default(), Paging::default())
        .await?;

    let mut report = MaintenanceReport::default();
    for memory in memories {
        report.scored += 1;
        let weight = decay_weight(memory.updated_at, now, config);
        if weight < config.archive_floor && memory.state == MemoryState::Active {
            let patch = memory_vector_store::MemoryPatch {
                state: Some(MemoryState::Archived),
                ..Default::default()
            };
            vector.update(scope, memory.id, patch).await?;
            report.archived += 1;
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use memory_core::Metadata;
    use memory_vector_store::InMemoryVectorStore;

    fn scope() -> Scope {
        Scope { user_id: Some("u1".to_string()), ..Default::default() }
    }

    #[test]
    fn weight_decays_toward_zero_with_elapsed_time() {
        let config = MaintenanceConfig::default();
        let now = Utc::now();
        let fresh = decay_weight(now, now, &config);
        let stale = decay_weight(now - chrono::Duration::days(60), now, &config);
        assert_eq!(fresh, 1.0);
        assert!(stale < fresh);
    }

    #[tokio::test]
    async fn archives_memories_below_floor() {
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::default());
        let stale_time = Utc::now() - chrono::Duration::days(120);
        let mut memory = Memory::new(scope(), "stale fact".to_string(), vec![1.0], Metadata::new(), stale_time).unwrap();
        memory.updated_at = stale_time;
        let id = memory.id;
        store.insert(memory).await.unwrap();

        let config = MaintenanceConfig::default();
        let report = run_maintenance(&store, &scope(), &config).await.unwrap();
        assert_eq!(report.scored, 1);
        assert_eq!(report.archived, 1);

        let filters = SearchFilters { include_state: true, ..Default::default() };
        let archived = store.get(&scope(), id).await.unwrap();
        let _ = filters;
        assert_eq!(archived.state, MemoryState::Archived);
    }

    #[tokio::test]
    async fn leaves_fresh_memories_active() {
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::default());
        let memory = Memory::new(scope(), "fresh fact".to_string(), vec![1.0], Metadata::new(), Utc::now()).unwrap();
        let id = memory.id;
        store.insert(memory).await.unwrap();

        let config = MaintenanceConfig::default();
        run_maintenance(&store, &scope(), &config).await.unwrap();

        let still_active = store.get(&scope(), id).await.unwrap();
        assert_eq!(still_active.state, MemoryState::Active);
    }
}
