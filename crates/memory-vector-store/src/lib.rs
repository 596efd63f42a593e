//! Vector Store (§4.C): `insert`/`update`/`delete`/`get`/`search`/`list` over
//! scoped, embedded `Memory` rows, with a Postgres/pgvector-backed
//! implementation and an in-memory one for tests and small deployments.

pub mod similarity;
pub mod store_memory;
pub mod store_postgres;

use async_trait::async_trait;
use memory_core::{Memory, MemoryId, MemoryResult, MemoryState, Metadata, MetadataValue, Scope};
use serde::{Deserialize, Serialize};

pub use similarity::DistanceMetric;
pub use store_memory::InMemoryVectorStore;
pub use store_postgres::PostgresVectorStore;

/// Fields a caller may change via `update` (§4.C): omitted fields are left
/// untouched on the stored memory. `state` transitions are validated by the
/// caller (the Engine, via `Memory::transition`, §4.E.4) before the patch is
/// built — the store applies whatever state it is given.
#[derive(Debug, Clone, Default)]
pub struct MemoryPatch {
    pub text: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub metadata: Option<Metadata>,
    pub state: Option<MemoryState>,
}

/// Metadata filter predicate: exact-match on scalar fields, set-membership
/// on list fields (§4.C guarantees).
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub metadata: Metadata,
    /// When `false` (default), memories whose `state != active` are
    /// excluded from the result (§4.C edge cases).
    pub include_state: bool,
}

impl SearchFilters {
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.metadata.iter().all(|(key, expected)| match (expected, metadata.get(key)) {
            (MetadataValue::Scalar(want), Some(MetadataValue::Scalar(have))) => want == have,
            (MetadataValue::List(want), Some(MetadataValue::List(have))) => {
                want.iter().all(|v| have.contains(v))
            }
            (MetadataValue::List(want), Some(MetadataValue::Scalar(have))) => {
                want.contains(have)
            }
            _ => false,
        })
    }
}

/// Stable pagination cursor for `list` (§4.C: ordered by `(created_at desc,
/// id asc)`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Paging {
    pub limit: usize,
    pub offset: usize,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Idempotent on `memory.id`: inserting the same id twice overwrites.
    async fn insert(&self, memory: Memory) -> MemoryResult<()>;

    async fn update(&self, scope: &Scope, id: MemoryId, patch: MemoryPatch) -> MemoryResult<Memory>;

    async fn delete(&self, scope: &Scope, id: MemoryId) -> MemoryResult<()>;

    async fn get(&self, scope: &Scope, id: MemoryId) -> MemoryResult<Memory>;

    /// Ordered by descending similarity under the store's pinned
    /// `DistanceMetric`. `k=0` and an empty scope both return `[]`.
    async fn search(
        &self,
        scope: &Scope,
        query_vector: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> MemoryResult<Vec<(Memory, f32)>>;

    async fn list(&self, scope: &Scope, filters: &SearchFilters, paging: Paging) -> MemoryResult<Vec<Memory>>;
}
