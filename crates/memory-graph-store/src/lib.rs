//! Graph Store (§4.D): entities and typed directed relationships scoped by
//! tenant, with a Postgres-backed implementation and an in-memory one for
//! tests and small deployments.

pub mod normalize;
pub mod store_memory;
pub mod store_postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use memory_core::{MemoryResult, Scope};
use serde::{Deserialize, Serialize};

pub use store_memory::InMemoryGraphStore;
pub use store_postgres::PostgresGraphStore;

/// Knowledge graph node. Identity is `(scope, name)` (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub entity_type: String,
    pub scope: Scope,
    pub created_at: DateTime<Utc>,
}

/// Typed directed edge. Identity is `(scope, source, predicate, target)` (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source: String,
    pub predicate: String,
    pub target: String,
    pub scope: Scope,
    pub created_at: DateTime<Utc>,
}

/// Entities and relationships reachable from a seed set within a bounded
/// depth (§4.D `neighborhood`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Neighborhood {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
}

/// Maximum traversal depth `neighborhood` accepts (§4.D: "depth is bounded
/// to prevent runaway traversals").
pub const MAX_NEIGHBORHOOD_DEPTH: usize = 2;

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Creates or returns the entity; merge is by `(scope, name)`
    /// case-insensitive with whitespace collapsed (§4.D).
    async fn upsert_entity(&self, scope: &Scope, name: &str, entity_type: &str) -> MemoryResult<Entity>;

    /// Creates both endpoints if missing and the edge if missing (§4.D).
    /// Idempotent: calling twice with identical arguments creates exactly
    /// one edge (§8 round-trip property).
    async fn upsert_relationship(
        &self,
        scope: &Scope,
        source_name: &str,
        predicate: &str,
        target_name: &str,
    ) -> MemoryResult<Relationship>;

    /// Removes the entity and cascades to every edge that references it as
    /// an endpoint (§3 invariant 5, §8 invariant 6).
    async fn delete_entity(&self, scope: &Scope, name: &str) -> MemoryResult<()>;

    async fn delete_relationship(
        &self,
        scope: &Scope,
        source: &str,
        predicate: &str,
        target: &str,
    ) -> MemoryResult<()>;

    /// Entities and relationships reachable from `seeds` within `depth`
    /// hops, clamped to [`MAX_NEIGHBORHOOD_DEPTH`].
    async fn neighborhood(&self, scope: &Scope, seeds: &[String], depth: usize) -> MemoryResult<Neighborhood>;

    /// Entities whose name matches `text` by a mix of lexical and embedding
    /// similarity, tie-broken by recency (§4.D).
    async fn search_by_text(&self, scope: &Scope, text: &str, k: usize) -> MemoryResult<Vec<Entity>>;
}
