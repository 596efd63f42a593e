//! Engine-level tunables (§6.4, §5): the subset of `MemoryServiceConfig`
//! the Engine itself consults, kept separate from `memory-config` so this
//! crate does not need a circular dependency on the config-loading crate.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// §6.4 `NEIGHBOR_K`, default 5, range 1..50.
    pub neighbor_k: usize,
    /// §6.4 `GRAPH_ENABLED`, default true.
    pub graph_enabled: bool,
    /// §9 Open Question resolution: cheap heuristic by default.
    pub graph_query_use_llm: bool,
    /// §5 default timeouts.
    pub add_timeout: Duration,
    pub search_timeout: Duration,
    pub default_timeout: Duration,
    /// §6.4 `LLM_MAX_CONCURRENCY`, default 8.
    pub llm_max_concurrency: usize,
    /// How long a caller waits for an LLM permit before `Overloaded` (§5:
    /// "excess calls queue with a bounded buffer and then fail fast").
    pub llm_queue_wait: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            neighbor_k: 5,
            graph_enabled: true,
            graph_query_use_llm: false,
            add_timeout: Duration::from_secs(60),
            search_timeout: Duration::from_secs(15),
            default_timeout: Duration::from_secs(10),
            llm_max_concurrency: 8,
            llm_queue_wait: Duration::from_millis(200),
        }
    }
}
