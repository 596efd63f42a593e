//! The Memory Engine (§4.E, §6.1): orchestrates the fact-planner, the
//! lifecycle state machine, the history log, and the concurrency controls
//! every public operation runs under. This is the one place in the
//! workspace that is allowed to know about the gateway, both stores, and
//! the history log at once.

use crate::history_store::HistoryStore;
use crate::planner::{
    extraction_prompt, graph_extraction_prompt, reconcile_prompt, AddInput, ExtractedFacts,
    GraphTriples, OpKind, ReconcileDecisions,
};
use crate::EngineConfig;
use chrono::Utc;
use dashmap::DashMap;
use memory_core::{
    content_hash, HistoryEvent, HistoryOp, Memory, MemoryError, MemoryId, MemoryResult,
    MemoryState, Metadata, Scope, ScopeResolver,
};
use memory_graph_store::GraphStore;
use memory_llm_gateway::{Gateway, GatewayError};
use memory_observability::EngineMetrics;
use memory_vector_store::{MemoryPatch, Paging, SearchFilters, VectorStore};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

/// Outcome of one candidate fact going through the reconcile/apply pipeline
/// (§4.E.2 step 7, §7 "partial failure after some writes have already
/// landed").
#[derive(Debug, Clone)]
pub enum OpOutcome {
    Added(MemoryId),
    Updated(MemoryId),
    Deleted(MemoryId),
    Noop,
    Failed(String),
}

#[derive(Debug, Clone, Default)]
pub struct AddResult {
    pub outcomes: Vec<OpOutcome>,
    /// Set when the graph-triple pass ran and failed; the memory writes
    /// above are still committed (§4.E.2: graph failures never fail `add`).
    pub partial_graph_failure: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub memory: Memory,
    pub score: f32,
}

#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub memories: Vec<ScoredMemory>,
    pub related_entities: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Page<T> {
    pub items: Vec<T>,
}

/// A neighbor candidate's id and text, the context set `Ctx` of §4.E.2.
type NeighborContext = Vec<(MemoryId, String)>;

pub struct MemoryEngine {
    vector: Arc<dyn VectorStore>,
    graph: Option<Arc<dyn GraphStore>>,
    gateway: Arc<Gateway>,
    history: Arc<dyn HistoryStore>,
    scope_resolver: ScopeResolver,
    config: EngineConfig,
    metrics: EngineMetrics,
    latches: DashMap<MemoryId, Arc<Mutex<()>>>,
    llm_permits: Arc<Semaphore>,
}

impl MemoryEngine {
    pub fn new(
        vector: Arc<dyn VectorStore>,
        graph: Option<Arc<dyn GraphStore>>,
        gateway: Arc<Gateway>,
        history: Arc<dyn HistoryStore>,
        scope_resolver: ScopeResolver,
        config: EngineConfig,
    ) -> Self {
        let llm_permits = Arc::new(Semaphore::new(config.llm_max_concurrency.max(1)));
        Self {
            vector,
            graph,
            gateway,
            history,
            scope_resolver,
            config,
            metrics: EngineMetrics::new(),
            latches: DashMap::new(),
            llm_permits,
        }
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    fn latch(&self, id: MemoryId) -> Arc<Mutex<()>> {
        self.latches.entry(id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Acquire an LLM concurrency permit, failing fast rather than queuing
    /// forever (§5: "excess calls queue with a bounded buffer and then fail
    /// fast").
    async fn acquire_llm_permit(&self) -> MemoryResult<tokio::sync::OwnedSemaphorePermit> {
        match tokio::time::timeout(self.config.llm_queue_wait, self.llm_permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(MemoryError::Other("llm semaphore closed".to_string())),
            Err(_) => Err(MemoryError::Overloaded("llm concurrency limit reached".to_string())),
        }
    }

    /// Race `fut` against `cancel` and an operation-level timeout (§5).
    async fn with_budget<T>(
        &self,
        timeout: std::time::Duration,
        cancel: &CancellationToken,
        fut: impl std::future::Future<Output = MemoryResult<T>>,
    ) -> MemoryResult<T> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(MemoryError::Timeout("operation cancelled".to_string())),
            result = tokio::time::timeout(timeout, fut) => match result {
                Ok(inner) => inner,
                Err(_) => Err(MemoryError::Timeout("operation exceeded its time budget".to_string())),
            },
        }
    }

    /// §4.E.2: extract candidate facts, embed them, retrieve neighbor
    /// context, reconcile against it, then apply Delete→Update→Add.
    #[instrument(skip(self, input))]
    pub async fn add(&self, request_scope: &Scope, input: AddInput, actor: &str) -> MemoryResult<AddResult> {
        self.add_with_cancellation(request_scope, input, actor, &CancellationToken::new()).await
    }

    pub async fn add_with_cancellation(
        &self,
        request_scope: &Scope,
        input: AddInput,
        actor: &str,
        cancel: &CancellationToken,
    ) -> MemoryResult<AddResult> {
        let scope = self.scope_resolver.resolve_for_mutation(request_scope)?;
        let timeout = self.config.add_timeout;

        let candidates = self
            .with_budget(timeout, cancel, self.extract_candidates(&input))
            .await?;
        if candidates.is_empty() {
            return Ok(AddResult::default());
        }

        let embeddings = self
            .with_budget(timeout, cancel, self.embed_candidates(&candidates))
            .await?;

        let context = self
            .with_budget(timeout, cancel, self.retrieve_context(&scope, &embeddings))
            .await?;

        let decisions = self
            .with_budget(timeout, cancel, self.reconcile(&candidates, &context))
            .await;
        // Only a `PlanError` on reconcile gets the all-ADD fallback (§4.E.5,
        // §7: "all other kinds are surfaced") — a `Timeout`/`Overloaded`/
        // cancellation must abort `add`, not silently write duplicates.
        let decisions = match decisions {
            Ok(d) => d,
            Err(MemoryError::Plan(msg)) => {
                warn!(error = %msg, "reconcile failed, falling back to treating every candidate as ADD");
                crate::planner::ReconcileDecisions {
                    decisions: (0..candidates.len())
                        .map(|i| crate::planner::ReconcileDecision {
                            candidate_index: i,
                            op: OpKind::Add,
                            target_id: None,
                            text: Some(candidates[i].clone()),
                        })
                        .collect(),
                }
            }
            Err(other) => return Err(other),
        };

        let outcomes = self
            .apply_decisions(&scope, &candidates, &embeddings, &context, decisions, actor)
            .await?;

        let mut result = AddResult { outcomes, partial_graph_failure: None };

        if self.config.graph_enabled {
            if let Some(graph) = &self.graph {
                if let Err(err) = self.extract_and_upsert_triples(graph.as_ref(), &scope, &candidates).await {
                    warn!(error = %err, "graph triple extraction failed, memory writes stand");
                    result.partial_graph_failure = Some(err.to_string());
                }
            }
        }

        Ok(result)
    }

    async fn extract_candidates(&self, input: &AddInput) -> MemoryResult<Vec<String>> {
        let _permit = self.acquire_llm_permit().await?;
        let prompt = extraction_prompt(input);
        let facts: ExtractedFacts = self
            .gateway
            .plan(&prompt)
            .await
            .map_err(|e| map_gateway_error(e, MemoryError::Plan))?;
        Ok(facts.facts)
    }

    async fn embed_candidates(&self, candidates: &[String]) -> MemoryResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let _permit = self.acquire_llm_permit().await?;
            let vector = self
                .gateway
                .embed(candidate)
                .await
                .map_err(|e| map_gateway_error(e, MemoryError::Embed))?;
            out.push(vector);
        }
        Ok(out)
    }

    async fn retrieve_context(&self, scope: &Scope, embeddings: &[Vec<f32>]) -> MemoryResult<NeighborContext> {
        let mut seen = std::collections::HashSet::new();
        let mut context = Vec::new();
        for embedding in embeddings {
            let neighbors = self
                .vector
                .search(scope, embedding, self.config.neighbor_k, &SearchFilters::default())
                .await?;
            for (memory, _score) in neighbors {
                if seen.insert(memory.id) {
                    context.push((memory.id, memory.text));
                }
            }
        }
        Ok(context)
    }

    async fn reconcile(&self, candidates: &[String], context: &NeighborContext) -> MemoryResult<ReconcileDecisions> {
        let _permit = self.acquire_llm_permit().await?;
        let prompt = reconcile_prompt(candidates, context);
        self.gateway
            .plan(&prompt)
            .await
            .map_err(|e| map_gateway_error(e, MemoryError::Plan))
    }

    /// Apply decisions in Delete→Update→Add order (§4.E.2 step 7), stopping
    /// at the first store failure but keeping the outcomes already applied.
    async fn apply_decisions(
        &self,
        scope: &Scope,
        candidates: &[String],
        embeddings: &[Vec<f32>],
        context: &NeighborContext,
        decisions: ReconcileDecisions,
        actor: &str,
    ) -> MemoryResult<Vec<OpOutcome>> {
        let in_context = |id: MemoryId| context.iter().any(|(cid, _)| *cid == id);
        let mut ordered: Vec<_> = decisions.decisions;
        ordered.sort_by_key(|d| match d.op {
            OpKind::Delete => 0,
            OpKind::Update => 1,
            OpKind::Add => 2,
            OpKind::Noop => 3,
        });

        let mut outcomes = vec![OpOutcome::Noop; candidates.len()];
        for decision in ordered {
            let index = decision.candidate_index;
            if index >= candidates.len() {
                continue;
            }
            let now = Utc::now();

            // Out-of-context target is treated as ADD (§4.E.2 edge case).
            let effective_op = match (decision.op, decision.target_id) {
                (OpKind::Update, Some(id)) | (OpKind::Delete, Some(id)) if !in_context(id) => OpKind::Add,
                (op, _) => op,
            };

            let outcome = match effective_op {
                OpKind::Noop => OpOutcome::Noop,
                OpKind::Delete => {
                    let Some(id) = decision.target_id else {
                        outcomes[index] = OpOutcome::Failed("delete decision missing target_id".to_string());
                        continue;
                    };
                    match self.delete_locked(scope, id, actor, now).await {
                        Ok(()) => OpOutcome::Deleted(id),
                        Err(MemoryError::NotFound(_)) => OpOutcome::Noop,
                        Err(err) => return Err(err),
                    }
                }
                OpKind::Update => {
                    let Some(id) = decision.target_id else {
                        outcomes[index] = OpOutcome::Failed("update decision missing target_id".to_string());
                        continue;
                    };
                    let text = decision.text.clone().unwrap_or_else(|| candidates[index].clone());
                    match self
                        .update_text_locked(scope, id, &text, &embeddings[index], actor, now)
                        .await
                    {
                        Ok(()) => OpOutcome::Updated(id),
                        Err(MemoryError::NotFound(_)) => OpOutcome::Noop,
                        Err(err) => return Err(err),
                    }
                }
                OpKind::Add => {
                    let text = decision.text.clone().unwrap_or_else(|| candidates[index].clone());
                    match self.add_if_new(scope, &text, &embeddings[index], actor, now).await {
                        Ok(Some(id)) => OpOutcome::Added(id),
                        Ok(None) => OpOutcome::Noop,
                        Err(err) => return Err(err),
                    }
                }
            };
            outcomes[index] = outcome;
        }
        Ok(outcomes)
    }

    /// Dedup tie-break (§4.E.2): a candidate whose content hash matches an
    /// existing active memory in scope is a NOOP, never a duplicate insert.
    async fn add_if_new(
        &self,
        scope: &Scope,
        text: &str,
        embedding: &[f32],
        actor: &str,
        now: chrono::DateTime<Utc>,
    ) -> MemoryResult<Option<MemoryId>> {
        let hash = content_hash(text);
        let existing = self.vector.list(scope, &SearchFilters::default(), Paging::default()).await?;
        if existing.iter().any(|m| m.hash == hash) {
            return Ok(None);
        }

        let memory = Memory::new(scope.clone(), text.to_string(), embedding.to_vec(), Metadata::new(), now)?;
        let id = memory.id;
        let latch = self.latch(id);
        let _guard = latch.lock().await;
        self.vector.insert(memory).await?;
        self.history
            .append(HistoryEvent::new(id, scope.clone(), HistoryOp::Add, None, Some(text.to_string()), actor, now))
            .await?;
        Ok(Some(id))
    }

    async fn update_text_locked(
        &self,
        scope: &Scope,
        id: MemoryId,
        text: &str,
        embedding: &[f32],
        actor: &str,
        now: chrono::DateTime<Utc>,
    ) -> MemoryResult<()> {
        let latch = self.latch(id);
        let _guard = latch.lock().await;
        let previous = self.vector.get(scope, id).await?;

        // A paused memory stays paused through a content update (§4.E.4
        // edge case: state is orthogonal to the reconcile pipeline).
        let patch = MemoryPatch {
            text: Some(text.to_string()),
            embedding: Some(embedding.to_vec()),
            ..Default::default()
        };
        self.vector.update(scope, id, patch).await?;
        self.history
            .append(HistoryEvent::new(id, scope.clone(), HistoryOp::Update, Some(previous.text), Some(text.to_string()), actor, now))
            .await?;
        Ok(())
    }

    async fn delete_locked(&self, scope: &Scope, id: MemoryId, actor: &str, now: chrono::DateTime<Utc>) -> MemoryResult<()> {
        let latch = self.latch(id);
        let _guard = latch.lock().await;
        let previous = self.vector.get(scope, id).await?;
        self.vector.delete(scope, id).await?;
        self.history
            .append(HistoryEvent::new(id, scope.clone(), HistoryOp::Delete, Some(previous.text), None, actor, now))
            .await?;
        Ok(())
    }

    async fn extract_and_upsert_triples(&self, graph: &dyn GraphStore, scope: &Scope, candidates: &[String]) -> MemoryResult<()> {
        let _permit = self.acquire_llm_permit().await?;
        let prompt = graph_extraction_prompt(candidates);
        let triples: GraphTriples = self
            .gateway
            .plan(&prompt)
            .await
            .map_err(|e| map_gateway_error(e, MemoryError::Plan))?;
        for triple in triples.triples {
            graph
                .upsert_relationship(scope, &triple.source, &triple.predicate, &triple.target)
                .await?;
        }
        Ok(())
    }

    /// §4.E.3: embed the query, search the vector store, and optionally
    /// widen the result with a graph neighborhood around entities mentioned
    /// in the query.
    #[instrument(skip(self, query))]
    pub async fn search(&self, request_scope: &Scope, query: &str, k: usize, filters: &SearchFilters) -> MemoryResult<SearchResult> {
        let scope = self.scope_resolver.resolve_for_query(request_scope)?;
        let cancel = CancellationToken::new();
        let timeout = self.config.search_timeout;

        let embedding = self
            .with_budget(timeout, &cancel, async {
                let _permit = self.acquire_llm_permit().await?;
                self.gateway.embed(query).await.map_err(|e| map_gateway_error(e, MemoryError::Embed))
            })
            .await?;

        let hits = self.vector.search(&scope, &embedding, k, filters).await?;
        let memories: Vec<ScoredMemory> = hits.into_iter().map(|(memory, score)| ScoredMemory { memory, score }).collect();

        let related_entities = if self.config.graph_enabled {
            match &self.graph {
                Some(graph) => self.related_entities_for_query(graph.as_ref(), &scope, query).await.unwrap_or_default(),
                None => Vec::new(),
            }
        } else {
            Vec::new()
        };

        Ok(SearchResult { memories, related_entities })
    }

    async fn related_entities_for_query(&self, graph: &dyn GraphStore, scope: &Scope, query: &str) -> MemoryResult<Vec<String>> {
        let seeds: Vec<String> = if self.config.graph_query_use_llm {
            self.llm_extract_entities(query).await?
        } else {
            heuristic_extract_entities(query)
        };
        if seeds.is_empty() {
            return Ok(Vec::new());
        }
        let neighborhood = graph.neighborhood(scope, &seeds, 1).await?;
        Ok(neighborhood.entities.into_iter().map(|e| e.name).collect())
    }

    async fn llm_extract_entities(&self, query: &str) -> MemoryResult<Vec<String>> {
        let _permit = self.acquire_llm_permit().await?;
        let prompt = format!(
            "Extract named entities mentioned in this query. Return JSON as \
             {{\"entities\": [string, ...]}}. Query: {query:?}"
        );
        #[derive(serde::Deserialize)]
        struct Entities {
            entities: Vec<String>,
        }
        let parsed: Entities = self
            .gateway
            .plan(&prompt)
            .await
            .map_err(|e| map_gateway_error(e, MemoryError::Plan))?;
        Ok(parsed.entities)
    }

    pub async fn get(&self, request_scope: &Scope, id: MemoryId) -> MemoryResult<Memory> {
        let scope = self.scope_resolver.resolve_for_query(request_scope)?;
        self.vector.get(&scope, id).await
    }

    pub async fn list(&self, request_scope: &Scope, filters: &SearchFilters, paging: Paging) -> MemoryResult<Page<Memory>> {
        let scope = self.scope_resolver.resolve_for_query(request_scope)?;
        let items = self.vector.list(&scope, filters, paging).await?;
        Ok(Page { items })
    }

    pub async fn history(&self, request_scope: &Scope, id: MemoryId) -> MemoryResult<Vec<HistoryEvent>> {
        let scope = self.scope_resolver.resolve_for_query(request_scope)?;
        self.history.list(&scope, id).await
    }

    /// Direct text/metadata edit outside the planner pipeline (§4.C `update`).
    pub async fn update(&self, request_scope: &Scope, id: MemoryId, new_text: Option<String>, metadata: Option<Metadata>, actor: &str) -> MemoryResult<Memory> {
        let scope = self.scope_resolver.resolve_for_mutation(request_scope)?;

        // Depends only on `new_text`, not on anything the latch protects —
        // compute it before acquiring the latch rather than across it (§5:
        // no in-process lock may be held across a B call).
        let embedding = match &new_text {
            Some(text) => Some(self.gateway.embed(text).await.map_err(|e| map_gateway_error(e, MemoryError::Embed))?),
            None => None,
        };

        let latch = self.latch(id);
        let _guard = latch.lock().await;
        let previous = self.vector.get(&scope, id).await?;
        let now = Utc::now();

        let patch = MemoryPatch { text: new_text.clone(), embedding, metadata, ..Default::default() };
        let updated = self.vector.update(&scope, id, patch).await?;

        if let Some(text) = new_text {
            self.history
                .append(HistoryEvent::new(id, scope, HistoryOp::Update, Some(previous.text), Some(text), actor, now))
                .await?;
        }
        Ok(updated)
    }

    pub async fn delete(&self, request_scope: &Scope, id: MemoryId, actor: &str) -> MemoryResult<()> {
        let scope = self.scope_resolver.resolve_for_mutation(request_scope)?;
        self.delete_locked(&scope, id, actor, Utc::now()).await
    }

    pub async fn delete_all(&self, request_scope: &Scope, actor: &str) -> MemoryResult<usize> {
        let scope = self.scope_resolver.resolve_for_mutation(request_scope)?;
        let memories = self.vector.list(&scope, &SearchFilters::default(), Paging::default()).await?;
        let now = Utc::now();
        let mut deleted = 0;
        for memory in memories {
            self.delete_locked(&scope, memory.id, actor, now).await?;
            deleted += 1;
        }
        Ok(deleted)
    }

    /// Pause/resume/archive a memory (§4.E.4). `Deleted` is routed through
    /// the same path as [`Self::delete`] rather than duplicated here, since
    /// both end in the same physical removal.
    pub async fn set_state(&self, request_scope: &Scope, id: MemoryId, next: MemoryState, actor: &str) -> MemoryResult<Memory> {
        if next == MemoryState::Deleted {
            self.delete(request_scope, id, actor).await?;
            return Err(MemoryError::NotFound(format!("memory {id} deleted")));
        }

        let scope = self.scope_resolver.resolve_for_mutation(request_scope)?;
        let latch = self.latch(id);
        let _guard = latch.lock().await;
        let mut memory = self.vector.get(&scope, id).await?;
        let now = Utc::now();
        memory.transition(next, now)?;

        let patch = MemoryPatch { state: Some(next), ..Default::default() };
        let updated = self.vector.update(&scope, id, patch).await?;
        self.history
            .append(HistoryEvent::new(id, scope, HistoryOp::Update, Some(memory.text.clone()), Some(memory.text), actor, now))
            .await?;
        Ok(updated)
    }
}

/// A cheap, dependency-free fallback for entity extraction from a query
/// (§9 Open Question: default to a lexical heuristic, gate the LLM path
/// behind `GRAPH_QUERY_USE_LLM`): capitalized tokens, deduplicated.
fn heuristic_extract_entities(query: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    query
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.chars().next().is_some_and(|c| c.is_uppercase()))
        .filter(|w| seen.insert(w.to_lowercase()))
        .map(|w| w.to_string())
        .collect()
}

fn map_gateway_error(err: GatewayError, plan_variant: impl Fn(String) -> MemoryError) -> MemoryError {
    match err {
        GatewayError::Overloaded => MemoryError::Overloaded("gateway overloaded".to_string()),
        GatewayError::Embed(msg) => MemoryError::Embed(msg),
        GatewayError::Plan(msg) => plan_variant(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history_store::InMemoryHistoryStore;
    use memory_llm_gateway::DeterministicProvider;
    use memory_vector_store::InMemoryVectorStore;

    fn scope() -> Scope {
        Scope { user_id: Some("u1".to_string()), ..Default::default() }
    }

    fn engine_with_provider(provider: Arc<DeterministicProvider>) -> MemoryEngine {
        let gateway = Arc::new(Gateway::new(provider.clone(), provider));
        MemoryEngine::new(
            Arc::new(InMemoryVectorStore::default()),
            None,
            gateway,
            Arc::new(InMemoryHistoryStore::new()),
            ScopeResolver::default(),
            EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn add_with_no_extracted_facts_writes_nothing() {
        let input = AddInput::Text("just chatting".to_string());
        let provider = Arc::new(DeterministicProvider::new(4));
        provider.script(extraction_prompt(&input), "{\"facts\": []}");
        let engine = engine_with_provider(provider);

        let result = engine.add(&scope(), input, "user").await.unwrap();
        assert!(result.outcomes.is_empty());
    }

    #[tokio::test]
    async fn add_inserts_a_new_fact_when_reconcile_says_add() {
        let input = AddInput::Text("I love pizza".to_string());
        let candidates = vec!["loves pizza".to_string()];
        let provider = Arc::new(DeterministicProvider::new(4));
        provider.script(extraction_prompt(&input), "{\"facts\": [\"loves pizza\"]}");
        // No existing memories, so the reconcile context is empty.
        provider.script(
            reconcile_prompt(&candidates, &[]),
            "{\"decisions\": [{\"candidate_index\": 0, \"op\": \"add\", \"target_id\": null, \"text\": \"loves pizza\"}]}",
        );
        let engine = engine_with_provider(provider);

        let result = engine.add(&scope(), input, "user").await.unwrap();
        assert_eq!(result.outcomes.len(), 1);
        assert!(matches!(result.outcomes[0], OpOutcome::Added(_)));

        let page = engine.list(&scope(), &SearchFilters::default(), Paging::default()).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].text, "loves pizza");
    }

    #[tokio::test]
    async fn set_state_to_deleted_routes_through_delete() {
        let engine = engine_with_provider(Arc::new(DeterministicProvider::new(4)));
        let memory = Memory::new(scope(), "a".to_string(), vec![1.0], Metadata::new(), Utc::now()).unwrap();
        let id = memory.id;
        engine.vector.insert(memory).await.unwrap();

        let err = engine.set_state(&scope(), id, MemoryState::Deleted, "user").await.unwrap_err();
        assert!(matches!(err, MemoryError::NotFound(_)));
        let err = engine.get(&scope(), id).await.unwrap_err();
        assert!(matches!(err, MemoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn heuristic_extracts_capitalized_tokens_only() {
        let found = heuristic_extract_entities("Alice met Bob in paris");
        assert_eq!(found, vec!["Alice".to_string(), "Bob".to_string()]);
    }
}
