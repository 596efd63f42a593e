//! Process entry point (§1 "deliberately out of scope: CLI startup, process
//! supervision" — the wiring below is the thin seam that owns those
//! concerns so every other crate can stay free of them). Grounded in the
//! teacher's `src/bin/api-server.rs`: `clap` args, `tokio::main`, build the
//! dependency graph bottom-up, bind a `TcpListener`, `axum::serve`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use memory_config::{MemoryServiceConfig, VectorDistance};
use memory_core::{Scope, ScopeResolver};
use memory_engine::{EngineConfig, HistoryStore, InMemoryHistoryStore, MaintenanceConfig, MemoryEngine, PostgresHistoryStore};
use memory_graph_store::{GraphStore, InMemoryGraphStore, PostgresGraphStore};
use memory_llm_gateway::{Gateway, HttpProvider};
use memory_mcp::{router, AppState, SessionTable};
use memory_observability::{init_logging, LoggingConfig};
use memory_vector_store::{DistanceMetric, InMemoryVectorStore, PostgresVectorStore, VectorStore};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "memory-service")]
#[command(about = "Long-term memory service: fact extraction, vector + graph recall, MCP surface")]
struct Args {
    /// Path to an optional TOML configuration file (§6.4); defaults/env still apply around it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run entirely in-memory, skipping the Postgres vector/graph/history connections.
    /// Intended for local development and the scenarios in §8, not production deployments.
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = memory_config::load(args.config.as_deref())?;

    init_logging(&LoggingConfig::default()).ok();
    info!(port = config.server.port, in_memory = args.in_memory, "starting memory-service");

    let metric = match config.vector_distance {
        VectorDistance::Cosine => DistanceMetric::Cosine,
        VectorDistance::InnerProduct => DistanceMetric::InnerProduct,
    };

    let (vector, graph, history): (Arc<dyn VectorStore>, Option<Arc<dyn GraphStore>>, Arc<dyn HistoryStore>) =
        if args.in_memory {
            let graph: Option<Arc<dyn GraphStore>> =
                config.graph_enabled.then(|| Arc::new(InMemoryGraphStore::new()) as Arc<dyn GraphStore>);
            (Arc::new(InMemoryVectorStore::new(metric)), graph, Arc::new(InMemoryHistoryStore::new()))
        } else {
            let vector_pool = PgPoolOptions::new()
                .max_connections(config.vector_store.pool.max_connections)
                .min_connections(config.vector_store.pool.min_connections)
                .connect(config.vector_store.database_url.expose())
                .await?;
            let vector: Arc<dyn VectorStore> = Arc::new(PostgresVectorStore::new(vector_pool.clone(), metric));

            let graph: Option<Arc<dyn GraphStore>> = if config.graph_enabled {
                let graph_pool = PgPoolOptions::new()
                    .max_connections(config.graph_store.pool.max_connections)
                    .min_connections(config.graph_store.pool.min_connections)
                    .connect(config.graph_store.database_url.expose())
                    .await?;
                Some(Arc::new(PostgresGraphStore::new(graph_pool)))
            } else {
                None
            };

            let history: Arc<dyn HistoryStore> = Arc::new(PostgresHistoryStore::new(vector_pool));
            (vector, graph, history)
        };

    let embedder = Arc::new(HttpProvider::new(
        config.llm_gateway.embedding_endpoint.clone(),
        config.llm_gateway.chat_endpoint.clone(),
        config.llm_gateway.embedding_model.clone(),
        config.llm_gateway.chat_model.clone(),
        config.embedding_dim,
        Duration::from_secs(config.llm_gateway.request_timeout_secs),
    ));
    let gateway = Arc::new(Gateway::new(embedder.clone(), embedder));

    let engine_config = EngineConfig {
        neighbor_k: config.neighbor_k as usize,
        graph_enabled: config.graph_enabled,
        graph_query_use_llm: config.graph_query_use_llm,
        add_timeout: Duration::from_secs(config.timeouts.add_secs),
        search_timeout: Duration::from_secs(config.timeouts.search_secs),
        default_timeout: Duration::from_secs(config.timeouts.default_secs),
        llm_max_concurrency: config.llm_max_concurrency,
        llm_queue_wait: Duration::from_millis(200),
    };
    let scope_resolver = ScopeResolver::new(Scope::default());
    let engine = Arc::new(MemoryEngine::new(vector.clone(), graph, gateway, history, scope_resolver, engine_config));

    let sessions = Arc::new(SessionTable::with_capacity(
        Duration::from_secs(config.session_idle_timeout_secs),
        config.server.max_concurrent_sessions,
    ));

    spawn_session_sweeper(sessions.clone());
    spawn_maintenance(vector);

    let app = router(AppState { engine, sessions, default_scope: Scope::default() })
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "memory-service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Idle-session eviction (§4.F, §5): runs outside the request path so a
/// quiet session doesn't need a live request to be noticed as stale.
fn spawn_session_sweeper(sessions: Arc<SessionTable>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            let evicted = sessions.sweep_idle();
            if evicted > 0 {
                info!(evicted, "swept idle MCP sessions");
            }
        }
    });
}

/// Periodic decay/archive pass (SPEC_FULL.md §4.E maintenance) against the
/// deployment's default scope. Multi-tenant deployments that want
/// maintenance swept per-tenant should drive `run_maintenance` from their
/// own tenant registry instead of this loop.
fn spawn_maintenance(vector: Arc<dyn VectorStore>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(3600));
        loop {
            ticker.tick().await;
            let report = memory_engine::run_maintenance(&vector, &Scope::default(), &MaintenanceConfig::default()).await;
            match report {
                Ok(report) => info!(archived = report.archived, scored = report.scored, "maintenance pass complete"),
                Err(err) => error!(error = %err, "maintenance pass failed"),
            }
        }
    });
}
