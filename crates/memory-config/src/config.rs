//! `MemoryServiceConfig` and its nested sections (§6.4).
//!
//! Field shapes mirror the teacher's `config::config::AppConfig` style:
//! plain structs with `Default` impls giving the defaults named in the spec,
//! assembled into one root config the loader fills in from file/env.

use crate::secrets::SecretString;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorDistance {
    Cosine,
    InnerProduct,
}

impl Default for VectorDistance {
    fn default() -> Self {
        VectorDistance::Cosine
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub min_connections: u32,
    pub max_connections: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 5,
            max_connections: 20,
        }
    }
}

impl PoolConfig {
    fn graph_default() -> Self {
        Self {
            min_connections: 2,
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    pub add_secs: u64,
    pub search_secs: u64,
    pub default_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            add_secs: 60,
            search_secs: 15,
            default_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmGatewayConfig {
    pub embedding_endpoint: String,
    pub chat_endpoint: String,
    pub embedding_model: String,
    pub chat_model: String,
    pub api_key: Option<SecretString>,
    pub request_timeout_secs: u64,
}

impl Default for LlmGatewayConfig {
    fn default() -> Self {
        Self {
            embedding_endpoint: "http://localhost:11434/api/embeddings".to_string(),
            chat_endpoint: "http://localhost:11434/api/chat".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            chat_model: "llama3.1".to_string(),
            api_key: None,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConnectionConfig {
    pub database_url: SecretString,
    pub pool: PoolConfig,
}

impl Default for StoreConnectionConfig {
    fn default() -> Self {
        Self {
            database_url: SecretString::new("postgresql://localhost:5432/memory"),
            pool: PoolConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_concurrent_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8090,
            max_concurrent_sessions: 1024,
        }
    }
}

/// Root configuration assembled by `ConfigLoader` (§6.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryServiceConfig {
    pub embedding_dim: usize,
    pub neighbor_k: u32,
    pub session_idle_timeout_secs: u64,
    pub llm_max_concurrency: usize,
    pub graph_enabled: bool,
    pub graph_query_use_llm: bool,
    pub vector_distance: VectorDistance,
    pub vector_store: StoreConnectionConfig,
    pub graph_store: StoreConnectionConfig,
    pub timeouts: TimeoutsConfig,
    pub llm_gateway: LlmGatewayConfig,
    pub server: ServerConfig,
}

impl Default for MemoryServiceConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 768,
            neighbor_k: 5,
            session_idle_timeout_secs: 1800,
            llm_max_concurrency: 8,
            graph_enabled: true,
            graph_query_use_llm: false,
            vector_distance: VectorDistance::default(),
            vector_store: StoreConnectionConfig::default(),
            graph_store: StoreConnectionConfig {
                pool: PoolConfig::graph_default(),
                ..StoreConnectionConfig::default()
            },
            timeouts: TimeoutsConfig::default(),
            llm_gateway: LlmGatewayConfig::default(),
            server: ServerConfig::default(),
        }
    }
}
