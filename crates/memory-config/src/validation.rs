//! Range/consistency checks run once after loading, before the service is
//! allowed to start (§6.4). Grounded in the teacher's
//! `config::validation::DatabaseConfigValidation`-style range checks, but
//! expressed as a single free function instead of the `validator` derive
//! crate — this config has no web-facing form input to validate against,
//! just its own assembled values.

use crate::config::MemoryServiceConfig;

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    Field { field: String, message: String },
}

pub fn validate(config: &MemoryServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let field = |f: &str, m: String| ValidationError::Field {
        field: f.to_string(),
        message: m,
    };

    if config.embedding_dim == 0 {
        errors.push(field("embedding_dim", "must be non-zero".to_string()));
    }

    if !(1..=50).contains(&config.neighbor_k) {
        errors.push(field(
            "neighbor_k",
            format!("must be in 1..=50, got {}", config.neighbor_k),
        ));
    }

    if config.session_idle_timeout_secs == 0 {
        errors.push(field(
            "session_idle_timeout_secs",
            "must be non-zero".to_string(),
        ));
    }

    if config.llm_max_concurrency == 0 {
        errors.push(field(
            "llm_max_concurrency",
            "must be non-zero".to_string(),
        ));
    }

    for (name, pool) in [
        ("vector_store.pool", &config.vector_store.pool),
        ("graph_store.pool", &config.graph_store.pool),
    ] {
        if pool.min_connections > pool.max_connections {
            errors.push(field(
                name,
                format!(
                    "min_connections ({}) must be <= max_connections ({})",
                    pool.min_connections, pool.max_connections
                ),
            ));
        }
        if pool.max_connections == 0 {
            errors.push(field(name, "max_connections must be non-zero".to_string()));
        }
    }

    for (name, secs) in [
        ("timeouts.add_secs", config.timeouts.add_secs),
        ("timeouts.search_secs", config.timeouts.search_secs),
        ("timeouts.default_secs", config.timeouts.default_secs),
        (
            "llm_gateway.request_timeout_secs",
            config.llm_gateway.request_timeout_secs,
        ),
    ] {
        if secs == 0 {
            errors.push(field(name, "must be non-zero".to_string()));
        }
    }

    if config.server.max_concurrent_sessions == 0 {
        errors.push(field(
            "server.max_concurrent_sessions",
            "must be non-zero".to_string(),
        ));
    }

    if config.server.port == 0 {
        errors.push(field("server.port", "must be non-zero".to_string()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&MemoryServiceConfig::default()).is_ok());
    }

    #[test]
    fn rejects_out_of_range_neighbor_k() {
        let mut config = MemoryServiceConfig::default();
        config.neighbor_k = 0;
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::Field { field, .. } if field == "neighbor_k")));
    }

    #[test]
    fn rejects_min_greater_than_max_pool() {
        let mut config = MemoryServiceConfig::default();
        config.vector_store.pool.min_connections = 50;
        config.vector_store.pool.max_connections = 20;
        let errors = validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::Field { field, .. } if field == "vector_store.pool")));
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut config = MemoryServiceConfig::default();
        config.timeouts.search_secs = 0;
        assert!(validate(&config).is_err());
    }
}
