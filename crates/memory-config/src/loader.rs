//! Defaults -> TOML file -> environment variable layering (§6.4), grounded
//! in the teacher's `config::loader::ConfigLoader::load` precedence order
//! (file, then env, then defaults — inverted here so later sources win,
//! which is what the `config` crate's builder expects).

use crate::config::MemoryServiceConfig;
use crate::validation::{self, ValidationError};
use anyhow::Context;
use config::{Config, Environment, File};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to assemble configuration: {0}")]
    Assembly(#[from] config::ConfigError),
    #[error("invalid configuration: {0:?}")]
    Invalid(Vec<ValidationError>),
}

/// Load and validate the service configuration. `file_path`, if present and
/// existing, is merged between the built-in defaults and environment
/// variables — environment variables always win, matching the teacher's
/// `MEMORY__` (here) vs. its own `AGENT_AGENCY_` prefix convention.
pub fn load(file_path: Option<&Path>) -> Result<MemoryServiceConfig, ConfigError> {
    let defaults = MemoryServiceConfig::default();
    let mut builder = Config::builder().add_source(
        Config::try_from(&defaults).context("serializing built-in defaults")?,
    );

    if let Some(path) = file_path {
        if path.exists() {
            info!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(File::from(path).required(false));
        } else {
            warn!(path = %path.display(), "configuration file not found, using defaults + env only");
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("MEMORY")
            .separator("__")
            .try_parsing(true),
    );

    let assembled = builder.build()?;
    let config: MemoryServiceConfig = assembled.try_deserialize()?;

    validation::validate(&config).map_err(ConfigError::Invalid)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // `MEMORY__*` env vars are process-global; serialize tests that touch them
    // so they don't race under the default parallel test runner.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn loads_defaults_when_no_file_or_env() {
        let config = load(None).unwrap();
        assert_eq!(config.neighbor_k, 5);
        assert_eq!(config.server.port, 8090);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "neighbor_k = 12").unwrap();
        writeln!(file, "[server]").unwrap();
        writeln!(file, "port = 9100").unwrap();
        writeln!(file, "host = \"0.0.0.0\"").unwrap();
        writeln!(file, "max_concurrent_sessions = 1024").unwrap();

        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.neighbor_k, 12);
        assert_eq!(config.server.port, 9100);
    }

    #[test]
    fn env_overrides_file() {
        let _guard = ENV_LOCK.lock().unwrap();
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "neighbor_k = 12").unwrap();

        std::env::set_var("MEMORY__NEIGHBOR_K", "30");
        let config = load(Some(file.path())).unwrap();
        std::env::remove_var("MEMORY__NEIGHBOR_K");

        assert_eq!(config.neighbor_k, 30);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("MEMORY__NEIGHBOR_K", "0");
        let result = load(None);
        std::env::remove_var("MEMORY__NEIGHBOR_K");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
