//! Configuration loading and validation for the memory service (§6.4).
//!
//! Layering is defaults -> optional TOML file -> `MEMORY__`-prefixed
//! environment variables, then a validation pass before the service starts.

pub mod config;
pub mod loader;
pub mod secrets;
pub mod validation;

pub use config::{
    LlmGatewayConfig, MemoryServiceConfig, PoolConfig, ServerConfig, StoreConnectionConfig,
    TimeoutsConfig, VectorDistance,
};
pub use loader::{load, ConfigError};
pub use secrets::SecretString;
pub use validation::ValidationError;
