//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → EngineConfig (validated, immutable)
//!     → shared via Arc with the engine's subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; one config per wallet engine instance
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, AggregatorConfig, EndpointConfig, EngineConfig, ObservabilityConfig, PersistenceConfig,
    PollingConfig, ProvidersConfig, SpendConfig, TokenConfig, WalletConfig,
};
