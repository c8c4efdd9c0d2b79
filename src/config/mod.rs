//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → FleetConfig (validated, immutable)
//!     → ServerRegistry + component settings handed to constructors
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no process-wide server list
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    FanoutConfig, FleetConfig, LogFormat, ObservabilityConfig, ServerConfig, TransportConfig,
    VariantConfig,
};
pub use validation::ValidationError;
