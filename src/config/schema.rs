//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the fleet
//! tooling. All types derive Serde traits for deserialization from config
//! files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FleetConfig {
    /// Remote servers, in display order.
    pub servers: Vec<ServerConfig>,

    /// Remote call settings.
    pub transport: TransportConfig,

    /// Scatter-gather settings.
    pub fanout: FanoutConfig,

    /// Phone-number variant expansion.
    pub variants: VariantConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// One authoritative remote server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Display name, unique within the file.
    pub name: String,

    /// Base URL of the server's API (e.g., "http://10.0.0.1:8080/external/server").
    pub url: String,
}

/// Remote call configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Timeout for ordinary calls in seconds.
    pub timeout_secs: u64,

    /// Shorter timeout used for ownership lookups in seconds.
    pub lookup_timeout_secs: u64,

    /// User-Agent header sent with every call.
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 45,
            lookup_timeout_secs: 20,
            user_agent: concat!("gateway-fleet/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Fan-out configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FanoutConfig {
    /// Maximum concurrent per-server tasks (0 = one per server).
    pub max_concurrency: usize,
}

/// Variant generation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VariantConfig {
    /// Country calling code used to build international forms.
    pub country_code: String,
}

impl Default for VariantConfig {
    fn default() -> Self {
        Self {
            country_code: "84".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}
