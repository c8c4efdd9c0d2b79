//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Every server has a name and a parsable http(s) URL
//! - Names and URLs are unique across the fleet
//! - Timeouts are positive
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: FleetConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::FleetConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no servers configured")]
    NoServers,

    #[error("server #{index} has an empty name")]
    EmptyServerName { index: usize },

    #[error("server '{name}' has an invalid URL '{url}': {reason}")]
    InvalidServerUrl {
        name: String,
        url: String,
        reason: String,
    },

    #[error("duplicate server name '{0}'")]
    DuplicateServerName(String),

    #[error("duplicate server URL '{0}'")]
    DuplicateServerUrl(String),

    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &FleetConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.servers.is_empty() {
        errors.push(ValidationError::NoServers);
    }

    let mut names = HashSet::new();
    let mut urls = HashSet::new();
    for (index, server) in config.servers.iter().enumerate() {
        if server.name.trim().is_empty() {
            errors.push(ValidationError::EmptyServerName { index });
        } else if !names.insert(server.name.as_str()) {
            errors.push(ValidationError::DuplicateServerName(server.name.clone()));
        }

        match Url::parse(&server.url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
                if !urls.insert(url.as_str().trim_end_matches('/').to_string()) {
                    errors.push(ValidationError::DuplicateServerUrl(server.url.clone()));
                }
            }
            Ok(url) => errors.push(ValidationError::InvalidServerUrl {
                name: server.name.clone(),
                url: server.url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            }),
            Err(e) => errors.push(ValidationError::InvalidServerUrl {
                name: server.name.clone(),
                url: server.url.clone(),
                reason: e.to_string(),
            }),
        }
    }

    if config.transport.timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "transport.timeout_secs" });
    }
    if config.transport.lookup_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "transport.lookup_timeout_secs" });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
