//! Error taxonomy shared by every fleet operation.
//!
//! Expected conditions (missing gateway, bad input, remote error, hash
//! mismatch) are returned as values. Panics inside per-server tasks never
//! reach this type directly; the fan-out boundary turns them into
//! [`crate::fanout::ServerFailure`] markers.

use thiserror::Error;

use crate::transport::{RemoteMethod, TransportError};

/// Errors returned by repository, matcher and resolver operations.
#[derive(Debug, Error)]
pub enum FleetError {
    /// The named record is absent after a full listing.
    #[error("{kind} '{name}' not found on server {server}")]
    NotFound {
        kind: &'static str,
        name: String,
        server: String,
    },

    /// A required input was missing or empty; no remote call was made.
    #[error("validation error: {0}")]
    Validation(String),

    /// The remote server reported an error or could not be reached.
    #[error("{method} on {server} failed: {source}")]
    Transport {
        server: String,
        method: RemoteMethod,
        #[source]
        source: TransportError,
    },

    /// The record changed since the caller loaded it.
    #[error("{kind} '{name}' on {server} was modified by someone else; reload and try again")]
    Conflict {
        kind: &'static str,
        name: String,
        server: String,
    },

    /// Every server in a fan-out failed.
    #[error("{failed} of {total} servers failed: {summary}")]
    PartialFailure {
        failed: usize,
        total: usize,
        summary: String,
    },
}

impl FleetError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True for hash mismatches, so callers can offer "reload and retry".
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for fleet operations.
pub type FleetResult<T> = Result<T, FleetError>;
