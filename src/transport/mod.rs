//! The remote call boundary.
//!
//! # Data Flow
//! ```text
//! repository / directory
//!     → RemoteClient::call (default timeout, logging, metrics, error mapping)
//!     → dyn Transport::call (one POST per call)
//!     → remote server
//! ```
//!
//! # Design Decisions
//! - Only the fixed [`RemoteMethod`] set can be invoked
//! - Every call has a deadline; there are no retries
//! - Any transport error short-circuits the caller into a failure that
//!   names the server and method

pub mod http;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::error::{FleetError, FleetResult};
use crate::model::ServerEndpoint;
use crate::observability::metrics;

pub use http::HttpTransport;

/// Methods the remote servers expose to this tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RemoteMethod {
    GetCustomer,
    GetAllCustomers,
    ModifyCustomer,
    GetGatewayMapping,
    ModifyGatewayMapping,
    GetGatewayRouting,
    ModifyGatewayRouting,
}

impl RemoteMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GetCustomer => "GetCustomer",
            Self::GetAllCustomers => "GetAllCustomers",
            Self::ModifyCustomer => "ModifyCustomer",
            Self::GetGatewayMapping => "GetGatewayMapping",
            Self::ModifyGatewayMapping => "ModifyGatewayMapping",
            Self::GetGatewayRouting => "GetGatewayRouting",
            Self::ModifyGatewayRouting => "ModifyGatewayRouting",
        }
    }
}

impl fmt::Display for RemoteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors a single remote call can produce.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("remote error (retCode {code}): {message}")]
    Remote { code: i64, message: String },

    #[error("invalid response: {0}")]
    Decode(String),

    /// Raised by non-HTTP transports (test doubles, adapters).
    #[error("{0}")]
    Other(String),
}

/// One remote call. Implementations must tolerate concurrent use.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(
        &self,
        server: &ServerEndpoint,
        method: RemoteMethod,
        payload: Value,
        timeout: Duration,
    ) -> Result<Value, TransportError>;
}

/// Shared handle used by repositories: transport plus default deadline.
#[derive(Clone)]
pub struct RemoteClient {
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl RemoteClient {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Same transport, different default deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            transport: self.transport.clone(),
            timeout,
        }
    }

    pub async fn call(
        &self,
        server: &ServerEndpoint,
        method: RemoteMethod,
        payload: Value,
    ) -> FleetResult<Value> {
        let start = Instant::now();
        let result = self
            .transport
            .call(server, method, payload, self.timeout)
            .await;
        metrics::record_remote_call(method.as_str(), &server.name, result.is_ok(), start);

        match result {
            Ok(data) => {
                tracing::debug!(
                    server = %server,
                    method = %method,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Remote call succeeded"
                );
                Ok(data)
            }
            Err(source) => {
                tracing::warn!(
                    server = %server,
                    method = %method,
                    error = %source,
                    "Remote call failed"
                );
                Err(FleetError::Transport {
                    server: server.name.clone(),
                    method,
                    source,
                })
            }
        }
    }
}

impl fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteClient")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
