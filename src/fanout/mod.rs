//! Scatter-gather across the server fleet.
//!
//! # Data Flow
//! ```text
//! run(operation, servers, task)
//!     → one tokio task per server (bounded by a semaphore)
//!     → each task returns Vec<R> or an error, or panics
//!     → join in registry order
//!     → Gathered { items, failures }
//! ```
//!
//! # Design Decisions
//! - A failing server never aborts the others and never fails the run
//! - Errors and panics both become one [`ServerFailure`] for that server
//! - No cross-task cancellation; per-call deadlines live in the transport
//! - Items from one server stay in the order that server's task produced them

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{Instrument, Span};
use uuid::Uuid;

use crate::config::FanoutConfig;
use crate::error::{FleetError, FleetResult};
use crate::model::ServerEndpoint;
use crate::observability::metrics;

/// Marker for a server whose task did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerFailure {
    pub server_name: String,
    pub server_url: String,
    pub message: String,
}

impl ServerFailure {
    pub fn new(server: &ServerEndpoint, message: impl Into<String>) -> Self {
        Self {
            server_name: server.name.clone(),
            server_url: server.url.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ServerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.server_name, self.message)
    }
}

/// Aggregate of one fan-out: every item that was produced plus one marker
/// per failed server.
#[derive(Debug, Clone, Serialize)]
pub struct Gathered<R> {
    pub items: Vec<R>,
    pub failures: Vec<ServerFailure>,
    pub servers: usize,
}

impl<R> Gathered<R> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Describe the failures as an error, if there were any.
    pub fn partial_failure(&self) -> Option<FleetError> {
        if self.failures.is_empty() {
            return None;
        }
        Some(FleetError::PartialFailure {
            failed: self.failures.len(),
            total: self.servers,
            summary: self
                .failures
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        })
    }

    /// Items, unless nothing was produced and at least one server failed.
    pub fn into_result(self) -> FleetResult<Vec<R>> {
        if self.items.is_empty() {
            if let Some(err) = self.partial_failure() {
                return Err(err);
            }
        }
        Ok(self.items)
    }

    pub fn map<T>(self, f: impl FnMut(R) -> T) -> Gathered<T> {
        Gathered {
            items: self.items.into_iter().map(f).collect(),
            failures: self.failures,
            servers: self.servers,
        }
    }

    fn record_failure(&mut self, operation: &str, span: &Span, server: &ServerEndpoint, message: String) {
        tracing::warn!(
            parent: span,
            server = %server,
            error = %message,
            "Server excluded from results"
        );
        metrics::record_fanout_failure(operation);
        self.failures.push(ServerFailure::new(server, message));
    }

    /// Combine two fan-outs over the same fleet.
    pub fn merge(mut self, other: Gathered<R>) -> Self {
        self.items.extend(other.items);
        self.failures.extend(other.failures);
        self.servers = self.servers.max(other.servers);
        self
    }
}

/// Bounded parallel executor shared by every fleet-wide operation.
#[derive(Debug, Clone, Default)]
pub struct ScatterGather {
    max_concurrency: usize,
}

impl ScatterGather {
    /// `max_concurrency` of 0 runs every server at once.
    pub fn new(max_concurrency: usize) -> Self {
        Self { max_concurrency }
    }

    pub fn from_config(config: &FanoutConfig) -> Self {
        Self::new(config.max_concurrency)
    }

    /// Run `task` once per server and collect the results.
    pub async fn run<R, F, Fut>(
        &self,
        operation: &'static str,
        servers: &[ServerEndpoint],
        task: F,
    ) -> Gathered<R>
    where
        R: Send + 'static,
        F: Fn(ServerEndpoint) -> Fut,
        Fut: Future<Output = FleetResult<Vec<R>>> + Send + 'static,
    {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("fanout", %run_id, operation);
        let limit = match self.max_concurrency {
            0 => servers.len().max(1),
            n => n,
        };
        let permits = Arc::new(Semaphore::new(limit));

        tracing::debug!(
            parent: &span,
            servers = servers.len(),
            concurrency = limit,
            "Starting fan-out"
        );

        let mut handles = Vec::with_capacity(servers.len());
        for server in servers {
            // A panic while building the future is charged to this server.
            let work = match panic::catch_unwind(AssertUnwindSafe(|| task(server.clone()))) {
                Ok(work) => work,
                Err(payload) => {
                    handles.push((server, Err(payload)));
                    continue;
                }
            };
            let permits = permits.clone();
            let task_span = tracing::debug_span!(parent: &span, "server_task", server = %server);
            let handle = tokio::spawn(
                async move {
                    // The semaphore is never closed.
                    let _permit = permits.acquire_owned().await.ok();
                    work.await
                }
                .instrument(task_span),
            );
            handles.push((server, Ok(handle)));
        }

        let mut gathered = Gathered {
            items: Vec::new(),
            failures: Vec::new(),
            servers: servers.len(),
        };
        for (server, handle) in handles {
            let handle = match handle {
                Ok(handle) => handle,
                Err(payload) => {
                    let message = format!("task panicked: {}", panic_message(payload));
                    gathered.record_failure(operation, &span, server, message);
                    continue;
                }
            };
            let message = match handle.await {
                Ok(Ok(items)) => {
                    gathered.items.extend(items);
                    continue;
                }
                Ok(Err(err)) => err.to_string(),
                Err(join_err) if join_err.is_panic() => {
                    format!("task panicked: {}", panic_message(join_err.into_panic()))
                }
                Err(join_err) => format!("task did not complete: {join_err}"),
            };

            gathered.record_failure(operation, &span, server, message);
        }

        tracing::info!(
            parent: &span,
            items = gathered.items.len(),
            failures = gathered.failures.len(),
            "Fan-out complete"
        );
        gathered
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
