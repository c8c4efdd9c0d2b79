//! Applying a reviewed cleanup plan.
//!
//! Tasks carry the exact payload to write. They are applied one by one
//! without a conflict check; each task produces its own report and a
//! failure never stops the remaining tasks.

use serde::{Deserialize, Serialize};

use crate::error::FleetResult;
use crate::model::{GatewayKind, Payload, ServerRegistry};
use crate::repository::{MappingRepository, RoutingRepository};
use crate::transport::RemoteClient;

/// One reviewed write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupTask {
    pub server_name: String,
    #[serde(rename = "type")]
    pub kind: GatewayKind,
    pub gateway_name: String,
    pub payload: Payload,
}

/// Outcome of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    pub server_name: String,
    #[serde(rename = "type")]
    pub kind: GatewayKind,
    pub gateway_name: String,
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct CleanupApplier {
    registry: ServerRegistry,
    mappings: MappingRepository,
    routings: RoutingRepository,
}

impl CleanupApplier {
    pub fn new(registry: ServerRegistry, client: RemoteClient) -> Self {
        Self {
            registry,
            mappings: MappingRepository::new(client.clone()),
            routings: RoutingRepository::new(client),
        }
    }

    /// Apply every task in order and report on each.
    pub async fn apply(&self, tasks: Vec<CleanupTask>) -> Vec<TaskReport> {
        let mut reports = Vec::with_capacity(tasks.len());
        for task in tasks {
            let report = match self.apply_one(&task).await {
                Ok(()) => TaskReport {
                    message: format!(
                        "{} '{}' on {} updated",
                        task.kind.label(),
                        task.gateway_name,
                        task.server_name
                    ),
                    success: true,
                    server_name: task.server_name,
                    kind: task.kind,
                    gateway_name: task.gateway_name,
                },
                Err(err) => {
                    tracing::warn!(
                        server = %task.server_name,
                        kind = %task.kind,
                        gateway = %task.gateway_name,
                        error = %err,
                        "Cleanup task failed"
                    );
                    TaskReport {
                        message: err.to_string(),
                        success: false,
                        server_name: task.server_name,
                        kind: task.kind,
                        gateway_name: task.gateway_name,
                    }
                }
            };
            reports.push(report);
        }

        let failed = reports.iter().filter(|r| !r.success).count();
        tracing::info!(tasks = reports.len(), failed, "Cleanup applied");
        reports
    }

    async fn apply_one(&self, task: &CleanupTask) -> FleetResult<()> {
        let server = self.registry.require(&task.server_name)?;
        let payload = task.payload.clone();
        match task.kind {
            GatewayKind::Mapping => {
                self.mappings
                    .update(server, &task.gateway_name, payload, None)
                    .await
            }
            GatewayKind::Routing => {
                self.routings
                    .update(server, &task.gateway_name, payload, None)
                    .await
            }
        }
    }
}
