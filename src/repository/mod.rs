//! Gateway collections on one server.
//!
//! # Data Flow
//! ```text
//! list_all(server, filter)
//!     → Get* {} → collection field → typed snapshots
//!     → name filter (case-insensitive substring) → sorted by name
//!
//! get_by_name(server, name)  → list_all → exact, case-sensitive match
//!
//! update(server, name, payload, hash?)
//!     → validation → ConflictGuard (refetch by original name) → Modify*
//! ```
//!
//! # Design Decisions
//! - One generic repository; the gateway kind selects methods and fields
//! - The remote API has no single-record read, so lookups list everything
//! - Nothing is cached

mod mapping;
mod routing;

use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::VariantConfig;
use crate::conflict::{guarded_update, ContentHash, GuardedStore};
use crate::error::{FleetError, FleetResult};
use crate::model::{GatewayKind, GatewayRecord, Payload, RawRecord, ServerEndpoint};
use crate::transport::{RemoteClient, RemoteMethod, TransportError};
use crate::variants::NationalNumberVariants;

pub use mapping::MappingRepository;
pub use routing::RoutingRepository;

/// Read and update one gateway kind on any server.
#[derive(Debug, Clone)]
pub struct GatewayRepository<G> {
    client: RemoteClient,
    numbers: NationalNumberVariants,
    _kind: PhantomData<fn() -> G>,
}

impl<G: GatewayRecord> GatewayRepository<G> {
    pub fn new(client: RemoteClient) -> Self {
        Self {
            client,
            numbers: NationalNumberVariants::from_config(&VariantConfig::default()),
            _kind: PhantomData,
        }
    }

    /// Country code used when numbers are written back.
    pub fn with_number_format(mut self, numbers: NationalNumberVariants) -> Self {
        self.numbers = numbers;
        self
    }

    fn list_method() -> RemoteMethod {
        match G::KIND {
            GatewayKind::Mapping => RemoteMethod::GetGatewayMapping,
            GatewayKind::Routing => RemoteMethod::GetGatewayRouting,
        }
    }

    fn modify_method() -> RemoteMethod {
        match G::KIND {
            GatewayKind::Mapping => RemoteMethod::ModifyGatewayMapping,
            GatewayKind::Routing => RemoteMethod::ModifyGatewayRouting,
        }
    }

    /// Every gateway of this kind on `server`, optionally filtered by a
    /// case-insensitive name substring, sorted by name.
    pub async fn list_all(&self, server: &ServerEndpoint, filter: Option<&str>) -> FleetResult<Vec<G>> {
        let mut data = self.client.call(server, Self::list_method(), json!({})).await?;
        let field = G::KIND.collection_field();

        let records = match data.get_mut(field).map(Value::take) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(FleetError::Transport {
                    server: server.name.clone(),
                    method: Self::list_method(),
                    source: TransportError::Decode(format!("{field} is not a list: {other}")),
                });
            }
        };

        let needle = filter
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_lowercase);

        let mut gateways: Vec<G> = records
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(raw) => Some(G::from_raw(raw)),
                other => {
                    tracing::warn!(server = %server, kind = %G::KIND, item = %other, "Skipping non-object gateway entry");
                    None
                }
            })
            .filter(|g| match &needle {
                Some(needle) => g.name().to_lowercase().contains(needle),
                None => true,
            })
            .collect();
        gateways.sort_by(|a, b| a.name().cmp(b.name()));

        tracing::debug!(server = %server, kind = %G::KIND, count = gateways.len(), "Listed gateways");
        Ok(gateways)
    }

    /// The gateway named exactly `name`.
    pub async fn get_by_name(&self, server: &ServerEndpoint, name: &str) -> FleetResult<G> {
        if name.trim().is_empty() {
            return Err(FleetError::validation(format!(
                "{} name cannot be empty",
                G::KIND.label()
            )));
        }
        self.list_all(server, None)
            .await?
            .into_iter()
            .find(|g| g.name() == name)
            .ok_or_else(|| FleetError::NotFound {
                kind: G::KIND.label(),
                name: name.to_string(),
                server: server.name.clone(),
            })
    }

    /// Write `payload` to the gateway loaded as `name`.
    ///
    /// With `expected` set, the gateway is re-read under `name` (even if the
    /// payload renames it) and the write is refused if it changed. A payload
    /// without a name targets `name`.
    pub async fn update(
        &self,
        server: &ServerEndpoint,
        name: &str,
        payload: Payload,
        expected: Option<&ContentHash>,
    ) -> FleetResult<()> {
        if name.trim().is_empty() {
            return Err(FleetError::validation(format!(
                "{} name cannot be empty for update",
                G::KIND.label()
            )));
        }
        if payload.is_empty() {
            return Err(FleetError::validation("update payload cannot be empty"));
        }

        let payload = payload.or_name(name);
        let effective = payload.name().unwrap_or(name).to_string();
        let store = RemoteGatewayStore { repo: self, server };
        guarded_update(&store, name, payload, expected).await?;

        tracing::info!(
            server = %server,
            kind = %G::KIND,
            gateway = %effective,
            guarded = expected.is_some(),
            "Gateway updated"
        );
        Ok(())
    }
}

/// Adapter letting the conflict guard re-read and write one gateway.
struct RemoteGatewayStore<'a, G> {
    repo: &'a GatewayRepository<G>,
    server: &'a ServerEndpoint,
}

#[async_trait]
impl<G: GatewayRecord> GuardedStore for RemoteGatewayStore<'_, G> {
    fn kind(&self) -> &'static str {
        G::KIND.label()
    }

    fn server(&self) -> &ServerEndpoint {
        self.server
    }

    async fn fetch_current(&self, key: &str) -> FleetResult<RawRecord> {
        let current = self.repo.get_by_name(self.server, key).await?;
        Ok(current.raw().clone())
    }

    async fn write(&self, payload: Payload) -> FleetResult<()> {
        self.repo
            .client
            .call(
                self.server,
                GatewayRepository::<G>::modify_method(),
                payload.into_value(),
            )
            .await
            .map(|_| ())
    }
}
