//! Component wiring.
//!
//! # Responsibilities
//! - Turn a validated configuration into ready-to-use components
//! - Share one transport, one registry and one executor between them
//!
//! # Design Decisions
//! - Fail fast: an invalid server URL or HTTP client setup is fatal
//! - Components are built in dependency order, not concurrently
//! - Nothing global: callers own the `Fleet` and pass it around

use std::sync::Arc;
use std::time::Duration;

use crate::cleanup::{CleanupApplier, CleanupMatcher, NumberSearch};
use crate::config::FleetConfig;
use crate::customer::CustomerDirectory;
use crate::error::{FleetError, FleetResult};
use crate::fanout::ScatterGather;
use crate::model::ServerRegistry;
use crate::repository::{MappingRepository, RoutingRepository};
use crate::resolver::VirtualNumberResolver;
use crate::transport::{HttpTransport, RemoteClient, Transport};
use crate::variants::{NationalNumberVariants, VariantGenerator};

/// Every component, built from one configuration.
#[derive(Clone)]
pub struct Fleet {
    pub registry: ServerRegistry,
    pub mappings: MappingRepository,
    pub routings: RoutingRepository,
    pub customers: CustomerDirectory,
    pub resolver: VirtualNumberResolver,
    pub matcher: CleanupMatcher,
    pub applier: CleanupApplier,
    pub search: NumberSearch,
}

impl Fleet {
    /// Build with the HTTP transport.
    pub fn from_config(config: &FleetConfig) -> FleetResult<Self> {
        let transport = HttpTransport::new(&config.transport).map_err(|e| {
            FleetError::validation(format!("failed to build HTTP client: {e}"))
        })?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Build on any transport.
    pub fn with_transport(config: &FleetConfig, transport: Arc<dyn Transport>) -> FleetResult<Self> {
        let registry = ServerRegistry::from_config(&config.servers)?;
        let client = RemoteClient::new(
            transport,
            Duration::from_secs(config.transport.timeout_secs),
        );
        let lookup_client =
            client.with_timeout(Duration::from_secs(config.transport.lookup_timeout_secs));
        let executor = ScatterGather::from_config(&config.fanout);
        let numbers = NationalNumberVariants::from_config(&config.variants);
        let variants: Arc<dyn VariantGenerator> = Arc::new(numbers.clone());

        let customers = CustomerDirectory::new(client.clone(), executor.clone());
        let owner_lookup = CustomerDirectory::new(lookup_client, executor.clone());

        tracing::debug!(
            servers = registry.len(),
            max_concurrency = config.fanout.max_concurrency,
            "Fleet components ready"
        );

        Ok(Self {
            mappings: MappingRepository::new(client.clone()),
            routings: RoutingRepository::new(client.clone()).with_number_format(numbers),
            resolver: VirtualNumberResolver::new(client.clone(), executor.clone(), Arc::new(owner_lookup)),
            matcher: CleanupMatcher::new(client.clone(), executor.clone(), variants.clone()),
            applier: CleanupApplier::new(registry.clone(), client.clone()),
            search: NumberSearch::new(client, executor, variants),
            customers,
            registry,
        })
    }
}
