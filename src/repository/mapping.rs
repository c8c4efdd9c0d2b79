//! Mapping-gateway specific reads.

use crate::error::FleetResult;
use crate::model::{MappingGateway, ServerEndpoint};
use crate::repository::GatewayRepository;

pub type MappingRepository = GatewayRepository<MappingGateway>;

impl GatewayRepository<MappingGateway> {
    /// Mapping gateways on `server` whose callout caller prefixes contain
    /// `prefix` exactly.
    pub async fn with_callout_prefix(
        &self,
        server: &ServerEndpoint,
        prefix: &str,
    ) -> FleetResult<Vec<MappingGateway>> {
        Ok(self
            .list_all(server, None)
            .await?
            .into_iter()
            .filter(|mg| mg.callout_caller_prefixes.iter().any(|p| p == prefix))
            .collect())
    }
}
