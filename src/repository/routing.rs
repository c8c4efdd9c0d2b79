//! Routing-gateway rewrite-rule operations.

use crate::codec::rewrite;
use crate::conflict::ContentHash;
use crate::error::{FleetError, FleetResult};
use crate::model::{GatewayRecord, RoutingGateway, ServerEndpoint, VirtualNumberDefinition};
use crate::repository::GatewayRepository;

pub type RoutingRepository = GatewayRepository<RoutingGateway>;

impl GatewayRepository<RoutingGateway> {
    /// Append real numbers to one rewrite rule, creating the rule if needed.
    ///
    /// New reals are converted to their stored form first. Existing reals
    /// keep their order and new ones are appended once. A "no rewrite" rule
    /// starts from an empty list. The write is always guarded: without
    /// `expected`, the hash of the snapshot loaded here is used. Returns the
    /// rule as written.
    pub async fn add_real_numbers<S: AsRef<str>>(
        &self,
        server: &ServerEndpoint,
        rg_name: &str,
        key: &str,
        reals: &[S],
        expected: Option<&ContentHash>,
    ) -> FleetResult<VirtualNumberDefinition> {
        rewrite::validate_key(key)?;
        let reals = self.storage_forms(reals)?;
        if reals.is_empty() {
            return Err(FleetError::validation(
                "the list of real numbers to add cannot be empty",
            ));
        }

        let rg = self.get_by_name(server, rg_name).await?;
        let mut rules = rg.rewrite_rules_in_caller.clone();
        let before = rules.get(key).map_or(0, <[String]>::len);
        let merged = rules.add_reals(key, &reals)?.to_vec();

        let hash = match expected {
            Some(hash) => hash.clone(),
            None => rg.content_hash(),
        };
        let payload = rg.patch().rewrite_rules(&rules).build();
        self.update(server, rg_name, payload, Some(&hash)).await?;

        tracing::info!(
            server = %server,
            gateway = rg_name,
            key,
            added = merged.len() - before,
            total = merged.len(),
            "Real numbers added to rewrite rule"
        );
        Ok(VirtualNumberDefinition::new(server, rg_name, key, &merged))
    }

    /// Blank inputs are skipped; anything else must hold exactly one number.
    fn storage_forms<S: AsRef<str>>(&self, reals: &[S]) -> FleetResult<Vec<String>> {
        let mut out = Vec::with_capacity(reals.len());
        for real in reals.iter().map(|r| r.as_ref().trim()) {
            if real.is_empty() {
                continue;
            }
            rewrite::validate_real(real)?;
            let stored = self.numbers.storage_form(real).ok_or_else(|| {
                FleetError::validation(format!("real number '{real}' contains no digits"))
            })?;
            out.push(stored);
        }
        Ok(out)
    }

    /// The rule for `key` inside one routing gateway.
    pub async fn virtual_number_status(
        &self,
        server: &ServerEndpoint,
        rg_name: &str,
        key: &str,
    ) -> FleetResult<VirtualNumberDefinition> {
        let rg = self.get_by_name(server, rg_name).await?;
        rg.definition(server, key.trim())
            .ok_or_else(|| FleetError::NotFound {
                kind: "Virtual number",
                name: format!("{key} in {rg_name}"),
                server: server.name.clone(),
            })
    }
}
