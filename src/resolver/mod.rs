//! Virtual-number definitions and ownership across the fleet.
//!
//! # Data Flow
//! ```text
//! find_definitions(keys) / search_keys(term) / all_definitions()
//!     → fan-out: GetGatewayRouting → parse rewrite rules → definitions
//!
//! resolve_owner_customer(key)
//!     → fan-out per server:
//!         MGs whose calloutCallerPrefixes contain key
//!         → (account, accountName), deduplicated per server
//!         → CustomerLookup → names must agree (case-insensitive)
//!     → links + per-lookup failure markers
//! ```
//!
//! # Design Decisions
//! - A key can be defined in many gateways; every occurrence is reported
//! - Customer lookups are injected so the resolver does not own customer I/O
//! - A failed lookup is reported as a failure, not silently dropped

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{FleetError, FleetResult};
use crate::fanout::{Gathered, ScatterGather, ServerFailure};
use crate::model::{Customer, ServerEndpoint, VirtualNumberDefinition};
use crate::repository::{MappingRepository, RoutingRepository};
use crate::transport::RemoteClient;

/// Source of customer records for ownership checks.
#[async_trait]
pub trait CustomerLookup: Send + Sync {
    async fn lookup(&self, server: &ServerEndpoint, account: &str) -> FleetResult<Customer>;
}

/// A customer confirmed to own a virtual number on one server.
#[derive(Debug, Clone, Serialize)]
pub struct OwnerLink {
    pub virtual_key: String,
    pub server_name: String,
    pub server_url: String,
    pub account: String,
    pub account_name: String,
    /// Mapping gateways on this server that link the key to the account.
    pub mapping_gateways: Vec<String>,
    pub customer: Customer,
}

/// Every definition in the fleet, grouped by key.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DefinitionMap {
    pub definitions: BTreeMap<String, Vec<VirtualNumberDefinition>>,
    pub failures: Vec<ServerFailure>,
}

impl From<Gathered<VirtualNumberDefinition>> for DefinitionMap {
    fn from(gathered: Gathered<VirtualNumberDefinition>) -> Self {
        let mut definitions: BTreeMap<String, Vec<VirtualNumberDefinition>> = BTreeMap::new();
        for def in gathered.items {
            definitions.entry(def.virtual_key.clone()).or_default().push(def);
        }
        Self {
            definitions,
            failures: gathered.failures,
        }
    }
}

enum OwnerProbe {
    Linked(OwnerLink),
    LookupFailed(ServerFailure),
}

#[derive(Clone)]
pub struct VirtualNumberResolver {
    mappings: MappingRepository,
    routings: RoutingRepository,
    executor: ScatterGather,
    customers: Arc<dyn CustomerLookup>,
}

impl VirtualNumberResolver {
    pub fn new(
        client: RemoteClient,
        executor: ScatterGather,
        customers: Arc<dyn CustomerLookup>,
    ) -> Self {
        Self {
            mappings: MappingRepository::new(client.clone()),
            routings: RoutingRepository::new(client),
            executor,
            customers,
        }
    }

    /// Definitions of the given keys, one per (server, routing gateway) occurrence.
    pub async fn find_definitions<S: AsRef<str>>(
        &self,
        servers: &[ServerEndpoint],
        keys: &[S],
    ) -> FleetResult<Gathered<VirtualNumberDefinition>> {
        let wanted: BTreeSet<String> = keys
            .iter()
            .map(|k| k.as_ref().trim())
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
        if wanted.is_empty() {
            return Err(FleetError::validation(
                "virtual number key list cannot be empty",
            ));
        }
        let wanted = Arc::new(wanted);

        Ok(self
            .executor
            .run("find_definitions", servers, |server| {
                let wanted = wanted.clone();
                definitions_on(self.routings.clone(), server, move |key| wanted.contains(key))
            })
            .await)
    }

    /// Definitions whose key contains `term`, case-insensitive.
    pub async fn search_keys(
        &self,
        servers: &[ServerEndpoint],
        term: &str,
    ) -> FleetResult<Gathered<VirtualNumberDefinition>> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return Err(FleetError::validation("key search term cannot be empty"));
        }

        Ok(self
            .executor
            .run("search_keys", servers, |server| {
                let term = term.clone();
                definitions_on(self.routings.clone(), server, move |key| {
                    key.to_lowercase().contains(&term)
                })
            })
            .await)
    }

    /// Every definition on every server.
    pub async fn all_definitions(&self, servers: &[ServerEndpoint]) -> DefinitionMap {
        self.executor
            .run("all_definitions", servers, |server| {
                definitions_on(self.routings.clone(), server, |_| true)
            })
            .await
            .into()
    }

    /// Customers that own `key` through a mapping gateway.
    ///
    /// A mapping gateway links a key to an account when its callout caller
    /// prefixes contain the key. The link is confirmed only when the
    /// customer record's name matches the gateway's account name.
    pub async fn resolve_owner_customer(
        &self,
        servers: &[ServerEndpoint],
        key: &str,
    ) -> FleetResult<Gathered<OwnerLink>> {
        let key = key.trim().to_string();
        if key.is_empty() {
            return Err(FleetError::validation("virtual number key cannot be empty"));
        }

        let probes = self
            .executor
            .run("resolve_owner", servers, |server| {
                probe_owners(
                    self.mappings.clone(),
                    self.customers.clone(),
                    server,
                    key.clone(),
                )
            })
            .await;

        let mut gathered = Gathered {
            items: Vec::new(),
            failures: probes.failures,
            servers: probes.servers,
        };
        for probe in probes.items {
            match probe {
                OwnerProbe::Linked(link) => gathered.items.push(link),
                OwnerProbe::LookupFailed(failure) => gathered.failures.push(failure),
            }
        }
        Ok(gathered)
    }
}

async fn definitions_on<F>(
    routings: RoutingRepository,
    server: ServerEndpoint,
    keep: F,
) -> FleetResult<Vec<VirtualNumberDefinition>>
where
    F: Fn(&str) -> bool,
{
    let gateways = routings.list_all(&server, None).await?;
    Ok(gateways
        .iter()
        .flat_map(|rg| rg.definitions(&server))
        .filter(|def| keep(&def.virtual_key))
        .collect())
}

async fn probe_owners(
    mappings: MappingRepository,
    customers: Arc<dyn CustomerLookup>,
    server: ServerEndpoint,
    key: String,
) -> FleetResult<Vec<OwnerProbe>> {
    // account -> (accountName, mapping gateway names)
    let mut accounts: BTreeMap<String, (String, Vec<String>)> = BTreeMap::new();
    for mg in mappings.with_callout_prefix(&server, &key).await? {
        let account = mg.account.trim();
        let account_name = mg.account_name.trim();
        if account.is_empty() || account_name.is_empty() {
            tracing::debug!(server = %server, gateway = %mg.name, "Mapping gateway has no account link");
            continue;
        }
        accounts
            .entry(account.to_string())
            .or_insert_with(|| (account_name.to_string(), Vec::new()))
            .1
            .push(mg.name.clone());
    }

    let mut probes = Vec::with_capacity(accounts.len());
    for (account, (account_name, mapping_gateways)) in accounts {
        match customers.lookup(&server, &account).await {
            Ok(customer) if customer.name.trim().to_lowercase() == account_name.to_lowercase() => {
                probes.push(OwnerProbe::Linked(OwnerLink {
                    virtual_key: key.clone(),
                    server_name: server.name.clone(),
                    server_url: server.url.to_string(),
                    account,
                    account_name,
                    mapping_gateways,
                    customer,
                }));
            }
            Ok(customer) => {
                tracing::debug!(
                    server = %server,
                    account = %account,
                    expected = %account_name,
                    actual = %customer.name,
                    "Customer name does not match mapping gateway"
                );
            }
            Err(err) => {
                tracing::warn!(server = %server, account = %account, error = %err, "Owner lookup failed");
                probes.push(OwnerProbe::LookupFailed(ServerFailure::new(
                    &server,
                    format!("lookup of account {account} failed: {err}"),
                )));
            }
        }
    }
    Ok(probes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customer::CustomerDirectory;
    use crate::testing::{FakeFleet, FakeServer};
    use serde_json::json;

    fn fleet() -> Arc<FakeFleet> {
        Arc::new(
            FakeFleet::new()
                .with_server(
                    "hn",
                    FakeServer::default()
                        .routing(json!({"name": "HN-To-SG", "rewriteRulesInCaller": "123456:84911222333;654321:hetso"}))
                        .routing(json!({"name": "HN-In", "rewriteRulesInCaller": "123456:84911222444"}))
                        .mapping(json!({"name": "MG-1", "account": "acme", "accountName": "ACME Corp", "calloutCallerPrefixes": "123456"}))
                        .mapping(json!({"name": "MG-2", "account": "acme", "accountName": "ACME Corp", "calloutCallerPrefixes": "123456,1"}))
                        .mapping(json!({"name": "MG-3", "account": "", "accountName": "Nobody", "calloutCallerPrefixes": "123456"}))
                        .mapping(json!({"name": "MG-4", "account": "impostor", "accountName": "Someone", "calloutCallerPrefixes": "123456"}))
                        .mapping(json!({"name": "MG-5", "account": "ghost", "accountName": "Ghost", "calloutCallerPrefixes": "123456"}))
                        .customer(json!({"account": "acme", "name": "acme corp"}))
                        .customer(json!({"account": "impostor", "name": "Different"})),
                )
                .with_server(
                    "sg",
                    FakeServer::default()
                        .routing(json!({"name": "SG-In", "rewriteRulesInCaller": "123456:6598765432"})),
                )
                .with_server("down", FakeServer::failing("no route to host")),
        )
    }

    fn resolver(fleet: &Arc<FakeFleet>) -> VirtualNumberResolver {
        let directory = CustomerDirectory::new(fleet.client(), ScatterGather::default());
        VirtualNumberResolver::new(fleet.client(), ScatterGather::default(), Arc::new(directory))
    }

    #[tokio::test]
    async fn test_find_definitions_reports_every_occurrence() {
        let fleet = fleet();
        let result = resolver(&fleet)
            .find_definitions(&fleet.servers(), &["123456"])
            .await
            .unwrap();

        let mut places: Vec<(String, String)> = result
            .items
            .iter()
            .map(|d| (d.server_name.clone(), d.rg_name.clone()))
            .collect();
        places.sort();
        assert_eq!(
            places,
            vec![
                ("hn".to_string(), "HN-In".to_string()),
                ("hn".to_string(), "HN-To-SG".to_string()),
                ("sg".to_string(), "SG-In".to_string()),
            ]
        );
        assert_eq!(result.failures.len(), 1);

        let empty: [&str; 0] = [];
        assert!(resolver(&fleet).find_definitions(&fleet.servers(), &empty).await.is_err());
    }

    #[tokio::test]
    async fn test_all_definitions_and_key_search() {
        let fleet = fleet();
        let resolver = resolver(&fleet);

        let map = resolver.all_definitions(&fleet.servers()).await;
        assert_eq!(map.definitions["123456"].len(), 3);
        assert!(map.definitions["654321"][0].is_sentinel);
        assert_eq!(map.failures.len(), 1);

        let found = resolver.search_keys(&fleet.servers(), "6543").await.unwrap();
        assert_eq!(found.items.len(), 1);
        assert_eq!(found.items[0].virtual_key, "654321");
    }

    #[tokio::test]
    async fn test_resolve_owner_customer() {
        let fleet = fleet();
        let result = resolver(&fleet)
            .resolve_owner_customer(&fleet.servers(), "123456")
            .await
            .unwrap();

        assert_eq!(result.items.len(), 1);
        let link = &result.items[0];
        assert_eq!(link.account, "acme");
        assert_eq!(link.mapping_gateways, vec!["MG-1", "MG-2"]);

        // "ghost" has no customer record; "down" is unreachable.
        let mut failed: Vec<&str> = result.failures.iter().map(|f| f.server_name.as_str()).collect();
        failed.sort();
        assert_eq!(failed, vec!["down", "hn"]);
        assert!(result.failures.iter().any(|f| f.message.contains("ghost")));
    }
}
