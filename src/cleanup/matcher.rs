//! Fleet-wide cleanup plan.
//!
//! Given numbers that should disappear from routing configuration, find
//! every gateway that still references one of their variants. The result
//! is a plan: nothing is written here.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::codec::prefix;
use crate::error::{FleetError, FleetResult};
use crate::fanout::{Gathered, ScatterGather};
use crate::model::{
    fields, GatewayKind, GatewayRecord, MappingGateway, Payload, RoutingGateway, ServerEndpoint,
};
use crate::repository::{MappingRepository, RoutingRepository};
use crate::transport::RemoteClient;
use crate::variants::{VariantGenerator, VariantIndex};

use super::apply::CleanupTask;

/// Name looks like an outbound route ("HN-To-SG", "hn_to_sg", "HNtoSG").
pub fn is_outbound_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    ["to", "to-", "to_"].iter().any(|marker| lower.contains(marker))
}

/// Exactly six ASCII digits.
pub fn is_six_digit_virtual_candidate(key: &str) -> bool {
    key.len() == 6 && key.bytes().all(|b| b.is_ascii_digit())
}

/// A mapping gateway whose callout caller prefixes reference the targets.
#[derive(Debug, Clone, Serialize)]
pub struct MappingCandidate {
    pub server_name: String,
    pub server_url: String,
    pub gateway_name: String,
    /// Untouched list as fetched.
    pub callout_caller_prefixes: Vec<String>,
    pub matched_callout_caller_prefixes: Vec<String>,
    #[serde(skip)]
    gateway: MappingGateway,
}

/// A routing gateway referencing the targets in any of its fields.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingCandidate {
    pub server_name: String,
    pub server_url: String,
    pub gateway_name: String,
    pub is_outbound: bool,
    pub callin_caller_prefixes: Vec<String>,
    pub matched_callin_caller_prefixes: Vec<String>,
    pub callin_callee_prefixes: Vec<String>,
    pub matched_callin_callee_prefixes: Vec<String>,
    pub matched_rewrite_keys: Vec<String>,
    /// Per rewrite key, the real numbers that matched.
    pub matched_rewrite_reals: BTreeMap<String, Vec<String>>,
    #[serde(skip)]
    gateway: RoutingGateway,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum CleanupCandidate {
    #[serde(rename = "MG")]
    Mapping(MappingCandidate),
    #[serde(rename = "RG")]
    Routing(RoutingCandidate),
}

impl MappingCandidate {
    pub fn gateway(&self) -> &MappingGateway {
        &self.gateway
    }

    /// The gateway with exactly the matched prefixes removed.
    pub fn proposed_payload(&self) -> Payload {
        let remaining = prefix::without(
            &self.callout_caller_prefixes,
            &self.matched_callout_caller_prefixes,
        );
        self.gateway
            .patch()
            .prefixes(fields::CALLOUT_CALLER_PREFIXES, &remaining)
            .build()
    }
}

impl RoutingCandidate {
    pub fn gateway(&self) -> &RoutingGateway {
        &self.gateway
    }

    /// The gateway with matched prefixes removed, matched rewrite keys
    /// dropped and matched real numbers taken out of their rules.
    ///
    /// Fields with nothing matched are sent back exactly as fetched.
    pub fn proposed_payload(&self) -> Payload {
        let mut patch = self.gateway.patch();
        if !self.matched_callin_caller_prefixes.is_empty() {
            patch = patch.prefixes(
                fields::CALLIN_CALLER_PREFIXES,
                &prefix::without(&self.callin_caller_prefixes, &self.matched_callin_caller_prefixes),
            );
        }
        if !self.matched_callin_callee_prefixes.is_empty() {
            patch = patch.prefixes(
                fields::CALLIN_CALLEE_PREFIXES,
                &prefix::without(&self.callin_callee_prefixes, &self.matched_callin_callee_prefixes),
            );
        }
        if !self.matched_rewrite_keys.is_empty() || !self.matched_rewrite_reals.is_empty() {
            let mut rules = self.gateway.rewrite_rules_in_caller.clone();
            for key in &self.matched_rewrite_keys {
                rules.remove_key(key);
            }
            for (key, reals) in &self.matched_rewrite_reals {
                rules.remove_reals(key, reals);
            }
            patch = patch.rewrite_rules(&rules);
        }
        patch.build()
    }
}

impl CleanupCandidate {
    pub fn kind(&self) -> GatewayKind {
        match self {
            Self::Mapping(_) => GatewayKind::Mapping,
            Self::Routing(_) => GatewayKind::Routing,
        }
    }

    pub fn server_name(&self) -> &str {
        match self {
            Self::Mapping(c) => &c.server_name,
            Self::Routing(c) => &c.server_name,
        }
    }

    pub fn gateway_name(&self) -> &str {
        match self {
            Self::Mapping(c) => &c.gateway_name,
            Self::Routing(c) => &c.gateway_name,
        }
    }

    pub fn proposed_payload(&self) -> Payload {
        match self {
            Self::Mapping(c) => c.proposed_payload(),
            Self::Routing(c) => c.proposed_payload(),
        }
    }

    /// Apply task that would write [`CleanupCandidate::proposed_payload`].
    pub fn to_task(&self) -> CleanupTask {
        CleanupTask {
            server_name: self.server_name().to_string(),
            kind: self.kind(),
            gateway_name: self.gateway_name().to_string(),
            payload: self.proposed_payload(),
        }
    }
}

/// Match one mapping gateway against the expanded targets.
pub fn match_mapping(
    server: &ServerEndpoint,
    mg: MappingGateway,
    targets: &VariantIndex,
) -> Option<MappingCandidate> {
    let matched = targets.matches(&mg.callout_caller_prefixes);
    if matched.is_empty() {
        return None;
    }
    Some(MappingCandidate {
        server_name: server.name.clone(),
        server_url: server.url.to_string(),
        gateway_name: mg.name.clone(),
        callout_caller_prefixes: mg.callout_caller_prefixes.clone(),
        matched_callout_caller_prefixes: matched,
        gateway: mg,
    })
}

/// Match one routing gateway against the expanded targets.
pub fn match_routing(
    server: &ServerEndpoint,
    rg: RoutingGateway,
    targets: &VariantIndex,
) -> Option<RoutingCandidate> {
    let is_outbound = is_outbound_name(&rg.name);
    let matched_caller = targets.matches(&rg.callin_caller_prefixes);
    let matched_callee = if is_outbound {
        targets.matches(&rg.callin_callee_prefixes)
    } else {
        Vec::new()
    };

    let mut matched_keys = Vec::new();
    let mut matched_reals = BTreeMap::new();
    for (key, reals) in rg.rewrite_rules_in_caller.iter() {
        if targets.contains(key) && is_six_digit_virtual_candidate(key) {
            matched_keys.push(key.to_string());
        }
        let hits = targets.matches(reals);
        if !hits.is_empty() {
            matched_reals.insert(key.to_string(), hits);
        }
    }

    if matched_caller.is_empty()
        && matched_callee.is_empty()
        && matched_keys.is_empty()
        && matched_reals.is_empty()
    {
        return None;
    }

    Some(RoutingCandidate {
        server_name: server.name.clone(),
        server_url: server.url.to_string(),
        gateway_name: rg.name.clone(),
        is_outbound,
        callin_caller_prefixes: rg.callin_caller_prefixes.clone(),
        matched_callin_caller_prefixes: matched_caller,
        callin_callee_prefixes: rg.callin_callee_prefixes.clone(),
        matched_callin_callee_prefixes: matched_callee,
        matched_rewrite_keys: matched_keys,
        matched_rewrite_reals: matched_reals,
        gateway: rg,
    })
}

/// Scans the fleet for gateways referencing a set of numbers.
#[derive(Clone)]
pub struct CleanupMatcher {
    mappings: MappingRepository,
    routings: RoutingRepository,
    executor: ScatterGather,
    generator: Arc<dyn VariantGenerator>,
}

impl CleanupMatcher {
    pub fn new(
        client: RemoteClient,
        executor: ScatterGather,
        generator: Arc<dyn VariantGenerator>,
    ) -> Self {
        Self {
            mappings: MappingRepository::new(client.clone()),
            routings: RoutingRepository::new(client),
            executor,
            generator,
        }
    }

    /// Build the cleanup plan for `numbers` across `servers`.
    ///
    /// Mapping and routing gateways are scanned in separate fan-outs, so a
    /// server failing one listing still contributes the other kind.
    pub async fn scan<S: AsRef<str>>(
        &self,
        servers: &[ServerEndpoint],
        numbers: &[S],
    ) -> FleetResult<Gathered<CleanupCandidate>> {
        let targets = Arc::new(VariantIndex::build(self.generator.as_ref(), numbers));
        if targets.is_empty() {
            return Err(FleetError::validation("no numbers to check"));
        }
        tracing::info!(
            inputs = numbers.len(),
            variants = targets.len(),
            servers = servers.len(),
            "Scanning fleet for cleanup candidates"
        );

        let mg_scan = self.executor.run("cleanup_scan_mg", servers, |server| {
            scan_mappings(self.mappings.clone(), server, targets.clone())
        });
        let rg_scan = self.executor.run("cleanup_scan_rg", servers, |server| {
            scan_routings(self.routings.clone(), server, targets.clone())
        });
        let (mg, rg) = tokio::join!(mg_scan, rg_scan);

        let gathered = mg.merge(rg);
        tracing::info!(
            candidates = gathered.items.len(),
            failures = gathered.failures.len(),
            "Cleanup scan complete"
        );
        Ok(gathered)
    }
}

async fn scan_mappings(
    repo: MappingRepository,
    server: ServerEndpoint,
    targets: Arc<VariantIndex>,
) -> FleetResult<Vec<CleanupCandidate>> {
    let gateways = repo.list_all(&server, None).await?;
    Ok(gateways
        .into_iter()
        .filter_map(|mg| match_mapping(&server, mg, &targets))
        .map(CleanupCandidate::Mapping)
        .collect())
}

async fn scan_routings(
    repo: RoutingRepository,
    server: ServerEndpoint,
    targets: Arc<VariantIndex>,
) -> FleetResult<Vec<CleanupCandidate>> {
    let gateways = repo.list_all(&server, None).await?;
    Ok(gateways
        .into_iter()
        .filter_map(|rg| match_routing(&server, rg, &targets))
        .map(CleanupCandidate::Routing)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{endpoint, raw, FakeFleet, FakeServer};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn exact(inputs: &[&str]) -> VariantIndex {
        let identity = |raw: &str| BTreeSet::from([raw.to_string()]);
        VariantIndex::build(&identity, inputs)
    }

    #[test]
    fn test_predicates() {
        assert!(is_outbound_name("HN-To-SG"));
        assert!(is_outbound_name("hn_to_sg"));
        assert!(!is_outbound_name("HN-CallIn"));
        assert!(is_six_digit_virtual_candidate("123456"));
        assert!(!is_six_digit_virtual_candidate("12345"));
        assert!(!is_six_digit_virtual_candidate("12345a"));
        assert!(!is_six_digit_virtual_candidate("１２３４５６"));
    }

    #[test]
    fn test_mapping_match_keeps_original_list() {
        let mg = MappingGateway::from_raw(raw(json!({
            "name": "MG-A",
            "calloutCallerPrefixes": "84911222333,0911222333",
        })));
        let candidate = match_mapping(&endpoint("hn-01"), mg, &exact(&["0911222333"])).unwrap();

        assert_eq!(candidate.matched_callout_caller_prefixes, vec!["0911222333"]);
        assert_eq!(candidate.callout_caller_prefixes, vec!["84911222333", "0911222333"]);
        assert_eq!(
            candidate.proposed_payload().get(fields::CALLOUT_CALLER_PREFIXES),
            Some(&json!("84911222333"))
        );
    }

    #[test]
    fn test_callee_only_matched_on_outbound() {
        let targets = exact(&["0911222333"]);
        let inbound = RoutingGateway::from_raw(raw(json!({
            "name": "HN-CallIn",
            "callinCalleePrefixes": "0911222333",
        })));
        assert!(match_routing(&endpoint("hn-01"), inbound, &targets).is_none());

        let outbound = RoutingGateway::from_raw(raw(json!({
            "name": "HN-To-SG",
            "callinCalleePrefixes": "0911222333",
        })));
        let candidate = match_routing(&endpoint("hn-01"), outbound, &targets).unwrap();
        assert_eq!(candidate.matched_callin_callee_prefixes, vec!["0911222333"]);
        assert!(candidate.is_outbound);
    }

    #[test]
    fn test_rewrite_key_requires_six_digits() {
        let targets = exact(&["123456", "1234567", "84911222333"]);
        let rg = RoutingGateway::from_raw(raw(json!({
            "name": "HN-CallIn",
            "rewriteRulesInCaller": "123456:hetso;1234567:555;777777:84911222333,1",
        })));
        let candidate = match_routing(&endpoint("hn-01"), rg, &targets).unwrap();

        assert_eq!(candidate.matched_rewrite_keys, vec!["123456"]);
        assert_eq!(
            candidate.matched_rewrite_reals,
            BTreeMap::from([("777777".to_string(), vec!["84911222333".to_string()])])
        );

        let payload = candidate.proposed_payload();
        assert_eq!(
            payload.get(fields::REWRITE_RULES_IN_CALLER),
            Some(&json!("1234567:555;777777:1"))
        );
    }

    #[test]
    fn test_unmatched_fields_are_sent_back_verbatim() {
        let stored = json!({
            "name": "HN-CallIn",
            "capacity": 30,
            "callinCallerPrefixes": "0911222333,5",
            "callinCalleePrefixes": " 0911222333 ,7",
            "rewriteRulesInCaller": "999999:84911000111;100000:hetso;junk-fragment",
        });
        let rg = RoutingGateway::from_raw(raw(stored.clone()));
        let candidate = match_routing(&endpoint("hn-01"), rg, &exact(&["0911222333"])).unwrap();

        let payload = candidate.proposed_payload();
        assert_eq!(payload.get(fields::CALLIN_CALLER_PREFIXES), Some(&json!("5")));
        for field in [fields::CALLIN_CALLEE_PREFIXES, fields::REWRITE_RULES_IN_CALLER, "capacity", "name"] {
            assert_eq!(payload.get(field), stored.get(field), "{field} changed");
        }
    }

    #[test]
    fn test_rewrite_cleanup_keeps_rule_order() {
        let rg = RoutingGateway::from_raw(raw(json!({
            "name": "HN-CallIn",
            "rewriteRulesInCaller": "999999:84911222333,1;100000:hetso;500000:2",
        })));
        let candidate = match_routing(&endpoint("hn-01"), rg, &exact(&["84911222333"])).unwrap();

        assert_eq!(
            candidate.proposed_payload().get(fields::REWRITE_RULES_IN_CALLER),
            Some(&json!("999999:1;100000:hetso;500000:2"))
        );
    }

    #[test]
    fn test_candidate_serializes_with_type_tag() {
        let mg = MappingGateway::from_raw(raw(json!({"name": "MG-A", "calloutCallerPrefixes": "1"})));
        let candidate = CleanupCandidate::Mapping(match_mapping(&endpoint("hn-01"), mg, &exact(&["1"])).unwrap());
        let value = serde_json::to_value(&candidate).unwrap();
        assert_eq!(value["type"], json!("MG"));
        assert_eq!(value["gateway_name"], json!("MG-A"));
        assert!(value.get("gateway").is_none());
    }

    #[tokio::test]
    async fn test_scan_isolates_failed_server() {
        let fleet = Arc::new(
            FakeFleet::new()
                .with_server(
                    "a",
                    FakeServer::default()
                        .mapping(json!({"name": "MG-A", "calloutCallerPrefixes": "84911222333,0911222333"}))
                        .routing(json!({"name": "A-To-B", "callinCalleePrefixes": "84911222333"})),
                )
                .with_server("b", FakeServer::failing("connection refused"))
                .with_server(
                    "c",
                    FakeServer::default()
                        .routing(json!({"name": "C-In", "callinCallerPrefixes": "911222333,1"})),
                ),
        );
        let matcher = CleanupMatcher::new(
            fleet.client(),
            ScatterGather::default(),
            Arc::new(crate::variants::NationalNumberVariants::new("84")),
        );

        let plan = matcher.scan(&fleet.servers(), &["0911222333"]).await.unwrap();

        let mut found: Vec<(String, String)> = plan
            .items
            .iter()
            .map(|c| (c.server_name().to_string(), c.gateway_name().to_string()))
            .collect();
        found.sort();
        assert_eq!(
            found,
            vec![
                ("a".to_string(), "A-To-B".to_string()),
                ("a".to_string(), "MG-A".to_string()),
                ("c".to_string(), "C-In".to_string()),
            ]
        );
        // One marker per fan-out for the failed server.
        assert_eq!(plan.failures.len(), 2);
        assert!(plan.failures.iter().all(|f| f.server_name == "b"));
        assert!(fleet.modifications().is_empty());
    }

    #[tokio::test]
    async fn test_scan_requires_numbers() {
        let fleet = Arc::new(FakeFleet::new().with_server("a", FakeServer::default()));
        let matcher = CleanupMatcher::new(
            fleet.client(),
            ScatterGather::default(),
            Arc::new(crate::variants::NationalNumberVariants::new("84")),
        );
        let empty: [&str; 0] = [];
        assert!(matches!(
            matcher.scan(&fleet.servers(), &empty).await,
            Err(FleetError::Validation(_))
        ));
    }
}
