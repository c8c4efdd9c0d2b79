//! Read-only report of where numbers appear in the fleet.
//!
//! Unlike the cleanup matcher this applies no shape or direction filter:
//! every prefix list, every rewrite key and every real number is checked.

use std::sync::Arc;

use serde::Serialize;

use crate::error::{FleetError, FleetResult};
use crate::fanout::{Gathered, ScatterGather};
use crate::model::{GatewayKind, MappingGateway, RoutingGateway, ServerEndpoint};
use crate::repository::{MappingRepository, RoutingRepository};
use crate::transport::RemoteClient;
use crate::variants::{VariantGenerator, VariantIndex};

/// Gateway field a number was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    CalloutCallerPrefixes,
    CallinCallerPrefixes,
    CallinCalleePrefixes,
    RewriteRuleKey,
    RewriteRuleReals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    pub server_name: String,
    pub server_url: String,
    #[serde(rename = "type")]
    pub kind: GatewayKind,
    pub gateway_name: String,
    pub field: MatchField,
    pub matched: Vec<String>,
    /// Inputs whose variants produced the matches.
    pub matching_inputs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewrite_key: Option<String>,
}

struct OccurrenceBuilder<'a> {
    server: &'a ServerEndpoint,
    kind: GatewayKind,
    gateway_name: &'a str,
    inputs: &'a VariantIndex,
    out: Vec<Occurrence>,
}

impl OccurrenceBuilder<'_> {
    fn push(&mut self, field: MatchField, matched: Vec<String>, rewrite_key: Option<&str>) {
        if matched.is_empty() {
            return;
        }
        self.out.push(Occurrence {
            server_name: self.server.name.clone(),
            server_url: self.server.url.to_string(),
            kind: self.kind,
            gateway_name: self.gateway_name.to_string(),
            field,
            matching_inputs: self.inputs.origins_of(&matched),
            matched,
            rewrite_key: rewrite_key.map(str::to_string),
        });
    }
}

pub fn occurrences_in_mapping(
    server: &ServerEndpoint,
    mg: &MappingGateway,
    inputs: &VariantIndex,
) -> Vec<Occurrence> {
    let mut found = OccurrenceBuilder {
        server,
        kind: GatewayKind::Mapping,
        gateway_name: &mg.name,
        inputs,
        out: Vec::new(),
    };
    found.push(
        MatchField::CalloutCallerPrefixes,
        inputs.matches(&mg.callout_caller_prefixes),
        None,
    );
    found.out
}

pub fn occurrences_in_routing(
    server: &ServerEndpoint,
    rg: &RoutingGateway,
    inputs: &VariantIndex,
) -> Vec<Occurrence> {
    let mut found = OccurrenceBuilder {
        server,
        kind: GatewayKind::Routing,
        gateway_name: &rg.name,
        inputs,
        out: Vec::new(),
    };
    found.push(
        MatchField::CallinCallerPrefixes,
        inputs.matches(&rg.callin_caller_prefixes),
        None,
    );
    found.push(
        MatchField::CallinCalleePrefixes,
        inputs.matches(&rg.callin_callee_prefixes),
        None,
    );
    for (key, reals) in rg.rewrite_rules_in_caller.iter() {
        if inputs.contains(key) {
            found.push(MatchField::RewriteRuleKey, vec![key.to_string()], Some(key));
        }
        found.push(MatchField::RewriteRuleReals, inputs.matches(reals), Some(key));
    }
    found.out
}

/// Fleet-wide number lookup.
#[derive(Clone)]
pub struct NumberSearch {
    mappings: MappingRepository,
    routings: RoutingRepository,
    executor: ScatterGather,
    generator: Arc<dyn VariantGenerator>,
}

impl NumberSearch {
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

    /// Every place any variant of `inputs` appears.
    pub async fn find_occurrences<S: AsRef<str>>(
        &self,
        servers: &[ServerEndpoint],
        inputs: &[S],
    ) -> FleetResult<Gathered<Occurrence>> {
        let index = Arc::new(VariantIndex::build(self.generator.as_ref(), inputs));
        if index.is_empty() {
            return Err(FleetError::validation("no numbers to search for"));
        }

        Ok(self
            .executor
            .run("number_search", servers, |server| {
                search_server(
                    self.mappings.clone(),
                    self.routings.clone(),
                    server,
                    index.clone(),
                )
            })
            .await)
    }
}

async fn search_server(
    mappings: MappingRepository,
    routings: RoutingRepository,
    server: ServerEndpoint,
    index: Arc<VariantIndex>,
) -> FleetResult<Vec<Occurrence>> {
    let (mgs, rgs) = tokio::try_join!(
        mappings.list_all(&server, None),
        routings.list_all(&server, None)
    )?;

    let mut found = Vec::new();
    for mg in &mgs {
        found.extend(occurrences_in_mapping(&server, mg, &index));
    }
    for rg in &rgs {
        found.extend(occurrences_in_routing(&server, rg, &index));
    }
    Ok(found)
}
