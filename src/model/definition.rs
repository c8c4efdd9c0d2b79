//! Virtual-number definitions derived from routing gateways.

use serde::Serialize;

use crate::model::{RoutingGateway, ServerEndpoint};

/// One rewrite rule as found in one routing gateway on one server.
///
/// The same key may be defined in several gateways across the fleet; each
/// occurrence is its own definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualNumberDefinition {
    pub virtual_key: String,
    pub server_name: String,
    pub server_url: String,
    pub rg_name: String,
    pub reals: Vec<String>,
    /// The key is stored as "no rewrite".
    pub is_sentinel: bool,
    pub count: usize,
}

impl VirtualNumberDefinition {
    pub fn new(server: &ServerEndpoint, rg_name: &str, key: &str, reals: &[String]) -> Self {
        Self {
            virtual_key: key.to_string(),
            server_name: server.name.clone(),
            server_url: server.url.to_string(),
            rg_name: rg_name.to_string(),
            reals: reals.to_vec(),
            is_sentinel: reals.is_empty(),
            count: reals.len(),
        }
    }
}

impl RoutingGateway {
    /// Every rewrite rule of this gateway as a definition.
    pub fn definitions<'a>(
        &'a self,
        server: &'a ServerEndpoint,
    ) -> impl Iterator<Item = VirtualNumberDefinition> + 'a {
        self.rewrite_rules_in_caller
            .iter()
            .map(move |(key, reals)| VirtualNumberDefinition::new(server, &self.name, key, reals))
    }

    /// The definition for one key, if this gateway has it.
    pub fn definition(&self, server: &ServerEndpoint, key: &str) -> Option<VirtualNumberDefinition> {
        self.rewrite_rules_in_caller
            .get(key)
            .map(|reals| VirtualNumberDefinition::new(server, &self.name, key, reals))
    }
}
