//! Remote server identity and the fleet registry.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::Serialize;
use url::Url;

use crate::config::ServerConfig;
use crate::error::{FleetError, FleetResult};

/// One authoritative remote server. Identity is the base URL.
#[derive(Debug, Clone, Serialize)]
pub struct ServerEndpoint {
    pub name: String,
    pub url: Url,
}

impl ServerEndpoint {
    pub fn new(name: impl Into<String>, url: Url) -> Self {
        Self {
            name: name.into(),
            url,
        }
    }

    pub fn parse(name: impl Into<String>, url: &str) -> FleetResult<Self> {
        let url = Url::parse(url)
            .map_err(|e| FleetError::validation(format!("invalid server URL '{url}': {e}")))?;
        Ok(Self::new(name, url))
    }

    /// URL for one remote method, `{base}/{method}`.
    pub fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.url.as_str().trim_end_matches('/'), method)
    }
}

impl PartialEq for ServerEndpoint {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for ServerEndpoint {}

impl Hash for ServerEndpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Ordered, read-only list of servers shared by every component.
#[derive(Debug, Clone, Default)]
pub struct ServerRegistry {
    servers: Arc<[ServerEndpoint]>,
}

impl ServerRegistry {
    pub fn new(servers: Vec<ServerEndpoint>) -> Self {
        Self {
            servers: servers.into(),
        }
    }

    /// Build from validated configuration.
    pub fn from_config(configs: &[ServerConfig]) -> FleetResult<Self> {
        let servers = configs
            .iter()
            .map(|c| ServerEndpoint::parse(&c.name, &c.url))
            .collect::<FleetResult<Vec<_>>>()?;
        Ok(Self::new(servers))
    }

    pub fn all(&self) -> &[ServerEndpoint] {
        &self.servers
    }

    pub fn by_name(&self, name: &str) -> Option<&ServerEndpoint> {
        self.servers.iter().find(|s| s.name == name)
    }

    /// Like [`ServerRegistry::by_name`] but reports unknown names as errors.
    pub fn require(&self, name: &str) -> FleetResult<&ServerEndpoint> {
        self.by_name(name).ok_or_else(|| FleetError::NotFound {
            kind: "Server",
            name: name.to_string(),
            server: "configuration".to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_url() {
        let a = ServerEndpoint::parse("hn-01", "http://10.0.0.1/api").unwrap();
        let b = ServerEndpoint::parse("renamed", "http://10.0.0.1/api").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_method_url() {
        let s = ServerEndpoint::parse("hn-01", "http://10.0.0.1:8080/external/server/").unwrap();
        assert_eq!(
            s.method_url("GetGatewayRouting"),
            "http://10.0.0.1:8080/external/server/GetGatewayRouting"
        );
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ServerRegistry::from_config(&[
            ServerConfig {
                name: "hn-01".into(),
                url: "http://10.0.0.1/api".into(),
            },
            ServerConfig {
                name: "sg-01".into(),
                url: "http://10.0.0.2/api".into(),
            },
        ])
        .unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.all()[0].name, "hn-01");
        assert!(registry.by_name("sg-01").is_some());
        assert!(registry.require("nope").unwrap_err().is_not_found());
    }
}
