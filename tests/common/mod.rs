//! Shared utilities for integration tests.
//!
//! Each fleet server is a wiremock `MockServer`; its API base is
//! `{mock}/api`, so a remote method lands on `POST /api/{Method}`.

use std::sync::Arc;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gateway_fleet::config::{FleetConfig, ServerConfig};
use gateway_fleet::Fleet;

/// Path a remote method is posted to.
pub fn method_path(remote_method: &str) -> String {
    format!("/api/{remote_method}")
}

/// Start a mock server answering `GetGatewayMapping` and `GetGatewayRouting`
/// with the given collections.
pub async fn start_mock_server(mappings: Value, routings: Value) -> MockServer {
    let server = MockServer::start().await;
    mount_ok(&server, "GetGatewayMapping", json!({"retCode": 0, "infoGatewayMappings": mappings})).await;
    mount_ok(&server, "GetGatewayRouting", json!({"retCode": 0, "infoGatewayRoutings": routings})).await;
    server
}

/// Answer `remote_method` with 200 and `body`.
pub async fn mount_ok(server: &MockServer, remote_method: &str, body: Value) {
    Mock::given(method("POST"))
        .and(path(method_path(remote_method)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Config pointing at the given mock servers.
pub fn fleet_config(servers: &[(&str, &MockServer)]) -> FleetConfig {
    let mut config = FleetConfig::default();
    config.servers = servers
        .iter()
        .map(|(name, mock)| ServerConfig {
            name: name.to_string(),
            url: format!("{}/api", mock.uri()),
        })
        .collect();
    config.transport.timeout_secs = 2;
    config.transport.lookup_timeout_secs = 2;
    config
}

#[allow(dead_code)]
pub fn fleet(servers: &[(&str, &MockServer)]) -> Arc<Fleet> {
    Arc::new(Fleet::from_config(&fleet_config(servers)).expect("fleet builds"))
}
