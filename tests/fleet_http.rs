//! End-to-end tests over the HTTP transport against mock servers.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gateway_fleet::cleanup::{CleanupCandidate, CleanupTask};
use gateway_fleet::model::{GatewayKind, GatewayRecord, Payload};
use gateway_fleet::transport::TransportError;
use gateway_fleet::{Fleet, FleetError};

mod common;

#[tokio::test]
async fn test_list_and_show_over_http() {
    let mock = common::start_mock_server(
        json!([
            {"name": "MG-B", "account": "acme", "calloutCallerPrefixes": "1,2"},
            {"name": "MG-A", "account": "beta", "calloutCallerPrefixes": ""},
        ]),
        json!([]),
    )
    .await;
    let fleet = common::fleet(&[("hn-01", &mock)]);
    let server = fleet.registry.require("hn-01").unwrap();

    let names: Vec<String> = fleet
        .mappings
        .list_all(server, None)
        .await
        .unwrap()
        .into_iter()
        .map(|g| g.name)
        .collect();
    assert_eq!(names, vec!["MG-A", "MG-B"]);

    let mg = fleet.mappings.get_by_name(server, "MG-B").await.unwrap();
    assert_eq!(mg.callout_caller_prefixes, vec!["1", "2"]);
    assert!(fleet.routings.list_all(server, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stale_hash_never_reaches_modify() {
    let mock = MockServer::start().await;
    common::mount_ok(
        &mock,
        "GetGatewayRouting",
        json!({"retCode": 0, "infoGatewayRoutings": [
            {"name": "HN-To-SG", "rewriteRulesInCaller": "123456:1,2"}
        ]}),
    )
    .await;
    Mock::given(method("POST"))
        .and(path(common::method_path("ModifyGatewayRouting")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"retCode": 0})))
        .expect(0)
        .mount(&mock)
        .await;

    let fleet = common::fleet(&[("hn-01", &mock)]);
    let server = fleet.registry.require("hn-01").unwrap();
    let stale = "0000".parse().unwrap();

    let err = fleet
        .routings
        .add_real_numbers(server, "HN-To-SG", "123456", &["3"], Some(&stale))
        .await
        .unwrap_err();
    assert!(err.is_conflict(), "unexpected error: {err}");
}

#[tokio::test]
async fn test_guarded_update_sends_payload() {
    let mock = common::start_mock_server(
        json!([{"name": "MG-A", "account": "acme", "calloutCallerPrefixes": "1,2"}]),
        json!([]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path(common::method_path("ModifyGatewayMapping")))
        .and(body_partial_json(json!({"name": "MG-A", "calloutCallerPrefixes": "2", "account": "acme"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"retCode": 0})))
        .expect(1)
        .mount(&mock)
        .await;

    let fleet = common::fleet(&[("hn-01", &mock)]);
    let server = fleet.registry.require("hn-01").unwrap();

    let mg = fleet.mappings.get_by_name(server, "MG-A").await.unwrap();
    let payload = mg.patch().prefixes("calloutCallerPrefixes", &["2"]).build();
    fleet
        .mappings
        .update(server, "MG-A", payload, Some(&mg.content_hash()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_remote_error_carries_exception() {
    let mock = MockServer::start().await;
    common::mount_ok(
        &mock,
        "GetCustomer",
        json!({"retCode": -10007, "exception": "Account does not exist"}),
    )
    .await;
    let fleet = common::fleet(&[("hn-01", &mock)]);
    let server = fleet.registry.require("hn-01").unwrap();

    match fleet.customers.get(server, "nobody").await {
        Err(FleetError::Transport {
            source: TransportError::Remote { code, message },
            ..
        }) => {
            assert_eq!(code, -10007);
            assert_eq!(message, "Account does not exist");
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(common::method_path("GetGatewayRouting")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"retCode": 0, "infoGatewayRoutings": []}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock)
        .await;

    let mut config = common::fleet_config(&[("slow", &mock)]);
    config.transport.timeout_secs = 1;
    let fleet = Fleet::from_config(&config).unwrap();
    let server = fleet.registry.require("slow").unwrap();

    let err = fleet.routings.list_all(server, None).await.unwrap_err();
    assert!(matches!(
        err,
        FleetError::Transport {
            source: TransportError::Timeout(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_cleanup_scan_and_apply_across_fleet() {
    let healthy = common::start_mock_server(
        json!([{"name": "MG-A", "calloutCallerPrefixes": "84911222333,0911222333,555"}]),
        json!([
            {"name": "HN-CallIn", "callinCalleePrefixes": "0911222333"},
            {"name": "HN-To-SG", "callinCalleePrefixes": "0911222333,777", "rewriteRulesInCaller": "123456:84911222333"},
        ]),
    )
    .await;
    let broken = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&broken)
        .await;

    let fleet = common::fleet(&[("hn-01", &healthy), ("sg-01", &broken)]);
    let servers = fleet.registry.all();

    let plan = fleet.matcher.scan(servers, &["0911222333"]).await.unwrap();
    assert_eq!(plan.failures.len(), 2);
    assert!(plan.failures.iter().all(|f| f.server_name == "sg-01"));

    let mut gateways: Vec<&str> = plan.items.iter().map(CleanupCandidate::gateway_name).collect();
    gateways.sort();
    assert_eq!(gateways, vec!["HN-To-SG", "MG-A"]);

    let tasks: Vec<CleanupTask> = plan.items.iter().map(CleanupCandidate::to_task).collect();
    let mg_task = tasks.iter().find(|t| t.kind == GatewayKind::Mapping).unwrap();
    assert_eq!(mg_task.payload.get("calloutCallerPrefixes"), Some(&json!("555")));

    Mock::given(method("POST"))
        .and(path(common::method_path("ModifyGatewayMapping")))
        .and(body_json(json!({"name": "MG-A", "calloutCallerPrefixes": "555"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"retCode": 0})))
        .expect(1)
        .mount(&healthy)
        .await;
    Mock::given(method("POST"))
        .and(path(common::method_path("ModifyGatewayRouting")))
        .and(body_partial_json(json!({
            "name": "HN-To-SG",
            "callinCalleePrefixes": "777",
            "rewriteRulesInCaller": "123456:hetso",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"retCode": 0})))
        .expect(1)
        .mount(&healthy)
        .await;

    let mut to_apply = tasks;
    to_apply.push(CleanupTask {
        server_name: "sg-01".to_string(),
        kind: GatewayKind::Routing,
        gateway_name: "SG-In".to_string(),
        payload: Payload::from_value(json!({"name": "SG-In"})).unwrap(),
    });

    let reports = fleet.applier.apply(to_apply).await;
    let succeeded = reports.iter().filter(|r| r.success).count();
    assert_eq!(succeeded, 2);
    assert_eq!(reports.len(), 3);
    assert!(reports.iter().any(|r| !r.success && r.server_name == "sg-01"));
}
