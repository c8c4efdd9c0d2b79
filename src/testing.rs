//! In-memory fleet for unit tests.
//!
//! `FakeFleet` answers the remote methods from per-server JSON fixtures,
//! records every Modify* call and applies it to the fixture so a later read
//! sees the write. Servers can be told to fail or panic on every call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::model::{RawRecord, ServerEndpoint, ServerRegistry};
use crate::transport::{RemoteClient, RemoteMethod, Transport, TransportError};

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeServer {
    pub mappings: Vec<Value>,
    pub routings: Vec<Value>,
    pub customers: Vec<Value>,
    pub failure: Option<String>,
    pub panic: bool,
}

impl FakeServer {
    pub fn mapping(mut self, record: Value) -> Self {
        self.mappings.push(record);
        self
    }

    pub fn routing(mut self, record: Value) -> Self {
        self.routings.push(record);
        self
    }

    pub fn customer(mut self, record: Value) -> Self {
        self.customers.push(record);
        self
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub server: String,
    pub method: RemoteMethod,
    pub payload: Value,
}

#[derive(Debug, Default)]
pub(crate) struct FakeFleet {
    order: Vec<ServerEndpoint>,
    state: Mutex<HashMap<String, FakeServer>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeFleet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(mut self, name: &str, server: FakeServer) -> Self {
        let endpoint = endpoint(name);
        self.order.push(endpoint);
        self.state
            .get_mut()
            .unwrap()
            .insert(name.to_string(), server);
        self
    }

    pub fn server(&self, name: &str) -> ServerEndpoint {
        self.order
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .unwrap_or_else(|| endpoint(name))
    }

    pub fn servers(&self) -> Vec<ServerEndpoint> {
        self.order.clone()
    }

    pub fn registry(&self) -> ServerRegistry {
        ServerRegistry::new(self.order.clone())
    }

    pub fn client(self: &Arc<Self>) -> RemoteClient {
        RemoteClient::new(self.clone(), Duration::from_secs(5))
    }

    /// Edit a server's fixture, e.g. to simulate another writer.
    pub fn mutate(&self, name: &str, f: impl FnOnce(&mut FakeServer)) {
        let mut state = self.state.lock().unwrap();
        f(state.get_mut(name).expect("unknown fake server"));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn modifications(&self) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| {
                matches!(
                    c.method,
                    RemoteMethod::ModifyCustomer
                        | RemoteMethod::ModifyGatewayMapping
                        | RemoteMethod::ModifyGatewayRouting
                )
            })
            .collect()
    }
}

pub(crate) fn endpoint(name: &str) -> ServerEndpoint {
    ServerEndpoint::parse(name, &format!("http://{name}.test/api")).unwrap()
}

pub(crate) fn raw(value: Value) -> RawRecord {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn merge_into(records: &mut Vec<Value>, key_field: &str, payload: &Value) {
    let key = payload.get(key_field).cloned();
    let existing = records
        .iter_mut()
        .find(|r| key.is_some() && r.get(key_field) == key.as_ref());
    match (existing, payload.as_object()) {
        (Some(Value::Object(target)), Some(fields)) => {
            for (k, v) in fields {
                target.insert(k.clone(), v.clone());
            }
        }
        (None, Some(_)) => records.push(payload.clone()),
        _ => {}
    }
}

#[async_trait]
impl Transport for FakeFleet {
    async fn call(
        &self,
        server: &ServerEndpoint,
        method: RemoteMethod,
        payload: Value,
        _timeout: Duration,
    ) -> Result<Value, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            server: server.name.clone(),
            method,
            payload: payload.clone(),
        });

        let (panics, failure) = {
            let state = self.state.lock().unwrap();
            let fixture = state
                .get(&server.name)
                .ok_or_else(|| TransportError::Other(format!("no fake server {}", server.name)))?;
            (fixture.panic, fixture.failure.clone())
        };
        // Outside the lock so the mutex is not poisoned for other servers.
        if panics {
            panic!("injected panic on {}", server.name);
        }
        if let Some(message) = failure {
            return Err(TransportError::Remote { code: -1, message });
        }

        let mut state = self.state.lock().unwrap();
        let Some(fixture) = state.get_mut(&server.name) else {
            return Err(TransportError::Other(format!("no fake server {}", server.name)));
        };

        let response = match method {
            RemoteMethod::GetGatewayMapping => {
                json!({"retCode": 0, "infoGatewayMappings": fixture.mappings})
            }
            RemoteMethod::GetGatewayRouting => {
                json!({"retCode": 0, "infoGatewayRoutings": fixture.routings})
            }
            RemoteMethod::GetAllCustomers => {
                let accounts: Vec<Value> = fixture
                    .customers
                    .iter()
                    .filter_map(|c| c.get("account").cloned())
                    .collect();
                json!({"retCode": 0, "accounts": accounts})
            }
            RemoteMethod::GetCustomer => {
                let wanted = payload.get("accounts").cloned().unwrap_or(json!([]));
                let found: Vec<Value> = fixture
                    .customers
                    .iter()
                    .filter(|c| {
                        wanted
                            .as_array()
                            .is_some_and(|w| c.get("account").is_some_and(|a| w.contains(a)))
                    })
                    .cloned()
                    .collect();
                json!({"retCode": 0, "infoCustomers": found})
            }
            RemoteMethod::ModifyGatewayMapping => {
                merge_into(&mut fixture.mappings, "name", &payload);
                json!({"retCode": 0})
            }
            RemoteMethod::ModifyGatewayRouting => {
                merge_into(&mut fixture.routings, "name", &payload);
                json!({"retCode": 0})
            }
            RemoteMethod::ModifyCustomer => {
                merge_into(&mut fixture.customers, "account", &payload);
                json!({"retCode": 0})
            }
        };
        Ok(response)
    }
}
