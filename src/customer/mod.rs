//! Customer accounts on each server.
//!
//! # Data Flow
//! ```text
//! get(server, account)        → GetCustomer {accounts:[account]} → first infoCustomers entry
//! update_*(…, hash?)          → ConflictGuard (refetch by account) → ModifyCustomer {account, field}
//! search(servers, filter)     → fan-out: GetAllCustomers → filter accounts → GetCustomer each
//! ```
//!
//! # Design Decisions
//! - Modify payloads carry only the account and the changed field
//! - A search keeps the accounts it could load; per-account failures are logged

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::conflict::{guarded_update, ContentHash, GuardedStore};
use crate::error::{FleetError, FleetResult};
use crate::fanout::{Gathered, ScatterGather};
use crate::model::{CreditLimit, Customer, Payload, RawRecord, ServerEndpoint};
use crate::resolver::CustomerLookup;
use crate::transport::{RemoteClient, RemoteMethod};

const KIND: &str = "Customer";

/// One customer found by a fleet search.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerMatch {
    pub server_name: String,
    pub server_url: String,
    pub account: String,
    pub locked: bool,
    pub credit_limit: CreditLimit,
    pub customer: Customer,
}

#[derive(Debug, Clone)]
pub struct CustomerDirectory {
    client: RemoteClient,
    executor: ScatterGather,
}

impl CustomerDirectory {
    pub fn new(client: RemoteClient, executor: ScatterGather) -> Self {
        Self { client, executor }
    }

    pub async fn get(&self, server: &ServerEndpoint, account: &str) -> FleetResult<Customer> {
        let account = account.trim();
        if account.is_empty() {
            return Err(FleetError::validation("customer account cannot be empty"));
        }

        let data = self
            .client
            .call(server, RemoteMethod::GetCustomer, json!({"accounts": [account]}))
            .await?;

        data.get("infoCustomers")
            .and_then(Value::as_array)
            .and_then(|list| list.first())
            .and_then(Value::as_object)
            .map(|raw| Customer::from_raw(raw.clone()))
            .ok_or_else(|| FleetError::NotFound {
                kind: KIND,
                name: account.to_string(),
                server: server.name.clone(),
            })
    }

    /// Set `limitMoney`. The limit must be a number; "-1" means unlimited.
    pub async fn update_credit_limit(
        &self,
        server: &ServerEndpoint,
        account: &str,
        limit: &str,
        expected: Option<&ContentHash>,
    ) -> FleetResult<()> {
        let limit = limit.trim();
        if !limit.parse::<f64>().is_ok_and(f64::is_finite) {
            return Err(FleetError::validation(format!(
                "credit limit must be a finite number, got '{limit}'"
            )));
        }
        self.modify(server, account, "limitMoney", limit, expected).await?;
        tracing::info!(server = %server, account, limit, "Credit limit updated");
        Ok(())
    }

    /// Set `lockType` to "1" (locked) or "0" (active).
    pub async fn update_lock_status(
        &self,
        server: &ServerEndpoint,
        account: &str,
        locked: bool,
        expected: Option<&ContentHash>,
    ) -> FleetResult<()> {
        let lock_type = if locked { "1" } else { "0" };
        self.modify(server, account, "lockType", lock_type, expected).await?;
        tracing::info!(server = %server, account, locked, "Lock status updated");
        Ok(())
    }

    async fn modify(
        &self,
        server: &ServerEndpoint,
        account: &str,
        field: &str,
        value: &str,
        expected: Option<&ContentHash>,
    ) -> FleetResult<()> {
        let account = account.trim();
        if account.is_empty() {
            return Err(FleetError::validation("customer account cannot be empty"));
        }
        let payload = Payload::from_value(json!({"account": account, field: value}))?;
        let store = RemoteCustomerStore {
            directory: self,
            server,
        };
        guarded_update(&store, account, payload, expected).await
    }

    /// Customers whose account contains `filter` (case-insensitive), fleet
    /// wide, sorted by server then account.
    pub async fn search(
        &self,
        servers: &[ServerEndpoint],
        filter: &str,
    ) -> FleetResult<Gathered<CustomerMatch>> {
        let filter = filter.trim().to_lowercase();
        if filter.is_empty() {
            return Err(FleetError::validation("customer search filter cannot be empty"));
        }

        let mut gathered = self
            .executor
            .run("customer_search", servers, |server| {
                search_server(self.clone(), server, filter.clone())
            })
            .await;
        gathered.items.sort_by(|a, b| {
            (a.server_name.as_str(), a.account.as_str()).cmp(&(b.server_name.as_str(), b.account.as_str()))
        });
        Ok(gathered)
    }
}

async fn search_server(
    directory: CustomerDirectory,
    server: ServerEndpoint,
    filter: String,
) -> FleetResult<Vec<CustomerMatch>> {
    let data = directory
        .client
        .call(&server, RemoteMethod::GetAllCustomers, json!({}))
        .await?;

    let accounts: Vec<String> = data
        .get("accounts")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|a| match a {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .filter(|a| a.to_lowercase().contains(&filter))
                .collect()
        })
        .unwrap_or_default();

    let mut found = Vec::with_capacity(accounts.len());
    for account in accounts {
        match directory.get(&server, &account).await {
            Ok(customer) => found.push(CustomerMatch {
                server_name: server.name.clone(),
                server_url: server.url.to_string(),
                account: account.clone(),
                locked: customer.is_locked(),
                credit_limit: customer.credit_limit(),
                customer,
            }),
            Err(err) => {
                tracing::warn!(server = %server, account = %account, error = %err, "Skipping customer that failed to load");
            }
        }
    }
    Ok(found)
}

struct RemoteCustomerStore<'a> {
    directory: &'a CustomerDirectory,
    server: &'a ServerEndpoint,
}

#[async_trait]
impl GuardedStore for RemoteCustomerStore<'_> {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn server(&self) -> &ServerEndpoint {
        self.server
    }

    async fn fetch_current(&self, key: &str) -> FleetResult<RawRecord> {
        Ok(self.directory.get(self.server, key).await?.raw().clone())
    }

    async fn write(&self, payload: Payload) -> FleetResult<()> {
        self.directory
            .client
            .call(self.server, RemoteMethod::ModifyCustomer, payload.into_value())
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl CustomerLookup for CustomerDirectory {
    async fn lookup(&self, server: &ServerEndpoint, account: &str) -> FleetResult<Customer> {
        self.get(server, account).await
    }
}
