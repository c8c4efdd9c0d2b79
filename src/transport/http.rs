//! HTTP transport.
//!
//! # Responsibilities
//! - POST a JSON body to `{server}/{Method}`
//! - Enforce the per-call deadline with Tokio's timeout
//! - Turn non-2xx statuses and non-zero `retCode` bodies into errors
//!
//! The `reqwest::Client` is shared across tasks; its connection pool is
//! safe for concurrent use.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::timeout;

use crate::config::TransportConfig;
use crate::model::ServerEndpoint;
use crate::transport::{RemoteMethod, Transport, TransportError};

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client })
    }

    async fn post(&self, url: &str, payload: &Value) -> Result<Value, TransportError> {
        let response = self.client.post(url).json(payload).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let data: Value = serde_json::from_str(&body)
            .map_err(|e| TransportError::Decode(format!("{e} (body: {})", truncate(&body, 200))))?;
        check_ret_code(&data)?;
        Ok(data)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(
        &self,
        server: &ServerEndpoint,
        method: RemoteMethod,
        payload: Value,
        deadline: Duration,
    ) -> Result<Value, TransportError> {
        let url = server.method_url(method.as_str());
        match timeout(deadline, self.post(&url, &payload)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(deadline)),
        }
    }
}

/// A body with `retCode` other than 0 is an application-level failure.
fn check_ret_code(data: &Value) -> Result<(), TransportError> {
    let Some(code) = data.get("retCode") else {
        return Ok(());
    };
    let code = match code {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| TransportError::Decode(format!("unreadable retCode {code}")))?;

    if code == 0 {
        return Ok(());
    }
    let message = data
        .get("exception")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or("no error message")
        .to_string();
    Err(TransportError::Remote { code, message })
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
