//! Optimistic concurrency for remotely-owned records.
//!
//! # Data Flow
//! ```text
//! read:   fetch snapshot → ContentHash::of(raw) → handed to the caller
//! write:  caller sends payload + expected hash
//!     → refetch current record by its original key
//!     → hash mismatch? → Conflict (nothing written)
//!     → Modify* call
//! ```
//!
//! # Design Decisions
//! - The hash covers the raw record in canonical form (keys sorted
//!   recursively), so field order in the server response is irrelevant
//! - Detection only: two writers can both pass the check; the remote
//!   server decides who lands last
//! - No merge and no retry on conflict
//! - Omitting the expected hash skips the check entirely

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{FleetError, FleetResult};
use crate::model::{Payload, RawRecord, ServerEndpoint};
use crate::observability::metrics;

/// SHA-256 over the canonical JSON form of a raw record, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn of(raw: &RawRecord) -> Self {
        let mut canonical = String::new();
        write_canonical_object(raw, &mut canonical);

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentHash {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(FleetError::validation("content hash cannot be empty"));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }
}

// Map iteration order depends on serde_json features, so keys are sorted here.
fn write_canonical_object(map: &RawRecord, out: &mut String) {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    out.push('{');
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::from(key.as_str()).to_string());
        out.push(':');
        write_canonical(&map[key], out);
    }
    out.push('}');
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => write_canonical_object(map, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// A remote collection that can be re-read and written for one record.
#[async_trait]
pub trait GuardedStore: Send + Sync {
    /// Human label used in errors, e.g. "Routing Gateway".
    fn kind(&self) -> &'static str;

    fn server(&self) -> &ServerEndpoint;

    /// Fetch the record as it is right now.
    async fn fetch_current(&self, key: &str) -> FleetResult<RawRecord>;

    /// Issue the remote modify call.
    async fn write(&self, payload: Payload) -> FleetResult<()>;
}

/// Write `payload`, but only if the record under `key` still hashes to
/// `expected`. With no expected hash the write is unconditional.
///
/// `key` must be the name the caller loaded the record under, even when
/// the payload renames it.
pub async fn guarded_update<S>(
    store: &S,
    key: &str,
    payload: Payload,
    expected: Option<&ContentHash>,
) -> FleetResult<()>
where
    S: GuardedStore + ?Sized,
{
    match expected {
        Some(expected) => {
            let current = store.fetch_current(key).await?;
            let actual = ContentHash::of(&current);
            if &actual != expected {
                tracing::warn!(
                    server = %store.server(),
                    kind = store.kind(),
                    key,
                    expected = %expected,
                    actual = %actual,
                    "Conflict detected, refusing to write"
                );
                metrics::record_conflict(store.kind());
                return Err(FleetError::Conflict {
                    kind: store.kind(),
                    name: key.to_string(),
                    server: store.server().name.clone(),
                });
            }
        }
        None => {
            tracing::debug!(
                server = %store.server(),
                kind = store.kind(),
                key,
                "Writing without conflict check"
            );
        }
    }

    store.write(payload).await
}
