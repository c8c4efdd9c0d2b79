//! Gateway snapshots and mutation payloads.
//!
//! A gateway is owned by its remote server. What we hold is a snapshot:
//! the raw JSON object exactly as fetched plus a typed view parsed from it.
//! The raw object is what gets hashed for conflict detection, so the typed
//! view is never written back into it. Mutations go through
//! [`GatewayPatch`], which copies the snapshot and applies named overrides.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::codec::{prefix, RewriteRuleSet};
use crate::conflict::ContentHash;
use crate::error::{FleetError, FleetResult};

/// Raw record as returned by the remote server.
pub type RawRecord = Map<String, Value>;

/// Wire field names.
pub mod fields {
    pub const NAME: &str = "name";
    pub const ACCOUNT: &str = "account";
    pub const ACCOUNT_NAME: &str = "accountName";
    pub const CALLOUT_CALLER_PREFIXES: &str = "calloutCallerPrefixes";
    pub const CALLIN_CALLER_PREFIXES: &str = "callinCallerPrefixes";
    pub const CALLIN_CALLEE_PREFIXES: &str = "callinCalleePrefixes";
    pub const REWRITE_RULES_IN_CALLER: &str = "rewriteRulesInCaller";
}

/// The two gateway collections every server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GatewayKind {
    #[serde(rename = "MG")]
    Mapping,
    #[serde(rename = "RG")]
    Routing,
}

impl GatewayKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Mapping => "Mapping Gateway",
            Self::Routing => "Routing Gateway",
        }
    }

    /// Field of the list response holding the collection.
    pub fn collection_field(self) -> &'static str {
        match self {
            Self::Mapping => "infoGatewayMappings",
            Self::Routing => "infoGatewayRoutings",
        }
    }
}

impl fmt::Display for GatewayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Common surface of gateway snapshots.
pub trait GatewayRecord: Clone + fmt::Debug + Send + Sync + 'static {
    const KIND: GatewayKind;

    /// Build the typed view. Missing or mistyped fields read as empty.
    fn from_raw(raw: RawRecord) -> Self;

    fn raw(&self) -> &RawRecord;

    fn name(&self) -> &str;

    fn content_hash(&self) -> ContentHash {
        ContentHash::of(self.raw())
    }

    /// Start a payload from this snapshot.
    fn patch(&self) -> GatewayPatch {
        GatewayPatch::from_raw(self.raw())
    }
}

/// Links a customer account to its allowed caller prefixes.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingGateway {
    pub name: String,
    pub account: String,
    pub account_name: String,
    pub callout_caller_prefixes: Vec<String>,
    raw: RawRecord,
}

impl GatewayRecord for MappingGateway {
    const KIND: GatewayKind = GatewayKind::Mapping;

    fn from_raw(raw: RawRecord) -> Self {
        Self {
            name: text_field(&raw, fields::NAME),
            account: text_field(&raw, fields::ACCOUNT),
            account_name: text_field(&raw, fields::ACCOUNT_NAME),
            callout_caller_prefixes: prefix::split(&text_field(&raw, fields::CALLOUT_CALLER_PREFIXES)),
            raw,
        }
    }

    fn raw(&self) -> &RawRecord {
        &self.raw
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Call-in prefixes and the virtual-number rewrite rules.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingGateway {
    pub name: String,
    pub callin_caller_prefixes: Vec<String>,
    pub callin_callee_prefixes: Vec<String>,
    pub rewrite_rules_in_caller: RewriteRuleSet,
    raw: RawRecord,
}

impl GatewayRecord for RoutingGateway {
    const KIND: GatewayKind = GatewayKind::Routing;

    fn from_raw(raw: RawRecord) -> Self {
        Self {
            name: text_field(&raw, fields::NAME),
            callin_caller_prefixes: prefix::split(&text_field(&raw, fields::CALLIN_CALLER_PREFIXES)),
            callin_callee_prefixes: prefix::split(&text_field(&raw, fields::CALLIN_CALLEE_PREFIXES)),
            rewrite_rules_in_caller: RewriteRuleSet::parse(&text_field(
                &raw,
                fields::REWRITE_RULES_IN_CALLER,
            )),
            raw,
        }
    }

    fn raw(&self) -> &RawRecord {
        &self.raw
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Serialize for MappingGateway {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl Serialize for RoutingGateway {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

/// Read a field as text. Numbers are rendered, null and absent read as "".
pub(crate) fn text_field(raw: &RawRecord, field: &str) -> String {
    match raw.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Builder for mutation payloads.
///
/// Starts from a snapshot's raw object, so fields the caller does not
/// touch are sent back unchanged.
#[derive(Debug, Clone)]
pub struct GatewayPatch {
    fields: RawRecord,
}

impl GatewayPatch {
    pub fn from_raw(raw: &RawRecord) -> Self {
        Self { fields: raw.clone() }
    }

    /// Override any field.
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    /// Override a comma-separated prefix field.
    pub fn prefixes<S: AsRef<str>>(self, field: &str, prefixes: &[S]) -> Self {
        self.set(field, prefix::join(prefixes))
    }

    pub fn rewrite_rules(self, rules: &RewriteRuleSet) -> Self {
        self.set(fields::REWRITE_RULES_IN_CALLER, rules.format())
    }

    pub fn rename(self, new_name: impl Into<String>) -> Self {
        self.set(fields::NAME, new_name.into())
    }

    pub fn build(self) -> Payload {
        Payload(self.fields)
    }
}

/// Body of a Modify* call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(RawRecord);

impl Payload {
    pub fn new(fields: RawRecord) -> Self {
        Self(fields)
    }

    /// Accept a JSON object; anything else is a validation error.
    pub fn from_value(value: Value) -> FleetResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(FleetError::validation(format!(
                "payload must be a JSON object, got {other}"
            ))),
        }
    }

    /// Name carried by the payload, if any.
    pub fn name(&self) -> Option<&str> {
        self.0
            .get(fields::NAME)
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Target `name` when the payload does not carry a name of its own.
    pub fn or_name(mut self, name: &str) -> Self {
        if self.name().is_none() {
            self.0.insert(fields::NAME.to_string(), Value::from(name));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}
