//! Customer records.

use serde::{Serialize, Serializer};

use crate::conflict::ContentHash;
use crate::model::gateway::{text_field, RawRecord};

/// Raw customer record with the fields the fleet tooling reads.
#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub account: String,
    pub name: String,
    raw: RawRecord,
}

/// Interpreted `limitMoney`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CreditLimit {
    Unlimited,
    Amount(f64),
    /// Present but not a number.
    Unparsed(String),
    Missing,
}

impl Customer {
    pub fn from_raw(raw: RawRecord) -> Self {
        Self {
            account: text_field(&raw, "account"),
            name: text_field(&raw, "name"),
            raw,
        }
    }

    pub fn raw(&self) -> &RawRecord {
        &self.raw
    }

    pub fn content_hash(&self) -> ContentHash {
        ContentHash::of(&self.raw)
    }

    /// `lockType` of "1" means locked.
    pub fn is_locked(&self) -> bool {
        text_field(&self.raw, "lockType").trim() == "1"
    }

    pub fn credit_limit(&self) -> CreditLimit {
        if !self.raw.contains_key("limitMoney") {
            return CreditLimit::Missing;
        }
        let text = text_field(&self.raw, "limitMoney");
        let normalized = text.trim().to_lowercase();
        if matches!(normalized.as_str(), "-1" | "infinity" | "unlimited") {
            return CreditLimit::Unlimited;
        }
        match normalized.parse::<f64>() {
            Ok(amount) => CreditLimit::Amount(amount),
            Err(_) => CreditLimit::Unparsed(text),
        }
    }
}

impl Serialize for Customer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn customer(value: Value) -> Customer {
        match value {
            Value::Object(map) => Customer::from_raw(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_credit_limit() {
        assert_eq!(customer(json!({"limitMoney": "-1"})).credit_limit(), CreditLimit::Unlimited);
        assert_eq!(customer(json!({"limitMoney": 2500.5})).credit_limit(), CreditLimit::Amount(2500.5));
        assert_eq!(
            customer(json!({"limitMoney": "n/a"})).credit_limit(),
            CreditLimit::Unparsed("n/a".into())
        );
        assert_eq!(customer(json!({})).credit_limit(), CreditLimit::Missing);
    }

    #[test]
    fn test_lock_state() {
        assert!(customer(json!({"lockType": 1})).is_locked());
        assert!(!customer(json!({"lockType": "0"})).is_locked());
    }
}
