//! Virtual-number rewrite rules.
//!
//! # Wire Format
//! ```text
//! 123456:84911222333,84911222444;654321:hetso
//! └─key─┘└────────reals─────────┘ └─key─┘└sentinel┘
//! ```
//! Rules are `;`-separated, a rule is `key:real,real,...`. The sentinel
//! token means "no rewrite" and is the only way to store a key with zero
//! real numbers. It never appears above this module: parsing maps it to
//! an empty list and formatting maps an empty list back to it.
//!
//! # Design Decisions
//! - Parsing is best-effort; malformed fragments are skipped
//! - Mutators reject keys and reals that contain a separator
//! - Real numbers are unique per key, first occurrence wins
//! - Keys keep the order they were stored in

use crate::codec::prefix;
use crate::error::{FleetError, FleetResult};

/// Token stored in place of an empty real-number list.
pub const SENTINEL: &str = "hetso";

const RULE_SEPARATOR: char = ';';
const KEY_SEPARATOR: char = ':';
const REAL_SEPARATOR: char = ',';
const SEPARATORS: [char; 3] = [RULE_SEPARATOR, KEY_SEPARATOR, REAL_SEPARATOR];

/// Parsed `rewriteRulesInCaller` value: virtual key → real numbers, in
/// stored order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteRuleSet(Vec<(String, Vec<String>)>);

impl RewriteRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the stored text form.
    pub fn parse(raw: &str) -> Self {
        let mut rules = Self::new();

        for fragment in raw.split(RULE_SEPARATOR) {
            let fragment = fragment.trim();
            if fragment.is_empty() {
                continue;
            }
            let Some((key, reals)) = fragment.split_once(KEY_SEPARATOR) else {
                tracing::debug!(fragment, "Skipping rewrite rule without key separator");
                continue;
            };
            let key = key.trim();
            if key.is_empty() || key.contains(REAL_SEPARATOR) {
                tracing::debug!(fragment, "Skipping rewrite rule with malformed key");
                continue;
            }

            let tokens: Vec<&str> = reals
                .split(REAL_SEPARATOR)
                .map(str::trim)
                .filter(|t| !t.is_empty() && !t.contains(KEY_SEPARATOR))
                .collect();
            rules.merge(key, &tokens);
        }

        rules
    }

    /// Render the stored text form. Inverse of [`RewriteRuleSet::parse`].
    pub fn format(&self) -> String {
        self.0
            .iter()
            .map(|(key, reals)| {
                if reals.is_empty() {
                    format!("{key}{KEY_SEPARATOR}{SENTINEL}")
                } else {
                    format!("{key}{KEY_SEPARATOR}{}", prefix::join(reals))
                }
            })
            .collect::<Vec<_>>()
            .join(&RULE_SEPARATOR.to_string())
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.position(key).map(|i| self.0[i].1.as_slice())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append real numbers to a key, creating it at the end if needed.
    ///
    /// Returns the key's resulting list. Fails without touching the set if
    /// the key or any real would not survive a format/parse round trip.
    pub fn add_reals<S: AsRef<str>>(&mut self, key: &str, reals: &[S]) -> FleetResult<&[String]> {
        validate_key(key)?;
        for real in reals {
            validate_real(real.as_ref())?;
        }
        Ok(self.merge(key, reals))
    }

    /// Drop a key entirely.
    pub fn remove_key(&mut self, key: &str) -> Option<Vec<String>> {
        self.position(key).map(|i| self.0.remove(i).1)
    }

    /// Remove specific real numbers from a key; the key stays even if emptied.
    pub fn remove_reals<S: AsRef<str>>(&mut self, key: &str, reals: &[S]) {
        if let Some(i) = self.position(key) {
            let entry = &mut self.0[i].1;
            *entry = prefix::without(entry, reals);
        }
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.0.iter().position(|(k, _)| k == key)
    }

    fn merge<S: AsRef<str>>(&mut self, key: &str, reals: &[S]) -> &[String] {
        let added = non_sentinel(reals);
        let i = match self.position(key) {
            Some(i) => i,
            None => {
                self.0.push((key.to_string(), Vec::new()));
                self.0.len() - 1
            }
        };
        let entry = &mut self.0[i].1;
        *entry = prefix::merge_unique(entry, &added);
        entry
    }
}

impl FromIterator<(String, Vec<String>)> for RewriteRuleSet {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        let mut rules = Self::new();
        for (key, reals) in iter {
            rules.merge(&key, reals.as_slice());
        }
        rules
    }
}

/// A key must be non-empty, free of separators and of surrounding spaces.
pub fn validate_key(key: &str) -> FleetResult<()> {
    if key.is_empty() || key.trim() != key {
        return Err(FleetError::validation(format!(
            "rewrite rule key '{key}' is empty or has surrounding whitespace"
        )));
    }
    if key.contains(SEPARATORS) {
        return Err(FleetError::validation(format!(
            "rewrite rule key '{key}' contains a separator (';', ':' or ',')"
        )));
    }
    Ok(())
}

/// A real number must be a single token: no separators.
pub fn validate_real(real: &str) -> FleetResult<()> {
    if real.contains(SEPARATORS) {
        return Err(FleetError::validation(format!(
            "real number '{real}' contains a separator (';', ':' or ',')"
        )));
    }
    Ok(())
}

fn is_sentinel(token: &str) -> bool {
    token.eq_ignore_ascii_case(SENTINEL)
}

fn non_sentinel<S: AsRef<str>>(reals: &[S]) -> Vec<&str> {
    reals
        .iter()
        .map(|r| r.as_ref().trim())
        .filter(|r| !r.is_empty() && !is_sentinel(r))
        .collect()
}
