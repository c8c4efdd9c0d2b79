//! Phone-number search variants.
//!
//! Operators type numbers in whatever form they have at hand, while the
//! servers store them in several national and international forms. Every
//! matching operation expands its inputs first and matches only against
//! the expanded set.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::VariantConfig;

/// Expands one raw input into every form it may be stored under.
///
/// Implementations must be pure and total: any input, including garbage,
/// yields a (possibly empty) set.
pub trait VariantGenerator: Send + Sync {
    fn variants(&self, raw: &str) -> BTreeSet<String>;
}

impl<F> VariantGenerator for F
where
    F: Fn(&str) -> BTreeSet<String> + Send + Sync,
{
    fn variants(&self, raw: &str) -> BTreeSet<String> {
        self(raw)
    }
}

/// National/international forms for one country code.
///
/// For `country_code = "84"` and input `+84 911-222-333` this yields
/// `84911222333`, `0911222333` and `911222333`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NationalNumberVariants {
    pub country_code: String,
}

impl NationalNumberVariants {
    pub fn new(country_code: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
        }
    }

    pub fn from_config(config: &VariantConfig) -> Self {
        Self::new(config.country_code.trim())
    }

    /// The form a real number is stored under: digits only, international.
    ///
    /// `+84 911-222-333`, `0084911222333` and `0911222333` all become
    /// `84911222333`. Numbers already in international form keep their
    /// digits. Returns `None` when the input has no digits.
    pub fn storage_form(&self, raw: &str) -> Option<String> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return None;
        }
        if self.country_code.is_empty() {
            return Some(digits);
        }

        if let Some(international) = digits.strip_prefix("00").filter(|d| !d.is_empty()) {
            return Some(international.to_string());
        }
        match digits.strip_prefix('0') {
            Some(national) if !national.is_empty() => Some(format!("{}{national}", self.country_code)),
            _ => Some(digits),
        }
    }
}

impl VariantGenerator for NationalNumberVariants {
    fn variants(&self, raw: &str) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return out;
        }
        out.insert(trimmed.to_string());

        let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return out;
        }
        out.insert(digits.clone());

        let subscriber = if !self.country_code.is_empty() && digits.starts_with(&self.country_code) {
            &digits[self.country_code.len()..]
        } else {
            digits.trim_start_matches('0')
        };
        if subscriber.is_empty() {
            return out;
        }

        out.insert(subscriber.to_string());
        out.insert(format!("0{subscriber}"));
        if !self.country_code.is_empty() {
            out.insert(format!("{}{subscriber}", self.country_code));
        }
        out
    }
}

/// Expanded variant set that remembers which inputs produced each variant.
#[derive(Debug, Clone, Default)]
pub struct VariantIndex {
    origins: BTreeMap<String, BTreeSet<String>>,
}

impl VariantIndex {
    pub fn build<S: AsRef<str>>(generator: &dyn VariantGenerator, inputs: &[S]) -> Self {
        let mut origins: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for input in inputs {
            let input = input.as_ref().trim();
            if input.is_empty() {
                continue;
            }
            for variant in generator.variants(input) {
                origins.entry(variant).or_default().insert(input.to_string());
            }
        }
        Self { origins }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.origins.contains_key(value)
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    /// Elements of `values` present in the index, sorted and deduplicated.
    pub fn matches<S: AsRef<str>>(&self, values: &[S]) -> Vec<String> {
        values
            .iter()
            .map(AsRef::as_ref)
            .filter(|v| self.contains(v))
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Original inputs that produced any of `matched`, sorted.
    pub fn origins_of<S: AsRef<str>>(&self, matched: &[S]) -> Vec<String> {
        matched
            .iter()
            .filter_map(|m| self.origins.get(m.as_ref()))
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
