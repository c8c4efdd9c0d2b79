//! Comma-separated prefix lists.
//!
//! Gateways store caller/callee prefixes as a single comma-joined string.
//! Entries are trimmed, empties dropped, and order kept as stored.

/// Split a stored prefix string into its entries.
pub fn split(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Join entries back into the stored form.
pub fn join<S: AsRef<str>>(prefixes: &[S]) -> String {
    prefixes
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(",")
}

/// Append `added` to `existing`, skipping anything already present.
///
/// First occurrence wins, so the existing order is never disturbed.
pub fn merge_unique<S: AsRef<str>>(existing: &[String], added: &[S]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(existing.len() + added.len());
    for item in existing
        .iter()
        .map(String::as_str)
        .chain(added.iter().map(AsRef::as_ref))
    {
        if !merged.iter().any(|m| m == item) {
            merged.push(item.to_string());
        }
    }
    merged
}

/// Remove every entry of `list` that appears in `remove`, keeping the rest in order.
pub fn without<S: AsRef<str>>(list: &[String], remove: &[S]) -> Vec<String> {
    list.iter()
        .filter(|item| !remove.iter().any(|r| r.as_ref() == item.as_str()))
        .cloned()
        .collect()
}
