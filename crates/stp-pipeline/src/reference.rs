use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use moka::sync::Cache;

/// Counterparty reference data used by parsers to map the names brokers and
/// venues use onto our canonical codes.
///
/// The alias table is fixed at construction. Resolved codes, including the
/// normalized fallback for unknown names, are memoized in a bounded moka cache
/// whose entries expire after the TTL.
pub struct ReferenceData {
    aliases: HashMap<String, String>,
    resolved: Cache<String, String>,
}

fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

impl ReferenceData {
    pub fn new(aliases: &BTreeMap<String, String>, max_capacity: u64, ttl: Duration) -> Self {
        Self {
            aliases: aliases
                .iter()
                .map(|(alias, code)| (normalize(alias), code.trim().to_string()))
                .collect(),
            resolved: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// No aliases; every name resolves to its normalized form.
    pub fn empty() -> Self {
        Self::new(&BTreeMap::new(), 1_000, Duration::from_secs(600))
    }

    /// Canonical counterparty code for a raw name. Unknown names resolve to
    /// their whitespace-collapsed, upper-cased form.
    pub fn counterparty(&self, raw: &str) -> String {
        let key = normalize(raw);
        self.resolved.get_with(key.clone(), || {
            self.aliases.get(&key).cloned().unwrap_or_else(|| {
                tracing::debug!(counterparty = %key, "No alias for counterparty");
                key.clone()
            })
        })
    }

    pub fn is_known(&self, raw: &str) -> bool {
        self.aliases.contains_key(&normalize(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> ReferenceData {
        let mut aliases = BTreeMap::new();
        aliases.insert("GS LDN".to_string(), "GSIL".to_string());
        aliases.insert("jpm".to_string(), "JPMC".to_string());
        ReferenceData::new(&aliases, 100, Duration::from_secs(60))
    }

    #[test]
    fn alias_lookup_ignores_case_and_spacing() {
        let refdata = reference();
        assert_eq!(refdata.counterparty("gs   ldn"), "GSIL");
        assert_eq!(refdata.counterparty(" JPM "), "JPMC");
        assert!(refdata.is_known("Gs Ldn"));
    }

    #[test]
    fn unknown_counterparty_is_normalized() {
        let refdata = reference();
        assert_eq!(refdata.counterparty("barclays  cap"), "BARCLAYS CAP");
        assert!(!refdata.is_known("barclays cap"));
    }

    #[test]
    fn repeated_lookups_are_stable() {
        let refdata = reference();
        let first = refdata.counterparty("GS LDN");
        let second = refdata.counterparty("GS LDN");
        assert_eq!(first, second);
    }
}
