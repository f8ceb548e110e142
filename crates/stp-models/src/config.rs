use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the STP pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StpConfig {
    pub store: StoreConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub parsers: ParsersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// Path to the SQLite database holding both staged messages and trades.
    pub sqlite_path: String,
    /// Seconds after which another worker's claim on a message is considered abandoned.
    #[serde(default = "default_claim_ttl")]
    pub claim_ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Maximum messages pulled per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Seconds between batches when running as a daemon.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Name written into message claims. Random per process when omitted.
    #[serde(default = "default_worker_id")]
    pub worker_id: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            poll_interval_seconds: default_poll_interval(),
            worker_id: default_worker_id(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsersConfig {
    /// Parser names in dispatch order. The first parser that accepts a message wins.
    #[serde(default = "default_parser_order")]
    pub order: Vec<String>,
    #[serde(default)]
    pub ticket: TicketParserConfig,
}

impl Default for ParsersConfig {
    fn default() -> Self {
        Self {
            order: default_parser_order(),
            ticket: TicketParserConfig::default(),
        }
    }
}

/// Settings for the built-in JSON ticket parser.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketParserConfig {
    /// A `new` system link is created for each of these systems on every trade.
    #[serde(default = "default_booking_systems")]
    pub booking_systems: Vec<String>,
    /// Counterparty alias -> canonical code.
    #[serde(default)]
    pub counterparty_aliases: BTreeMap<String, String>,
    #[serde(default = "default_reference_capacity")]
    pub reference_cache_capacity: u64,
    #[serde(default = "default_reference_ttl")]
    pub reference_cache_ttl_seconds: u64,
}

impl Default for TicketParserConfig {
    fn default() -> Self {
        Self {
            booking_systems: default_booking_systems(),
            counterparty_aliases: BTreeMap::new(),
            reference_cache_capacity: default_reference_capacity(),
            reference_cache_ttl_seconds: default_reference_ttl(),
        }
    }
}

fn default_claim_ttl() -> u64 {
    300
}
fn default_batch_size() -> usize {
    100
}
fn default_poll_interval() -> u64 {
    30
}
fn default_worker_id() -> String {
    format!("stp-{}", uuid::Uuid::new_v4())
}
fn default_parser_order() -> Vec<String> {
    vec!["ticket".to_string()]
}
fn default_booking_systems() -> Vec<String> {
    vec!["MUREX".to_string()]
}
fn default_reference_capacity() -> u64 {
    10_000
}
fn default_reference_ttl() -> u64 {
    600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_full_config() {
        let toml_str = r#"
[store]
sqlite_path = "data/stp.db"
claim_ttl_seconds = 120

[pipeline]
batch_size = 50
poll_interval_seconds = 10
worker_id = "stp-worker-1"

[parsers]
order = ["ticket"]

[parsers.ticket]
booking_systems = ["MUREX", "CLS"]
counterparty_aliases = { "GS LDN" = "GSIL", "JPM" = "JPMC" }
"#;
        let config: StpConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.store.claim_ttl_seconds, 120);
        assert_eq!(config.pipeline.batch_size, 50);
        assert_eq!(config.pipeline.worker_id, "stp-worker-1");
        assert_eq!(config.parsers.ticket.booking_systems, vec!["MUREX", "CLS"]);
        assert_eq!(
            config.parsers.ticket.counterparty_aliases.get("GS LDN"),
            Some(&"GSIL".to_string())
        );
        assert_eq!(config.parsers.ticket.reference_cache_capacity, 10_000);
    }

    #[test]
    fn deserialize_minimal_config() {
        let toml_str = r#"
[store]
sqlite_path = "data/stp.db"
"#;
        let config: StpConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.store.claim_ttl_seconds, 300);
        assert_eq!(config.pipeline.batch_size, 100);
        assert_eq!(config.pipeline.poll_interval_seconds, 30);
        assert!(config.pipeline.worker_id.starts_with("stp-"));
        assert_eq!(config.parsers.order, vec!["ticket"]);
        assert_eq!(config.parsers.ticket.booking_systems, vec!["MUREX"]);
    }

    #[test]
    fn worker_ids_differ_per_default() {
        assert_ne!(PipelineConfig::default().worker_id, PipelineConfig::default().worker_id);
    }
}
