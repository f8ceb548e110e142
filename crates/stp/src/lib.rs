//! STP inbound pipeline.
//!
//! Reads staged trade messages, hands each to the first parser that claims it,
//! persists the resulting trade bundles and records the parse outcome on the message.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use stp::models::StpConfig;
//! use stp::pipeline::{Orchestrator, MessageOutcome};
//! use stp::store::{SqliteMessageStore, SqliteTradeStore};
//! ```

pub mod daemon;

pub use stp_models as models;
pub use stp_pipeline as pipeline;
pub use stp_store as store;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use stp_models::StpConfig;
use stp_pipeline::{build_registry, Orchestrator};
use stp_store::{MessageStore, SqliteMessageStore, SqliteTradeStore, TradeStore};

/// Stores and orchestrator wired from configuration.
pub struct Pipeline {
    pub orchestrator: Arc<Orchestrator>,
    pub messages: Arc<SqliteMessageStore>,
    pub trades: Arc<SqliteTradeStore>,
}

/// Open the SQLite gateways and build an orchestrator from configuration.
pub fn build_pipeline(config: &StpConfig) -> Result<Pipeline, anyhow::Error> {
    let path = &config.store.sqlite_path;
    let messages = Arc::new(
        SqliteMessageStore::open(path)
            .with_context(|| format!("Failed to open message store: {path}"))?
            .with_claim_policy(
                config.pipeline.worker_id.clone(),
                Duration::from_secs(config.store.claim_ttl_seconds),
            ),
    );
    let trades = Arc::new(
        SqliteTradeStore::open(path)
            .with_context(|| format!("Failed to open trade store: {path}"))?,
    );
    let registry = build_registry(&config.parsers).context("Failed to build parser registry")?;

    let orchestrator = Orchestrator::new(
        registry,
        messages.clone() as Arc<dyn MessageStore>,
        trades.clone() as Arc<dyn TradeStore>,
        config.pipeline.batch_size,
    );
    Ok(Pipeline {
        orchestrator: Arc::new(orchestrator),
        messages,
        trades,
    })
}

/// Read and parse a TOML configuration file.
pub fn load_config(path: &str) -> Result<StpConfig, anyhow::Error> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {path}"))?;
    toml::from_str(&raw).with_context(|| format!("Failed to parse config: {path}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_config_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/stp.toml");
        let config = load_config(path).unwrap();
        assert_eq!(config.parsers.order, vec!["ticket".to_string()]);
        assert_eq!(config.parsers.ticket.booking_systems, vec!["MUREX".to_string()]);
        assert_eq!(
            config.parsers.ticket.counterparty_aliases.get("GS LDN").map(String::as_str),
            Some("GSIL")
        );
        assert!(config.pipeline.worker_id.starts_with("stp-"));
    }

    #[test]
    fn missing_config_names_the_path() {
        let err = load_config("/nonexistent/stp.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/stp.toml"));
    }
}
