//! Integration tests for the polling daemon: batches against a file-backed
//! SQLite database and graceful shutdown via CancellationToken.
//!
//! Run with:
//! ```bash
//! cargo test -p stp --test daemon_lifecycle
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use stp::daemon::{run_batch, Daemon};
use stp::models::{PipelineConfig, StoreConfig, StpConfig};
use stp::store::MessageStore;
use stp::{build_pipeline, Pipeline};

const TICKET: &str = r#"{"format": "stp-ticket", "ticket_id": "T-1", "trades": [{
  "trade_ref": "SPOT-1", "product": "spot", "counterparty": "jpm",
  "currency_pair": "GBPUSD", "side": "sell", "notional": "2500000",
  "notional_currency": "GBP", "trade_date": "2026-03-02",
  "external_ids": {"MUREX": "MX-991"}
}]}"#;

fn config(db_path: &std::path::Path) -> StpConfig {
    let mut config = StpConfig {
        store: StoreConfig {
            sqlite_path: db_path.to_string_lossy().into_owned(),
            claim_ttl_seconds: 300,
        },
        pipeline: PipelineConfig {
            batch_size: 10,
            poll_interval_seconds: 3600,
            worker_id: "daemon-test".to_string(),
        },
        parsers: Default::default(),
    };
    let mut aliases = BTreeMap::new();
    aliases.insert("JPM".to_string(), "JPMC".to_string());
    config.parsers.ticket.counterparty_aliases = aliases;
    config
}

fn pipeline(dir: &tempfile::TempDir) -> Pipeline {
    build_pipeline(&config(&dir.path().join("stp_test.db"))).unwrap()
}

/// The first batch runs immediately on startup; cancellation during the sleep
/// stops the daemon without waiting for the poll interval.
#[tokio::test]
async fn daemon_processes_staged_messages_and_shuts_down() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&dir);
    let ticket = pipeline.messages.stage("EMAIL", TICKET).unwrap();
    let junk = pipeline.messages.stage("FIX", "8=FIX.4.4|35=D").unwrap();

    let daemon = Daemon::new(pipeline.orchestrator.clone(), Duration::from_secs(3600));
    let cancel = daemon.cancel_token();
    let handle = tokio::spawn(async move { daemon.run().await });

    // Wait for the startup batch to drain the queue.
    let mut remaining = usize::MAX;
    for _ in 0..100 {
        remaining = pipeline.messages.count_unparsed().unwrap();
        if remaining == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(remaining, 0);

    cancel.cancel();
    let batches = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("daemon did not stop after cancellation")
        .unwrap();
    assert_eq!(batches, 1);

    let trades = pipeline.trades.trades_for_message(ticket).unwrap();
    assert_eq!(trades.len(), 1);
    let (trade_id, trade) = &trades[0];
    assert_eq!(trade.counterparty, "JPMC");
    assert_eq!(trade.source_type, "EMAIL");
    let links = pipeline.trades.links_for_trade(*trade_id).unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].1.external_trade_id.as_deref(), Some("MX-991"));

    let junk = pipeline.messages.fetch_by_id(junk).unwrap().unwrap();
    assert!(junk.parsed);
    assert_eq!(junk.parse_error.as_deref(), Some("No parser available"));
}

#[tokio::test]
async fn run_batch_reports_summary() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&dir);
    pipeline.messages.stage("EMAIL", TICKET).unwrap();

    let summary = run_batch(&pipeline.orchestrator).await.unwrap();
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.trades_persisted, 1);

    let empty = run_batch(&pipeline.orchestrator).await.unwrap();
    assert_eq!(empty.fetched, 0);
}

/// Cancelling before the daemon starts still lets it run the startup batch once.
#[tokio::test]
async fn cancelled_daemon_runs_a_single_batch() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&dir);

    let daemon = Daemon::new(pipeline.orchestrator.clone(), Duration::from_secs(3600));
    daemon.cancel_token().cancel();
    let batches = tokio::time::timeout(Duration::from_secs(5), daemon.run())
        .await
        .unwrap();
    assert_eq!(batches, 1);
}

#[test]
fn build_pipeline_rejects_unknown_parser() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&dir.path().join("stp_test.db"));
    config.parsers.order = vec!["fixml".to_string()];
    let err = build_pipeline(&config).err().unwrap();
    assert!(format!("{err:#}").contains("fixml"), "{err:#}");
}
