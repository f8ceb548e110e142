use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use stp_models::{InboundMessage, MessageId, ParseResult, TradeBundle, TradeId};
use stp_store::{MessageStore, StoreError, TradeStore};
use tracing::{error, info, warn};

use crate::error::ParseFailure;
use crate::registry::ParserRegistry;

/// What happened to a single message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MessageOutcome {
    /// The id does not resolve. Nothing was written.
    NotFound,
    /// The message was already parsed. Nothing was written.
    AlreadyParsed,
    Succeeded { trade_ids: Vec<TradeId> },
    Failed { failure: ParseFailure },
}

/// Counts for one `process_pending_messages` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub fetched: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Messages that were already parsed by the time they were looked at.
    pub skipped: usize,
    /// Messages whose outcome could not be written back.
    pub writeback_errors: usize,
    pub trades_persisted: usize,
}

/// Drives the pull -> dispatch -> parse -> persist -> write-back loop.
///
/// Every message picked up ends in exactly one parse-state write-back, success
/// or failure, so nothing is left `parsed = false` after a batch has seen it.
/// Parser and persistence failures never escape; they become the message's
/// parse error.
pub struct Orchestrator {
    registry: ParserRegistry,
    messages: Arc<dyn MessageStore>,
    trades: Arc<dyn TradeStore>,
    batch_size: usize,
}

impl Orchestrator {
    pub fn new(
        registry: ParserRegistry,
        messages: Arc<dyn MessageStore>,
        trades: Arc<dyn TradeStore>,
        batch_size: usize,
    ) -> Self {
        Self {
            registry,
            messages,
            trades,
            batch_size,
        }
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Pull up to `batch_size` unparsed messages and process each independently.
    ///
    /// Only a failure of the fetch itself is returned as an error.
    pub fn process_pending_messages(&self) -> Result<BatchSummary, StoreError> {
        let start = Instant::now();
        let batch = self.messages.fetch_unparsed(self.batch_size)?;
        let mut summary = BatchSummary {
            fetched: batch.len(),
            ..BatchSummary::default()
        };

        for message in batch {
            let id = message.id;
            match self.process_loaded(message) {
                Ok(MessageOutcome::Succeeded { trade_ids }) => {
                    summary.succeeded += 1;
                    summary.trades_persisted += trade_ids.len();
                }
                Ok(MessageOutcome::Failed { .. }) => summary.failed += 1,
                Ok(MessageOutcome::AlreadyParsed) | Ok(MessageOutcome::NotFound) => {
                    summary.skipped += 1
                }
                Err(e) => {
                    error!(message_id = %id, error = %e, "Failed to write back parse state");
                    summary.writeback_errors += 1;
                }
            }
        }

        if summary.fetched > 0 {
            info!(
                fetched = summary.fetched,
                succeeded = summary.succeeded,
                failed = summary.failed,
                trades = summary.trades_persisted,
                elapsed_ms = start.elapsed().as_millis(),
                "Batch complete"
            );
        }
        Ok(summary)
    }

    /// Process one message by id. Calling this again on a parsed message is a no-op.
    pub fn process_message(&self, id: MessageId) -> Result<MessageOutcome, StoreError> {
        match self.messages.fetch_by_id(id)? {
            Some(message) => self.process_loaded(message),
            None => {
                warn!(message_id = %id, "Message not found");
                Ok(MessageOutcome::NotFound)
            }
        }
    }

    fn process_loaded(&self, mut message: InboundMessage) -> Result<MessageOutcome, StoreError> {
        if message.parsed {
            return Ok(MessageOutcome::AlreadyParsed);
        }

        let outcome = match self.interpret(&message) {
            Ok(trade_ids) => {
                message.mark_succeeded(Utc::now());
                info!(
                    message_id = %message.id,
                    trades = trade_ids.len(),
                    "Message parsed"
                );
                MessageOutcome::Succeeded { trade_ids }
            }
            Err(failure) => {
                message.mark_failed(failure.to_string(), Utc::now());
                warn!(message_id = %message.id, error = %failure, "Message failed to parse");
                MessageOutcome::Failed { failure }
            }
        };

        self.messages.write_parse_state(&message)?;
        Ok(outcome)
    }

    /// Dispatch, parse and persist. Stops issuing writes at the first failure.
    fn interpret(&self, message: &InboundMessage) -> Result<Vec<TradeId>, ParseFailure> {
        let parser = self
            .registry
            .find(message)
            .ok_or(ParseFailure::NoParserAvailable)?;

        let parsed = panic::catch_unwind(AssertUnwindSafe(|| parser.parse(message)));
        let result = match parsed {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                return Err(ParseFailure::UnhandledParserFault {
                    parser: parser.name().to_string(),
                    detail: e.to_string(),
                })
            }
            Err(payload) => {
                return Err(ParseFailure::UnhandledParserFault {
                    parser: parser.name().to_string(),
                    detail: format!("panicked: {}", panic_text(payload.as_ref())),
                })
            }
        };

        let bundles = match result {
            ParseResult::Rejected(reason) if reason.trim().is_empty() => {
                return Err(ParseFailure::ParserRejected {
                    reason: format!("Parser {} rejected the message", parser.name()),
                })
            }
            ParseResult::Rejected(reason) => return Err(ParseFailure::ParserRejected { reason }),
            ParseResult::Parsed(bundles) if bundles.is_empty() => {
                return Err(ParseFailure::EmptyResult)
            }
            ParseResult::Parsed(bundles) => bundles,
        };

        bundles
            .into_iter()
            .enumerate()
            .map(|(index, bundle)| self.persist_bundle(message.id, index, bundle))
            .collect()
    }

    /// Insert the trade, then its links and events bound to the new trade id.
    fn persist_bundle(
        &self,
        message_id: MessageId,
        index: usize,
        bundle: TradeBundle,
    ) -> Result<TradeId, ParseFailure> {
        let fault = |e: StoreError| ParseFailure::PersistenceFault {
            index,
            detail: e.to_string(),
        };

        let trade = bundle
            .trade
            .ok_or(ParseFailure::MalformedBundle { index })?
            .with_inbound_message(message_id);
        let trade_id = self.trades.insert_trade(&trade).map_err(fault)?;

        let now = Utc::now();
        for draft in bundle.system_links {
            self.trades
                .insert_system_link(&draft.bind(trade_id, now))
                .map_err(fault)?;
        }
        for draft in bundle.workflow_events {
            self.trades
                .insert_workflow_event(&draft.bind(trade_id))
                .map_err(fault)?;
        }
        Ok(trade_id)
    }
}

fn panic_text(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
