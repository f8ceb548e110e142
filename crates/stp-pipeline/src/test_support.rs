//! Test support: scripted parsers and in-memory gateways that record every call.
//!
//! Used by the unit tests here and by the integration tests of downstream crates.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use stp_models::{
    EventId, InboundMessage, LinkId, MessageId, ParseResult, ProductType, Side, Trade, TradeId,
    TradeSystemLink, TradeWorkflowEvent,
};
use stp_store::{MessageStore, StoreError, TradeStore};

use crate::error::ParserError;
use crate::parser::Parser;

/// A plain spot trade for tests.
pub fn sample_trade(trade_ref: &str) -> Trade {
    Trade {
        trade_ref: trade_ref.to_string(),
        product: ProductType::Spot,
        source_type: "TEST".to_string(),
        venue: None,
        counterparty: "GSIL".to_string(),
        broker: None,
        currency_pair: "EURUSD".to_string(),
        side: Side::Buy,
        notional: Decimal::new(1_000_000, 0),
        notional_currency: "EUR".to_string(),
        strike: None,
        cut: None,
        trade_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap_or_default(),
        expiry_date: None,
        settlement_date: None,
        premium: None,
        premium_currency: None,
        premium_date: None,
        inbound_message_id: None,
    }
}

enum Behavior {
    Return(ParseResult),
    Fault(String),
    Panic(String),
}

type Predicate = Box<dyn Fn(&InboundMessage) -> bool + Send + Sync>;

/// A parser whose applicability and result are fixed up front.
pub struct ScriptedParser {
    name: String,
    accepts: Predicate,
    behavior: Behavior,
    calls: AtomicUsize,
}

impl ScriptedParser {
    pub fn new(
        name: &str,
        accepts: impl Fn(&InboundMessage) -> bool + Send + Sync + 'static,
        result: ParseResult,
    ) -> Self {
        Self {
            name: name.to_string(),
            accepts: Box::new(accepts),
            behavior: Behavior::Return(result),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn accept_all(name: &str, result: ParseResult) -> Self {
        Self::new(name, |_| true, result)
    }

    /// Accepts messages whose `source` equals `source`.
    pub fn for_source(name: &str, source: &str, result: ParseResult) -> Self {
        let source = source.to_string();
        Self::new(name, move |m| m.source == source, result)
    }

    /// Accepts messages whose payload contains `needle`.
    pub fn for_payload(name: &str, needle: &str, result: ParseResult) -> Self {
        let needle = needle.to_string();
        Self::new(name, move |m| m.payload.contains(&needle), result)
    }

    pub fn faulting(name: &str, detail: &str) -> Self {
        Self::accept_all(name, ParseResult::Parsed(vec![])).into_faulting(detail)
    }

    pub fn panicking(name: &str, detail: &str) -> Self {
        Self::accept_all(name, ParseResult::Parsed(vec![])).into_panicking(detail)
    }

    /// Keep the predicate, but fail with `ParserError::Fault` when parsing.
    pub fn into_faulting(mut self, detail: &str) -> Self {
        self.behavior = Behavior::Fault(detail.to_string());
        self
    }

    pub fn into_panicking(mut self, detail: &str) -> Self {
        self.behavior = Behavior::Panic(detail.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Parser for ScriptedParser {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_parse(&self, message: &InboundMessage) -> bool {
        (self.accepts)(message)
    }

    fn parse(&self, _message: &InboundMessage) -> Result<ParseResult, ParserError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Return(result) => Ok(result.clone()),
            Behavior::Fault(detail) => Err(ParserError::Fault(detail.clone())),
            Behavior::Panic(detail) => panic!("{}", detail),
        }
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Unavailable(format!("mutex poisoned: {e}"))
}

/// In-memory message store that counts write-backs and can fail fetches or
/// the write-back of chosen messages.
#[derive(Default)]
pub struct MemoryMessageStore {
    messages: Mutex<BTreeMap<MessageId, InboundMessage>>,
    writebacks: AtomicUsize,
    failing_writebacks: Mutex<BTreeSet<MessageId>>,
    fail_next_fetch: AtomicBool,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self, source: &str, payload: &str) -> MessageId {
        let mut messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        let id = MessageId(messages.keys().next_back().map_or(1, |last| last.0 + 1));
        messages.insert(id, InboundMessage::new(id, source, payload));
        id
    }

    pub fn get(&self, id: MessageId) -> Option<InboundMessage> {
        let messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        messages.get(&id).cloned()
    }

    pub fn all(&self) -> Vec<InboundMessage> {
        let messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        messages.values().cloned().collect()
    }

    /// Successful write-backs only.
    pub fn writeback_count(&self) -> usize {
        self.writebacks.load(Ordering::SeqCst)
    }

    /// Make every write-back of `id` fail.
    pub fn fail_writeback_for(&self, id: MessageId) {
        let mut failing = self.failing_writebacks.lock().unwrap_or_else(|e| e.into_inner());
        failing.insert(id);
    }

    /// Make the next `fetch_unparsed` call fail.
    pub fn fail_next_fetch(&self) {
        self.fail_next_fetch.store(true, Ordering::SeqCst);
    }
}

impl MessageStore for MemoryMessageStore {
    fn fetch_unparsed(&self, max_count: usize) -> Result<Vec<InboundMessage>, StoreError> {
        if self.fail_next_fetch.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected fetch failure".to_string()));
        }
        let messages = self.messages.lock().map_err(poisoned)?;
        Ok(messages
            .values()
            .filter(|m| !m.parsed)
            .take(max_count)
            .cloned()
            .collect())
    }

    fn fetch_by_id(&self, id: MessageId) -> Result<Option<InboundMessage>, StoreError> {
        let messages = self.messages.lock().map_err(poisoned)?;
        Ok(messages.get(&id).cloned())
    }

    fn write_parse_state(&self, message: &InboundMessage) -> Result<(), StoreError> {
        if self.failing_writebacks.lock().map_err(poisoned)?.contains(&message.id) {
            return Err(StoreError::Unavailable(format!(
                "injected write-back failure for message {}",
                message.id
            )));
        }
        let mut messages = self.messages.lock().map_err(poisoned)?;
        let stored = messages
            .get_mut(&message.id)
            .ok_or(StoreError::MessageNotFound(message.id))?;
        stored.parsed = message.parsed;
        stored.parsed_at = message.parsed_at;
        stored.parse_error = message.parse_error.clone();
        self.writebacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct Recorded {
    trades: Vec<(TradeId, Trade)>,
    links: Vec<TradeSystemLink>,
    events: Vec<TradeWorkflowEvent>,
    trade_attempts: usize,
    write_attempts: usize,
    fail_trade_on: Option<usize>,
}

/// In-memory trade store that records inserts and can fail the n-th trade insert.
#[derive(Default)]
pub struct RecordingTradeStore {
    inner: Mutex<Recorded>,
}

impl RecordingTradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `n`-th trade insert (1-based) fail.
    pub fn fail_trade_insert(&self, n: usize) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.fail_trade_on = Some(n);
    }

    pub fn trades(&self) -> Vec<(TradeId, Trade)> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.trades.clone()
    }

    pub fn links(&self) -> Vec<TradeSystemLink> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.links.clone()
    }

    pub fn events(&self) -> Vec<TradeWorkflowEvent> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.events.clone()
    }

    pub fn trade_insert_attempts(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.trade_attempts
    }

    /// Every insert call, successful or not.
    pub fn write_attempts(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.write_attempts
    }
}

impl TradeStore for RecordingTradeStore {
    fn insert_trade(&self, trade: &Trade) -> Result<TradeId, StoreError> {
        let mut inner = self.inner.lock().map_err(poisoned)?;
        inner.trade_attempts += 1;
        inner.write_attempts += 1;
        if inner.fail_trade_on == Some(inner.trade_attempts) {
            return Err(StoreError::Constraint(format!(
                "injected failure on trade insert {}",
                inner.trade_attempts
            )));
        }
        let id = TradeId(100 + inner.trades.len() as i64);
        inner.trades.push((id, trade.clone()));
        Ok(id)
    }

    fn insert_system_link(&self, link: &TradeSystemLink) -> Result<LinkId, StoreError> {
        let mut inner = self.inner.lock().map_err(poisoned)?;
        inner.write_attempts += 1;
        inner.links.push(link.clone());
        Ok(LinkId(inner.links.len() as i64))
    }

    fn insert_workflow_event(&self, event: &TradeWorkflowEvent) -> Result<EventId, StoreError> {
        let mut inner = self.inner.lock().map_err(poisoned)?;
        inner.write_attempts += 1;
        inner.events.push(event.clone());
        Ok(EventId(inner.events.len() as i64))
    }
}
