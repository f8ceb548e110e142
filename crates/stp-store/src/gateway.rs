//! Gateway contracts consumed by the pipeline.
//!
//! Both gateways are synchronous and are expected to fail loudly: a constraint
//! violation or I/O problem is an `Err`, never a silently dropped write.

use stp_models::{
    EventId, InboundMessage, LinkId, MessageId, Trade, TradeId, TradeSystemLink,
    TradeWorkflowEvent,
};

use crate::error::StoreError;

/// Read/write access to staged inbound messages and their parse state.
pub trait MessageStore: Send + Sync {
    /// Up to `max_count` messages with `parsed = false`, in store order.
    fn fetch_unparsed(&self, max_count: usize) -> Result<Vec<InboundMessage>, StoreError>;

    fn fetch_by_id(&self, id: MessageId) -> Result<Option<InboundMessage>, StoreError>;

    /// Persist the parsed flag, timestamp and error text of exactly this message.
    fn write_parse_state(&self, message: &InboundMessage) -> Result<(), StoreError>;
}

/// Durable persistence for trades, system links and workflow events.
pub trait TradeStore: Send + Sync {
    fn insert_trade(&self, trade: &Trade) -> Result<TradeId, StoreError>;

    fn insert_system_link(&self, link: &TradeSystemLink) -> Result<LinkId, StoreError>;

    fn insert_workflow_event(&self, event: &TradeWorkflowEvent) -> Result<EventId, StoreError>;
}
