use serde::{Deserialize, Serialize};

use crate::system_link::SystemLinkDraft;
use crate::trade::Trade;
use crate::workflow::WorkflowEventDraft;

/// One normalized trade plus the records that hang off it, as produced from a
/// single inbound message. A message may yield several bundles (option + hedge).
///
/// Links and events are drafts: the owning trade has no identity until it is
/// inserted, so the orchestrator binds them after the trade insert returns.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TradeBundle {
    /// Required. A bundle without a trade fails the whole message.
    pub trade: Option<Trade>,
    pub system_links: Vec<SystemLinkDraft>,
    pub workflow_events: Vec<WorkflowEventDraft>,
}

impl TradeBundle {
    pub fn new(trade: Trade) -> Self {
        Self {
            trade: Some(trade),
            system_links: Vec::new(),
            workflow_events: Vec::new(),
        }
    }

    pub fn with_link(mut self, link: SystemLinkDraft) -> Self {
        self.system_links.push(link);
        self
    }

    pub fn with_event(mut self, event: WorkflowEventDraft) -> Self {
        self.workflow_events.push(event);
        self
    }
}

/// Outcome of a parser's attempt at one message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ParseResult {
    /// The parser understood the message. An empty list is still a failure
    /// from the orchestrator's point of view.
    Parsed(Vec<TradeBundle>),
    /// The parser understood the shape but refused the content.
    Rejected(String),
}

impl ParseResult {
    pub fn rejected(reason: impl Into<String>) -> Self {
        ParseResult::Rejected(reason.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ParseResult::Parsed(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ParseResult::Rejected(reason) => Some(reason),
            ParseResult::Parsed(_) => None,
        }
    }

    pub fn bundles(&self) -> &[TradeBundle] {
        match self {
            ParseResult::Parsed(bundles) => bundles,
            ParseResult::Rejected(_) => &[],
        }
    }
}
