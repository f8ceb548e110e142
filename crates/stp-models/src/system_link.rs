use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::trade::TradeId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct LinkId(pub i64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Booking lifecycle of a trade inside one external system.
///
/// Happy path: `New -> Pending -> Booked -> ReadyToAck -> AckSent`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum LinkStatus {
    New,
    Pending,
    Booked,
    Error,
    Cancelled,
    ReadyToAck,
    AckSent,
    AckError,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::New => "new",
            LinkStatus::Pending => "pending",
            LinkStatus::Booked => "booked",
            LinkStatus::Error => "error",
            LinkStatus::Cancelled => "cancelled",
            LinkStatus::ReadyToAck => "ready-to-ack",
            LinkStatus::AckSent => "ack-sent",
            LinkStatus::AckError => "ack-error",
        }
    }

    /// Error states must carry error text.
    pub fn is_error(&self) -> bool {
        matches!(self, LinkStatus::Error | LinkStatus::AckError)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LinkStatus::AckSent | LinkStatus::Cancelled)
    }

    /// Position on the happy path; error states have none.
    fn rank(&self) -> Option<u8> {
        match self {
            LinkStatus::New => Some(0),
            LinkStatus::Pending => Some(1),
            LinkStatus::Booked => Some(2),
            LinkStatus::ReadyToAck => Some(3),
            LinkStatus::AckSent => Some(4),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, to: LinkStatus) -> bool {
        if *self == to {
            return !self.is_terminal();
        }
        if self.is_terminal() {
            return false;
        }
        if to == LinkStatus::Cancelled {
            return true;
        }
        match (self.rank(), to.rank()) {
            (Some(from), Some(next)) => next > from,
            _ => matches!(
                (self, to),
                (LinkStatus::New, LinkStatus::Error)
                    | (LinkStatus::Pending, LinkStatus::Error)
                    | (LinkStatus::Error, LinkStatus::Pending)
                    | (LinkStatus::ReadyToAck, LinkStatus::AckError)
                    | (LinkStatus::AckError, LinkStatus::ReadyToAck)
            ),
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(LinkStatus::New),
            "pending" => Ok(LinkStatus::Pending),
            "booked" => Ok(LinkStatus::Booked),
            "error" => Ok(LinkStatus::Error),
            "cancelled" => Ok(LinkStatus::Cancelled),
            "ready-to-ack" => Ok(LinkStatus::ReadyToAck),
            "ack-sent" => Ok(LinkStatus::AckSent),
            "ack-error" => Ok(LinkStatus::AckError),
            other => Err(format!("unknown link status: {other}")),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkTransitionError {
    #[error("illegal link transition {from} -> {to}")]
    Illegal { from: LinkStatus, to: LinkStatus },

    #[error("status {0} requires an error message")]
    MissingErrorText(LinkStatus),
}

/// A system link as emitted by a parser, before its owning trade has an identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemLinkDraft {
    /// Target booking/settlement system (e.g., "MUREX", "CLS").
    pub system: String,
    pub external_trade_id: Option<String>,
    pub status: LinkStatus,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl SystemLinkDraft {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            external_trade_id: None,
            status: LinkStatus::New,
            error_code: None,
            error_message: None,
        }
    }

    /// Attach the persisted trade identity, producing an insertable link.
    pub fn bind(self, trade_id: TradeId, now: DateTime<Utc>) -> TradeSystemLink {
        TradeSystemLink {
            trade_id,
            system: self.system,
            external_trade_id: self.external_trade_id,
            status: self.status,
            error_code: self.error_code,
            error_message: self.error_message,
            created_at: now,
            updated_at: now,
            deleted: false,
        }
    }
}

/// A trade's projection into one external booking or settlement system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeSystemLink {
    pub trade_id: TradeId,
    pub system: String,
    pub external_trade_id: Option<String>,
    pub status: LinkStatus,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-delete flag.
    pub deleted: bool,
}

impl TradeSystemLink {
    /// Checks that error states carry error text.
    pub fn validate(&self) -> Result<(), LinkTransitionError> {
        let has_text = self
            .error_message
            .as_deref()
            .is_some_and(|m| !m.trim().is_empty());
        if self.status.is_error() && !has_text {
            return Err(LinkTransitionError::MissingErrorText(self.status));
        }
        Ok(())
    }

    /// Move the link forward through its booking lifecycle.
    pub fn transition(
        &mut self,
        to: LinkStatus,
        error: Option<(Option<String>, String)>,
        now: DateTime<Utc>,
    ) -> Result<(), LinkTransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(LinkTransitionError::Illegal {
                from: self.status,
                to,
            });
        }
        match (to.is_error(), error) {
            (true, Some((code, message))) if !message.trim().is_empty() => {
                self.error_code = code;
                self.error_message = Some(message);
            }
            (true, _) => return Err(LinkTransitionError::MissingErrorText(to)),
            (false, _) => {
                self.error_code = None;
                self.error_message = None;
            }
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }
}
