use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a staged inbound message, assigned by the message store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A raw trade notification staged by upstream ingestion (FIX drop, email, file import),
/// waiting to be interpreted.
///
/// Once `parsed` is set the message is never selected for processing again. A failed
/// attempt is still `parsed = true`, with the reason in `parse_error`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InboundMessage {
    pub id: MessageId,
    /// Origin of the message (e.g., "FIX", "EMAIL", "FILE").
    pub source: String,
    pub payload: String,
    pub received_at: DateTime<Utc>,
    pub parsed: bool,
    pub parsed_at: Option<DateTime<Utc>>,
    pub parse_error: Option<String>,
}

impl InboundMessage {
    /// A fresh, unparsed message.
    pub fn new(id: MessageId, source: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id,
            source: source.into(),
            payload: payload.into(),
            received_at: Utc::now(),
            parsed: false,
            parsed_at: None,
            parse_error: None,
        }
    }

    pub fn mark_succeeded(&mut self, at: DateTime<Utc>) {
        self.parsed = true;
        self.parsed_at = Some(at);
        self.parse_error = None;
    }

    /// Failure is terminal for this attempt: the message is flagged parsed so the
    /// batch puller skips it from now on.
    pub fn mark_failed(&mut self, error: impl Into<String>, at: DateTime<Utc>) {
        self.parsed = true;
        self.parsed_at = Some(at);
        self.parse_error = Some(error.into());
    }

    pub fn is_failed(&self) -> bool {
        self.parsed && self.parse_error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_is_unparsed() {
        let msg = InboundMessage::new(MessageId(7), "FIX", "8=FIX.4.4|35=8");
        assert!(!msg.parsed);
        assert!(msg.parsed_at.is_none());
        assert!(msg.parse_error.is_none());
    }

    #[test]
    fn mark_failed_then_succeeded_clears_error() {
        let mut msg = InboundMessage::new(MessageId(1), "EMAIL", "body");
        let now = Utc::now();
        msg.mark_failed("No parser available", now);
        assert!(msg.parsed);
        assert!(msg.is_failed());
        assert_eq!(msg.parsed_at, Some(now));

        msg.mark_succeeded(now);
        assert!(msg.parsed);
        assert!(!msg.is_failed());
        assert!(msg.parse_error.is_none());
    }

    #[test]
    fn message_id_serializes_as_number() {
        assert_eq!(serde_json::to_string(&MessageId(42)).unwrap(), "42");
    }
}
