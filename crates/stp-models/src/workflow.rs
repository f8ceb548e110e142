use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::trade::TradeId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct EventId(pub i64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An audit entry emitted by a parser, before its owning trade has an identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowEventDraft {
    pub system_code: String,
    pub event_type: String,
    pub description: String,
    pub field_name: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub event_time: DateTime<Utc>,
    pub initiated_by: String,
}

impl WorkflowEventDraft {
    pub fn new(
        system_code: impl Into<String>,
        event_type: impl Into<String>,
        description: impl Into<String>,
        initiated_by: impl Into<String>,
    ) -> Self {
        Self {
            system_code: system_code.into(),
            event_type: event_type.into(),
            description: description.into(),
            field_name: None,
            old_value: None,
            new_value: None,
            event_time: Utc::now(),
            initiated_by: initiated_by.into(),
        }
    }

    /// Record a field-level change.
    pub fn with_change(
        mut self,
        field: impl Into<String>,
        old_value: Option<String>,
        new_value: Option<String>,
    ) -> Self {
        self.field_name = Some(field.into());
        self.old_value = old_value;
        self.new_value = new_value;
        self
    }

    pub fn bind(self, trade_id: TradeId) -> TradeWorkflowEvent {
        TradeWorkflowEvent {
            trade_id,
            system_code: self.system_code,
            event_type: self.event_type,
            description: self.description,
            field_name: self.field_name,
            old_value: self.old_value,
            new_value: self.new_value,
            event_time: self.event_time,
            initiated_by: self.initiated_by,
        }
    }
}

/// Immutable, append-only audit record of a trade state or field change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeWorkflowEvent {
    pub trade_id: TradeId,
    pub system_code: String,
    pub event_type: String,
    pub description: String,
    pub field_name: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub event_time: DateTime<Utc>,
    pub initiated_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_keeps_change_fields() {
        let event = WorkflowEventDraft::new("STP", "AMENDED", "Strike corrected", "ops")
            .with_change("strike", Some("1.0850".to_string()), Some("1.0900".to_string()))
            .bind(TradeId(3));
        assert_eq!(event.trade_id, TradeId(3));
        assert_eq!(event.field_name.as_deref(), Some("strike"));
        assert_eq!(event.new_value.as_deref(), Some("1.0900"));
    }
}
