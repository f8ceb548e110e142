//! JSON STP tickets, sent bare or pasted into an email body.
//!
//! ```json
//! {
//!   "format": "stp-ticket",
//!   "ticket_id": "EM-2026-0142",
//!   "trades": [{
//!     "trade_ref": "OPT-1", "product": "vanilla_option", "counterparty": "GS LDN",
//!     "currency_pair": "EURUSD", "side": "buy", "notional": "10000000",
//!     "notional_currency": "EUR", "strike": "1.0850", "cut": "NY10",
//!     "trade_date": "2026-03-02", "expiry_date": "2026-06-02",
//!     "hedge": { "notional": "4500000", "settlement_date": "2026-03-04" }
//!   }]
//! }
//! ```
//!
//! Each trade becomes one bundle; an option's `hedge` becomes a second bundle.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use stp_models::{
    InboundMessage, ParseResult, ProductType, Side, SystemLinkDraft, Trade, TradeBundle,
    WorkflowEventDraft,
};

use crate::error::ParserError;
use crate::json::find_object;
use crate::parser::Parser;
use crate::reference::ReferenceData;

const TICKET_FORMAT: &str = "stp-ticket";
const SYSTEM_CODE: &str = "STP";
const INITIATOR: &str = "stp";

#[derive(Debug, Deserialize)]
struct Ticket {
    #[serde(default)]
    ticket_id: Option<String>,
    trades: Vec<TicketTrade>,
}

#[derive(Debug, Deserialize)]
struct TicketTrade {
    trade_ref: String,
    product: ProductType,
    counterparty: String,
    #[serde(default)]
    venue: Option<String>,
    #[serde(default)]
    broker: Option<String>,
    currency_pair: String,
    side: Side,
    notional: Decimal,
    notional_currency: String,
    #[serde(default)]
    strike: Option<Decimal>,
    #[serde(default)]
    cut: Option<String>,
    trade_date: NaiveDate,
    #[serde(default)]
    expiry_date: Option<NaiveDate>,
    #[serde(default)]
    settlement_date: Option<NaiveDate>,
    #[serde(default)]
    premium: Option<Decimal>,
    #[serde(default)]
    premium_currency: Option<String>,
    #[serde(default)]
    premium_date: Option<NaiveDate>,
    /// Identifiers already assigned by downstream systems, keyed by system.
    #[serde(default)]
    external_ids: BTreeMap<String, String>,
    #[serde(default)]
    hedge: Option<TicketHedge>,
}

/// Delta hedge booked alongside an option. Missing fields inherit from the option.
#[derive(Debug, Deserialize)]
struct TicketHedge {
    #[serde(default)]
    trade_ref: Option<String>,
    #[serde(default)]
    product: Option<ProductType>,
    #[serde(default)]
    side: Option<Side>,
    notional: Decimal,
    #[serde(default)]
    notional_currency: Option<String>,
    #[serde(default)]
    settlement_date: Option<NaiveDate>,
}

/// Parser for JSON STP tickets.
pub struct TicketParser {
    reference: Arc<ReferenceData>,
    booking_systems: Vec<String>,
}

impl TicketParser {
    pub const NAME: &'static str = "ticket";

    pub fn new(reference: Arc<ReferenceData>, booking_systems: Vec<String>) -> Self {
        Self {
            reference,
            booking_systems,
        }
    }

    fn find_ticket(payload: &str) -> Option<serde_json::Value> {
        if !payload.contains(TICKET_FORMAT) {
            return None;
        }
        find_object(payload, |v| v.get("format").and_then(|f| f.as_str()) == Some(TICKET_FORMAT))
    }

    fn links(&self, trade: &TicketTrade) -> Vec<SystemLinkDraft> {
        self.booking_systems
            .iter()
            .map(|system| {
                let mut link = SystemLinkDraft::new(system.clone());
                link.external_trade_id = trade.external_ids.get(system).cloned();
                link
            })
            .collect()
    }

    fn bundles_for(
        &self,
        message: &InboundMessage,
        ticket_id: &str,
        raw: TicketTrade,
    ) -> Result<Vec<TradeBundle>, String> {
        validate(&raw)?;

        let counterparty = self.reference.counterparty(&raw.counterparty);
        let links = self.links(&raw);
        let trade = Trade {
            trade_ref: raw.trade_ref.trim().to_string(),
            product: raw.product,
            source_type: message.source.clone(),
            venue: raw.venue.clone(),
            counterparty,
            broker: raw.broker.clone(),
            currency_pair: raw.currency_pair.to_uppercase(),
            side: raw.side,
            notional: raw.notional,
            notional_currency: raw.notional_currency.trim().to_uppercase(),
            strike: raw.strike,
            cut: raw.cut.clone(),
            trade_date: raw.trade_date,
            expiry_date: raw.expiry_date,
            settlement_date: raw.settlement_date,
            premium: raw.premium,
            premium_currency: raw.premium_currency.as_ref().map(|c| c.to_uppercase()),
            premium_date: raw.premium_date,
            inbound_message_id: None,
        };

        let created = WorkflowEventDraft::new(
            SYSTEM_CODE,
            "CREATED",
            format!("Captured from {} ticket {ticket_id}", message.source),
            INITIATOR,
        );
        let mut bundles = vec![TradeBundle {
            trade: Some(trade.clone()),
            system_links: links,
            workflow_events: vec![created],
        }];

        if let Some(hedge) = raw.hedge {
            let hedge_ref = hedge
                .trade_ref
                .map(|r| r.trim().to_string())
                .unwrap_or_else(|| format!("{}-H", trade.trade_ref));
            let hedge_trade = Trade {
                trade_ref: hedge_ref,
                product: hedge.product.unwrap_or(ProductType::Spot),
                side: hedge.side.unwrap_or_else(|| trade.side.opposite()),
                notional: hedge.notional,
                notional_currency: hedge
                    .notional_currency
                    .map(|c| c.trim().to_uppercase())
                    .unwrap_or_else(|| trade.notional_currency.clone()),
                strike: None,
                cut: None,
                expiry_date: None,
                settlement_date: hedge.settlement_date,
                premium: None,
                premium_currency: None,
                premium_date: None,
                ..trade.clone()
            };
            let event = WorkflowEventDraft::new(
                SYSTEM_CODE,
                "CREATED",
                format!("Delta hedge for {} from ticket {ticket_id}", trade.trade_ref),
                INITIATOR,
            );
            bundles.push(TradeBundle {
                trade: Some(hedge_trade),
                system_links: self
                    .booking_systems
                    .iter()
                    .map(|s| SystemLinkDraft::new(s.clone()))
                    .collect(),
                workflow_events: vec![event],
            });
        }
        Ok(bundles)
    }
}

fn is_currency(code: &str) -> bool {
    let code = code.trim();
    code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic())
}

/// Content checks that serde cannot express.
fn validate(trade: &TicketTrade) -> Result<(), String> {
    let r = &trade.trade_ref;
    if r.trim().is_empty() {
        return Err("trade_ref is empty".to_string());
    }
    let pair = &trade.currency_pair;
    if pair.len() != 6 || !pair.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(format!("{r}: invalid currency_pair '{pair}'"));
    }
    if trade.notional <= Decimal::ZERO {
        return Err(format!("{r}: notional must be positive"));
    }
    if !is_currency(&trade.notional_currency) {
        return Err(format!(
            "{r}: invalid notional_currency '{}'",
            trade.notional_currency
        ));
    }
    if trade.counterparty.trim().is_empty() {
        return Err(format!("{r}: counterparty is empty"));
    }
    if trade.product.is_option() {
        if trade.strike.is_none() {
            return Err(format!("{r}: option without strike"));
        }
        if trade.expiry_date.is_none() {
            return Err(format!("{r}: option without expiry_date"));
        }
    } else if trade.hedge.is_some() {
        return Err(format!("{r}: hedge is only allowed on options"));
    }
    if let Some(hedge) = &trade.hedge {
        if hedge.notional <= Decimal::ZERO {
            return Err(format!("{r}: hedge notional must be positive"));
        }
        if hedge.trade_ref.as_deref().is_some_and(|h| h.trim().is_empty()) {
            return Err(format!("{r}: hedge trade_ref is empty"));
        }
        if let Some(ccy) = hedge.notional_currency.as_deref().filter(|c| !is_currency(c)) {
            return Err(format!("{r}: invalid hedge notional_currency '{ccy}'"));
        }
    }
    Ok(())
}

impl Parser for TicketParser {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn can_parse(&self, message: &InboundMessage) -> bool {
        Self::find_ticket(&message.payload).is_some()
    }

    fn parse(&self, message: &InboundMessage) -> Result<ParseResult, ParserError> {
        let Some(value) = Self::find_ticket(&message.payload) else {
            return Ok(ParseResult::rejected("No stp-ticket object in payload"));
        };
        let ticket: Ticket = match serde_json::from_value(value) {
            Ok(ticket) => ticket,
            Err(e) => return Ok(ParseResult::rejected(format!("Invalid ticket: {e}"))),
        };
        let ticket_id = ticket
            .ticket_id
            .unwrap_or_else(|| format!("message-{}", message.id));

        let mut bundles = Vec::new();
        for raw in ticket.trades {
            match self.bundles_for(message, &ticket_id, raw) {
                Ok(mut produced) => bundles.append(&mut produced),
                Err(reason) => return Ok(ParseResult::Rejected(reason)),
            }
        }
        tracing::debug!(
            message_id = %message.id,
            ticket = %ticket_id,
            bundles = bundles.len(),
            "Ticket parsed"
        );
        Ok(ParseResult::Parsed(bundles))
    }
}
