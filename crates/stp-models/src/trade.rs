use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::message::MessageId;

/// Identity of a persisted trade. Only the trade store hands these out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TradeId(pub i64);

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Spot,
    Forward,
    Swap,
    Ndf,
    VanillaOption,
    ExoticOption,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Spot => "spot",
            ProductType::Forward => "forward",
            ProductType::Swap => "swap",
            ProductType::Ndf => "ndf",
            ProductType::VanillaOption => "vanilla_option",
            ProductType::ExoticOption => "exotic_option",
        }
    }

    pub fn is_option(&self) -> bool {
        matches!(self, ProductType::VanillaOption | ProductType::ExoticOption)
    }
}

impl FromStr for ProductType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spot" => Ok(ProductType::Spot),
            "forward" => Ok(ProductType::Forward),
            "swap" => Ok(ProductType::Swap),
            "ndf" => Ok(ProductType::Ndf),
            "vanilla_option" => Ok(ProductType::VanillaOption),
            "exotic_option" => Ok(ProductType::ExoticOption),
            other => Err(format!("unknown product type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            other => Err(format!("unknown side: {other}")),
        }
    }
}

/// Canonical negotiated FX trade (spot, forward, swap, NDF, vanilla or exotic option).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trade {
    /// Human-readable trade identifier (venue or ticket reference).
    pub trade_ref: String,
    pub product: ProductType,
    /// How the trade reached us (e.g., "FIX", "EMAIL", "FILE").
    pub source_type: String,
    pub venue: Option<String>,
    pub counterparty: String,
    pub broker: Option<String>,
    /// Six-letter pair, e.g. "EURUSD".
    pub currency_pair: String,
    pub side: Side,
    pub notional: Decimal,
    pub notional_currency: String,
    pub strike: Option<Decimal>,
    /// Option expiry cut (e.g., "NY10", "TK15").
    pub cut: Option<String>,
    pub trade_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub settlement_date: Option<NaiveDate>,
    pub premium: Option<Decimal>,
    pub premium_currency: Option<String>,
    pub premium_date: Option<NaiveDate>,
    /// The inbound message this trade was parsed from. Set by the orchestrator.
    pub inbound_message_id: Option<MessageId>,
}

impl Trade {
    pub fn with_inbound_message(mut self, id: MessageId) -> Self {
        self.inbound_message_id = Some(id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn product_type_str_roundtrip() {
        for product in [
            ProductType::Spot,
            ProductType::Forward,
            ProductType::Swap,
            ProductType::Ndf,
            ProductType::VanillaOption,
            ProductType::ExoticOption,
        ] {
            assert_eq!(product.as_str().parse::<ProductType>().unwrap(), product);
        }
        assert!("swaption".parse::<ProductType>().is_err());
    }

    #[test]
    fn product_type_matches_serde_name() {
        assert_eq!(
            serde_json::to_string(&ProductType::VanillaOption).unwrap(),
            "\"vanilla_option\""
        );
    }

    #[test]
    fn side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!("sell".parse::<Side>().unwrap(), Side::Sell);
    }

    #[test]
    fn with_inbound_message_sets_link() {
        let trade = Trade {
            trade_ref: "T-1".to_string(),
            product: ProductType::Spot,
            source_type: "FIX".to_string(),
            venue: None,
            counterparty: "GSIL".to_string(),
            broker: None,
            currency_pair: "EURUSD".to_string(),
            side: Side::Buy,
            notional: dec!(1000000),
            notional_currency: "EUR".to_string(),
            strike: None,
            cut: None,
            trade_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            expiry_date: None,
            settlement_date: None,
            premium: None,
            premium_currency: None,
            premium_date: None,
            inbound_message_id: None,
        };
        let trade = trade.with_inbound_message(MessageId(9));
        assert_eq!(trade.inbound_message_id, Some(MessageId(9)));
    }
}
