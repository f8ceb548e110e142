use stp_models::{InboundMessage, ParseResult};

use crate::error::ParserError;

/// A source-format parser (FIX, email, file import, ...).
///
/// Parsers only interpret; they never write to the trade store. Reference-data
/// lookups are allowed.
pub trait Parser: Send + Sync {
    fn name(&self) -> &str;

    /// Pure applicability check. Must not fail on well-formed foreign input.
    fn can_parse(&self, message: &InboundMessage) -> bool;

    /// `Ok(ParseResult::Rejected)` for content the parser refuses, `Err` for faults.
    fn parse(&self, message: &InboundMessage) -> Result<ParseResult, ParserError>;
}
