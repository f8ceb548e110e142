pub mod ticket;

use std::sync::Arc;
use std::time::Duration;

use stp_models::ParsersConfig;

use crate::error::ParserError;
use crate::reference::ReferenceData;
use crate::registry::ParserRegistry;

pub use ticket::TicketParser;

/// Build the registry in the configured dispatch order.
pub fn build_registry(config: &ParsersConfig) -> Result<ParserRegistry, ParserError> {
    let mut registry = ParserRegistry::new();
    for name in &config.order {
        match name.as_str() {
            TicketParser::NAME => {
                let ticket = &config.ticket;
                let reference = Arc::new(ReferenceData::new(
                    &ticket.counterparty_aliases,
                    ticket.reference_cache_capacity,
                    Duration::from_secs(ticket.reference_cache_ttl_seconds),
                ));
                registry.register(Arc::new(TicketParser::new(
                    reference,
                    ticket.booking_systems.clone(),
                )));
            }
            other => return Err(ParserError::UnknownParser(other.to_string())),
        }
    }
    tracing::info!(parsers = ?registry.names(), "Parser registry built");
    Ok(registry)
}
