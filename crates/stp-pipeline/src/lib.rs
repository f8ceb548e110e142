pub mod error;
pub mod json;
pub mod orchestrator;
pub mod parser;
pub mod parsers;
pub mod reference;
pub mod registry;

pub mod test_support;

pub use error::{ParseFailure, ParserError};
pub use orchestrator::{BatchSummary, MessageOutcome, Orchestrator};
pub use parser::Parser;
pub use parsers::{build_registry, TicketParser};
pub use reference::ReferenceData;
pub use registry::ParserRegistry;
