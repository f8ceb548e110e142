use serde::Serialize;
use thiserror::Error;

/// An unexpected fault raised by a parser, as opposed to a rejection it reports.
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parser fault: {0}")]
    Fault(String),

    #[error("Unknown parser in configuration: {0}")]
    UnknownParser(String),
}

/// Why a message could not be turned into persisted trades.
///
/// The `Display` text is what gets written to the message's parse error.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseFailure {
    #[error("No parser available")]
    NoParserAvailable,

    #[error("{reason}")]
    ParserRejected { reason: String },

    #[error("Parser returned success but no trades")]
    EmptyResult,

    #[error("Bundle {index} has no trade")]
    MalformedBundle { index: usize },

    #[error("Persistence fault in bundle {index}: {detail}")]
    PersistenceFault { index: usize, detail: String },

    #[error("Parser {parser} fault: {detail}")]
    UnhandledParserFault { parser: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_diagnostics() {
        assert_eq!(ParseFailure::NoParserAvailable.to_string(), "No parser available");
        assert_eq!(
            ParseFailure::EmptyResult.to_string(),
            "Parser returned success but no trades"
        );
        assert_eq!(
            ParseFailure::MalformedBundle { index: 1 }.to_string(),
            "Bundle 1 has no trade"
        );
    }

    #[test]
    fn rejection_is_recorded_verbatim() {
        let failure = ParseFailure::ParserRejected {
            reason: "missing tag 55".to_string(),
        };
        assert_eq!(failure.to_string(), "missing tag 55");
    }

    #[test]
    fn failure_serializes_with_kind() {
        let json = serde_json::to_value(ParseFailure::MalformedBundle { index: 2 }).unwrap();
        assert_eq!(json["kind"], "malformed_bundle");
        assert_eq!(json["index"], 2);
    }
}
