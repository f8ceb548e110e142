use std::sync::Arc;

use stp_models::InboundMessage;

use crate::parser::Parser;

/// Ordered set of parsers. Dispatch is first-match: registration order decides
/// which parser gets a message several of them could handle.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: Vec<Arc<dyn Parser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, parser: Arc<dyn Parser>) {
        self.parsers.push(parser);
    }

    pub fn with(mut self, parser: Arc<dyn Parser>) -> Self {
        self.register(parser);
        self
    }

    /// The first parser whose `can_parse` accepts the message.
    pub fn find(&self, message: &InboundMessage) -> Option<&Arc<dyn Parser>> {
        self.parsers.iter().find(|p| p.can_parse(message))
    }

    pub fn names(&self) -> Vec<&str> {
        self.parsers.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}
