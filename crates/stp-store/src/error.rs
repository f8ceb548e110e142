use stp_models::{LinkId, LinkTransitionError, MessageId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Link transition rejected: {0}")]
    LinkTransition(#[from] LinkTransitionError),

    #[error("Message not found: id={0}")]
    MessageNotFound(MessageId),

    #[error("System link not found: id={0}")]
    LinkNotFound(LinkId),

    #[error("Store not available: {0}")]
    Unavailable(String),
}
