use thiserror::Error;

use crate::{analysis::RuleSourceError, persistence::PersistenceError, queue::QueueError};

/// Errors aborting the handling of one rule match.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The queue message is not a rule match. Redelivering it cannot help.
    #[error("Malformed alert notification: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Alert store error: {0}")]
    Store(#[from] PersistenceError),

    /// The window counter lost the race but no counter could be read back.
    #[error("No merge window recorded for rule {0}")]
    MissingWindow(String),

    #[error("Failed to fetch rule metadata: {0}")]
    RuleLookup(#[from] RuleSourceError),

    #[error("Failed to encode alert: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to enqueue alert: {0}")]
    Queue(#[from] QueueError),
}
