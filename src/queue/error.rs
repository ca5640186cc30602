//! Errors of the durable queue layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    /// Sending one or more messages failed.
    #[error("Failed to send message: {0}")]
    Send(String),

    /// Polling the queue failed.
    #[error("Failed to receive messages: {0}")]
    Receive(String),

    /// Acknowledging a message failed.
    #[error("Failed to delete message: {0}")]
    Delete(String),

    /// A message body could not be encoded or decoded.
    #[error("Failed to serialize message: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A request could not be built from its inputs.
    #[error("Failed to build request: {0}")]
    Build(String),
}
