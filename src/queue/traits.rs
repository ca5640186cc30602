//! Producer and consumer sides of a durable queue.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::QueueError;

/// A message body to enqueue with its own visibility delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayedMessage {
    pub body: String,
    pub delay: Duration,
}

/// A message received from a queue, acknowledged through its receipt handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub body: String,
    pub receipt_handle: String,
}

/// Producer side of a durable queue.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AlertQueue: Send + Sync {
    /// Enqueues a single message for immediate delivery.
    async fn send(&self, body: String) -> Result<(), QueueError>;

    /// Enqueues many messages, each visible only after its own delay.
    async fn send_batch(&self, messages: Vec<DelayedMessage>) -> Result<(), QueueError>;
}

/// Consumer side of a durable queue.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait QueueConsumer: Send + Sync {
    /// Long-polls for the next batch of messages. May return an empty batch.
    async fn receive(&self) -> Result<Vec<QueueMessage>, QueueError>;

    /// Acknowledges a message so it is not redelivered.
    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError>;
}
