//! Long-running queue consumers feeding the merge engine and the delivery
//! stage.

mod delivery;
mod merge;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use delivery::DeliveryProcessor;
pub use merge::MergeProcessor;

use crate::queue::{QueueConsumer, QueueMessage};

const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Handles one batch of received messages, acknowledging those that are done.
#[async_trait]
pub trait BatchProcessor: Send + Sync {
    async fn process_batch(&self, consumer: &dyn QueueConsumer, messages: Vec<QueueMessage>);
}

/// Acknowledges a message, logging rather than failing when that is not
/// possible. The message will then simply be redelivered.
pub(crate) async fn acknowledge(consumer: &dyn QueueConsumer, message: &QueueMessage) {
    if let Err(e) = consumer.delete(&message.receipt_handle).await {
        tracing::warn!(error = %e, receipt_handle = %message.receipt_handle, "Failed to delete message.");
    }
}

/// Polls a queue until cancelled, handing every batch to its processor.
pub struct QueueWorker<P> {
    name: &'static str,
    consumer: Arc<dyn QueueConsumer>,
    processor: P,
    cancellation_token: CancellationToken,
    error_backoff: Duration,
}

impl<P: BatchProcessor> QueueWorker<P> {
    pub fn new(
        name: &'static str,
        consumer: Arc<dyn QueueConsumer>,
        processor: P,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self { name, consumer, processor, cancellation_token, error_backoff: DEFAULT_ERROR_BACKOFF }
    }

    /// Sets how long to wait after a failed poll.
    pub fn with_error_backoff(mut self, error_backoff: Duration) -> Self {
        self.error_backoff = error_backoff;
        self
    }

    /// Starts the long-running polling loop. A batch that is being processed
    /// when cancellation arrives is finished first.
    pub async fn run(self) {
        tracing::info!(worker = self.name, "Queue worker started.");
        loop {
            let received = tokio::select! {
                biased;

                _ = self.cancellation_token.cancelled() => break,
                received = self.consumer.receive() => received,
            };

            match received {
                Ok(messages) if messages.is_empty() => {}
                Ok(messages) => {
                    tracing::debug!(worker = self.name, count = messages.len(), "Received batch.");
                    self.processor.process_batch(self.consumer.as_ref(), messages).await;
                }
                Err(e) => {
                    tracing::error!(worker = self.name, error = %e, "Failed to poll queue. Retrying after delay...");
                    tokio::select! {
                        _ = self.cancellation_token.cancelled() => break,
                        _ = tokio::time::sleep(self.error_backoff) => {}
                    }
                }
            }
        }
        tracing::info!(worker = self.name, "Queue worker has shut down.");
    }
}
