use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

use super::{BatchProcessor, acknowledge};
use crate::{
    merger::{AlertMerger, MergeError},
    queue::{QueueConsumer, QueueMessage},
};

/// Feeds rule matches to the merge engine. A message is acknowledged only
/// once it has been merged, so failed merges are redelivered by the queue.
/// Malformed messages are dropped.
pub struct MergeProcessor {
    merger: Arc<AlertMerger>,
}

impl MergeProcessor {
    pub fn new(merger: Arc<AlertMerger>) -> Self {
        Self { merger }
    }

    async fn process_message(&self, consumer: &dyn QueueConsumer, message: &QueueMessage) {
        match self.merger.handle(&message.body).await {
            Ok(_) => acknowledge(consumer, message).await,
            Err(e @ MergeError::Malformed(_)) => {
                tracing::error!(error = %e, body = %message.body, "Dropping malformed rule match.");
                acknowledge(consumer, message).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to merge rule match, leaving it for redelivery.");
            }
        }
    }
}

#[async_trait]
impl BatchProcessor for MergeProcessor {
    async fn process_batch(&self, consumer: &dyn QueueConsumer, messages: Vec<QueueMessage>) {
        join_all(messages.iter().map(|message| self.process_message(consumer, message))).await;
    }
}
