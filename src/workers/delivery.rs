use std::sync::Arc;

use async_trait::async_trait;

use super::{BatchProcessor, acknowledge};
use crate::{
    delivery::AlertHandler,
    models::Alert,
    queue::{QueueConsumer, QueueMessage},
};

/// Feeds alert envelopes to the delivery handler. Every message is
/// acknowledged after the batch: alerts that need another attempt have been
/// re-enqueued by the handler itself.
pub struct DeliveryProcessor {
    handler: Arc<AlertHandler>,
}

impl DeliveryProcessor {
    pub fn new(handler: Arc<AlertHandler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl BatchProcessor for DeliveryProcessor {
    async fn process_batch(&self, consumer: &dyn QueueConsumer, messages: Vec<QueueMessage>) {
        let alerts: Vec<Alert> = messages
            .iter()
            .filter_map(|message| match serde_json::from_str(&message.body) {
                Ok(alert) => Some(alert),
                Err(e) => {
                    tracing::error!(error = %e, body = %message.body, "Dropping malformed alert.");
                    None
                }
            })
            .collect();

        if !alerts.is_empty() {
            self.handler.handle_alerts(alerts).await;
        }

        for message in &messages {
            acknowledge(consumer, message).await;
        }
    }
}
