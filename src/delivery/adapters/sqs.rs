use async_trait::async_trait;
use aws_sdk_sqs::{Client, error::DisplayErrorContext};
use url::Url;

use super::aws::{DestinationMessage, RegionalClients};
use crate::{
    delivery::{DeliveryError, OutputAdapter},
    models::{Alert, OutputConfig},
};

/// Region of a queue URL such as
/// `https://sqs.us-west-2.amazonaws.com/123456789012/alerts`.
fn queue_region(queue_url: &Url) -> Option<&str> {
    queue_url.host_str()?.split('.').nth(1).filter(|region| !region.is_empty())
}

/// Sends alerts to customer SQS queues.
pub struct SqsAdapter {
    clients: RegionalClients<Client>,
}

impl SqsAdapter {
    pub fn new(sdk_config: aws_config::SdkConfig) -> Self {
        Self { clients: RegionalClients::new(sdk_config) }
    }
}

#[async_trait]
impl OutputAdapter for SqsAdapter {
    async fn deliver(&self, alert: &Alert, config: &OutputConfig) -> Result<(), DeliveryError> {
        let OutputConfig::Sqs(sqs) = config else {
            return Err(DeliveryError::permanent("sqs adapter given a non-sqs config"));
        };
        let region = queue_region(&sqs.queue_url).ok_or_else(|| {
            DeliveryError::permanent(format!("cannot determine region of queue {}", sqs.queue_url))
        })?;
        let body = serde_json::to_string(&DestinationMessage::from(alert))
            .map_err(|e| DeliveryError::permanent(e.to_string()))?;

        let client = self.clients.get_or_create(region, |sdk_config, region| {
            Client::from_conf(aws_sdk_sqs::config::Builder::from(sdk_config).region(region).build())
        });
        client
            .send_message()
            .queue_url(sqs.queue_url.as_str())
            .message_body(body)
            .send()
            .await
            .map_err(|e| DeliveryError::transient(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}
