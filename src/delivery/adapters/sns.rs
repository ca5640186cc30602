use async_trait::async_trait;
use aws_sdk_sns::{Client, error::DisplayErrorContext};

use super::aws::{DestinationMessage, RegionalClients};
use crate::{
    delivery::{DeliveryError, OutputAdapter},
    models::{Alert, OutputConfig},
};

/// Region of a topic ARN such as `arn:aws:sns:us-west-2:123456789012:alerts`.
fn topic_region(topic_arn: &str) -> Option<&str> {
    let mut parts = topic_arn.split(':');
    if parts.next() != Some("arn") {
        return None;
    }
    parts.nth(2).filter(|region| !region.is_empty())
}

/// Publishes alerts to customer SNS topics.
pub struct SnsAdapter {
    clients: RegionalClients<Client>,
}

impl SnsAdapter {
    pub fn new(sdk_config: aws_config::SdkConfig) -> Self {
        Self { clients: RegionalClients::new(sdk_config) }
    }
}

#[async_trait]
impl OutputAdapter for SnsAdapter {
    async fn deliver(&self, alert: &Alert, config: &OutputConfig) -> Result<(), DeliveryError> {
        let OutputConfig::Sns(sns) = config else {
            return Err(DeliveryError::permanent("sns adapter given a non-sns config"));
        };
        let region = topic_region(&sns.topic_arn).ok_or_else(|| {
            DeliveryError::permanent(format!("invalid topic ARN {}", sns.topic_arn))
        })?;
        let message = serde_json::to_string(&DestinationMessage::from(alert))
            .map_err(|e| DeliveryError::permanent(e.to_string()))?;

        let client = self.clients.get_or_create(region, |sdk_config, region| {
            Client::from_conf(aws_sdk_sns::config::Builder::from(sdk_config).region(region).build())
        });
        client
            .publish()
            .topic_arn(&sns.topic_arn)
            .message(message)
            .send()
            .await
            .map_err(|e| DeliveryError::transient(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}
