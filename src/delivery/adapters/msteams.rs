use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::{Value, json};

use super::{AlertFormatter, http};
use crate::{
    delivery::{DeliveryError, OutputAdapter},
    models::{Alert, OutputConfig},
};

const VIEW_LINK_TEXT: &str = "Click here to view the alert";

/// Posts alerts to Microsoft Teams connectors as a MessageCard.
pub struct MsTeamsAdapter {
    client: Arc<ClientWithMiddleware>,
    formatter: Arc<AlertFormatter>,
}

impl MsTeamsAdapter {
    pub fn new(client: Arc<ClientWithMiddleware>, formatter: Arc<AlertFormatter>) -> Self {
        Self { client, formatter }
    }

    fn payload(&self, alert: &Alert) -> Value {
        json!({
            "@context": "http://schema.org/extensions",
            "@type": "MessageCard",
            "text": alert.title(),
            "sections": [{
                "facts": [
                    { "name": "Description", "value": alert.policy_description },
                    { "name": "Runbook", "value": alert.runbook },
                    { "name": "Severity", "value": alert.severity.as_str() },
                    { "name": "Tags", "value": alert.tags.join(", ") },
                ],
                "text": format!("[{VIEW_LINK_TEXT}]({}).\n", self.formatter.policy_url(alert)),
            }],
            "potentialAction": [{
                "@type": "OpenUri",
                "name": VIEW_LINK_TEXT,
                "targets": [{ "os": "default", "uri": self.formatter.url(alert) }],
            }],
        })
    }
}

#[async_trait]
impl OutputAdapter for MsTeamsAdapter {
    async fn deliver(&self, alert: &Alert, config: &OutputConfig) -> Result<(), DeliveryError> {
        let OutputConfig::MsTeams(teams) = config else {
            return Err(DeliveryError::permanent("msteams adapter given a non-msteams config"));
        };
        let request = self
            .client
            .post(teams.webhook_url.clone())
            .header(ACCEPT, "application/json")
            .json(&self.payload(alert));
        http::send(request).await
    }
}
