use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::json;
use url::Url;

use super::{AlertFormatter, http};
use crate::{
    delivery::{DeliveryError, OutputAdapter},
    http_client::endpoint_url,
    models::{Alert, OutputConfig, Severity},
    template::OPSGENIE_TEMPLATE,
};

pub const OPSGENIE_API_URL: &str = "https://api.opsgenie.com/";

fn priority(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "P1",
        Severity::High => "P2",
        Severity::Medium => "P3",
        Severity::Low => "P4",
        Severity::Info => "P5",
    }
}

/// Creates Opsgenie alerts.
pub struct OpsgenieAdapter {
    client: Arc<ClientWithMiddleware>,
    formatter: Arc<AlertFormatter>,
    api_url: Url,
}

impl OpsgenieAdapter {
    pub fn new(client: Arc<ClientWithMiddleware>, formatter: Arc<AlertFormatter>, api_url: Url) -> Self {
        Self { client, formatter, api_url }
    }
}

#[async_trait]
impl OutputAdapter for OpsgenieAdapter {
    async fn deliver(&self, alert: &Alert, config: &OutputConfig) -> Result<(), DeliveryError> {
        let OutputConfig::Opsgenie(opsgenie) = config else {
            return Err(DeliveryError::permanent("opsgenie adapter given a non-opsgenie config"));
        };
        let url = endpoint_url(&self.api_url, "v2/alerts")
            .map_err(|e| DeliveryError::permanent(e.to_string()))?;
        let body = json!({
            "message": alert.title(),
            "description": self.formatter.render(OPSGENIE_TEMPLATE, alert)?,
            "tags": alert.tags,
            "priority": priority(alert.severity),
        });
        let request = self
            .client
            .post(url)
            .header(AUTHORIZATION, format!("GenieKey {}", opsgenie.api_key))
            .json(&body);
        http::send(request).await
    }
}
