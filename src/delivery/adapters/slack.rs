use std::sync::Arc;

use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::{Value, json};

use super::{AlertFormatter, http};
use crate::{
    delivery::{DeliveryError, OutputAdapter},
    models::{Alert, OutputConfig, Severity},
};

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "#425a70",
        Severity::High => "#cb2e2e",
        Severity::Medium => "#d9822b",
        Severity::Low => "#f7d154",
        Severity::Info => "#47b881",
    }
}

/// Posts alerts to Slack incoming webhooks as a single attachment.
pub struct SlackAdapter {
    client: Arc<ClientWithMiddleware>,
    formatter: Arc<AlertFormatter>,
}

impl SlackAdapter {
    pub fn new(client: Arc<ClientWithMiddleware>, formatter: Arc<AlertFormatter>) -> Self {
        Self { client, formatter }
    }

    fn payload(&self, alert: &Alert) -> Value {
        let title = alert.title();
        json!({
            "attachments": [{
                "fallback": title,
                "color": severity_color(alert.severity),
                "title": title,
                "title_link": self.formatter.url(alert),
                "text": alert.summary(),
                "fields": [
                    { "title": "Runbook", "value": alert.runbook, "short": false },
                    { "title": "Severity", "value": alert.severity.as_str(), "short": true },
                ],
            }]
        })
    }
}

#[async_trait]
impl OutputAdapter for SlackAdapter {
    async fn deliver(&self, alert: &Alert, config: &OutputConfig) -> Result<(), DeliveryError> {
        let OutputConfig::Slack(slack) = config else {
            return Err(DeliveryError::permanent("slack adapter given a non-slack config"));
        };
        http::send(self.client.post(slack.webhook_url.clone()).json(&self.payload(alert))).await
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;
    use crate::{
        models::SlackConfig,
        template::TemplateService,
        test_helpers::{AlertBuilder, create_test_http_client},
    };

    fn adapter() -> SlackAdapter {
        let formatter = AlertFormatter::new(
            "https://tripwire.test/alerts/",
            "https://tripwire.test/policies/",
            TemplateService::new().unwrap(),
        );
        SlackAdapter::new(create_test_http_client(), Arc::new(formatter))
    }

    fn config(server: &mockito::Server) -> OutputConfig {
        OutputConfig::Slack(SlackConfig {
            webhook_url: format!("{}/services/T0/B0", server.url()).parse().unwrap(),
        })
    }

    #[tokio::test]
    async fn test_slack_posts_attachment() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/services/T0/B0")
            .match_body(Matcher::PartialJson(json!({
                "attachments": [{
                    "title": "New Alert: Root Login",
                    "title_link": "https://tripwire.test/alerts/R1-1",
                    "color": "#cb2e2e",
                }]
            })))
            .with_status(200)
            .create_async()
            .await;
        let alert = AlertBuilder::rule("R1-1").name("Root Login").severity(Severity::High).build();

        adapter().deliver(&alert, &config(&server)).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_slack_classifies_failures() {
        let mut server = mockito::Server::new_async().await;
        let alert = AlertBuilder::rule("R1-1").build();

        let throttled = server.mock("POST", "/services/T0/B0").with_status(429).create_async().await;
        let result = adapter().deliver(&alert, &config(&server)).await;
        assert!(matches!(result, Err(DeliveryError::Transient(_))));
        throttled.remove_async().await;

        server.mock("POST", "/services/T0/B0").with_status(404).create_async().await;
        let result = adapter().deliver(&alert, &config(&server)).await;
        assert!(matches!(result, Err(DeliveryError::Permanent(_))));
    }
}
