use std::sync::Arc;

use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::{Value, json};
use url::Url;

use super::http;
use crate::{
    delivery::{DeliveryError, OutputAdapter},
    models::{Alert, OutputConfig, Severity},
};

pub const PAGERDUTY_EVENTS_URL: &str = "https://events.pagerduty.com/v2/enqueue";

const EVENT_SOURCE: &str = "tripwire";

/// PagerDuty only knows four severities.
fn pagerduty_severity(severity: Severity) -> &'static str {
    match severity {
        Severity::Info | Severity::Low => "info",
        Severity::Medium => "warning",
        Severity::High => "error",
        Severity::Critical => "critical",
    }
}

/// Triggers PagerDuty incidents through the Events API v2.
pub struct PagerDutyAdapter {
    client: Arc<ClientWithMiddleware>,
    events_url: Url,
}

impl PagerDutyAdapter {
    pub fn new(client: Arc<ClientWithMiddleware>, events_url: Url) -> Self {
        Self { client, events_url }
    }

    fn payload(alert: &Alert, routing_key: &str) -> Value {
        json!({
            "routing_key": routing_key,
            "event_action": "trigger",
            "payload": {
                "summary": alert.title(),
                "severity": pagerduty_severity(alert.severity),
                "source": EVENT_SOURCE,
                "timestamp": alert.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                "custom_details": {
                    "description": alert.policy_description,
                    "runbook": alert.runbook,
                },
            },
        })
    }
}

#[async_trait]
impl OutputAdapter for PagerDutyAdapter {
    async fn deliver(&self, alert: &Alert, config: &OutputConfig) -> Result<(), DeliveryError> {
        let OutputConfig::PagerDuty(pagerduty) = config else {
            return Err(DeliveryError::permanent("pagerduty adapter given a non-pagerduty config"));
        };
        let body = Self::payload(alert, &pagerduty.integration_key);
        http::send(self.client.post(self.events_url.clone()).json(&body)).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;

    use super::*;
    use crate::{
        models::PagerDutyConfig,
        test_helpers::{AlertBuilder, create_test_http_client},
    };

    #[test]
    fn test_severity_mapping() {
        assert_eq!(pagerduty_severity(Severity::Info), "info");
        assert_eq!(pagerduty_severity(Severity::Low), "info");
        assert_eq!(pagerduty_severity(Severity::Medium), "warning");
        assert_eq!(pagerduty_severity(Severity::High), "error");
        assert_eq!(pagerduty_severity(Severity::Critical), "critical");
    }

    #[tokio::test]
    async fn test_pagerduty_triggers_event() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v2/enqueue")
            .match_body(Matcher::Json(json!({
                "routing_key": "integrationKey",
                "event_action": "trigger",
                "payload": {
                    "summary": "Policy Failure: policyName",
                    "severity": "info",
                    "source": "tripwire",
                    "timestamp": "2019-05-03T11:40:13Z",
                    "custom_details": { "description": "", "runbook": "runbook" },
                },
            })))
            .with_status(202)
            .create_async()
            .await;
        let alert = AlertBuilder::policy("policyId")
            .name("policyName")
            .runbook("runbook")
            .severity(Severity::Info)
            .created_at(Utc.with_ymd_and_hms(2019, 5, 3, 11, 40, 13).unwrap())
            .build();
        let adapter = PagerDutyAdapter::new(
            create_test_http_client(),
            format!("{}/v2/enqueue", server.url()).parse().unwrap(),
        );
        let config = OutputConfig::PagerDuty(PagerDutyConfig { integration_key: "integrationKey".into() });

        adapter.deliver(&alert, &config).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_pagerduty_server_error_is_transient() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/v2/enqueue").with_status(500).create_async().await;
        let adapter = PagerDutyAdapter::new(
            create_test_http_client(),
            format!("{}/v2/enqueue", server.url()).parse().unwrap(),
        );
        let config = OutputConfig::PagerDuty(PagerDutyConfig { integration_key: "key".into() });

        let result = adapter.deliver(&AlertBuilder::rule("R1-1").build(), &config).await;

        assert!(matches!(result, Err(DeliveryError::Transient(_))));
    }
}
