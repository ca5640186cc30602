//! Rendering of the human-facing parts of an alert notification.

use serde::Serialize;

use crate::{
    delivery::DeliveryError,
    models::{Alert, AlertType, Severity},
    template::TemplateService,
};

/// Values every message template can refer to.
#[derive(Debug, Serialize)]
pub struct MessageContext<'a> {
    pub title: String,
    pub summary: String,
    pub url: String,
    pub description: &'a str,
    pub runbook: &'a str,
    pub severity: Severity,
    pub tags: &'a [String],
}

/// Builds titles, links and template bodies for alerts.
pub struct AlertFormatter {
    alert_url_prefix: String,
    policy_url_prefix: String,
    templates: TemplateService,
}

impl AlertFormatter {
    pub fn new(
        alert_url_prefix: impl Into<String>,
        policy_url_prefix: impl Into<String>,
        templates: TemplateService,
    ) -> Self {
        Self {
            alert_url_prefix: alert_url_prefix.into(),
            policy_url_prefix: policy_url_prefix.into(),
            templates,
        }
    }

    /// Deep link to the alert for rule alerts, or to the policy otherwise.
    pub fn url(&self, alert: &Alert) -> String {
        match (alert.alert_type, alert.alert_id.as_deref()) {
            (AlertType::Rule, Some(alert_id)) => format!("{}{alert_id}", self.alert_url_prefix),
            _ => self.policy_url(alert),
        }
    }

    pub fn policy_url(&self, alert: &Alert) -> String {
        format!("{}{}", self.policy_url_prefix, alert.policy_id)
    }

    pub fn context<'a>(&self, alert: &'a Alert) -> MessageContext<'a> {
        MessageContext {
            title: alert.title(),
            summary: alert.summary(),
            url: self.url(alert),
            description: &alert.policy_description,
            runbook: &alert.runbook,
            severity: alert.severity,
            tags: &alert.tags,
        }
    }

    /// Renders a built-in template for `alert`. A template that cannot be
    /// rendered will not render on a retry either.
    pub fn render(&self, template: &str, alert: &Alert) -> Result<String, DeliveryError> {
        self.templates
            .render(template, self.context(alert))
            .map_err(|e| DeliveryError::permanent(e.to_string()))
    }
}
