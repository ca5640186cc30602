use chrono::{DateTime, TimeZone, Utc};

use crate::models::{Alert, AlertType, Severity};

/// A builder for creating `Alert` instances for testing.
pub struct AlertBuilder {
    alert: Alert,
}

impl AlertBuilder {
    /// A rule alert. The rule id is the alert id without its counter suffix.
    pub fn rule(alert_id: &str) -> Self {
        let rule_id = alert_id.rsplit_once('-').map_or(alert_id, |(rule_id, _)| rule_id);
        let mut builder = Self::policy(rule_id);
        builder.alert.alert_id = Some(alert_id.to_string());
        builder.alert.alert_type = AlertType::Rule;
        builder
    }

    pub fn policy(policy_id: &str) -> Self {
        Self {
            alert: Alert {
                alert_id: None,
                created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                output_ids: Vec::new(),
                policy_description: String::new(),
                policy_id: policy_id.to_string(),
                policy_name: String::new(),
                policy_version_id: None,
                runbook: String::new(),
                severity: Severity::Info,
                tags: Vec::new(),
                alert_type: AlertType::Policy,
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.alert.policy_name = name.to_string();
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.alert.policy_description = description.to_string();
        self
    }

    pub fn runbook(mut self, runbook: &str) -> Self {
        self.alert.runbook = runbook.to_string();
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.alert.severity = severity;
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.alert.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn output_ids(mut self, output_ids: &[&str]) -> Self {
        self.alert.output_ids = output_ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.alert.created_at = created_at;
        self
    }

    pub fn created_at_secs(self, secs: i64) -> Self {
        self.created_at(Utc.timestamp_opt(secs, 0).unwrap())
    }

    pub fn build(self) -> Alert {
        self.alert
    }
}
