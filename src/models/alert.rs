//! The alert envelope handed from the merge stage to the delivery stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{RuleMetadata, Severity};

/// Whether an alert was raised by a log-analysis rule or a cloud policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertType {
    Rule,
    #[default]
    Policy,
}

/// A dispatchable notification.
///
/// `output_ids` is the list of destinations still owed this alert. It is
/// empty for a fresh alert (meaning "the severity defaults") and is narrowed
/// by the dispatcher to the destinations that must be retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub output_ids: Vec<String>,
    #[serde(default)]
    pub policy_description: String,
    pub policy_id: String,
    #[serde(default)]
    pub policy_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_version_id: Option<String>,
    #[serde(default)]
    pub runbook: String,
    pub severity: Severity,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "type", default)]
    pub alert_type: AlertType,
}

impl Alert {
    /// Builds the envelope of a freshly opened rule alert.
    pub fn for_rule(
        alert_id: String,
        rule_id: &str,
        rule_version_id: Option<String>,
        created_at: DateTime<Utc>,
        rule: RuleMetadata,
    ) -> Self {
        Self {
            alert_id: Some(alert_id),
            created_at,
            output_ids: Vec::new(),
            policy_description: rule.description,
            policy_id: rule_id.to_string(),
            policy_name: rule.display_name,
            policy_version_id: rule_version_id,
            runbook: rule.runbook,
            severity: rule.severity,
            tags: rule.tags,
            alert_type: AlertType::Rule,
        }
    }

    /// Human readable name, falling back to the policy id.
    pub fn display_name(&self) -> &str {
        if self.policy_name.is_empty() { &self.policy_id } else { &self.policy_name }
    }

    pub fn title(&self) -> String {
        match self.alert_type {
            AlertType::Rule => format!("New Alert: {}", self.display_name()),
            AlertType::Policy => format!("Policy Failure: {}", self.display_name()),
        }
    }

    /// One-line summary used by destinations without a separate title.
    pub fn summary(&self) -> String {
        match self.alert_type {
            AlertType::Rule => format!("{} failed", self.display_name()),
            AlertType::Policy => format!("{} failed on new resources", self.display_name()),
        }
    }

    /// Identifier used in logs: the alert id for rule alerts, the policy id
    /// otherwise.
    pub fn log_id(&self) -> &str {
        self.alert_id.as_deref().unwrap_or(&self.policy_id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn rule() -> RuleMetadata {
        RuleMetadata {
            description: "Root account used".into(),
            display_name: "Root Login".into(),
            runbook: "Rotate credentials".into(),
            severity: Severity::High,
            tags: vec!["aws".into()],
        }
    }

    #[test]
    fn test_for_rule_copies_metadata() {
        let created_at = Utc.with_ymd_and_hms(2023, 5, 1, 10, 0, 0).unwrap();
        let alert =
            Alert::for_rule("R1-1".into(), "R1", Some("v1".into()), created_at, rule());

        assert_eq!(alert.alert_id.as_deref(), Some("R1-1"));
        assert_eq!(alert.policy_id, "R1");
        assert_eq!(alert.policy_name, "Root Login");
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.alert_type, AlertType::Rule);
        assert!(alert.output_ids.is_empty());
        assert_eq!(alert.title(), "New Alert: Root Login");
        assert_eq!(alert.summary(), "Root Login failed");
    }

    #[test]
    fn test_policy_alert_title_falls_back_to_id() {
        let json = r#"{
            "createdAt": "2023-05-01T10:00:00Z",
            "policyId": "AWS.S3.Public",
            "severity": "LOW"
        }"#;
        let alert: Alert = serde_json::from_str(json).unwrap();

        assert_eq!(alert.alert_type, AlertType::Policy);
        assert_eq!(alert.display_name(), "AWS.S3.Public");
        assert_eq!(alert.title(), "Policy Failure: AWS.S3.Public");
        assert_eq!(alert.summary(), "AWS.S3.Public failed on new resources");
        assert_eq!(alert.log_id(), "AWS.S3.Public");
    }

    #[test]
    fn test_alert_wire_format() {
        let created_at = Utc.with_ymd_and_hms(2023, 5, 1, 10, 0, 0).unwrap();
        let mut alert = Alert::for_rule("R1-2".into(), "R1", None, created_at, rule());
        alert.output_ids = vec!["out-1".into()];

        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["alertId"], "R1-2");
        assert_eq!(value["outputIds"][0], "out-1");
        assert_eq!(value["type"], "RULE");
        assert_eq!(value["severity"], "HIGH");
        assert_eq!(value["policyName"], "Root Login");
        assert!(value.get("policyVersionId").is_none());

        let restored: Alert = serde_json::from_value(value).unwrap();
        assert_eq!(restored, alert);
    }
}
