//! Destinations ("outputs") as served by the output directory.

use serde::{Deserialize, Serialize};
use url::Url;

use super::Severity;

/// Whether a destination has been proven reachable by its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    #[default]
    NotStarted,
    Pending,
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackConfig {
    #[serde(rename = "webhookURL")]
    pub webhook_url: Url,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnsConfig {
    pub topic_arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfig {
    pub destination_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagerDutyConfig {
    pub integration_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubConfig {
    /// `owner/repository`
    pub repo_name: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraConfig {
    /// Host name of the Jira cloud instance, e.g. `acme.atlassian.net`.
    pub org_domain: String,
    pub project_key: String,
    pub user_name: String,
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpsgenieConfig {
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsTeamsConfig {
    #[serde(rename = "webhookURL")]
    pub webhook_url: Url,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqsConfig {
    pub queue_url: Url,
}

/// Typed, decrypted destination configuration. Exactly one variant is ever
/// present on the wire, e.g. `{"slack": {"webhookURL": "..."}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputConfig {
    Slack(SlackConfig),
    Sns(SnsConfig),
    Email(EmailConfig),
    PagerDuty(PagerDutyConfig),
    Github(GithubConfig),
    Jira(JiraConfig),
    Opsgenie(OpsgenieConfig),
    MsTeams(MsTeamsConfig),
    Sqs(SqsConfig),
}

impl OutputConfig {
    /// The type tag destinations of this kind are registered under.
    pub fn type_tag(&self) -> &'static str {
        match self {
            OutputConfig::Slack(_) => "slack",
            OutputConfig::Sns(_) => "sns",
            OutputConfig::Email(_) => "email",
            OutputConfig::PagerDuty(_) => "pagerduty",
            OutputConfig::Github(_) => "github",
            OutputConfig::Jira(_) => "jira",
            OutputConfig::Opsgenie(_) => "opsgenie",
            OutputConfig::MsTeams(_) => "msteams",
            OutputConfig::Sqs(_) => "sqs",
        }
    }
}

/// A configured notification sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertOutput {
    pub output_id: String,
    #[serde(default)]
    pub display_name: String,
    /// Type tag used to select the delivery adapter.
    pub output_type: String,
    pub output_config: OutputConfig,
    #[serde(default)]
    pub verification_status: VerificationStatus,
    #[serde(default)]
    pub default_for_severity: Vec<Severity>,
}

impl AlertOutput {
    pub fn is_verified(&self) -> bool {
        self.verification_status == VerificationStatus::Success
    }
}

/// The destinations alerts of one severity go to when they name none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultOutputs {
    pub severity: Severity,
    #[serde(default)]
    pub output_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_output_wire_format() {
        let json = r#"{
            "outputId": "6c0d7b6e-0b3f-4a3a-a8a8-6d1b2a3c4d5e",
            "displayName": "security-alerts",
            "outputType": "slack",
            "outputConfig": {"slack": {"webhookURL": "https://hooks.slack.com/services/T0/B0/X"}},
            "verificationStatus": "SUCCESS",
            "defaultForSeverity": ["HIGH", "CRITICAL"],
            "createdBy": "user-1"
        }"#;
        let output: AlertOutput = serde_json::from_str(json).unwrap();

        assert_eq!(output.output_type, "slack");
        assert!(output.is_verified());
        assert_eq!(output.default_for_severity, vec![Severity::High, Severity::Critical]);
        match &output.output_config {
            OutputConfig::Slack(cfg) => {
                assert_eq!(cfg.webhook_url.as_str(), "https://hooks.slack.com/services/T0/B0/X")
            }
            other => panic!("unexpected config {other:?}"),
        }
        assert_eq!(output.output_config.type_tag(), "slack");
    }

    #[test]
    fn test_output_config_variant_names() {
        let config: OutputConfig =
            serde_json::from_str(r#"{"pagerDuty": {"integrationKey": "abc"}}"#).unwrap();
        assert_eq!(config.type_tag(), "pagerduty");

        let config: OutputConfig = serde_json::from_str(
            r#"{"msTeams": {"webhookURL": "https://outlook.office.com/webhook/x"}}"#,
        )
        .unwrap();
        assert_eq!(config.type_tag(), "msteams");

        let config: OutputConfig = serde_json::from_str(
            r#"{"jira": {"orgDomain": "acme.atlassian.net", "projectKey": "SEC",
                "userName": "bot", "apiKey": "k"}}"#,
        )
        .unwrap();
        assert!(matches!(config, OutputConfig::Jira(JiraConfig { assignee_id: None, .. })));
    }

    #[test]
    fn test_output_config_rejects_two_variants() {
        let json = r#"{"email": {"destinationAddress": "a@b.c"}, "opsgenie": {"apiKey": "k"}}"#;
        assert!(serde_json::from_str::<OutputConfig>(json).is_err());
    }

    #[test]
    fn test_missing_verification_status_is_not_verified() {
        let json = r#"{
            "outputId": "o1",
            "outputType": "email",
            "outputConfig": {"email": {"destinationAddress": "soc@example.com"}}
        }"#;
        let output: AlertOutput = serde_json::from_str(json).unwrap();
        assert_eq!(output.verification_status, VerificationStatus::NotStarted);
        assert!(!output.is_verified());
    }
}
