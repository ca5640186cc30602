//! Pieces shared by the destinations reached through AWS services.

use aws_config::{Region, SdkConfig};
use dashmap::DashMap;
use serde::Serialize;

use crate::models::{Alert, Severity};

/// Body published to customer queues and topics.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DestinationMessage<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version_id: Option<&'a str>,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    runbook: &'a str,
    severity: Severity,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    tags: &'a [String],
}

impl<'a> From<&'a Alert> for DestinationMessage<'a> {
    fn from(alert: &'a Alert) -> Self {
        Self {
            id: &alert.policy_id,
            name: &alert.policy_name,
            version_id: alert.policy_version_id.as_deref(),
            description: &alert.policy_description,
            runbook: &alert.runbook,
            severity: alert.severity,
            tags: &alert.tags,
        }
    }
}

/// SDK clients keyed by region, built lazily from one base configuration.
pub(super) struct RegionalClients<C> {
    sdk_config: SdkConfig,
    clients: DashMap<String, C>,
}

impl<C: Clone> RegionalClients<C> {
    pub fn new(sdk_config: SdkConfig) -> Self {
        Self { sdk_config, clients: DashMap::new() }
    }

    pub fn get_or_create(&self, region: &str, build: impl FnOnce(&SdkConfig, Region) -> C) -> C {
        self.clients
            .entry(region.to_string())
            .or_insert_with(|| {
                tracing::debug!(region, "Creating regional client.");
                build(&self.sdk_config, Region::new(region.to_string()))
            })
            .clone()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.clients.len()
    }
}

#[cfg(test)]
pub(super) fn test_sdk_config() -> SdkConfig {
    SdkConfig::builder()
        .behavior_version(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .build()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_helpers::AlertBuilder;

    #[test]
    fn test_destination_message_omits_empty_fields() {
        let alert = AlertBuilder::policy("AWS.S3.Public").severity(Severity::Low).build();

        let value = serde_json::to_value(DestinationMessage::from(&alert)).unwrap();

        assert_eq!(value, json!({ "id": "AWS.S3.Public", "severity": "LOW" }));
    }

    #[test]
    fn test_destination_message_full() {
        let mut alert = AlertBuilder::rule("R1-1")
            .name("Root Login")
            .description("root used")
            .runbook("rotate")
            .tags(&["aws"])
            .build();
        alert.policy_version_id = Some("v7".into());

        let value = serde_json::to_value(DestinationMessage::from(&alert)).unwrap();

        assert_eq!(value["id"], "R1");
        assert_eq!(value["name"], "Root Login");
        assert_eq!(value["versionId"], "v7");
        assert_eq!(value["description"], "root used");
        assert_eq!(value["runbook"], "rotate");
        assert_eq!(value["tags"], json!(["aws"]));
    }

    #[test]
    fn test_regional_clients_are_reused() {
        let clients: RegionalClients<String> = RegionalClients::new(test_sdk_config());

        let first = clients.get_or_create("us-west-2", |_, region| region.to_string());
        let second = clients.get_or_create("us-west-2", |_, _| "rebuilt".to_string());
        clients.get_or_create("eu-west-1", |_, region| region.to_string());

        assert_eq!(first, "us-west-2");
        assert_eq!(second, "us-west-2");
        assert_eq!(clients.len(), 2);
    }
}
