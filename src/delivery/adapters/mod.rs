//! Delivery adapters for the supported destination types.

mod aws;
mod email;
mod github;
mod http;
mod jira;
mod message;
mod msteams;
mod opsgenie;
mod pagerduty;
mod slack;
mod sns;
mod sqs;

use std::sync::Arc;

use aws_config::SdkConfig;
use reqwest_middleware::ClientWithMiddleware;
use url::Url;

pub use email::EmailAdapter;
pub use github::{GITHUB_API_URL, GithubAdapter};
pub use jira::JiraAdapter;
pub use message::{AlertFormatter, MessageContext};
pub use msteams::MsTeamsAdapter;
pub use opsgenie::{OPSGENIE_API_URL, OpsgenieAdapter};
pub use pagerduty::{PAGERDUTY_EVENTS_URL, PagerDutyAdapter};
pub use slack::SlackAdapter;
pub use sns::SnsAdapter;
pub use sqs::SqsAdapter;

use super::OutputRegistry;

/// Sender identity of notification emails.
#[derive(Debug, Clone, Default)]
pub struct EmailSettings {
    pub mail_from: String,
    pub configuration_set: Option<String>,
}

/// Builds a registry with an adapter for every supported destination type.
pub fn default_registry(
    http_client: Arc<ClientWithMiddleware>,
    sdk_config: &SdkConfig,
    formatter: Arc<AlertFormatter>,
    email: EmailSettings,
) -> Result<OutputRegistry, url::ParseError> {
    let registry = OutputRegistry::new()
        .with("slack", Arc::new(SlackAdapter::new(http_client.clone(), formatter.clone())))
        .with("msteams", Arc::new(MsTeamsAdapter::new(http_client.clone(), formatter.clone())))
        .with(
            "pagerduty",
            Arc::new(PagerDutyAdapter::new(http_client.clone(), Url::parse(PAGERDUTY_EVENTS_URL)?)),
        )
        .with("jira", Arc::new(JiraAdapter::new(http_client.clone(), formatter.clone())))
        .with(
            "github",
            Arc::new(GithubAdapter::new(
                http_client.clone(),
                formatter.clone(),
                Url::parse(GITHUB_API_URL)?,
            )),
        )
        .with(
            "opsgenie",
            Arc::new(OpsgenieAdapter::new(http_client, formatter.clone(), Url::parse(OPSGENIE_API_URL)?)),
        )
        .with(
            "email",
            Arc::new(EmailAdapter::new(
                aws_sdk_sesv2::Client::new(sdk_config),
                formatter,
                email.mail_from,
                email.configuration_set,
            )),
        )
        .with("sqs", Arc::new(SqsAdapter::new(sdk_config.clone())))
        .with("sns", Arc::new(SnsAdapter::new(sdk_config.clone())));
    Ok(registry)
}
