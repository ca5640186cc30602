use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest_middleware::ClientWithMiddleware;
use serde_json::{Value, json};
use url::Url;

use super::{AlertFormatter, http};
use crate::{
    delivery::{DeliveryError, OutputAdapter},
    models::{Alert, JiraConfig, OutputConfig},
    template::JIRA_TEMPLATE,
};

const ISSUE_TYPE: &str = "Task";

/// Issue endpoint of a Jira instance. The org domain may be given with or
/// without a scheme.
fn issue_url(org_domain: &str) -> Result<Url, url::ParseError> {
    let base = org_domain.trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        Url::parse(&format!("{base}/rest/api/latest/issue/"))
    } else {
        Url::parse(&format!("https://{base}/rest/api/latest/issue/"))
    }
}

fn basic_auth(config: &JiraConfig) -> String {
    let credentials = format!("{}:{}", config.user_name, config.api_key);
    format!("Basic {}", STANDARD.encode(credentials))
}

/// Opens a Jira task per alert.
pub struct JiraAdapter {
    client: Arc<ClientWithMiddleware>,
    formatter: Arc<AlertFormatter>,
}

impl JiraAdapter {
    pub fn new(client: Arc<ClientWithMiddleware>, formatter: Arc<AlertFormatter>) -> Self {
        Self { client, formatter }
    }

    fn payload(&self, alert: &Alert, config: &JiraConfig) -> Result<Value, DeliveryError> {
        let mut fields = json!({
            "summary": alert.title(),
            "description": self.formatter.render(JIRA_TEMPLATE, alert)?,
            "project": { "key": config.project_key },
            "issuetype": { "name": ISSUE_TYPE },
        });
        if let Some(assignee_id) = &config.assignee_id {
            fields["assignee"] = json!({ "id": assignee_id });
        }
        Ok(json!({ "fields": fields }))
    }
}

#[async_trait]
impl OutputAdapter for JiraAdapter {
    async fn deliver(&self, alert: &Alert, config: &OutputConfig) -> Result<(), DeliveryError> {
        let OutputConfig::Jira(jira) = config else {
            return Err(DeliveryError::permanent("jira adapter given a non-jira config"));
        };
        let url = issue_url(&jira.org_domain)
            .map_err(|e| DeliveryError::permanent(format!("invalid jira org domain: {e}")))?;
        let request = self
            .client
            .post(url)
            .header(AUTHORIZATION, basic_auth(jira))
            .header(ACCEPT, "application/json")
            .json(&self.payload(alert, jira)?);
        http::send(request).await
    }
}
