//! Rule metadata lookup against the analysis service.

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::StatusCode;
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;
use url::Url;

use crate::{http_client::endpoint_url, models::RuleMetadata};

#[derive(Debug, Error)]
pub enum RuleSourceError {
    /// The analysis service has no rule with this id.
    #[error("Rule not found: {0}")]
    NotFound(String),

    /// The request failed or the service answered with an error status.
    #[error("Rule lookup failed: {0}")]
    Request(String),

    /// The response body was not a rule.
    #[error("Malformed rule response: {0}")]
    Malformed(String),
}

/// Source of the metadata copied onto newly opened alerts.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RuleSource: Send + Sync {
    async fn get_rule(&self, rule_id: &str) -> Result<RuleMetadata, RuleSourceError>;
}

/// [`RuleSource`] backed by the analysis service's `GET rule?ruleId=` endpoint.
pub struct HttpRuleSource {
    client: Arc<ClientWithMiddleware>,
    base_url: Url,
}

impl HttpRuleSource {
    pub fn new(client: Arc<ClientWithMiddleware>, base_url: Url) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl RuleSource for HttpRuleSource {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_rule(&self, rule_id: &str) -> Result<RuleMetadata, RuleSourceError> {
        let mut url = endpoint_url(&self.base_url, "rule")
            .map_err(|e| RuleSourceError::Request(e.to_string()))?;
        url.query_pairs_mut().append_pair("ruleId", rule_id);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RuleSourceError::Request(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(RuleSourceError::NotFound(rule_id.to_string())),
            status if !status.is_success() => {
                Err(RuleSourceError::Request(format!("analysis service returned {status}")))
            }
            _ => response.json().await.map_err(|e| RuleSourceError::Malformed(e.to_string())),
        }
    }
}
