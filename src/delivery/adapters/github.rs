use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest_middleware::ClientWithMiddleware;
use serde_json::json;
use url::Url;

use super::{AlertFormatter, http};
use crate::{
    delivery::{DeliveryError, OutputAdapter},
    http_client::endpoint_url,
    models::{Alert, OutputConfig},
    template::GITHUB_TEMPLATE,
};

pub const GITHUB_API_URL: &str = "https://api.github.com/";

/// Opens a GitHub issue per alert.
pub struct GithubAdapter {
    client: Arc<ClientWithMiddleware>,
    formatter: Arc<AlertFormatter>,
    api_url: Url,
}

impl GithubAdapter {
    pub fn new(client: Arc<ClientWithMiddleware>, formatter: Arc<AlertFormatter>, api_url: Url) -> Self {
        Self { client, formatter, api_url }
    }
}

#[async_trait]
impl OutputAdapter for GithubAdapter {
    async fn deliver(&self, alert: &Alert, config: &OutputConfig) -> Result<(), DeliveryError> {
        let OutputConfig::Github(github) = config else {
            return Err(DeliveryError::permanent("github adapter given a non-github config"));
        };
        let url = endpoint_url(&self.api_url, &format!("repos/{}/issues", github.repo_name))
            .map_err(|e| DeliveryError::permanent(format!("invalid repository name: {e}")))?;
        let body = json!({
            "title": alert.title(),
            "body": self.formatter.render(GITHUB_TEMPLATE, alert)?,
        });
        let request = self
            .client
            .post(url)
            .header(AUTHORIZATION, format!("token {}", github.token))
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, env!("CARGO_PKG_NAME"))
            .json(&body);
        http::send(request).await
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;
    use crate::{
        models::GithubConfig,
        template::TemplateService,
        test_helpers::{AlertBuilder, create_test_http_client},
    };

    fn adapter(server: &mockito::Server) -> GithubAdapter {
        let formatter = AlertFormatter::new(
            "https://tripwire.test/alerts/",
            "https://tripwire.test/policies/",
            TemplateService::new().unwrap(),
        );
        GithubAdapter::new(create_test_http_client(), Arc::new(formatter), server.url().parse().unwrap())
    }

    fn config() -> OutputConfig {
        OutputConfig::Github(GithubConfig { repo_name: "acme/security".into(), token: "ghp_x".into() })
    }

    #[tokio::test]
    async fn test_github_opens_issue() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/acme/security/issues")
            .match_header("authorization", "token ghp_x")
            .match_body(Matcher::PartialJson(json!({ "title": "New Alert: Root Login" })))
            .with_status(201)
            .create_async()
            .await;
        let alert = AlertBuilder::rule("R1-1").name("Root Login").build();

        adapter(&server).deliver(&alert, &config()).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_github_unauthorized_is_permanent() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/repos/acme/security/issues").with_status(401).create_async().await;

        let result = adapter(&server).deliver(&AlertBuilder::rule("R1-1").build(), &config()).await;

        assert!(matches!(result, Err(DeliveryError::Permanent(_))));
    }
}
