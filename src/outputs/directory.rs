//! Client of the output directory service.

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::StatusCode;
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, de::DeserializeOwned};
use thiserror::Error;
use url::Url;

use crate::{
    http_client::endpoint_url,
    models::{AlertOutput, DefaultOutputs},
};

#[derive(Debug, Error)]
pub enum OutputsError {
    /// The destination does not exist, typically because it was deleted
    /// after the alert referencing it was created.
    #[error("Output not found: {0}")]
    NotFound(String),

    /// The directory could not be reached or answered with an error.
    #[error("Output directory unavailable: {0}")]
    Unavailable(String),

    /// The directory returned a record that could not be decoded.
    #[error("Malformed output record: {0}")]
    Malformed(String),
}

/// Read access to configured destinations.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OutputsDirectory: Send + Sync {
    /// Fetches one destination with its decrypted configuration.
    async fn get_output(&self, output_id: &str) -> Result<AlertOutput, OutputsError>;

    /// Fetches the severity to default destinations mapping.
    async fn get_default_outputs(&self) -> Result<Vec<DefaultOutputs>, OutputsError>;
}

#[derive(Deserialize)]
struct DefaultOutputsResponse {
    #[serde(default)]
    defaults: Vec<DefaultOutputs>,
}

/// [`OutputsDirectory`] over the directory's HTTP API
/// (`GET outputs/{id}` and `GET defaults`).
pub struct HttpOutputsDirectory {
    client: Arc<ClientWithMiddleware>,
    base_url: Url,
}

impl HttpOutputsDirectory {
    pub fn new(client: Arc<ClientWithMiddleware>, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn url(&self, segments: &[&str]) -> Result<Url, OutputsError> {
        let mut url = endpoint_url(&self.base_url, "")
            .map_err(|e| OutputsError::Unavailable(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| OutputsError::Unavailable(format!("invalid base url {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, OutputsError> {
        self.client.get(url).send().await.map_err(|e| OutputsError::Unavailable(e.to_string()))
    }
}

/// A body cut off in transit is an availability problem, only a complete body
/// that fails to decode is a malformed record.
async fn decode_body<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, OutputsError> {
    let body = response
        .bytes()
        .await
        .map_err(|e| OutputsError::Unavailable(format!("failed to read response body: {e}")))?;
    serde_json::from_slice(&body).map_err(|e| OutputsError::Malformed(e.to_string()))
}

#[async_trait]
impl OutputsDirectory for HttpOutputsDirectory {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_output(&self, output_id: &str) -> Result<AlertOutput, OutputsError> {
        let response = self.get(self.url(&["outputs", output_id])?).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(OutputsError::NotFound(output_id.to_string())),
            status if !status.is_success() => {
                Err(OutputsError::Unavailable(format!("output directory returned {status}")))
            }
            _ => decode_body(response).await,
        }
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_default_outputs(&self) -> Result<Vec<DefaultOutputs>, OutputsError> {
        let response = self.get(self.url(&["defaults"])?).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OutputsError::Unavailable(format!("output directory returned {status}")));
        }
        let body: DefaultOutputsResponse = decode_body(response).await?;
        Ok(body.defaults)
    }
}
