//! Shared pool of HTTP clients, one per retry policy.

use std::{collections::HashMap, sync::Arc};

use reqwest::Client as ReqwestClient;
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;
use tokio::sync::RwLock;

use super::client::create_retryable_http_client;
use crate::config::{BaseHttpClientConfig, HttpRetryConfig};

/// Errors that can occur within the `HttpClientPool`.
#[derive(Debug, Error)]
pub enum HttpClientPoolError {
    /// An error occurred while building the underlying `reqwest::Client`.
    #[error("Failed to create HTTP client: {0}")]
    HttpClientBuildError(String),
}

/// Hands out retrying HTTP clients to the upstream service clients and the
/// HTTP destination adapters.
///
/// Clients are keyed by their `HttpRetryConfig`, so callers sharing a policy
/// share connections. Every client carries the connect and request timeouts
/// of the pool's `BaseHttpClientConfig`, which bounds how long a single
/// destination call can take.
pub struct HttpClientPool {
    clients: Arc<RwLock<HashMap<String, Arc<ClientWithMiddleware>>>>,
    base_config: BaseHttpClientConfig,
}

impl HttpClientPool {
    pub fn new(base_config: BaseHttpClientConfig) -> Self {
        Self { clients: Arc::new(RwLock::new(HashMap::new())), base_config }
    }

    /// Returns the client for `retry_policy`, creating it on first use.
    pub async fn get_or_create(
        &self,
        retry_policy: &HttpRetryConfig,
    ) -> Result<Arc<ClientWithMiddleware>, HttpClientPoolError> {
        let key = format!("{retry_policy:?}");

        if let Some(client) = self.clients.read().await.get(&key) {
            return Ok(client.clone());
        }

        let mut clients = self.clients.write().await;
        // Another task may have created it while we waited for the write lock.
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let base_client = ReqwestClient::builder()
            .pool_max_idle_per_host(self.base_config.max_idle_per_host)
            .pool_idle_timeout(Some(self.base_config.idle_timeout))
            .connect_timeout(self.base_config.connect_timeout)
            .timeout(self.base_config.request_timeout)
            .build()
            .map_err(|e| HttpClientPoolError::HttpClientBuildError(e.to_string()))?;

        let new_client = Arc::new(create_retryable_http_client(retry_policy, base_client));
        clients.insert(key, new_client.clone());
        tracing::debug!(clients = clients.len(), "Created pooled HTTP client.");

        Ok(new_client)
    }

    #[cfg(test)]
    pub async fn get_active_client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

impl Default for HttpClientPool {
    fn default() -> Self {
        Self::new(BaseHttpClientConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pool_returns_same_client_for_same_policy() {
        let pool = HttpClientPool::default();
        assert_eq!(pool.get_active_client_count().await, 0);

        let retry_config = HttpRetryConfig::default();
        let client1 = pool.get_or_create(&retry_config).await.unwrap();
        let client2 = pool.get_or_create(&retry_config).await.unwrap();

        assert!(Arc::ptr_eq(&client1, &client2));
        assert_eq!(pool.get_active_client_count().await, 1);
    }

    #[tokio::test]
    async fn test_pool_separates_clients_by_policy() {
        let pool = HttpClientPool::default();
        let no_retries = HttpRetryConfig { max_retries: 0, ..Default::default() };

        let client1 = pool.get_or_create(&HttpRetryConfig::default()).await.unwrap();
        let client2 = pool.get_or_create(&no_retries).await.unwrap();

        assert!(!Arc::ptr_eq(&client1, &client2));
        assert_eq!(pool.get_active_client_count().await, 2);
    }

    #[tokio::test]
    async fn test_pool_concurrent_access_creates_one_client() {
        let pool = Arc::new(HttpClientPool::default());

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let pool = Arc::clone(&pool);
                tokio::spawn(async move {
                    pool.get_or_create(&HttpRetryConfig::default()).await.map(|_| ())
                })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            assert!(result.unwrap().is_ok());
        }
        assert_eq!(pool.get_active_client_count().await, 1);
    }
}
