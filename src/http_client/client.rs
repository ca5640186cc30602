//! Retrying HTTP client construction.

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{Jitter, RetryTransientMiddleware, policies::ExponentialBackoff};
use url::Url;

use crate::config::{HttpRetryConfig, JitterSetting};

/// Wraps `base_client` in middleware that retries transient failures
/// (connection errors, timeouts, 429 and 5xx responses) with exponential
/// backoff, as described by `config`.
pub fn create_retryable_http_client(
    config: &HttpRetryConfig,
    base_client: reqwest::Client,
) -> ClientWithMiddleware {
    let jitter = match config.jitter {
        JitterSetting::None => Jitter::None,
        JitterSetting::Full => Jitter::Full,
    };

    let retry_policy = ExponentialBackoff::builder()
        .jitter(jitter)
        .base(config.base_for_backoff)
        .retry_bounds(config.initial_backoff_ms, config.max_backoff_secs)
        .build_with_max_retries(config.max_retries);

    ClientBuilder::new(base_client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build()
}

/// Resolves `path` below `base`, treating `base` as a directory whether or
/// not it ends with a slash.
pub fn endpoint_url(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    if base.path().ends_with('/') {
        base.join(path)
    } else {
        Url::parse(&format!("{base}/"))?.join(path)
    }
}
