//! Retrying HTTP clients shared by the upstream service clients and the
//! HTTP destination adapters.

mod client;
mod pool;

pub use client::{create_retryable_http_client, endpoint_url};
pub use pool::{HttpClientPool, HttpClientPoolError};
