//! Shared request execution and status classification for HTTP destinations.

use reqwest::StatusCode;
use reqwest_middleware::RequestBuilder;

use crate::delivery::DeliveryError;

/// Sends a prepared request and classifies the outcome.
///
/// Throttling, server errors and network failures are transient; any other
/// non-success status, and requests that cannot be built, are permanent.
pub(super) async fn send(request: RequestBuilder) -> Result<(), DeliveryError> {
    let response = request.send().await.map_err(|e| match &e {
        reqwest_middleware::Error::Reqwest(inner) if inner.is_builder() => {
            DeliveryError::permanent(format!("invalid request: {e}"))
        }
        _ => DeliveryError::transient(format!("request failed: {e}")),
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    tracing::debug!(%status, body = %body, "Destination rejected request.");
    Err(classify_status(status))
}

pub(super) fn classify_status(status: StatusCode) -> DeliveryError {
    let message = format!("destination responded with {status}");
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        DeliveryError::transient(message)
    } else {
        DeliveryError::permanent(message)
    }
}
