//! Delivery outcomes and their retry classification.

use thiserror::Error;

use crate::{models::VerificationStatus, outputs::OutputsError};

/// Failure reported by a destination adapter. The adapter decides whether
/// trying again later can succeed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The destination rejected the alert or the request cannot be built.
    #[error("permanent delivery failure: {0}")]
    Permanent(String),

    /// Network trouble, throttling or a server-side error.
    #[error("transient delivery failure: {0}")]
    Transient(String),
}

impl DeliveryError {
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent(message.into())
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }
}

/// Why an alert could not be delivered to one destination.
#[derive(Debug, Error)]
pub enum DispatchFailure {
    /// The destination was deleted after the alert referenced it.
    #[error("destination does not exist")]
    DestinationNotFound,

    /// The destination has not completed verification.
    #[error("destination is not verified (status {0:?})")]
    DestinationUnverified(VerificationStatus),

    /// No adapter is registered for the destination's type tag.
    #[error("unsupported output type {0:?}")]
    UnsupportedOutputType(String),

    /// The destination record could not be fetched or decoded.
    #[error("destination lookup failed: {0}")]
    OutputLookup(OutputsError),

    #[error(transparent)]
    Delivery(DeliveryError),

    /// The delivery task panicked.
    #[error("unhandled fault during delivery: {0}")]
    UnhandledFault(String),
}

impl DispatchFailure {
    /// Whether the destination should stay on the alert for a later retry.
    pub fn needs_retry(&self) -> bool {
        match self {
            DispatchFailure::OutputLookup(_) => true,
            DispatchFailure::Delivery(DeliveryError::Transient(_)) => true,
            DispatchFailure::DestinationNotFound
            | DispatchFailure::DestinationUnverified(_)
            | DispatchFailure::UnsupportedOutputType(_)
            | DispatchFailure::Delivery(DeliveryError::Permanent(_))
            | DispatchFailure::UnhandledFault(_) => false,
        }
    }
}

impl From<OutputsError> for DispatchFailure {
    fn from(error: OutputsError) -> Self {
        match error {
            OutputsError::NotFound(_) => DispatchFailure::DestinationNotFound,
            other => DispatchFailure::OutputLookup(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_transient_failures_need_retry() {
        assert!(DispatchFailure::Delivery(DeliveryError::transient("503")).needs_retry());
        assert!(DispatchFailure::from(OutputsError::Unavailable("timeout".into())).needs_retry());
        assert!(DispatchFailure::from(OutputsError::Malformed("bad".into())).needs_retry());

        assert!(!DispatchFailure::Delivery(DeliveryError::permanent("400")).needs_retry());
        assert!(!DispatchFailure::DestinationUnverified(VerificationStatus::Pending).needs_retry());
        assert!(!DispatchFailure::UnsupportedOutputType("fax".into()).needs_retry());
        assert!(!DispatchFailure::UnhandledFault("boom".into()).needs_retry());
    }

    #[test]
    fn test_not_found_lookup_maps_to_deleted_destination() {
        let failure = DispatchFailure::from(OutputsError::NotFound("o1".into()));
        assert!(matches!(failure, DispatchFailure::DestinationNotFound));
        assert!(!failure.needs_retry());
    }
}
