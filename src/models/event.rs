//! Rule matches as they arrive from the rule engine, and their stored form.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use thiserror::Error;

/// Inbound message published by the rule engine for every rule match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertNotification {
    /// Id of the rule that matched.
    pub rule_id: String,
    /// Version of the rule body that produced the match.
    #[serde(default)]
    pub rule_version_id: Option<String>,
    /// The raw event, exactly as it was evaluated.
    pub event: String,
    /// When the event was matched.
    pub timestamp: DateTime<Utc>,
}

/// Raised when bytes read back from storage are not a valid event hash.
#[derive(Debug, Error)]
#[error("invalid event hash length: expected 20 bytes, got {0}")]
pub struct InvalidEventHash(pub usize);

/// SHA-1 digest of a raw event. Identical events always hash to the same
/// value, which makes writes keyed by it idempotent.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventHash([u8; 20]);

impl EventHash {
    /// Hashes the raw event payload.
    pub fn of(event: &str) -> Self {
        let mut digest = [0u8; 20];
        digest.copy_from_slice(&Sha1::digest(event.as_bytes()));
        Self(digest)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl TryFrom<&[u8]> for EventHash {
    type Error = InvalidEventHash;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let digest: [u8; 20] = bytes.try_into().map_err(|_| InvalidEventHash(bytes.len()))?;
        Ok(Self(digest))
    }
}

impl fmt::Display for EventHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for EventHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHash({})", self.to_hex())
    }
}

/// One raw rule match as written to the event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedEvent {
    pub event_hash: EventHash,
    pub timestamp: DateTime<Utc>,
    pub event: String,
}

impl From<&AlertNotification> for MatchedEvent {
    fn from(notification: &AlertNotification) -> Self {
        Self {
            event_hash: EventHash::of(&notification.event),
            timestamp: notification.timestamp,
            event: notification.event.clone(),
        }
    }
}
