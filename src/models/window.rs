//! Merge-window state kept per rule, and the alerts built from it.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::EventHash;

/// Builds the id of the alert opened by the `alert_count`-th window of a rule.
pub fn alert_id_for(rule_id: &str, alert_count: i64) -> String {
    format!("{rule_id}-{alert_count}")
}

/// Per-rule merge-window state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowCounter {
    pub rule_id: String,
    /// When the current window was opened.
    pub creation_time: DateTime<Utc>,
    /// When the current window closes.
    pub expires_at: DateTime<Utc>,
    /// Number of windows opened for the rule so far.
    pub alert_count: i64,
}

impl WindowCounter {
    /// Id of the alert belonging to the current window.
    pub fn alert_id(&self) -> String {
        alert_id_for(&self.rule_id, self.alert_count)
    }
}

/// One merged alert, accumulating every event matched inside its window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertAggregate {
    pub alert_id: String,
    pub rule_id: String,
    pub creation_time: DateTime<Utc>,
    pub last_event_matched: DateTime<Utc>,
    pub event_hashes: BTreeSet<EventHash>,
}
