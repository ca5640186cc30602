//! Storage interface of the merge stage.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

use crate::{
    models::{AlertAggregate, EventHash, MatchedEvent, WindowCounter},
    persistence::error::PersistenceError,
};

/// The three tables behind alert merging: the event log, the per-rule
/// window counters and the alert aggregates.
///
/// Implementations must make [`AlertStore::try_open_window`] atomic; it is
/// the only thing that keeps concurrent merge workers from opening two
/// alerts for the same window.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Writes a matched event keyed by its hash. Writing the same event
    /// twice is not an error.
    async fn put_matched_event(&self, event: &MatchedEvent) -> Result<(), PersistenceError>;

    /// Reads a matched event back from the event log.
    async fn get_matched_event(
        &self,
        event_hash: &EventHash,
    ) -> Result<Option<MatchedEvent>, PersistenceError>;

    /// Opens a new merge window for `rule_id` at `now`, incrementing the
    /// rule's alert counter, if and only if no window was opened within the
    /// last `window`. Returns the updated counter, or
    /// [`PersistenceError::ConditionFailed`] when a window is still open.
    async fn try_open_window(
        &self,
        rule_id: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<WindowCounter, PersistenceError>;

    /// Reads the current window counter of a rule.
    async fn get_window(&self, rule_id: &str) -> Result<Option<WindowCounter>, PersistenceError>;

    /// Adds an event to an alert, creating the alert if needed, and bumps
    /// its last-matched timestamp.
    async fn add_event_to_alert(
        &self,
        alert_id: &str,
        rule_id: &str,
        creation_time: DateTime<Utc>,
        event: &MatchedEvent,
    ) -> Result<(), PersistenceError>;

    /// Reads an alert together with all of its event hashes.
    async fn get_alert(&self, alert_id: &str) -> Result<Option<AlertAggregate>, PersistenceError>;
}
