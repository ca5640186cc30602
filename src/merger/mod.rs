//! The merge engine: decides whether a rule match opens a new alert or joins
//! the alert of the rule's currently open window.

mod error;

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
pub use error::MergeError;

use crate::{
    analysis::RuleSource,
    clock::Clock,
    models::{Alert, AlertNotification, MatchedEvent},
    persistence::{AlertStore, PersistenceError},
    queue::AlertQueue,
};

/// Result of merging one rule match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Whether this match opened a new window, and therefore a new alert.
    pub is_new_alert: bool,
    pub alert_id: String,
    /// When the alert's window was opened.
    pub creation_time: DateTime<Utc>,
}

/// Merges rule matches into alerts and enqueues every newly opened alert for
/// delivery.
///
/// No locking happens here. The store's conditional window update picks
/// exactly one winner per window among concurrent workers.
pub struct AlertMerger {
    store: Arc<dyn AlertStore>,
    rules: Arc<dyn RuleSource>,
    alert_queue: Arc<dyn AlertQueue>,
    clock: Arc<dyn Clock>,
    merge_window: Duration,
}

impl AlertMerger {
    pub fn new(
        store: Arc<dyn AlertStore>,
        rules: Arc<dyn RuleSource>,
        alert_queue: Arc<dyn AlertQueue>,
        clock: Arc<dyn Clock>,
        merge_window: Duration,
    ) -> Self {
        Self { store, rules, alert_queue, clock, merge_window }
    }

    /// Decodes a queue message and merges the rule match it carries.
    pub async fn handle(&self, body: &str) -> Result<MergeOutcome, MergeError> {
        let notification: AlertNotification =
            serde_json::from_str(body).map_err(MergeError::Malformed)?;
        self.record_match(&notification).await
    }

    /// Stores the matched event, merges it into the rule's current alert
    /// (opening a new one if the previous window has closed) and enqueues new
    /// alerts for delivery.
    ///
    /// Any store error aborts before anything is enqueued. Failures after the
    /// store writes are safe to retry by redelivering the same notification:
    /// the event write is idempotent and the window will already be open.
    #[tracing::instrument(skip(self, notification), fields(rule_id = %notification.rule_id))]
    pub async fn record_match(
        &self,
        notification: &AlertNotification,
    ) -> Result<MergeOutcome, MergeError> {
        let event = MatchedEvent::from(notification);
        self.store.put_matched_event(&event).await?;
        tracing::debug!(event_hash = %event.event_hash, "Stored matched event.");

        let outcome = self.resolve_window(&notification.rule_id).await?;
        self.store
            .add_event_to_alert(
                &outcome.alert_id,
                &notification.rule_id,
                outcome.creation_time,
                &event,
            )
            .await?;

        if outcome.is_new_alert {
            self.send_alert(notification, &outcome.alert_id).await?;
            tracing::info!(alert_id = %outcome.alert_id, "Opened new alert.");
        } else {
            tracing::debug!(alert_id = %outcome.alert_id, "Merged event into open alert.");
        }

        Ok(outcome)
    }

    async fn resolve_window(&self, rule_id: &str) -> Result<MergeOutcome, MergeError> {
        let now = self.clock.now();
        match self.store.try_open_window(rule_id, now, self.merge_window).await {
            Ok(counter) => Ok(MergeOutcome {
                is_new_alert: true,
                alert_id: counter.alert_id(),
                creation_time: counter.creation_time,
            }),
            Err(PersistenceError::ConditionFailed(_)) => {
                // Separate read: a concurrent winner may move the counter on
                // in between, in which case the next match converges.
                let counter = self
                    .store
                    .get_window(rule_id)
                    .await?
                    .ok_or_else(|| MergeError::MissingWindow(rule_id.to_string()))?;
                Ok(MergeOutcome {
                    is_new_alert: false,
                    alert_id: counter.alert_id(),
                    creation_time: counter.creation_time,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn send_alert(
        &self,
        notification: &AlertNotification,
        alert_id: &str,
    ) -> Result<(), MergeError> {
        let rule = self.rules.get_rule(&notification.rule_id).await.inspect_err(|e| {
            tracing::warn!(error = %e, "Failed to fetch rule metadata.");
        })?;

        let alert = Alert::for_rule(
            alert_id.to_string(),
            &notification.rule_id,
            notification.rule_version_id.clone(),
            notification.timestamp,
            rule,
        );
        let body = serde_json::to_string(&alert).map_err(MergeError::Encode)?;
        self.alert_queue.send(body).await.inspect_err(|e| {
            tracing::warn!(error = %e, alert_id, "Failed to enqueue alert.");
        })?;
        Ok(())
    }
}
