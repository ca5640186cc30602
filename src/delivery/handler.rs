//! Batch delivery with bounded, randomized retries.

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use rand::Rng;

use super::AlertDispatcher;
use crate::{
    clock::Clock,
    models::Alert,
    queue::{AlertQueue, DelayedMessage},
};

/// How long failed alerts wait before they are delivered again, and for how
/// long they keep being retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Alerts older than this are abandoned instead of retried.
    pub max_age: Duration,
    /// Inclusive lower bound of the re-enqueue delay.
    pub min_delay: Duration,
    /// Exclusive upper bound of the re-enqueue delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Draws a delay uniformly from `[min_delay, max_delay)` at second
    /// granularity, or `min_delay` when the range is empty.
    fn draw_delay(&self, rng: &mut impl Rng) -> Duration {
        let (min, max) = (self.min_delay.as_secs(), self.max_delay.as_secs());
        if max <= min {
            return Duration::from_secs(min);
        }
        Duration::from_secs(rng.gen_range(min..max))
    }
}

/// Delivers batches of alerts and schedules the failed ones for another
/// attempt.
pub struct AlertHandler {
    dispatcher: Arc<AlertDispatcher>,
    queue: Arc<dyn AlertQueue>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
}

impl AlertHandler {
    pub fn new(
        dispatcher: Arc<AlertDispatcher>,
        queue: Arc<dyn AlertQueue>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
    ) -> Self {
        Self { dispatcher, queue, clock, policy }
    }

    /// Dispatches every alert of the batch concurrently. Alerts that still
    /// owe some destinations are re-enqueued, unless they have outlived the
    /// retry horizon.
    pub async fn handle_alerts(&self, alerts: Vec<Alert>) {
        let dispatcher = &self.dispatcher;
        let results = join_all(alerts.into_iter().map(|mut alert| async move {
            let delivered = dispatcher.dispatch(&mut alert).await;
            (alert, delivered)
        }))
        .await;

        let now = self.clock.now();
        let mut to_retry = Vec::new();
        for (alert, delivered) in results {
            if delivered {
                continue;
            }
            let age = (now - alert.created_at).to_std().unwrap_or_default();
            if age > self.policy.max_age {
                tracing::error!(
                    alert_id = %alert.log_id(),
                    policy_id = %alert.policy_id,
                    severity = %alert.severity,
                    created_at = %alert.created_at,
                    output_ids = ?alert.output_ids,
                    "Alert exceeded its retry horizon and is abandoned."
                );
                continue;
            }
            to_retry.push(alert);
        }

        if !to_retry.is_empty() {
            self.retry(to_retry).await;
        }
    }

    /// Re-enqueues the alerts, each with its own random delay. A failed
    /// enqueue is logged and not retried here.
    pub async fn retry(&self, alerts: Vec<Alert>) {
        let count = alerts.len();
        let messages: Vec<DelayedMessage> = {
            let mut rng = rand::thread_rng();
            alerts
                .iter()
                .filter_map(|alert| match serde_json::to_string(alert) {
                    Ok(body) => Some(DelayedMessage { body, delay: self.policy.draw_delay(&mut rng) }),
                    Err(e) => {
                        tracing::error!(alert_id = %alert.log_id(), error = %e, "Failed to serialize alert for retry.");
                        None
                    }
                })
                .collect()
        };

        tracing::info!(count, "Scheduling alerts for retry.");
        if let Err(e) = self.queue.send_batch(messages).await {
            tracing::error!(count, error = %e, "Failed to enqueue alerts for retry.");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        delivery::{DeliveryError, MockOutputAdapter, OutputRegistry},
        outputs::{MockOutputsDirectory, OutputCache},
        queue::{MockAlertQueue, QueueError},
        test_helpers::{AlertBuilder, ManualClock, OutputBuilder},
    };

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_age: Duration::from_secs(300),
            min_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(30),
        }
    }

    /// Outputs named `fail-*` fail transiently, everything else succeeds.
    fn dispatcher(clock: Arc<ManualClock>) -> Arc<AlertDispatcher> {
        let mut directory = MockOutputsDirectory::new();
        directory.expect_get_output().returning(|id| {
            let output = OutputBuilder::slack(id)
                .webhook_url(&format!("https://hooks.slack.test/{id}"))
                .build();
            Ok(output)
        });
        let mut adapter = MockOutputAdapter::new();
        adapter.expect_deliver().returning(|_, config| match config {
            crate::models::OutputConfig::Slack(slack) if slack.webhook_url.path().starts_with("/fail") => {
                Err(DeliveryError::transient("503"))
            }
            _ => Ok(()),
        });
        let cache = OutputCache::new(Arc::new(directory), clock, Duration::from_secs(300));
        let registry = OutputRegistry::new().with("slack", Arc::new(adapter));
        Arc::new(AlertDispatcher::new(Arc::new(cache), Arc::new(registry), 4))
    }

    fn clock_at(secs: i64) -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.timestamp_opt(secs, 0).unwrap()))
    }

    #[test]
    fn test_draw_delay_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let delay = policy().draw_delay(&mut rng);
            assert!(delay >= Duration::from_secs(10) && delay < Duration::from_secs(30));
        }
    }

    #[test]
    fn test_draw_delay_empty_range_uses_min() {
        let policy = RetryPolicy { min_delay: Duration::from_secs(5), max_delay: Duration::from_secs(5), ..policy() };
        assert_eq!(policy.draw_delay(&mut StdRng::seed_from_u64(1)), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_delivered_alerts_are_not_retried() {
        let clock = clock_at(1_000);
        let mut queue = MockAlertQueue::new();
        queue.expect_send_batch().never();
        let handler = AlertHandler::new(dispatcher(clock.clone()), Arc::new(queue), clock, policy());

        let alert = AlertBuilder::rule("R1-1").output_ids(&["ok"]).created_at_secs(990).build();
        handler.handle_alerts(vec![alert]).await;
    }

    #[tokio::test]
    async fn test_failed_alert_within_horizon_is_retried_with_narrowed_outputs() {
        let clock = clock_at(1_000);
        let mut queue = MockAlertQueue::new();
        queue.expect_send_batch().times(1).returning(|messages| {
            assert_eq!(messages.len(), 1);
            let alert: Alert = serde_json::from_str(&messages[0].body).unwrap();
            assert_eq!(alert.output_ids, vec!["fail-1"]);
            assert!(messages[0].delay >= Duration::from_secs(10));
            assert!(messages[0].delay < Duration::from_secs(30));
            Ok(())
        });
        let handler = AlertHandler::new(dispatcher(clock.clone()), Arc::new(queue), clock, policy());

        let alert =
            AlertBuilder::rule("R1-1").output_ids(&["ok", "fail-1"]).created_at_secs(1_000 - 299).build();
        handler.handle_alerts(vec![alert]).await;
    }

    #[tokio::test]
    async fn test_alert_past_horizon_is_abandoned() {
        let clock = clock_at(1_000);
        let mut queue = MockAlertQueue::new();
        queue.expect_send_batch().never();
        let handler = AlertHandler::new(dispatcher(clock.clone()), Arc::new(queue), clock, policy());

        let alert = AlertBuilder::rule("R1-1").output_ids(&["fail-1"]).created_at_secs(1_000 - 301).build();
        handler.handle_alerts(vec![alert]).await;
    }

    #[tokio::test]
    async fn test_mixed_batch_retries_only_young_failures() {
        let clock = clock_at(1_000);
        let mut queue = MockAlertQueue::new();
        queue.expect_send_batch().times(1).returning(|messages| {
            let ids: Vec<String> = messages
                .iter()
                .map(|m| serde_json::from_str::<Alert>(&m.body).unwrap().alert_id.unwrap())
                .collect();
            assert_eq!(ids, vec!["R2-1"]);
            Ok(())
        });
        let handler = AlertHandler::new(dispatcher(clock.clone()), Arc::new(queue), clock, policy());

        handler
            .handle_alerts(vec![
                AlertBuilder::rule("R1-1").output_ids(&["ok"]).created_at_secs(900).build(),
                AlertBuilder::rule("R2-1").output_ids(&["fail-2"]).created_at_secs(900).build(),
                AlertBuilder::rule("R3-1").output_ids(&["fail-3"]).created_at_secs(100).build(),
            ])
            .await;
    }

    #[tokio::test]
    async fn test_enqueue_failure_is_swallowed() {
        let clock = clock_at(1_000);
        let mut queue = MockAlertQueue::new();
        queue.expect_send_batch().times(1).returning(|_| Err(QueueError::Send("throttled".into())));
        let handler = AlertHandler::new(dispatcher(clock.clone()), Arc::new(queue), clock, policy());

        handler.retry(vec![AlertBuilder::rule("R1-1").output_ids(&["fail-1"]).build()]).await;
    }
}
