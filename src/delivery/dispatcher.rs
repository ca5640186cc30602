//! Concurrent fan-out of one alert to all of its destinations.

use std::{any::Any, collections::HashSet, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use tokio::sync::{Semaphore, mpsc};

use super::{DispatchFailure, OutputRegistry};
use crate::{models::Alert, outputs::OutputCache};

/// Result of delivering an alert to one destination.
#[derive(Debug)]
pub struct DeliveryOutcome {
    pub output_id: String,
    pub result: Result<(), DispatchFailure>,
}

impl DeliveryOutcome {
    pub fn needs_retry(&self) -> bool {
        self.result.as_ref().is_err_and(DispatchFailure::needs_retry)
    }
}

/// Delivers alerts to their destinations concurrently and classifies the
/// outcomes.
pub struct AlertDispatcher {
    outputs: Arc<OutputCache>,
    registry: Arc<OutputRegistry>,
    max_concurrent: usize,
}

impl AlertDispatcher {
    pub fn new(outputs: Arc<OutputCache>, registry: Arc<OutputRegistry>, max_concurrent: usize) -> Self {
        Self { outputs, registry, max_concurrent: max_concurrent.max(1) }
    }

    /// Delivers `alert` to each of its destinations, or to the defaults of its
    /// severity when it names none.
    ///
    /// Returns `true` when nothing needs to be retried. Otherwise
    /// `alert.output_ids` is narrowed to exactly the destinations that failed
    /// transiently; permanently failed destinations are dropped for good.
    /// When the severity defaults cannot be resolved, returns `false` and
    /// leaves the alert untouched.
    #[tracing::instrument(skip_all, fields(alert_id = %alert.log_id(), severity = %alert.severity))]
    pub async fn dispatch(&self, alert: &mut Alert) -> bool {
        let output_ids = if alert.output_ids.is_empty() {
            match self.outputs.get_default_output_ids(alert.severity).await {
                Ok(ids) => ids,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to resolve default outputs, alert will be retried.");
                    return false;
                }
            }
        } else {
            alert.output_ids.clone()
        };

        let mut seen = HashSet::new();
        let output_ids: Vec<String> =
            output_ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
        if output_ids.is_empty() {
            tracing::info!("No destinations configured for alert.");
            return true;
        }

        let outcomes = self.deliver_all(alert, &output_ids).await;

        let mut retry_ids = HashSet::new();
        let mut permanent_ids = Vec::new();
        for outcome in &outcomes {
            match &outcome.result {
                Ok(()) => {
                    tracing::info!(output_id = %outcome.output_id, "Alert delivered.");
                }
                Err(failure) if failure.needs_retry() => {
                    tracing::warn!(output_id = %outcome.output_id, error = %failure, "Delivery failed, will retry.");
                    retry_ids.insert(outcome.output_id.as_str());
                }
                Err(failure @ DispatchFailure::UnhandledFault(_)) => {
                    tracing::error!(output_id = %outcome.output_id, error = %failure, "Delivery task faulted.");
                    permanent_ids.push(outcome.output_id.as_str());
                }
                Err(failure) => {
                    tracing::warn!(output_id = %outcome.output_id, error = %failure, "Delivery failed permanently.");
                    permanent_ids.push(outcome.output_id.as_str());
                }
            }
        }

        if !permanent_ids.is_empty() {
            tracing::error!(output_ids = ?permanent_ids, "Dropping permanently failed destinations.");
        }
        if retry_ids.is_empty() {
            return true;
        }

        alert.output_ids =
            output_ids.iter().filter(|id| retry_ids.contains(id.as_str())).cloned().collect();
        false
    }

    /// Spawns one task per destination and waits for every one of them.
    /// A destination whose task vanished without reporting counts as faulted.
    async fn deliver_all(&self, alert: &Alert, output_ids: &[String]) -> Vec<DeliveryOutcome> {
        let alert = Arc::new(alert.clone());
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let (tx, mut rx) = mpsc::channel(output_ids.len());

        for output_id in output_ids {
            let tx = tx.clone();
            let alert = Arc::clone(&alert);
            let outputs = Arc::clone(&self.outputs);
            let registry = Arc::clone(&self.registry);
            let semaphore = Arc::clone(&semaphore);
            let output_id = output_id.clone();

            tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = AssertUnwindSafe(deliver_one(&outputs, &registry, &alert, &output_id))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(DispatchFailure::UnhandledFault(panic_message(panic))));
                let _ = tx.send(DeliveryOutcome { output_id, result }).await;
            });
        }
        drop(tx);

        let mut outcomes = Vec::with_capacity(output_ids.len());
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
        }

        if outcomes.len() < output_ids.len() {
            let reported: HashSet<_> = outcomes.iter().map(|o| o.output_id.clone()).collect();
            for output_id in output_ids.iter().filter(|id| !reported.contains(*id)) {
                outcomes.push(DeliveryOutcome {
                    output_id: output_id.clone(),
                    result: Err(DispatchFailure::UnhandledFault(
                        "delivery task ended without reporting".into(),
                    )),
                });
            }
        }
        outcomes
    }
}

async fn deliver_one(
    outputs: &OutputCache,
    registry: &OutputRegistry,
    alert: &Alert,
    output_id: &str,
) -> Result<(), DispatchFailure> {
    let output = outputs.get_output(output_id).await?;
    if !output.is_verified() {
        return Err(DispatchFailure::DestinationUnverified(output.verification_status));
    }
    let adapter = registry
        .get(&output.output_type)
        .ok_or_else(|| DispatchFailure::UnsupportedOutputType(output.output_type.clone()))?;
    adapter.deliver(alert, &output.output_config).await.map_err(DispatchFailure::Delivery)
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(message) => *message,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(message) => message.to_string(),
            Err(_) => "unknown panic payload".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        delivery::{DeliveryError, MockOutputAdapter, OutputAdapter},
        models::{DefaultOutputs, OutputConfig, Severity, VerificationStatus},
        outputs::{MockOutputsDirectory, OutputsError},
        test_helpers::{AlertBuilder, ManualClock, OutputBuilder},
    };

    fn dispatcher(directory: MockOutputsDirectory, registry: OutputRegistry) -> AlertDispatcher {
        let cache = OutputCache::new(
            Arc::new(directory),
            Arc::new(ManualClock::default()),
            Duration::from_secs(300),
        );
        AlertDispatcher::new(Arc::new(cache), Arc::new(registry), 4)
    }

    /// Slack adapter whose outcome is chosen by the webhook path.
    fn adapter_by_webhook_path() -> MockOutputAdapter {
        let mut adapter = MockOutputAdapter::new();
        adapter.expect_deliver().returning(|_, config| match config {
            OutputConfig::Slack(cfg) => match cfg.webhook_url.path() {
                "/transient" => Err(DeliveryError::transient("503")),
                "/permanent" => Err(DeliveryError::permanent("400")),
                _ => Ok(()),
            },
            _ => Ok(()),
        });
        adapter
    }

    struct PanickingAdapter;

    #[async_trait::async_trait]
    impl OutputAdapter for PanickingAdapter {
        async fn deliver(&self, _: &Alert, _: &OutputConfig) -> Result<(), DeliveryError> {
            panic!("adapter bug")
        }
    }

    fn registry() -> OutputRegistry {
        OutputRegistry::new()
            .with("slack", Arc::new(adapter_by_webhook_path()))
            .with("crash", Arc::new(PanickingAdapter))
    }

    /// Slack outputs whose webhook path is the output id, plus a few ids with
    /// broken directory records.
    fn directory_with_paths() -> MockOutputsDirectory {
        let mut directory = MockOutputsDirectory::new();
        directory.expect_get_output().returning(|id| match id {
            "deleted" => Err(OutputsError::NotFound(id.into())),
            "lookup-down" => Err(OutputsError::Unavailable("503".into())),
            "garbled" => Err(OutputsError::Malformed("expected value at line 1".into())),
            "unverified" => Ok(OutputBuilder::slack(id)
                .verification_status(VerificationStatus::Pending)
                .build()),
            "fax" => Ok(OutputBuilder::slack(id).output_type("fax").build()),
            "panic" => Ok(OutputBuilder::slack(id).output_type("crash").build()),
            other => Ok(OutputBuilder::slack(id)
                .webhook_url(&format!("https://hooks.slack.test/{other}"))
                .build()),
        });
        directory
    }

    #[tokio::test]
    async fn test_all_destinations_delivered_leaves_alert_unchanged() {
        let mut alert = AlertBuilder::rule("R1-1").output_ids(&["ok-1", "ok-2"]).build();
        let original = alert.clone();

        let delivered = dispatcher(directory_with_paths(), registry()).dispatch(&mut alert).await;

        assert!(delivered);
        assert_eq!(alert, original);
    }

    #[tokio::test]
    async fn test_partial_failure_narrows_to_transient_outputs() {
        let mut alert = AlertBuilder::rule("R1-1")
            .output_ids(&["ok", "transient", "permanent", "lookup-down", "deleted", "unverified", "fax"])
            .build();

        let delivered = dispatcher(directory_with_paths(), registry()).dispatch(&mut alert).await;

        assert!(!delivered);
        assert_eq!(alert.output_ids, vec!["transient", "lookup-down"]);
    }

    #[tokio::test]
    async fn test_undecodable_output_record_is_retried() {
        let mut alert = AlertBuilder::rule("R1-1").output_ids(&["garbled", "ok"]).build();

        let delivered = dispatcher(directory_with_paths(), registry()).dispatch(&mut alert).await;

        assert!(!delivered);
        assert_eq!(alert.output_ids, vec!["garbled"]);
    }

    struct SlowAdapter(Duration);

    #[async_trait::async_trait]
    impl OutputAdapter for SlowAdapter {
        async fn deliver(&self, _: &Alert, _: &OutputConfig) -> Result<(), DeliveryError> {
            tokio::time::sleep(self.0).await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_destinations_are_delivered_in_parallel() {
        let registry =
            OutputRegistry::new().with("slack", Arc::new(SlowAdapter(Duration::from_millis(200))));
        let mut alert = AlertBuilder::rule("R1-1").output_ids(&["slow-1", "slow-2", "slow-3"]).build();

        let started = tokio::time::Instant::now();
        let delivered = dispatcher(directory_with_paths(), registry).dispatch(&mut alert).await;

        assert!(delivered);
        assert!(started.elapsed() < Duration::from_millis(400), "took {:?}", started.elapsed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_limit_bounds_parallel_deliveries() {
        let cache = OutputCache::new(
            Arc::new(directory_with_paths()),
            Arc::new(ManualClock::default()),
            Duration::from_secs(300),
        );
        let registry =
            OutputRegistry::new().with("slack", Arc::new(SlowAdapter(Duration::from_millis(200))));
        let dispatcher = AlertDispatcher::new(Arc::new(cache), Arc::new(registry), 1);
        let mut alert = AlertBuilder::rule("R1-1").output_ids(&["slow-1", "slow-2"]).build();

        let started = tokio::time::Instant::now();
        assert!(dispatcher.dispatch(&mut alert).await);
        assert!(started.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_panicking_adapter_is_a_permanent_failure() {
        let mut alert = AlertBuilder::rule("R1-1").output_ids(&["panic", "transient", "ok"]).build();

        let delivered = dispatcher(directory_with_paths(), registry()).dispatch(&mut alert).await;

        assert!(!delivered);
        assert_eq!(alert.output_ids, vec!["transient"]);
    }

    #[tokio::test]
    async fn test_only_permanent_failures_count_as_delivered() {
        let mut alert = AlertBuilder::rule("R1-1").output_ids(&["unverified", "ok"]).build();

        let delivered = dispatcher(directory_with_paths(), registry()).dispatch(&mut alert).await;

        assert!(delivered);
    }

    #[tokio::test]
    async fn test_defaults_are_used_when_alert_names_no_outputs() {
        let mut directory = directory_with_paths();
        directory.expect_get_default_outputs().times(1).returning(|| {
            Ok(vec![DefaultOutputs {
                severity: Severity::High,
                output_ids: vec!["ok".into(), "transient".into()],
            }])
        });
        let mut alert = AlertBuilder::rule("R1-1").severity(Severity::High).build();

        let delivered = dispatcher(directory, registry()).dispatch(&mut alert).await;

        assert!(!delivered);
        assert_eq!(alert.output_ids, vec!["transient"]);
    }

    #[tokio::test]
    async fn test_no_default_outputs_is_delivered() {
        let mut directory = MockOutputsDirectory::new();
        directory.expect_get_default_outputs().returning(|| Ok(vec![]));
        directory.expect_get_output().never();
        let mut alert = AlertBuilder::rule("R1-1").build();

        assert!(dispatcher(directory, registry()).dispatch(&mut alert).await);
        assert!(alert.output_ids.is_empty());
    }

    #[tokio::test]
    async fn test_defaults_lookup_failure_retries_whole_alert() {
        let mut directory = MockOutputsDirectory::new();
        directory
            .expect_get_default_outputs()
            .returning(|| Err(OutputsError::Unavailable("timeout".into())));
        let mut alert = AlertBuilder::rule("R1-1").build();

        assert!(!dispatcher(directory, registry()).dispatch(&mut alert).await);
        assert!(alert.output_ids.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_output_ids_are_delivered_once() {
        let mut directory = MockOutputsDirectory::new();
        directory
            .expect_get_output()
            .times(1)
            .returning(|id| Ok(OutputBuilder::slack(id).build()));
        let mut adapter = MockOutputAdapter::new();
        adapter.expect_deliver().times(1).returning(|_, _| Ok(()));
        let registry = OutputRegistry::new().with("slack", Arc::new(adapter));
        let mut alert = AlertBuilder::rule("R1-1").output_ids(&["o1", "o1"]).build();

        assert!(dispatcher(directory, registry).dispatch(&mut alert).await);
    }

    #[test]
    fn test_panic_message_extracts_payload() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(42)), "unknown panic payload");
    }
}
