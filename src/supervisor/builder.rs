//! This module provides the `SupervisorBuilder` for constructing a `Supervisor`.

use std::sync::Arc;

use aws_config::{BehaviorVersion, SdkConfig};
use reqwest_middleware::ClientWithMiddleware;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{Supervisor, SupervisorError, WorkerMode};
use crate::{
    analysis::HttpRuleSource,
    clock::{Clock, SystemClock},
    config::AppConfig,
    delivery::{
        AlertDispatcher, AlertHandler, RetryPolicy,
        adapters::{AlertFormatter, EmailSettings, default_registry},
    },
    http_client::HttpClientPool,
    merger::AlertMerger,
    outputs::{HttpOutputsDirectory, OutputCache},
    persistence::SqliteAlertStore,
    queue::SqsQueue,
    template::TemplateService,
    workers::{DeliveryProcessor, MergeProcessor, QueueWorker},
};

/// The endpoints one worker mode needs, checked before anything is built.
struct Endpoints {
    ingest_queue_url: Option<String>,
    alert_queue_url: String,
    analysis_api_url: Option<Url>,
    outputs_api_url: Option<Url>,
}

fn required<T: Clone>(value: &Option<T>, name: &str) -> Result<T, SupervisorError> {
    value
        .clone()
        .ok_or_else(|| SupervisorError::InvalidConfiguration(format!("`{name}` must be set")))
}

impl Endpoints {
    fn validate(config: &AppConfig, mode: WorkerMode) -> Result<Self, SupervisorError> {
        let alert_queue_url = required(&config.alert_queue_url, "alert_queue_url")?;
        let (ingest_queue_url, analysis_api_url) = if mode.runs_merge() {
            (
                Some(required(&config.ingest_queue_url, "ingest_queue_url")?),
                Some(required(&config.analysis_api_url, "analysis_api_url")?),
            )
        } else {
            (None, None)
        };
        let outputs_api_url = if mode.runs_delivery() {
            Some(required(&config.outputs_api_url, "outputs_api_url")?)
        } else {
            None
        };
        if config.min_retry_delay > config.max_retry_delay {
            return Err(SupervisorError::InvalidConfiguration(
                "`min_retry_delay_secs` must not exceed `max_retry_delay_secs`".into(),
            ));
        }
        Ok(Self { ingest_queue_url, alert_queue_url, analysis_api_url, outputs_api_url })
    }
}

/// A builder for creating a `Supervisor` instance.
pub struct SupervisorBuilder {
    config: Option<AppConfig>,
    mode: WorkerMode,
    sdk_config: Option<SdkConfig>,
}

impl Default for SupervisorBuilder {
    fn default() -> Self {
        Self { config: None, mode: WorkerMode::All, sdk_config: None }
    }
}

impl SupervisorBuilder {
    /// Creates a new, empty `SupervisorBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application configuration for the `Supervisor`.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Selects which workers the `Supervisor` runs.
    pub fn mode(mut self, mode: WorkerMode) -> Self {
        self.mode = mode;
        self
    }

    /// Uses the given AWS configuration instead of loading it from the
    /// environment.
    pub fn sdk_config(mut self, sdk_config: SdkConfig) -> Self {
        self.sdk_config = Some(sdk_config);
        self
    }

    /// Validates the configuration and wires the workers of the selected
    /// mode together.
    pub async fn build(self) -> Result<Supervisor, SupervisorError> {
        let config = self.config.ok_or(SupervisorError::MissingConfig)?;
        let endpoints = Endpoints::validate(&config, self.mode)?;

        let sdk_config = match self.sdk_config {
            Some(sdk_config) => sdk_config,
            None => aws_config::defaults(BehaviorVersion::latest()).load().await,
        };
        let sqs_client = aws_sdk_sqs::Client::new(&sdk_config);
        let http_client = HttpClientPool::new(config.http_base_config.clone())
            .get_or_create(&config.http_retry_config)
            .await?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let cancellation_token = CancellationToken::new();
        let alert_queue = SqsQueue::new(sqs_client.clone(), endpoints.alert_queue_url.clone())
            .with_polling(config.queue_batch_size, config.queue_wait_time);

        let mut store = None;
        let mut merge_worker = None;
        if let (Some(ingest_queue_url), Some(analysis_api_url)) =
            (endpoints.ingest_queue_url, endpoints.analysis_api_url)
        {
            let sqlite = Arc::new(SqliteAlertStore::new(&config.database_url).await?);
            sqlite.run_migrations().await?;

            let merger = AlertMerger::new(
                sqlite.clone(),
                Arc::new(HttpRuleSource::new(http_client.clone(), analysis_api_url)),
                Arc::new(alert_queue.clone()),
                clock.clone(),
                config.merge_window,
            );
            let ingest_queue = SqsQueue::new(sqs_client.clone(), ingest_queue_url)
                .with_polling(config.queue_batch_size, config.queue_wait_time);
            merge_worker = Some(QueueWorker::new(
                "merge",
                Arc::new(ingest_queue),
                MergeProcessor::new(Arc::new(merger)),
                cancellation_token.clone(),
            ));
            store = Some(sqlite);
            tracing::info!(merge_window = ?config.merge_window, "Merge worker configured.");
        }

        let mut delivery_worker = None;
        if let Some(outputs_api_url) = endpoints.outputs_api_url {
            let handler =
                build_alert_handler(&config, &sdk_config, http_client, outputs_api_url, &alert_queue, clock)?;
            delivery_worker = Some(QueueWorker::new(
                "delivery",
                Arc::new(alert_queue),
                DeliveryProcessor::new(Arc::new(handler)),
                cancellation_token.clone(),
            ));
            tracing::info!(
                max_concurrent_deliveries = config.max_concurrent_deliveries,
                "Delivery worker configured."
            );
        }

        Ok(Supervisor::new(config, store, merge_worker, delivery_worker, cancellation_token))
    }
}

fn build_alert_handler(
    config: &AppConfig,
    sdk_config: &SdkConfig,
    http_client: Arc<ClientWithMiddleware>,
    outputs_api_url: Url,
    alert_queue: &SqsQueue,
    clock: Arc<dyn Clock>,
) -> Result<AlertHandler, SupervisorError> {
    let formatter = Arc::new(AlertFormatter::new(
        config.alert_url_prefix.clone(),
        config.policy_url_prefix.clone(),
        TemplateService::new()?,
    ));
    let registry = default_registry(
        http_client.clone(),
        sdk_config,
        formatter,
        EmailSettings {
            mail_from: config.mail_from.clone(),
            configuration_set: config.ses_configuration_set.clone(),
        },
    )
    .map_err(|e| SupervisorError::InvalidConfiguration(e.to_string()))?;

    let cache = OutputCache::new(
        Arc::new(HttpOutputsDirectory::new(http_client, outputs_api_url)),
        clock.clone(),
        config.outputs_refresh_interval,
    );
    let dispatcher =
        AlertDispatcher::new(Arc::new(cache), Arc::new(registry), config.max_concurrent_deliveries);
    Ok(AlertHandler::new(
        Arc::new(dispatcher),
        Arc::new(alert_queue.clone()),
        clock,
        RetryPolicy {
            max_age: config.alert_retry_duration,
            min_delay: config.min_retry_delay,
            max_delay: config.max_retry_delay,
        },
    ))
}
