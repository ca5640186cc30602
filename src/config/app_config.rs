use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use url::Url;

use super::{
    BaseHttpClientConfig, HttpRetryConfig, deserialize_duration_from_minutes,
    deserialize_duration_from_seconds,
};

fn default_database_url() -> String {
    "sqlite://tripwire.db".to_string()
}

fn default_merge_window() -> Duration {
    Duration::from_secs(3600)
}

fn default_outputs_refresh_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_min_retry_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_max_retry_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_alert_retry_duration() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_max_concurrent_deliveries() -> usize {
    16
}

fn default_queue_batch_size() -> i32 {
    10
}

fn default_queue_wait_time() -> Duration {
    Duration::from_secs(20)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Application configuration for the merge and delivery workers.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// SQLite URL of the alert store (event log, window counters, alerts).
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Length of the merge window during which matches of one rule join the
    /// same alert.
    #[serde(
        rename = "merge_window_secs",
        default = "default_merge_window",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub merge_window: Duration,

    /// How long resolved destination configs and severity defaults are
    /// served from memory before being refetched.
    #[serde(
        rename = "outputs_refresh_interval_mins",
        default = "default_outputs_refresh_interval",
        deserialize_with = "deserialize_duration_from_minutes"
    )]
    pub outputs_refresh_interval: Duration,

    /// Lower bound (inclusive) of the random re-enqueue delay.
    #[serde(
        rename = "min_retry_delay_secs",
        default = "default_min_retry_delay",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub min_retry_delay: Duration,

    /// Upper bound (exclusive) of the random re-enqueue delay.
    #[serde(
        rename = "max_retry_delay_secs",
        default = "default_max_retry_delay",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub max_retry_delay: Duration,

    /// Alerts older than this are abandoned instead of retried.
    #[serde(
        rename = "alert_retry_duration_mins",
        default = "default_alert_retry_duration",
        deserialize_with = "deserialize_duration_from_minutes"
    )]
    pub alert_retry_duration: Duration,

    /// Queue carrying alert envelopes to the delivery workers.
    #[serde(default)]
    pub alert_queue_url: Option<String>,

    /// Queue carrying rule matches to the merge workers.
    #[serde(default)]
    pub ingest_queue_url: Option<String>,

    /// Base URL of the rule analysis service.
    #[serde(default)]
    pub analysis_api_url: Option<Url>,

    /// Base URL of the output directory service.
    #[serde(default)]
    pub outputs_api_url: Option<Url>,

    /// Prefix of deep links to rule alerts, followed by the alert id.
    #[serde(default)]
    pub alert_url_prefix: String,

    /// Prefix of deep links to policies, followed by the policy id.
    #[serde(default)]
    pub policy_url_prefix: String,

    /// Sender address of email notifications.
    #[serde(default)]
    pub mail_from: String,

    /// Optional SES configuration set applied to outgoing email.
    #[serde(default)]
    pub ses_configuration_set: Option<String>,

    /// Maximum number of destinations delivered concurrently for one alert.
    #[serde(default = "default_max_concurrent_deliveries")]
    pub max_concurrent_deliveries: usize,

    /// Maximum number of messages fetched by one queue poll.
    #[serde(default = "default_queue_batch_size")]
    pub queue_batch_size: i32,

    /// Long-poll wait time of one queue poll.
    #[serde(
        rename = "queue_wait_time_secs",
        default = "default_queue_wait_time",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub queue_wait_time: Duration,

    /// The maximum time to wait for graceful shutdown.
    #[serde(
        rename = "shutdown_timeout_secs",
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub shutdown_timeout: Duration,

    /// Configuration for HTTP client retry policies.
    #[serde(default)]
    pub http_retry_config: HttpRetryConfig,

    /// Configuration for the base HTTP client.
    #[serde(default)]
    pub http_base_config: BaseHttpClientConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            merge_window: default_merge_window(),
            outputs_refresh_interval: default_outputs_refresh_interval(),
            min_retry_delay: default_min_retry_delay(),
            max_retry_delay: default_max_retry_delay(),
            alert_retry_duration: default_alert_retry_duration(),
            alert_queue_url: None,
            ingest_queue_url: None,
            analysis_api_url: None,
            outputs_api_url: None,
            alert_url_prefix: String::new(),
            policy_url_prefix: String::new(),
            mail_from: String::new(),
            ses_configuration_set: None,
            max_concurrent_deliveries: default_max_concurrent_deliveries(),
            queue_batch_size: default_queue_batch_size(),
            queue_wait_time: default_queue_wait_time(),
            shutdown_timeout: default_shutdown_timeout(),
            http_retry_config: HttpRetryConfig::default(),
            http_base_config: BaseHttpClientConfig::default(),
        }
    }
}

impl AppConfig {
    /// Creates a new `AppConfig` from `<config_dir>/app.yaml` (optional)
    /// overridden by `TRIPWIRE__*` environment variables.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir = config_dir.unwrap_or("configs");
        Config::builder()
            .add_source(File::with_name(&format!("{config_dir}/app.yaml")).required(false))
            .add_source(Environment::with_prefix("TRIPWIRE").separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }
}
