use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use url::Url;

use crate::{
    models::{AlertOutput, DefaultOutputs, OutputConfig, Severity, SlackConfig, VerificationStatus},
    outputs::{OutputsDirectory, OutputsError},
};

/// A builder for creating `AlertOutput` instances for testing.
pub struct OutputBuilder {
    output: AlertOutput,
}

impl OutputBuilder {
    /// A verified Slack output whose webhook URL ends with the output id.
    pub fn slack(output_id: &str) -> Self {
        Self {
            output: AlertOutput {
                output_id: output_id.to_string(),
                display_name: output_id.to_string(),
                output_type: "slack".to_string(),
                output_config: OutputConfig::Slack(SlackConfig {
                    webhook_url: Url::parse(&format!("https://hooks.slack.test/{output_id}"))
                        .unwrap(),
                }),
                verification_status: VerificationStatus::Success,
                default_for_severity: Vec::new(),
            },
        }
    }

    pub fn display_name(mut self, display_name: &str) -> Self {
        self.output.display_name = display_name.to_string();
        self
    }

    /// Overrides the type tag without touching the config.
    pub fn output_type(mut self, output_type: &str) -> Self {
        self.output.output_type = output_type.to_string();
        self
    }

    pub fn webhook_url(mut self, url: &str) -> Self {
        self.output.output_config = OutputConfig::Slack(SlackConfig { webhook_url: Url::parse(url).unwrap() });
        self
    }

    pub fn config(mut self, config: OutputConfig) -> Self {
        self.output.output_type = config.type_tag().to_string();
        self.output.output_config = config;
        self
    }

    pub fn verification_status(mut self, status: VerificationStatus) -> Self {
        self.output.verification_status = status;
        self
    }

    pub fn default_for(mut self, severities: &[Severity]) -> Self {
        self.output.default_for_severity = severities.to_vec();
        self
    }

    pub fn build(self) -> AlertOutput {
        self.output
    }
}

/// An output directory backed by a fixed set of outputs. Outputs marked as
/// default for a severity are served as that severity's defaults.
#[derive(Debug, Default)]
pub struct StaticOutputsDirectory {
    outputs: Mutex<HashMap<String, AlertOutput>>,
    output_fetches: AtomicUsize,
    default_fetches: AtomicUsize,
}

impl StaticOutputsDirectory {
    pub fn new(outputs: impl IntoIterator<Item = AlertOutput>) -> Self {
        let directory = Self::default();
        for output in outputs {
            directory.upsert(output);
        }
        directory
    }

    /// Adds or replaces an output, as an operator editing it would.
    pub fn upsert(&self, output: AlertOutput) {
        self.outputs.lock().unwrap().insert(output.output_id.clone(), output);
    }

    pub fn remove(&self, output_id: &str) {
        self.outputs.lock().unwrap().remove(output_id);
    }

    pub fn output_fetches(&self) -> usize {
        self.output_fetches.load(Ordering::SeqCst)
    }

    pub fn default_fetches(&self) -> usize {
        self.default_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OutputsDirectory for StaticOutputsDirectory {
    async fn get_output(&self, output_id: &str) -> Result<AlertOutput, OutputsError> {
        self.output_fetches.fetch_add(1, Ordering::SeqCst);
        self.outputs
            .lock()
            .unwrap()
            .get(output_id)
            .cloned()
            .ok_or_else(|| OutputsError::NotFound(output_id.to_string()))
    }

    async fn get_default_outputs(&self) -> Result<Vec<DefaultOutputs>, OutputsError> {
        self.default_fetches.fetch_add(1, Ordering::SeqCst);
        let outputs = self.outputs.lock().unwrap();
        let mut ids: Vec<&String> = outputs.keys().collect();
        ids.sort();
        Ok(Severity::ALL
            .iter()
            .map(|severity| DefaultOutputs {
                severity: *severity,
                output_ids: ids
                    .iter()
                    .filter(|id| outputs[id.as_str()].default_for_severity.contains(severity))
                    .map(|id| id.to_string())
                    .collect(),
            })
            .collect())
    }
}
