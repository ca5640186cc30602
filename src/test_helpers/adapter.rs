use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;

use crate::{
    delivery::{DeliveryError, OutputAdapter},
    models::{Alert, OutputConfig},
};

/// A Slack stand-in that records deliveries and fails on demand. Outputs are
/// told apart by the last segment of their webhook URL, which
/// `OutputBuilder::slack` sets to the output id.
#[derive(Debug, Default)]
pub struct ScriptedAdapter {
    failures: HashMap<String, DeliveryError>,
    delivered: Mutex<Vec<(String, Alert)>>,
}

impl ScriptedAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every delivery to `output_id` fail with `error`.
    pub fn failing(mut self, output_id: &str, error: DeliveryError) -> Self {
        self.failures.insert(output_id.to_string(), error);
        self
    }

    /// Output ids of the successful deliveries, in completion order.
    pub fn delivered_to(&self) -> Vec<String> {
        self.delivered.lock().unwrap().iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn delivered_alerts(&self) -> Vec<Alert> {
        self.delivered.lock().unwrap().iter().map(|(_, alert)| alert.clone()).collect()
    }
}

#[async_trait]
impl OutputAdapter for ScriptedAdapter {
    async fn deliver(&self, alert: &Alert, config: &OutputConfig) -> Result<(), DeliveryError> {
        let OutputConfig::Slack(slack) = config else {
            return Err(DeliveryError::permanent("scripted adapter only handles slack configs"));
        };
        let output_id = slack.webhook_url.path().trim_start_matches('/').to_string();
        if let Some(error) = self.failures.get(&output_id) {
            return Err(error.clone());
        }
        self.delivered.lock().unwrap().push((output_id, alert.clone()));
        Ok(())
    }
}
