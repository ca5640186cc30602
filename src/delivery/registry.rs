//! Mapping from destination type tags to delivery adapters.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::DeliveryError;
use crate::models::{Alert, OutputConfig};

/// Delivers alerts to one kind of destination.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OutputAdapter: Send + Sync {
    /// Sends `alert` to the destination described by `config`.
    async fn deliver(&self, alert: &Alert, config: &OutputConfig) -> Result<(), DeliveryError>;
}

/// Adapters keyed by the destination type tag they handle.
#[derive(Default, Clone)]
pub struct OutputRegistry {
    adapters: HashMap<String, Arc<dyn OutputAdapter>>,
}

impl OutputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `adapter` for `output_type`, replacing any previous one.
    pub fn register(&mut self, output_type: impl Into<String>, adapter: Arc<dyn OutputAdapter>) {
        self.adapters.insert(output_type.into(), adapter);
    }

    pub fn with(mut self, output_type: impl Into<String>, adapter: Arc<dyn OutputAdapter>) -> Self {
        self.register(output_type, adapter);
        self
    }

    pub fn get(&self, output_type: &str) -> Option<Arc<dyn OutputAdapter>> {
        self.adapters.get(output_type).cloned()
    }

    pub fn output_types(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }
}
