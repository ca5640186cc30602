use std::collections::HashMap;

use async_trait::async_trait;

use crate::{
    analysis::{RuleSource, RuleSourceError},
    models::{RuleMetadata, Severity},
};

/// A rule source answering from a fixed set of rules.
#[derive(Debug, Default)]
pub struct StaticRuleSource {
    rules: HashMap<String, RuleMetadata>,
}

impl StaticRuleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule_id: &str, display_name: &str, severity: Severity) -> Self {
        self.rules.insert(
            rule_id.to_string(),
            RuleMetadata {
                description: format!("{display_name} description"),
                display_name: display_name.to_string(),
                runbook: String::new(),
                severity,
                tags: Vec::new(),
            },
        );
        self
    }
}

#[async_trait]
impl RuleSource for StaticRuleSource {
    async fn get_rule(&self, rule_id: &str) -> Result<RuleMetadata, RuleSourceError> {
        self.rules.get(rule_id).cloned().ok_or_else(|| RuleSourceError::NotFound(rule_id.to_string()))
    }
}
