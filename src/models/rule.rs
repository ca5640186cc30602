//! Rule metadata served by the analysis service.

use serde::{Deserialize, Serialize};

use super::Severity;

/// The parts of a rule definition copied onto the alerts it raises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleMetadata {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub runbook: String,
    pub severity: Severity,
    #[serde(default)]
    pub tags: Vec<String>,
}
