//! Data models shared by the merge and delivery stages.

pub mod alert;
pub mod event;
pub mod output;
pub mod rule;
pub mod severity;
pub mod window;

pub use alert::{Alert, AlertType};
pub use event::{AlertNotification, EventHash, InvalidEventHash, MatchedEvent};
pub use output::{
    AlertOutput, DefaultOutputs, EmailConfig, GithubConfig, JiraConfig, MsTeamsConfig,
    OpsgenieConfig, OutputConfig, PagerDutyConfig, SlackConfig, SnsConfig, SqsConfig,
    VerificationStatus,
};
pub use rule::RuleMetadata;
pub use severity::Severity;
pub use window::{AlertAggregate, WindowCounter, alert_id_for};
