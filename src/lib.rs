//! Tripwire turns rule matches into deduplicated alerts and fans them out to
//! the configured notification destinations.
//!
//! The merge engine folds matches of one rule within a time window into a
//! single alert. The delivery stage resolves each alert's destinations,
//! delivers to all of them concurrently and re-enqueues the alert for the
//! destinations that failed transiently.

pub mod analysis;
pub mod clock;
pub mod config;
pub mod delivery;
pub mod http_client;
pub mod merger;
pub mod models;
pub mod outputs;
pub mod persistence;
pub mod queue;
pub mod supervisor;
pub mod template;
pub mod test_helpers;
pub mod workers;
