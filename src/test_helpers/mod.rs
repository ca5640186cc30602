//! A set of helpers for testing

mod adapter;
mod alert;
mod clock;
mod http_client;
mod outputs;
mod queue;
mod rules;

pub use adapter::ScriptedAdapter;
pub use alert::AlertBuilder;
pub use clock::ManualClock;
pub use http_client::create_test_http_client;
pub use outputs::{OutputBuilder, StaticOutputsDirectory};
pub use queue::InMemoryQueue;
pub use rules::StaticRuleSource;
