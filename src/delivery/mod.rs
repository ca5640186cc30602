//! Alert delivery: adapters per destination type, the concurrent dispatcher
//! and the retry scheduler.

pub mod adapters;
mod dispatcher;
mod error;
mod handler;
mod registry;

pub use dispatcher::{AlertDispatcher, DeliveryOutcome};
pub use error::{DeliveryError, DispatchFailure};
pub use handler::{AlertHandler, RetryPolicy};
#[cfg(test)]
pub use registry::MockOutputAdapter;
pub use registry::{OutputAdapter, OutputRegistry};
