//! Durable queues connecting the merge and delivery stages.

mod error;
mod sqs;
mod traits;

pub use error::QueueError;
pub use sqs::SqsQueue;
pub use traits::{AlertQueue, DelayedMessage, QueueConsumer, QueueMessage};
#[cfg(test)]
pub use traits::{MockAlertQueue, MockQueueConsumer};
