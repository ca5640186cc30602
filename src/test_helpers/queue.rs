use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::queue::{AlertQueue, DelayedMessage, QueueConsumer, QueueError, QueueMessage};

/// An in-process queue. Everything sent is recorded and becomes receivable
/// immediately, regardless of its delay.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    pending: Mutex<VecDeque<QueueMessage>>,
    sent: Mutex<Vec<DelayedMessage>>,
    deleted: Mutex<Vec<String>>,
    next_receipt: AtomicU64,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `body` available to the next `receive`, as if another producer
    /// had sent it.
    pub fn push(&self, body: impl Into<String>) -> String {
        let receipt_handle = self.next_receipt.fetch_add(1, Ordering::SeqCst).to_string();
        self.pending
            .lock()
            .unwrap()
            .push_back(QueueMessage { body: body.into(), receipt_handle: receipt_handle.clone() });
        receipt_handle
    }

    /// Every message sent through the producer side, in order.
    pub fn sent(&self) -> Vec<DelayedMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_bodies(&self) -> Vec<String> {
        self.sent().into_iter().map(|m| m.body).collect()
    }

    /// Receipt handles acknowledged through the consumer side.
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    fn record(&self, message: DelayedMessage) {
        self.push(message.body.clone());
        self.sent.lock().unwrap().push(message);
    }
}

#[async_trait]
impl AlertQueue for InMemoryQueue {
    async fn send(&self, body: String) -> Result<(), QueueError> {
        self.record(DelayedMessage { body, delay: Duration::ZERO });
        Ok(())
    }

    async fn send_batch(&self, messages: Vec<DelayedMessage>) -> Result<(), QueueError> {
        for message in messages {
            self.record(message);
        }
        Ok(())
    }
}

#[async_trait]
impl QueueConsumer for InMemoryQueue {
    /// Returns up to ten pending messages, or waits briefly and returns none,
    /// like a short long-poll.
    async fn receive(&self) -> Result<Vec<QueueMessage>, QueueError> {
        let batch: Vec<QueueMessage> = {
            let mut pending = self.pending.lock().unwrap();
            let count = pending.len().min(10);
            pending.drain(..count).collect()
        };
        if batch.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(batch)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.deleted.lock().unwrap().push(receipt_handle.to_string());
        Ok(())
    }
}
