//! Amazon SQS implementation of the queue traits.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_sqs::{Client, error::DisplayErrorContext, types::SendMessageBatchRequestEntry};

use super::{AlertQueue, DelayedMessage, QueueConsumer, QueueError, QueueMessage};

/// Most entries a single `SendMessageBatch` call accepts.
const MAX_BATCH_ENTRIES: usize = 10;

/// Longest per-message delay SQS supports.
const MAX_DELAY_SECS: u64 = 900;

/// One SQS queue, usable both as a producer and as a long-polling consumer.
#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: Client,
    queue_url: String,
    max_messages: i32,
    wait_time: Duration,
}

impl SqsQueue {
    pub fn new(client: Client, queue_url: impl Into<String>) -> Self {
        Self { client, queue_url: queue_url.into(), max_messages: 10, wait_time: Duration::from_secs(20) }
    }

    /// Sets the batch size and long-poll wait of [`QueueConsumer::receive`].
    pub fn with_polling(mut self, max_messages: i32, wait_time: Duration) -> Self {
        self.max_messages = max_messages.clamp(1, 10);
        self.wait_time = wait_time;
        self
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

/// Splits messages into `SendMessageBatch`-sized chunks, clamping delays to
/// what SQS accepts. Entry ids are unique within a chunk.
fn batch_entries(
    messages: Vec<DelayedMessage>,
) -> Result<Vec<Vec<SendMessageBatchRequestEntry>>, QueueError> {
    let mut batches = Vec::with_capacity(messages.len().div_ceil(MAX_BATCH_ENTRIES));
    let mut current = Vec::with_capacity(MAX_BATCH_ENTRIES);

    for message in messages {
        let delay = message.delay.as_secs().min(MAX_DELAY_SECS) as i32;
        let entry = SendMessageBatchRequestEntry::builder()
            .id(current.len().to_string())
            .message_body(message.body)
            .delay_seconds(delay)
            .build()
            .map_err(|e| QueueError::Build(e.to_string()))?;
        current.push(entry);

        if current.len() == MAX_BATCH_ENTRIES {
            batches.push(std::mem::replace(&mut current, Vec::with_capacity(MAX_BATCH_ENTRIES)));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    Ok(batches)
}

/// Sends every chunk, even after earlier ones failed, and reports all
/// failures together. `send_chunk` returns the rejection reasons of the
/// entries the queue refused.
async fn send_chunks<F, Fut>(
    batches: Vec<Vec<SendMessageBatchRequestEntry>>,
    mut send_chunk: F,
) -> Result<(), QueueError>
where
    F: FnMut(Vec<SendMessageBatchRequestEntry>) -> Fut,
    Fut: Future<Output = Result<Vec<String>, QueueError>>,
{
    let total: usize = batches.iter().map(Vec::len).sum();
    let mut not_sent = 0;
    let mut reasons = Vec::new();

    for entries in batches {
        let size = entries.len();
        match send_chunk(entries).await {
            Ok(rejected) => {
                not_sent += rejected.len();
                reasons.extend(rejected);
            }
            Err(e) => {
                tracing::warn!(error = %e, entries = size, "Failed to send message batch.");
                not_sent += size;
                reasons.push(e.to_string());
            }
        }
    }

    if not_sent == 0 {
        return Ok(());
    }
    Err(QueueError::Send(format!(
        "{not_sent} of {total} messages were not enqueued: {}",
        reasons.join(", ")
    )))
}

#[async_trait]
impl AlertQueue for SqsQueue {
    #[tracing::instrument(skip(self, body), fields(queue_url = %self.queue_url), level = "debug")]
    async fn send(&self, body: String) -> Result<(), QueueError> {
        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| QueueError::Send(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    #[tracing::instrument(skip(self, messages), fields(queue_url = %self.queue_url, count = messages.len()), level = "debug")]
    async fn send_batch(&self, messages: Vec<DelayedMessage>) -> Result<(), QueueError> {
        send_chunks(batch_entries(messages)?, |entries| async move {
            let output = self
                .client
                .send_message_batch()
                .queue_url(&self.queue_url)
                .set_entries(Some(entries))
                .send()
                .await
                .map_err(|e| QueueError::Send(DisplayErrorContext(&e).to_string()))?;
            Ok::<_, QueueError>(
                output
                    .failed()
                    .iter()
                    .map(|f| format!("{}: {}", f.code(), f.message().unwrap_or_default()))
                    .collect::<Vec<String>>(),
            )
        })
        .await
    }
}

#[async_trait]
impl QueueConsumer for SqsQueue {
    async fn receive(&self) -> Result<Vec<QueueMessage>, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(self.max_messages)
            .wait_time_seconds(self.wait_time.as_secs().min(20) as i32)
            .send()
            .await
            .map_err(|e| QueueError::Receive(DisplayErrorContext(&e).to_string()))?;

        Ok(output
            .messages()
            .iter()
            .filter_map(|message| match (message.body(), message.receipt_handle()) {
                (Some(body), Some(handle)) => Some(QueueMessage {
                    body: body.to_string(),
                    receipt_handle: handle.to_string(),
                }),
                _ => {
                    tracing::warn!(message_id = ?message.message_id(), "Skipping message without body or receipt handle.");
                    None
                }
            })
            .collect())
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Delete(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(i: u64, delay_secs: u64) -> DelayedMessage {
        DelayedMessage { body: format!("alert-{i}"), delay: Duration::from_secs(delay_secs) }
    }

    #[test]
    fn test_batch_entries_chunks_by_ten() {
        let messages = (0..23).map(|i| message(i, 10)).collect();
        let batches = batch_entries(messages).unwrap();

        let sizes: Vec<_> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![10, 10, 3]);
        assert_eq!(batches[2][0].message_body(), "alert-20");

        let ids: Vec<_> = batches[0].iter().map(|e| e.id().to_string()).collect();
        assert_eq!(ids, (0..10).map(|i| i.to_string()).collect::<Vec<_>>());
    }

    #[test]
    fn test_batch_entries_keeps_per_message_delay_and_clamps() {
        let batches = batch_entries(vec![message(0, 12), message(1, 4000)]).unwrap();
        assert_eq!(batches[0][0].delay_seconds(), Some(12));
        assert_eq!(batches[0][1].delay_seconds(), Some(900));
    }

    #[tokio::test]
    async fn test_send_chunks_continues_after_failed_chunk() {
        let messages = (0..25).map(|i| message(i, 10)).collect();
        let mut sent = Vec::new();

        let result = send_chunks(batch_entries(messages).unwrap(), |entries| {
            let first = entries[0].message_body().to_string();
            sent.push(first.clone());
            std::future::ready(match first.as_str() {
                "alert-0" => Err(QueueError::Send("throttled".into())),
                "alert-10" => Ok(vec!["InternalError: try again".to_string()]),
                _ => Ok(Vec::new()),
            })
        })
        .await;

        assert_eq!(sent, vec!["alert-0", "alert-10", "alert-20"]);
        let Err(QueueError::Send(message)) = result else {
            panic!("expected an aggregated send error, got {result:?}");
        };
        assert!(message.starts_with("11 of 25 messages were not enqueued"), "{message}");
        assert!(message.contains("throttled") && message.contains("InternalError"));
    }

    #[tokio::test]
    async fn test_send_chunks_succeeds_when_every_entry_is_accepted() {
        let messages = (0..12).map(|i| message(i, 0)).collect();
        let mut chunks = 0;

        let result = send_chunks(batch_entries(messages).unwrap(), |_| {
            chunks += 1;
            std::future::ready(Ok(Vec::new()))
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(chunks, 2);
    }

    #[test]
    fn test_batch_entries_empty() {
        assert!(batch_entries(Vec::new()).unwrap().is_empty());
    }
}
