//! Implementation of the AlertStore trait for SqliteAlertStore

use std::{collections::BTreeSet, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{from_unix_millis, from_unix_secs};
use crate::{
    models::{AlertAggregate, EventHash, MatchedEvent, WindowCounter},
    persistence::{error::PersistenceError, sqlite::SqliteAlertStore, traits::AlertStore},
};

/// Opens a new window only when the stored one was created before the cutoff.
/// A rejected update returns no row.
const OPEN_WINDOW_SQL: &str = "\
INSERT INTO window_counters (rule_id, creation_time, expires_at, alert_count)
VALUES (?1, ?2, ?3, 1)
ON CONFLICT (rule_id) DO UPDATE SET
    creation_time = excluded.creation_time,
    expires_at = excluded.expires_at,
    alert_count = window_counters.alert_count + 1
WHERE window_counters.creation_time < ?4
RETURNING alert_count, creation_time, expires_at";

const UPSERT_ALERT_SQL: &str = "\
INSERT INTO alerts (alert_id, rule_id, creation_time, last_event_matched)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT (alert_id) DO UPDATE SET
    creation_time = excluded.creation_time,
    last_event_matched = excluded.last_event_matched";

fn window_secs(window: Duration) -> Result<i64, PersistenceError> {
    i64::try_from(window.as_secs())
        .map_err(|_| PersistenceError::InvalidInput(format!("merge window too large: {window:?}")))
}

fn decode_hash(bytes: &[u8]) -> Result<EventHash, PersistenceError> {
    EventHash::try_from(bytes).map_err(|e| PersistenceError::SerializationError(e.to_string()))
}

#[async_trait]
impl AlertStore for SqliteAlertStore {
    #[tracing::instrument(skip(self, event), fields(event_hash = %event.event_hash), level = "debug")]
    async fn put_matched_event(&self, event: &MatchedEvent) -> Result<(), PersistenceError> {
        self.execute_query_with_error_handling(
            "put matched event",
            sqlx::query(
                "INSERT OR REPLACE INTO matched_events (event_hash, timestamp, event) VALUES (?, ?, ?)",
            )
            .bind(event.event_hash.as_bytes())
            .bind(event.timestamp.timestamp_millis())
            .bind(&event.event)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_matched_event(
        &self,
        event_hash: &EventHash,
    ) -> Result<Option<MatchedEvent>, PersistenceError> {
        let row = self
            .execute_query_with_error_handling(
                "get matched event",
                sqlx::query_as::<_, (i64, String)>(
                    "SELECT timestamp, event FROM matched_events WHERE event_hash = ?",
                )
                .bind(event_hash.as_bytes())
                .fetch_optional(&self.pool),
            )
            .await?;

        row.map(|(timestamp, event)| {
            Ok::<_, PersistenceError>(MatchedEvent {
                event_hash: *event_hash,
                timestamp: from_unix_millis(timestamp)?,
                event,
            })
        })
        .transpose()
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn try_open_window(
        &self,
        rule_id: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<WindowCounter, PersistenceError> {
        let window = window_secs(window)?;
        let now = now.timestamp();
        let row = self
            .execute_query_with_error_handling(
                "open merge window",
                sqlx::query_as::<_, (i64, i64, i64)>(OPEN_WINDOW_SQL)
                    .bind(rule_id)
                    .bind(now)
                    .bind(now.saturating_add(window))
                    .bind(now.saturating_sub(window))
                    .fetch_optional(&self.pool),
            )
            .await?;

        match row {
            Some((alert_count, creation_time, expires_at)) => {
                tracing::debug!(rule_id, alert_count, "Opened a new merge window.");
                Ok(WindowCounter {
                    rule_id: rule_id.to_string(),
                    creation_time: from_unix_secs(creation_time)?,
                    expires_at: from_unix_secs(expires_at)?,
                    alert_count,
                })
            }
            None => Err(PersistenceError::ConditionFailed(format!(
                "merge window for rule {rule_id} is still open"
            ))),
        }
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_window(&self, rule_id: &str) -> Result<Option<WindowCounter>, PersistenceError> {
        let row = self
            .execute_query_with_error_handling(
                "get merge window",
                sqlx::query_as::<_, (i64, i64, i64)>(
                    "SELECT alert_count, creation_time, expires_at FROM window_counters WHERE rule_id = ?",
                )
                .bind(rule_id)
                .fetch_optional(&self.pool),
            )
            .await?;

        row.map(|(alert_count, creation_time, expires_at)| {
            Ok::<_, PersistenceError>(WindowCounter {
                rule_id: rule_id.to_string(),
                creation_time: from_unix_secs(creation_time)?,
                expires_at: from_unix_secs(expires_at)?,
                alert_count,
            })
        })
        .transpose()
    }

    #[tracing::instrument(skip(self, event), fields(event_hash = %event.event_hash), level = "debug")]
    async fn add_event_to_alert(
        &self,
        alert_id: &str,
        rule_id: &str,
        creation_time: DateTime<Utc>,
        event: &MatchedEvent,
    ) -> Result<(), PersistenceError> {
        let mut tx = self
            .execute_query_with_error_handling("begin alert update", self.pool.begin())
            .await?;

        self.execute_query_with_error_handling(
            "upsert alert",
            sqlx::query(UPSERT_ALERT_SQL)
                .bind(alert_id)
                .bind(rule_id)
                .bind(creation_time.timestamp())
                .bind(event.timestamp.timestamp_millis())
                .execute(&mut *tx),
        )
        .await?;

        self.execute_query_with_error_handling(
            "add event hash to alert",
            sqlx::query(
                "INSERT OR IGNORE INTO alert_event_hashes (alert_id, event_hash) VALUES (?, ?)",
            )
            .bind(alert_id)
            .bind(event.event_hash.as_bytes())
            .execute(&mut *tx),
        )
        .await?;

        self.execute_query_with_error_handling("commit alert update", tx.commit()).await
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_alert(&self, alert_id: &str) -> Result<Option<AlertAggregate>, PersistenceError> {
        let row = self
            .execute_query_with_error_handling(
                "get alert",
                sqlx::query_as::<_, (String, i64, i64)>(
                    "SELECT rule_id, creation_time, last_event_matched FROM alerts WHERE alert_id = ?",
                )
                .bind(alert_id)
                .fetch_optional(&self.pool),
            )
            .await?;

        let Some((rule_id, creation_time, last_event_matched)) = row else {
            return Ok(None);
        };

        let hashes = self
            .execute_query_with_error_handling(
                "get alert event hashes",
                sqlx::query_as::<_, (Vec<u8>,)>(
                    "SELECT event_hash FROM alert_event_hashes WHERE alert_id = ?",
                )
                .bind(alert_id)
                .fetch_all(&self.pool),
            )
            .await?;

        let event_hashes = hashes
            .iter()
            .map(|(bytes,)| decode_hash(bytes))
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(Some(AlertAggregate {
            alert_id: alert_id.to_string(),
            rule_id,
            creation_time: from_unix_secs(creation_time)?,
            last_event_matched: from_unix_millis(last_event_matched)?,
            event_hashes,
        }))
    }
}
