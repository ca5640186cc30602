//! Read-through caches in front of the output directory.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::RwLock;

use super::{OutputsDirectory, OutputsError};
use crate::{
    clock::Clock,
    models::{AlertOutput, Severity},
};

struct CachedOutput {
    output: Arc<AlertOutput>,
    fetched_at: DateTime<Utc>,
}

struct CachedDefaults {
    by_severity: HashMap<Severity, Vec<String>>,
    fetched_at: DateTime<Utc>,
}

/// Caches destination records and the severity defaults for a bounded time.
///
/// Readers never block each other. Refreshes are not coordinated: callers
/// that miss at the same time each fetch from the directory, and the last
/// write wins.
pub struct OutputCache {
    directory: Arc<dyn OutputsDirectory>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    outputs: DashMap<String, CachedOutput>,
    defaults: RwLock<Option<CachedDefaults>>,
}

impl OutputCache {
    pub fn new(directory: Arc<dyn OutputsDirectory>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { directory, clock, ttl, outputs: DashMap::new(), defaults: RwLock::new(None) }
    }

    fn is_fresh(&self, fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        (now - fetched_at).to_std().is_ok_and(|age| age < self.ttl)
    }

    /// Returns the destination, fetching it if it is not cached or stale.
    pub async fn get_output(&self, output_id: &str) -> Result<Arc<AlertOutput>, OutputsError> {
        let now = self.clock.now();
        if let Some(entry) = self.outputs.get(output_id) {
            if self.is_fresh(entry.fetched_at, now) {
                tracing::debug!(output_id, "Output cache hit.");
                return Ok(entry.output.clone());
            }
        }

        tracing::debug!(output_id, "Output cache miss, fetching from directory.");
        let output = Arc::new(self.directory.get_output(output_id).await?);
        self.outputs.insert(
            output_id.to_string(),
            CachedOutput { output: output.clone(), fetched_at: now },
        );
        Ok(output)
    }

    /// Returns the ids of the destinations configured as defaults for
    /// `severity`, refreshing the whole mapping when it is stale.
    pub async fn get_default_output_ids(
        &self,
        severity: Severity,
    ) -> Result<Vec<String>, OutputsError> {
        let now = self.clock.now();
        {
            let defaults = self.defaults.read().await;
            if let Some(cached) = defaults.as_ref().filter(|c| self.is_fresh(c.fetched_at, now)) {
                tracing::debug!(%severity, "Default outputs cache hit.");
                return Ok(cached.by_severity.get(&severity).cloned().unwrap_or_default());
            }
        }

        tracing::debug!(%severity, "Default outputs cache miss, fetching from directory.");
        let mut by_severity: HashMap<Severity, Vec<String>> = HashMap::new();
        for defaults in self.directory.get_default_outputs().await? {
            by_severity.entry(defaults.severity).or_default().extend(defaults.output_ids);
        }
        let ids = by_severity.get(&severity).cloned().unwrap_or_default();
        *self.defaults.write().await = Some(CachedDefaults { by_severity, fetched_at: now });
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::{
        models::DefaultOutputs,
        outputs::MockOutputsDirectory,
        test_helpers::{ManualClock, OutputBuilder},
    };

    const TTL: Duration = Duration::from_secs(300);

    fn cache(directory: MockOutputsDirectory, clock: Arc<ManualClock>) -> OutputCache {
        OutputCache::new(Arc::new(directory), clock, TTL)
    }

    #[tokio::test]
    async fn test_get_output_is_cached_until_ttl() {
        let clock = Arc::new(ManualClock::default());
        let mut directory = MockOutputsDirectory::new();
        directory
            .expect_get_output()
            .with(eq("o1"))
            .times(2)
            .returning(|id| Ok(OutputBuilder::slack(id).build()));
        let cache = cache(directory, clock.clone());

        cache.get_output("o1").await.unwrap();
        clock.advance(Duration::from_secs(299));
        let output = cache.get_output("o1").await.unwrap();
        assert_eq!(output.output_id, "o1");

        // Stale after the TTL, refetched exactly once.
        clock.advance(Duration::from_secs(1));
        cache.get_output("o1").await.unwrap();
        cache.get_output("o1").await.unwrap();
    }

    #[tokio::test]
    async fn test_get_output_errors_are_not_cached() {
        let clock = Arc::new(ManualClock::default());
        let mut directory = MockOutputsDirectory::new();
        let mut seq = mockall::Sequence::new();
        directory
            .expect_get_output()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(OutputsError::Unavailable("timeout".into())));
        directory
            .expect_get_output()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|id| Ok(OutputBuilder::slack(id).build()));
        let cache = cache(directory, clock);

        assert!(cache.get_output("o1").await.is_err());
        assert!(cache.get_output("o1").await.is_ok());
    }

    #[tokio::test]
    async fn test_default_outputs_are_indexed_by_severity() {
        let clock = Arc::new(ManualClock::default());
        let mut directory = MockOutputsDirectory::new();
        directory.expect_get_default_outputs().times(1).returning(|| {
            Ok(vec![
                DefaultOutputs { severity: Severity::High, output_ids: vec!["o1".into()] },
                DefaultOutputs { severity: Severity::Critical, output_ids: vec!["o1".into(), "o2".into()] },
            ])
        });
        let cache = cache(directory, clock);

        assert_eq!(cache.get_default_output_ids(Severity::High).await.unwrap(), vec!["o1"]);
        assert_eq!(
            cache.get_default_output_ids(Severity::Critical).await.unwrap(),
            vec!["o1", "o2"]
        );
        assert!(cache.get_default_output_ids(Severity::Info).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_default_outputs_refresh_when_stale() {
        let clock = Arc::new(ManualClock::default());
        let mut directory = MockOutputsDirectory::new();
        let mut seq = mockall::Sequence::new();
        directory.expect_get_default_outputs().times(1).in_sequence(&mut seq).returning(|| {
            Ok(vec![DefaultOutputs { severity: Severity::Low, output_ids: vec!["old".into()] }])
        });
        directory.expect_get_default_outputs().times(1).in_sequence(&mut seq).returning(|| {
            Ok(vec![DefaultOutputs { severity: Severity::Low, output_ids: vec!["new".into()] }])
        });
        let cache = cache(directory, clock.clone());

        assert_eq!(cache.get_default_output_ids(Severity::Low).await.unwrap(), vec!["old"]);
        clock.advance(Duration::from_secs(60));
        assert_eq!(cache.get_default_output_ids(Severity::Low).await.unwrap(), vec!["old"]);
        clock.advance(TTL);
        assert_eq!(cache.get_default_output_ids(Severity::Low).await.unwrap(), vec!["new"]);
    }

    #[tokio::test]
    async fn test_default_outputs_failure_is_returned() {
        let clock = Arc::new(ManualClock::default());
        let mut directory = MockOutputsDirectory::new();
        directory
            .expect_get_default_outputs()
            .returning(|| Err(OutputsError::Unavailable("503".into())));
        let cache = cache(directory, clock);

        assert!(matches!(
            cache.get_default_output_ids(Severity::High).await,
            Err(OutputsError::Unavailable(_))
        ));
    }
}
