//! The Supervisor module manages the lifecycle of the tripwire workers.
//!
//! The `SupervisorBuilder` wires the merge engine, the delivery stage and
//! their queues from the application configuration. The `Supervisor` then
//! runs the queue workers side by side, listens for shutdown signals
//! (Ctrl+C or SIGTERM) and makes sure a worker that dies takes the others
//! down with it instead of leaving the process half-functional.

mod builder;

use std::sync::Arc;

pub use builder::SupervisorBuilder;
use thiserror::Error;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::{
    config::AppConfig,
    http_client::HttpClientPoolError,
    persistence::{PersistenceError, SqliteAlertStore},
    template::TemplateServiceError,
    workers::{DeliveryProcessor, MergeProcessor, QueueWorker},
};

/// Which workers a process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMode {
    /// Only the merge worker.
    Merge,
    /// Only the delivery worker.
    Deliver,
    /// Both workers in one process.
    All,
}

impl WorkerMode {
    pub fn runs_merge(self) -> bool {
        matches!(self, WorkerMode::Merge | WorkerMode::All)
    }

    pub fn runs_delivery(self) -> bool {
        matches!(self, WorkerMode::Deliver | WorkerMode::All)
    }
}

/// Represents the set of errors that can occur while building or running the
/// supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A required configuration was not provided to the `SupervisorBuilder`.
    #[error("Missing configuration for Supervisor")]
    MissingConfig,

    /// An error occurred due to an invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The alert store could not be opened or migrated.
    #[error("Alert store error: {0}")]
    Persistence(#[from] PersistenceError),

    /// The shared HTTP client could not be created.
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] HttpClientPoolError),

    /// The built-in message templates failed to load.
    #[error("Template error: {0}")]
    Template(#[from] TemplateServiceError),
}

/// The primary runtime manager for the application.
pub struct Supervisor {
    /// Shared application configuration.
    config: Arc<AppConfig>,

    /// The alert store, present when the merge worker runs.
    store: Option<Arc<SqliteAlertStore>>,

    merge_worker: Option<QueueWorker<MergeProcessor>>,

    delivery_worker: Option<QueueWorker<DeliveryProcessor>>,

    /// A token used to signal a graceful shutdown to all supervised tasks.
    cancellation_token: CancellationToken,

    /// A set of all spawned tasks that the supervisor is actively managing.
    join_set: tokio::task::JoinSet<()>,
}

impl Supervisor {
    pub(crate) fn new(
        config: AppConfig,
        store: Option<Arc<SqliteAlertStore>>,
        merge_worker: Option<QueueWorker<MergeProcessor>>,
        delivery_worker: Option<QueueWorker<DeliveryProcessor>>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            merge_worker,
            delivery_worker,
            cancellation_token,
            join_set: tokio::task::JoinSet::new(),
        }
    }

    /// Returns a new `SupervisorBuilder` instance.
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }

    /// A token that stops the supervisor when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Starts the workers and runs until a shutdown signal arrives or a
    /// worker dies, then waits for in-flight batches and releases the store
    /// within the configured shutdown timeout.
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        let cancellation_token = self.cancellation_token.clone();

        // Spawn a task to listen for shutdown signals.
        self.join_set.spawn(async move {
            let ctrl_c = signal::ctrl_c();
            #[cfg(unix)]
            let terminate = async {
                signal::unix::signal(signal::unix::SignalKind::terminate())
                    .expect("Failed to register SIGTERM handler")
                    .recv()
                    .await;
            };
            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => tracing::info!("SIGINT (Ctrl+C) received, initiating graceful shutdown."),
                _ = terminate => tracing::info!("SIGTERM received, initiating graceful shutdown."),
                _ = cancellation_token.cancelled() => {}
            }

            cancellation_token.cancel();
        });

        let mut workers = 0;
        if let Some(worker) = self.merge_worker.take() {
            self.join_set.spawn(worker.run());
            workers += 1;
        }
        if let Some(worker) = self.delivery_worker.take() {
            self.join_set.spawn(worker.run());
            workers += 1;
        }
        tracing::info!(workers, "Supervisor started.");

        loop {
            tokio::select! {
                maybe_result = self.join_set.join_next() => {
                    match maybe_result {
                        Some(Ok(())) => {
                            if !self.cancellation_token.is_cancelled() {
                                tracing::error!("A worker stopped unexpectedly. Initiating shutdown.");
                                self.cancellation_token.cancel();
                            }
                        }
                        Some(Err(e)) => {
                            tracing::error!("A critical task failed: {:?}. Initiating shutdown.", e);
                            self.cancellation_token.cancel();
                        }
                        None => break,
                    }
                }
                _ = self.cancellation_token.cancelled() => break,
            }
        }

        // --- Graceful Shutdown ---
        let shutdown_timeout = self.config.shutdown_timeout;
        let cleanup_logic = async {
            while let Some(result) = self.join_set.join_next().await {
                if let Err(e) = result {
                    tracing::error!("A task failed during shutdown: {:?}", e);
                }
            }
            tracing::info!("All supervised tasks have completed.");

            if let Some(store) = &self.store {
                store.close().await;
            }
        };

        if tokio::time::timeout(shutdown_timeout, cleanup_logic).await.is_err() {
            tracing::warn!(
                "Cleanup did not complete within the timeout of {:?}. Continuing shutdown.",
                shutdown_timeout
            );
            self.join_set.abort_all();
        } else {
            tracing::info!("Cleanup completed successfully.");
        }

        tracing::info!("Supervisor shutdown complete.");
        Ok(())
    }
}
