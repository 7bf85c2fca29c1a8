//! Worker dispatcher.
//!
//! A dispatcher repeatedly claims one job, runs its handler and records the
//! result. Any number of dispatchers (tasks or processes) may share a store;
//! the claim guarantees each job runs on one of them at a time.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{Job, JobKind, JobStatus};

use super::handlers::{HandlerOutcome, JobHandlers};
use super::store::{Store, StoreError};

/// Dispatcher settings
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Sleep between polls when the queue is empty
    pub poll_interval: Duration,

    /// How long a claim is exclusive before other workers may take over
    pub lease: Duration,

    /// Only claim jobs of this kind
    pub kind_filter: Option<JobKind>,

    /// Name used in logs
    pub worker_id: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        let id = Uuid::new_v4().simple().to_string();
        Self {
            poll_interval: Duration::from_millis(500),
            lease: Duration::from_secs(600),
            kind_filter: None,
            worker_id: format!("worker-{}", &id[..8]),
        }
    }
}

/// Result of running one job
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,

    /// Set when the handler succeeded
    pub handler: Option<HandlerOutcome>,

    /// Set when the handler failed
    pub error: Option<String>,
}

/// Counters for one dispatcher run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    pub claimed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub idle_polls: usize,
}

impl DispatcherStats {
    fn record(&mut self, outcome: &JobOutcome) {
        self.claimed += 1;
        match outcome.status {
            JobStatus::Succeeded => self.succeeded += 1,
            JobStatus::Failed => self.failed += 1,
            _ => {}
        }
    }
}

pub struct Dispatcher {
    store: Arc<Store>,
    handlers: JobHandlers,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(store: Arc<Store>, handlers: JobHandlers, config: DispatcherConfig) -> Self {
        Self {
            store,
            handlers,
            config,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Claim and run a single job. Returns `None` when nothing is claimable.
    ///
    /// Handler errors end up on the job as `failed`; only store errors are
    /// returned.
    #[instrument(skip(self), fields(worker = %self.config.worker_id))]
    pub async fn run_once(&self) -> Result<Option<JobOutcome>> {
        let job = self
            .store
            .claim(self.config.kind_filter, self.config.lease)
            .context("Failed to claim job")?;
        let Some(job) = job else {
            return Ok(None);
        };

        info!(job_id = %job.id, kind = %job.kind, attempt = job.attempts, "Running job");
        let outcome = match self.handlers.handle(&job).await {
            Ok(handler_outcome) => self.finish(&job, Ok(handler_outcome)),
            Err(e) => {
                let message = format!("{:#}", e);
                error!(job_id = %job.id, kind = %job.kind, error = %message, "Job failed");
                self.finish(&job, Err(message))
            }
        };

        Ok(Some(outcome))
    }

    /// Record a handler result on the job
    fn finish(&self, job: &Job, result: Result<HandlerOutcome, String>) -> JobOutcome {
        let (recorded, handler, error) = match result {
            Ok(handler) => (self.store.ack(job), Some(handler), None),
            Err(message) => {
                let recorded = self.store.fail(job, &message);
                (recorded, None, Some(message))
            }
        };

        let status = match recorded {
            Ok(job) => {
                info!(job_id = %job.id, status = %job.status, "Job finished");
                job.status
            }
            Err(e @ StoreError::LeaseLost { .. }) => {
                // Another worker owns the job now; its result is the one that counts
                warn!(job_id = %job.id, error = %e, "Discarding result after lease loss");
                JobStatus::Running
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Could not record job result");
                if error.is_some() {
                    JobStatus::Failed
                } else {
                    JobStatus::Succeeded
                }
            }
        };

        JobOutcome {
            job_id: job.id,
            kind: job.kind,
            status,
            handler,
            error,
        }
    }

    /// Poll until `shutdown` flips to true (or its sender is dropped)
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> DispatcherStats {
        let mut stats = DispatcherStats::default();
        info!(
            worker = %self.config.worker_id,
            kind = ?self.config.kind_filter.map(|k| k.as_str()),
            "Worker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let idle = match self.run_once().await {
                Ok(Some(outcome)) => {
                    stats.record(&outcome);
                    false
                }
                Ok(None) => {
                    stats.idle_polls += 1;
                    true
                }
                Err(e) => {
                    error!(error = %format!("{:#}", e), "Worker poll failed");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        info!(
            worker = %self.config.worker_id,
            claimed = stats.claimed,
            succeeded = stats.succeeded,
            failed = stats.failed,
            "Worker stopped"
        );
        stats
    }

    /// Run up to `max_jobs` jobs, stopping early once the queue is empty
    pub async fn run_bounded(&self, max_jobs: usize) -> Result<DispatcherStats> {
        let mut stats = DispatcherStats::default();
        for _ in 0..max_jobs {
            match self.run_once().await? {
                Some(outcome) => stats.record(&outcome),
                None => {
                    stats.idle_polls += 1;
                    break;
                }
            }
        }
        Ok(stats)
    }

    /// Run on a background task until the handle is stopped
    pub fn spawn(self: Arc<Self>) -> WorkerHandle {
        let (shutdown, receiver) = watch::channel(false);
        let task = tokio::spawn(async move { self.run(receiver).await });
        WorkerHandle { shutdown, task }
    }
}

/// Handle to a spawned dispatcher
pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<DispatcherStats>,
}

impl WorkerHandle {
    /// Signal shutdown and wait for the current job to finish
    pub async fn stop(self) -> Result<DispatcherStats> {
        // The worker may already have exited; nothing to signal then
        let _ = self.shutdown.send(true);
        self.task.await.context("Worker task panicked")
    }
}
