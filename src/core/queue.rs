//! Idempotent job queue.
//!
//! Enqueue is pure deduplication on the idempotency key: the first caller
//! creates the row, everyone after gets that row back untouched. Claiming is
//! one conditional update inside an immediate transaction, so two workers
//! (threads or processes) can never both move the same job to `running`.

use std::time::Duration;

use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{Job, JobKind, JobStatus, NewJob};

use super::store::{from_ms, now_ms, Store, StoreError};

const JOB_COLUMNS: &str = "id, job_type, content_key, version, locale, slide_index, scope, format, \
     status, idempotency_key, error, attempts, lease_until_ms, created_at_ms, updated_at_ms";

/// Result of enqueueing a job
#[derive(Debug, Clone)]
pub enum EnqueueResult {
    /// A new row was created
    Queued(Job),

    /// A job with the same idempotency key already existed; returned unchanged
    AlreadyExists(Job),
}

impl EnqueueResult {
    /// The job row regardless of result type
    pub fn job(&self) -> &Job {
        match self {
            Self::Queued(job) | Self::AlreadyExists(job) => job,
        }
    }

    /// Check if this was a new enqueue
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Queued(_))
    }
}

/// Queue status summary
#[derive(Debug, Clone, Default)]
pub struct QueueStatus {
    pub queued: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub recent: Vec<Job>,
}

impl QueueStatus {
    /// Total jobs in the queue
    pub fn total(&self) -> usize {
        self.queued + self.running + self.succeeded + self.failed
    }
}

impl Store {
    /// Enqueue a job unless one with the same idempotency key exists
    pub fn enqueue(&self, new_job: NewJob) -> Result<EnqueueResult, StoreError> {
        let now = now_ms();
        let conn = self.conn();

        let inserted = conn.execute(
            "INSERT INTO jobs
                 (id, job_type, content_key, version, locale, slide_index, scope, format,
                  status, idempotency_key, attempts, created_at_ms, updated_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'queued', ?9, 0, ?10, ?10)
             ON CONFLICT (idempotency_key) DO NOTHING",
            params![
                Uuid::new_v4().to_string(),
                new_job.kind.as_str(),
                new_job.content_key,
                new_job.version,
                new_job.locale,
                new_job.slide_index,
                new_job.scope,
                new_job.format,
                new_job.idempotency_key,
                now,
            ],
        )?;

        let job = conn.query_row(
            &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE idempotency_key = ?1"),
            params![new_job.idempotency_key],
            job_from_row,
        )?;

        if inserted == 1 {
            info!(job_id = %job.id, kind = %job.kind, content_key = %job.content_key, "Job queued");
            Ok(EnqueueResult::Queued(job))
        } else {
            debug!(job_id = %job.id, status = %job.status, "Job already exists");
            Ok(EnqueueResult::AlreadyExists(job))
        }
    }

    /// Claim the oldest claimable job, optionally restricted to one kind.
    ///
    /// Claimable means `queued`, or `running` with a lease that has expired
    /// (its worker is presumed dead). The claim sets a fresh lease.
    pub fn claim(
        &self,
        kind: Option<JobKind>,
        lease: Duration,
    ) -> Result<Option<Job>, StoreError> {
        self.claim_at(kind, lease, now_ms())
    }

    /// [`Store::claim`] with an explicit clock, in epoch milliseconds
    pub fn claim_at(
        &self,
        kind: Option<JobKind>,
        lease: Duration,
        now: i64,
    ) -> Result<Option<Job>, StoreError> {
        let lease_ms = i64::try_from(lease.as_millis()).unwrap_or(i64::MAX);
        let lease_until = now.saturating_add(lease_ms);
        let kinds = match kind {
            Some(kind) => vec![kind.as_str()],
            None => JobKind::ALL.iter().map(JobKind::as_str).collect(),
        };
        // Only kinds this build can run are claimable
        let kind_list = kinds
            .iter()
            .map(|k| format!("'{}'", k))
            .collect::<Vec<_>>()
            .join(", ");

        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let job = tx
            .query_row(
                &format!(
                    "UPDATE jobs
                     SET status = 'running', lease_until_ms = ?1, attempts = attempts + 1,
                         updated_at_ms = ?2
                     WHERE id = (
                         SELECT id FROM jobs
                         WHERE job_type IN ({kind_list})
                           AND (status = 'queued'
                                OR (status = 'running' AND lease_until_ms <= ?2))
                         ORDER BY created_at_ms, rowid
                         LIMIT 1
                     )
                     AND (status = 'queued' OR (status = 'running' AND lease_until_ms <= ?2))
                     RETURNING {JOB_COLUMNS}"
                ),
                params![lease_until, now],
                job_from_row,
            )
            .optional()?;
        tx.commit()?;

        if let Some(job) = &job {
            if job.attempts > 1 {
                warn!(job_id = %job.id, kind = %job.kind, attempts = job.attempts, "Reclaimed job with expired lease");
            } else {
                debug!(job_id = %job.id, kind = %job.kind, "Claimed job");
            }
        }

        Ok(job)
    }

    /// Mark a claimed job as succeeded.
    ///
    /// `job` is the row returned by the claim. If the lease ran out and
    /// another worker has claimed the job since, this fails with
    /// [`StoreError::LeaseLost`] and the row is left alone.
    pub fn ack(&self, job: &Job) -> Result<Job, StoreError> {
        self.finish(job, JobStatus::Succeeded, None)
    }

    /// Mark a claimed job as failed. Failed jobs are not retried.
    pub fn fail(&self, job: &Job, message: &str) -> Result<Job, StoreError> {
        self.finish(job, JobStatus::Failed, Some(message))
    }

    fn finish(
        &self,
        claimed: &Job,
        to: JobStatus,
        error: Option<&str>,
    ) -> Result<Job, StoreError> {
        let id = claimed.id;
        let conn = self.conn();
        let updated = conn
            .query_row(
                &format!(
                    "UPDATE jobs
                     SET status = ?2, error = ?3, lease_until_ms = NULL, updated_at_ms = ?4
                     WHERE id = ?1 AND status = 'running' AND attempts = ?5
                     RETURNING {JOB_COLUMNS}"
                ),
                params![id.to_string(), to.as_str(), error, now_ms(), claimed.attempts],
                job_from_row,
            )
            .optional()?;

        if let Some(job) = updated {
            return Ok(job);
        }

        let current: Option<(String, i64)> = conn
            .query_row(
                "SELECT status, attempts FROM jobs WHERE id = ?1",
                params![id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        match current {
            None => Err(StoreError::NotFound(format!("job {}", id))),
            Some((_, attempts)) if attempts != claimed.attempts => Err(StoreError::LeaseLost {
                id,
                attempt: claimed.attempts,
            }),
            Some((status, _)) => Err(StoreError::InvalidTransition {
                id,
                from: parse_status(&status)?,
                to,
            }),
        }
    }

    pub fn get_job(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        let job = self
            .conn()
            .query_row(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
                params![id.to_string()],
                job_from_row,
            )
            .optional()?;
        Ok(job)
    }

    pub fn get_job_by_key(&self, idempotency_key: &str) -> Result<Option<Job>, StoreError> {
        let job = self
            .conn()
            .query_row(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE idempotency_key = ?1"),
                params![idempotency_key],
                job_from_row,
            )
            .optional()?;
        Ok(job)
    }

    /// Counts per status plus the five most recently touched jobs
    pub fn queue_status(&self) -> Result<QueueStatus, StoreError> {
        let conn = self.conn();
        let mut status = QueueStatus::default();

        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status")?;
        let counts = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        for (name, count) in counts {
            let count = usize::try_from(count).unwrap_or(0);
            match parse_status(&name)? {
                JobStatus::Queued => status.queued += count,
                JobStatus::Running => status.running += count,
                JobStatus::Succeeded => status.succeeded += count,
                JobStatus::Failed => status.failed += count,
            }
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs ORDER BY updated_at_ms DESC, rowid DESC LIMIT 5"
        ))?;
        status.recent = stmt
            .query_map([], job_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(status)
    }
}

fn parse_status(raw: &str) -> Result<JobStatus, StoreError> {
    raw.parse()
        .map_err(|_| StoreError::Corrupt(format!("job status '{}'", raw)))
}

fn conversion_error(column: usize, err: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        err.into(),
    )
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<Job> {
    let id: String = row.get(0)?;
    let kind: String = row.get(1)?;
    let status: String = row.get(8)?;
    let lease_until_ms: Option<i64> = row.get(12)?;

    Ok(Job {
        id: Uuid::parse_str(&id).map_err(|e| conversion_error(0, e.into()))?,
        kind: kind.parse().map_err(|e| conversion_error(1, e))?,
        content_key: row.get(2)?,
        version: row.get(3)?,
        locale: row.get(4)?,
        slide_index: row.get(5)?,
        scope: row.get(6)?,
        format: row.get(7)?,
        status: status.parse().map_err(|e| conversion_error(8, e))?,
        idempotency_key: row.get(9)?,
        error: row.get(10)?,
        attempts: row.get(11)?,
        lease_until: lease_until_ms.map(from_ms),
        created_at: from_ms(row.get(13)?),
        updated_at: from_ms(row.get(14)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEASE: Duration = Duration::from_secs(60);

    fn job(key: &str) -> NewJob {
        NewJob::new(JobKind::TranslateContent, "ch:1", 1, key).with_locale("es")
    }

    #[test]
    fn test_enqueue_new_job() {
        let store = Store::open_in_memory().unwrap();

        let result = store.enqueue(job("k1")).unwrap();

        assert!(result.is_new());
        assert_eq!(result.job().status, JobStatus::Queued);
        assert_eq!(result.job().attempts, 0);
        assert_eq!(store.queue_status().unwrap().queued, 1);
    }

    #[test]
    fn test_idempotent_enqueue() {
        let store = Store::open_in_memory().unwrap();

        let first = store.enqueue(job("k1")).unwrap();
        // Different descriptive fields, same key: still the same job
        let second = store
            .enqueue(NewJob::new(JobKind::BuildStoryPlan, "ch:2", 7, "k1"))
            .unwrap();

        assert!(first.is_new());
        assert!(!second.is_new());
        assert_eq!(first.job(), second.job());
        assert_eq!(store.queue_status().unwrap().total(), 1);
    }

    #[test]
    fn test_enqueue_does_not_touch_finished_job() {
        let store = Store::open_in_memory().unwrap();
        store.enqueue(job("k1")).unwrap();
        let claimed = store.claim(None, LEASE).unwrap().unwrap();
        store.fail(&claimed, "boom").unwrap();

        let again = store.enqueue(job("k1")).unwrap();

        assert!(!again.is_new());
        assert_eq!(again.job().status, JobStatus::Failed);
        assert_eq!(again.job().error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_claim_oldest_first_and_filter() {
        let store = Store::open_in_memory().unwrap();
        store.enqueue(job("a")).unwrap();
        store
            .enqueue(NewJob::new(JobKind::BuildBrailleExport, "ch:1", 1, "b").with_locale("en"))
            .unwrap();
        store.enqueue(job("c")).unwrap();

        let braille = store
            .claim(Some(JobKind::BuildBrailleExport), LEASE)
            .unwrap()
            .unwrap();
        assert_eq!(braille.idempotency_key, "b");
        assert_eq!(braille.status, JobStatus::Running);
        assert_eq!(braille.attempts, 1);
        assert!(braille.lease_until.is_some());

        let first = store.claim(None, LEASE).unwrap().unwrap();
        let second = store.claim(None, LEASE).unwrap().unwrap();
        assert_eq!(first.idempotency_key, "a");
        assert_eq!(second.idempotency_key, "c");
        assert!(store.claim(None, LEASE).unwrap().is_none());
    }

    #[test]
    fn test_state_transitions() {
        let store = Store::open_in_memory().unwrap();
        store.enqueue(job("k1")).unwrap();

        // Queued → Running → Succeeded
        let claimed = store.claim(None, LEASE).unwrap().unwrap();
        let done = store.ack(&claimed).unwrap();
        assert_eq!(done.status, JobStatus::Succeeded);
        assert!(done.lease_until.is_none());

        // Terminal jobs cannot move again
        let err = store.fail(&claimed, "late").unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidTransition {
                from: JobStatus::Succeeded,
                to: JobStatus::Failed,
                ..
            }
        ));
        let mut ghost = claimed.clone();
        ghost.id = Uuid::new_v4();
        assert!(store.ack(&ghost).unwrap_err().is_not_found());
    }

    #[test]
    fn test_ack_requires_running() {
        let store = Store::open_in_memory().unwrap();
        let queued = store.enqueue(job("k1")).unwrap().job().clone();

        let err = store.ack(&queued).unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidTransition {
                from: JobStatus::Queued,
                ..
            }
        ));
    }

    #[test]
    fn test_expired_lease_is_reclaimed() {
        let store = Store::open_in_memory().unwrap();
        store.enqueue(job("k1")).unwrap();

        let now = now_ms();
        let claimed = store.claim_at(None, LEASE, now).unwrap().unwrap();

        // Lease still valid: nothing to claim
        assert!(store.claim_at(None, LEASE, now + 1_000).unwrap().is_none());

        // Lease expired: same job comes back
        let reclaimed = store
            .claim_at(None, LEASE, now + 61_000)
            .unwrap()
            .unwrap();
        assert_eq!(reclaimed.id, claimed.id);
        assert_eq!(reclaimed.attempts, 2);
    }

    #[test]
    fn test_stale_worker_cannot_finish_reclaimed_job() {
        let store = Store::open_in_memory().unwrap();
        store.enqueue(job("k1")).unwrap();

        let now = now_ms();
        let stale = store.claim_at(None, LEASE, now).unwrap().unwrap();
        let fresh = store
            .claim_at(None, LEASE, now + 61_000)
            .unwrap()
            .unwrap();

        let err = store.fail(&stale, "timed out").unwrap_err();
        assert!(matches!(err, StoreError::LeaseLost { attempt: 1, .. }));
        let row = store.get_job(stale.id).unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Running);
        assert!(row.error.is_none());

        let done = store.ack(&fresh).unwrap();
        assert_eq!(done.status, JobStatus::Succeeded);

        // Still rejected once the job is finished
        assert!(matches!(
            store.ack(&stale).unwrap_err(),
            StoreError::LeaseLost { .. }
        ));
    }

    #[test]
    fn test_queue_status_counts() {
        let store = Store::open_in_memory().unwrap();
        for key in ["a", "b", "c"] {
            store.enqueue(job(key)).unwrap();
        }
        let claimed = store.claim(None, LEASE).unwrap().unwrap();
        store.fail(&claimed, "nope").unwrap();
        store.claim(None, LEASE).unwrap().unwrap();

        let status = store.queue_status().unwrap();
        assert_eq!(status.queued, 1);
        assert_eq!(status.running, 1);
        assert_eq!(status.failed, 1);
        assert_eq!(status.succeeded, 0);
        assert_eq!(status.total(), 3);
        assert_eq!(status.recent.len(), 3);
    }
}
