//! # Retry Orchestrator
//!
//! Selects eligible failed jobs and re-enqueues them under the bounded
//! attempts policy. The transition is a compare-and-swap on status
//! (`failed -> retrying -> pending`), never a blind update, so concurrent
//! orchestrator instances sweeping the same jobs cannot double-increment the
//! attempts counter: re-invoking retry on a job that is already `retrying`
//! or back in `pending` is a skip, not a duplicate.
//!
//! Dead-lettered failures (attempts exhausted) and failures older than the
//! configured retry window are excluded up front; resurrecting stale work is
//! worse than alerting on it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::error::Result;
use crate::models::Job;
use crate::store::JobStore;

/// Outcome of retrying one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryOutcome {
    /// The job went back to `pending` through the enqueue path
    Requeued,
    /// The job was not retried, with the cause
    Skipped(SkipCause),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipCause {
    /// Attempts exhausted; the job is dead-lettered
    Exhausted,
    /// The job is no longer in `failed` (a worker or another instance moved it)
    NotFailed,
    /// Another orchestrator instance won the transition race
    LostRace,
}

/// Counts from one batch retry run. Individual job failures never abort the
/// batch; they land in `failed` and the sweep continues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryRunReport {
    pub attempted: u64,
    pub succeeded: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl fmt::Display for RetryRunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempted={} succeeded={} skipped={} failed={}",
            self.attempted, self.succeeded, self.skipped, self.failed
        )
    }
}

pub struct RetryOrchestrator {
    store: Arc<dyn JobStore>,
    policy: RetryPolicy,
}

impl RetryOrchestrator {
    pub fn new(store: Arc<dyn JobStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Jobs currently eligible for retry: failed, attempts remaining, and
    /// failure within the retry window.
    pub async fn retry_eligible(&self) -> Result<Vec<Job>> {
        self.store
            .failed_eligible(Utc::now(), self.policy.retry_window(), self.policy.batch_limit)
            .await
    }

    /// Retry a single job. Idempotent under at-least-once invocation: the
    /// status CAS decides the winner, and losers report a skip.
    pub async fn retry(&self, job: &Job) -> Result<RetryOutcome> {
        if job.is_dead_lettered() {
            return Ok(RetryOutcome::Skipped(SkipCause::Exhausted));
        }
        if !job.can_retry() {
            return Ok(RetryOutcome::Skipped(SkipCause::NotFailed));
        }

        if !self.store.begin_retry(job.id).await? {
            return Ok(RetryOutcome::Skipped(SkipCause::LostRace));
        }
        if !self.store.requeue(job.id).await? {
            // Someone moved the job between our two transitions. The attempts
            // increment already happened exactly once, so this is a skip.
            return Ok(RetryOutcome::Skipped(SkipCause::LostRace));
        }

        debug!(job_id = %job.id, queue = %job.queue, attempts = job.attempts + 1, "job re-enqueued for retry");
        Ok(RetryOutcome::Requeued)
    }

    /// One batch sweep over the eligible set.
    pub async fn run(&self) -> Result<RetryRunReport> {
        let eligible = self.retry_eligible().await?;
        let mut report = RetryRunReport::default();

        for job in &eligible {
            report.attempted += 1;
            match self.retry(job).await {
                Ok(RetryOutcome::Requeued) => report.succeeded += 1,
                Ok(RetryOutcome::Skipped(cause)) => {
                    report.skipped += 1;
                    debug!(job_id = %job.id, cause = ?cause, "retry skipped");
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(job_id = %job.id, error = %err, "retry failed");
                }
            }
        }

        Ok(report)
    }
}
