//! # Health Engine
//!
//! ## Overview
//!
//! Read-only aggregation over the job store plus the explicit health decision
//! policy. Every operation takes a fresh snapshot at call time; nothing is
//! cached between calls, so a probe after a retry sweep sees the sweep's
//! effect immediately.
//!
//! ## Decision policy
//!
//! The verdict is explicit, not emergent: the queue system is unhealthy iff
//! any job is stuck, the trailing-hour failure count exceeds its ceiling, or
//! any single queue's pending backlog exceeds its ceiling. All three
//! thresholds come from [`HealthPolicy`]; the engine hard-codes nothing.
//!
//! ## Failure semantics
//!
//! If the job store is unreachable every method fails with
//! `QueueError::StoreUnavailable`. The engine performs no retries of its own
//! (the scheduler owns retry-next-tick) and never returns a partial snapshot.

use chrono::{Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::HealthPolicy;
use crate::error::Result;
use crate::store::{FailedCounts, JobStore, QueueCounts, StatusCounts};

use super::snapshot::{
    HealthSnapshot, HealthVerdict, PerformanceMetrics, QueueBacklog, TOTAL_QUEUE_KEY,
};

pub struct HealthEngine {
    store: Arc<dyn JobStore>,
    policy: HealthPolicy,
}

impl HealthEngine {
    pub fn new(store: Arc<dyn JobStore>, policy: HealthPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &HealthPolicy {
        &self.policy
    }

    /// Per-queue `{pending, processing}` backlog plus an aggregated `total`
    /// entry, from one grouped read.
    pub async fn queue_status(&self) -> Result<BTreeMap<String, QueueBacklog>> {
        let counts = self.store.queue_counts().await?;
        Ok(Self::backlog_map(&counts))
    }

    /// Global lifecycle-state counts, including the computed `stuck` count
    /// (processing longer than the configured threshold).
    pub async fn job_status_stats(&self) -> Result<StatusCounts> {
        self.store
            .status_counts(Utc::now(), self.policy.stuck_threshold())
            .await
    }

    /// Failed-job counts over the total history and the trailing 24h/1h
    /// windows, anchored on when each job failed.
    pub async fn failed_job_stats(&self) -> Result<FailedCounts> {
        self.store.failed_counts(Utc::now()).await
    }

    /// Latency metrics over jobs completed in the last 24 hours. All-zero
    /// when the window is empty.
    pub async fn performance_metrics(&self) -> Result<PerformanceMetrics> {
        let since = Utc::now() - Duration::hours(24);
        let durations = self.store.completed_durations_since(since).await?;
        Ok(PerformanceMetrics::from_durations(&durations))
    }

    /// The health decision with the reasons that failed it.
    pub async fn verdict(&self) -> Result<HealthVerdict> {
        let now = Utc::now();
        let stats = self
            .store
            .status_counts(now, self.policy.stuck_threshold())
            .await?;
        let failed = self.store.failed_counts(now).await?;
        let queues = self.store.queue_counts().await?;
        let verdict = evaluate(&self.policy, &stats, &failed, &queues);
        if !verdict.healthy {
            debug!(reasons = ?verdict.reasons, "queue health verdict: unhealthy");
        }
        Ok(verdict)
    }

    /// Single-boolean form of [`HealthEngine::verdict`].
    pub async fn is_healthy(&self) -> Result<bool> {
        Ok(self.verdict().await?.healthy)
    }

    /// Full snapshot for reporting: all four reads plus the verdict and a
    /// timestamp. Sections are individually consistent; treat the whole as
    /// approximate-as-of-call-time.
    pub async fn snapshot(&self) -> Result<HealthSnapshot> {
        let now = Utc::now();
        let queue_counts = self.store.queue_counts().await?;
        let job_stats = self
            .store
            .status_counts(now, self.policy.stuck_threshold())
            .await?;
        let failed_jobs = self.store.failed_counts(now).await?;
        let durations = self
            .store
            .completed_durations_since(now - Duration::hours(24))
            .await?;

        let verdict = evaluate(&self.policy, &job_stats, &failed_jobs, &queue_counts);

        Ok(HealthSnapshot {
            timestamp: now,
            queues: Self::backlog_map(&queue_counts),
            job_stats,
            failed_jobs,
            performance: PerformanceMetrics::from_durations(&durations),
            healthy: verdict.healthy,
        })
    }

    fn backlog_map(counts: &[QueueCounts]) -> BTreeMap<String, QueueBacklog> {
        let mut queues = BTreeMap::new();
        let mut total = QueueBacklog::default();
        for entry in counts {
            total.pending += entry.pending;
            total.processing += entry.processing;
            queues.insert(
                entry.queue.clone(),
                QueueBacklog {
                    pending: entry.pending,
                    processing: entry.processing,
                },
            );
        }
        queues.insert(TOTAL_QUEUE_KEY.to_string(), total);
        queues
    }
}

/// The explicit decision rule. Stuck jobs make the system unhealthy
/// regardless of every other metric.
fn evaluate(
    policy: &HealthPolicy,
    stats: &StatusCounts,
    failed: &FailedCounts,
    queues: &[QueueCounts],
) -> HealthVerdict {
    let mut reasons = Vec::new();

    if stats.stuck > 0 {
        reasons.push(format!("{} stuck job(s) in processing", stats.stuck));
    }
    if failed.recent_1h > policy.max_recent_failures_1h {
        reasons.push(format!(
            "{} failures in the last hour (ceiling {})",
            failed.recent_1h, policy.max_recent_failures_1h
        ));
    }
    for queue in queues {
        if queue.pending > policy.max_pending_per_queue {
            reasons.push(format!(
                "queue {} backlog {} exceeds ceiling {}",
                queue.queue, queue.pending, policy.max_pending_per_queue
            ));
        }
    }

    HealthVerdict {
        healthy: reasons.is_empty(),
        reasons,
    }
}
