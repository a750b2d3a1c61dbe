//! In-memory job store.
//!
//! A mutex-guarded map with the same compare-and-swap transition semantics as
//! the Postgres store. Backs the test suites and doubles as a store for
//! embedded setups that do not persist jobs. Outage injection
//! ([`InMemoryJobStore::set_unavailable`]) lets tests exercise the
//! `StoreUnavailable` propagation path without a database.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use super::{FailedCounts, JobStore, QueueCounts, StatusCounts};
use crate::error::{QueueError, Result};
use crate::models::{Job, JobStatus};

#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<Uuid, Job>>,
    unavailable: AtomicBool,
    poisoned: Mutex<HashSet<Uuid>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a job in any lifecycle state, bypassing the enqueue path.
    /// Fixture affordance for seeding snapshots.
    pub fn insert(&self, job: Job) {
        self.jobs.lock().insert(job.id, job);
    }

    /// Simulate the store being unreachable: every subsequent call fails
    /// with `StoreUnavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make transitions on one specific job fail with a database error,
    /// for exercising per-item failure handling in batch runs.
    pub fn poison(&self, id: Uuid) {
        self.poisoned.lock().insert(id);
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(QueueError::store_unavailable(
                "in-memory store marked unavailable",
            ))
        } else {
            Ok(())
        }
    }

    fn check_poisoned(&self, id: Uuid) -> Result<()> {
        if self.poisoned.lock().contains(&id) {
            Err(QueueError::database(
                "update",
                format!("injected failure for job {id}"),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn queue_counts(&self) -> Result<Vec<QueueCounts>> {
        self.check_available()?;
        let jobs = self.jobs.lock();
        let mut by_queue: HashMap<&str, (i64, i64)> = HashMap::new();
        for job in jobs.values() {
            match job.status {
                JobStatus::Pending => by_queue.entry(job.queue.as_str()).or_default().0 += 1,
                JobStatus::Processing => by_queue.entry(job.queue.as_str()).or_default().1 += 1,
                _ => {}
            }
        }
        let mut counts: Vec<QueueCounts> = by_queue
            .into_iter()
            .map(|(queue, (pending, processing))| QueueCounts {
                queue: queue.to_string(),
                pending,
                processing,
            })
            .collect();
        counts.sort_by(|a, b| a.queue.cmp(&b.queue));
        Ok(counts)
    }

    async fn status_counts(
        &self,
        now: DateTime<Utc>,
        stuck_threshold: Duration,
    ) -> Result<StatusCounts> {
        self.check_available()?;
        let jobs = self.jobs.lock();
        let mut counts = StatusCounts::default();
        for job in jobs.values() {
            match job.status {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
                JobStatus::Retrying => counts.retrying += 1,
            }
            if job.is_stuck(now, stuck_threshold) {
                counts.stuck += 1;
            }
        }
        Ok(counts)
    }

    async fn failed_counts(&self, now: DateTime<Utc>) -> Result<FailedCounts> {
        self.check_available()?;
        let jobs = self.jobs.lock();
        let mut counts = FailedCounts::default();
        for job in jobs.values().filter(|j| j.status == JobStatus::Failed) {
            counts.total += 1;
            let reference = job.failed_reference_time();
            if now - reference < Duration::hours(24) {
                counts.recent_24h += 1;
            }
            if now - reference < Duration::hours(1) {
                counts.recent_1h += 1;
            }
        }
        Ok(counts)
    }

    async fn completed_durations_since(&self, since: DateTime<Utc>) -> Result<Vec<f64>> {
        self.check_available()?;
        let jobs = self.jobs.lock();
        let mut durations: Vec<f64> = jobs
            .values()
            .filter(|j| {
                j.status == JobStatus::Completed
                    && j.finished_at.map(|f| f > since).unwrap_or(false)
            })
            .filter_map(|j| j.duration())
            .map(|d| d.num_milliseconds() as f64 / 1000.0)
            .collect();
        durations.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        Ok(durations)
    }

    async fn failed_eligible(
        &self,
        now: DateTime<Utc>,
        window: Duration,
        limit: i64,
    ) -> Result<Vec<Job>> {
        self.check_available()?;
        let jobs = self.jobs.lock();
        let mut eligible: Vec<Job> = jobs
            .values()
            .filter(|j| j.can_retry() && now - j.failed_reference_time() < window)
            .cloned()
            .collect();
        eligible.sort_by_key(Job::failed_reference_time);
        eligible.truncate(limit.max(0) as usize);
        Ok(eligible)
    }

    async fn begin_retry(&self, id: Uuid) -> Result<bool> {
        self.check_available()?;
        self.check_poisoned(id)?;
        let mut jobs = self.jobs.lock();
        match jobs.get_mut(&id) {
            Some(job) if job.can_retry() => {
                job.status = JobStatus::Retrying;
                job.attempts += 1;
                job.last_error = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn requeue(&self, id: Uuid) -> Result<bool> {
        self.check_available()?;
        self.check_poisoned(id)?;
        let mut jobs = self.jobs.lock();
        match jobs.get_mut(&id) {
            Some(job) if job.status == JobStatus::Retrying => {
                job.status = JobStatus::Pending;
                job.started_at = None;
                job.finished_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn enqueue(&self, job: &Job) -> Result<()> {
        self.check_available()?;
        self.jobs.lock().insert(job.id, job.clone());
        Ok(())
    }

    async fn purge_terminal(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.check_available()?;
        let mut jobs = self.jobs.lock();
        let before = jobs.len();
        jobs.retain(|_, job| !(job.is_terminal() && job.failed_reference_time() < cutoff));
        Ok((before - jobs.len()) as u64)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Job>> {
        self.check_available()?;
        Ok(self.jobs.lock().get(&id).cloned())
    }
}
