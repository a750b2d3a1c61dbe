//! Shared fixtures: job factories, a seeded in-memory store, and recording
//! collaborator fakes.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tasklight_queue::error::Result;
use tasklight_queue::models::{Job, JobStatus};
use tasklight_queue::services::{ReminderRunReport, ReminderService, WorkerPool};
use tasklight_queue::store::InMemoryJobStore;

pub fn pending_job(queue: &str) -> Job {
    Job::new(queue, 3)
}

pub fn processing_job(queue: &str, started_minutes_ago: i64) -> Job {
    let mut job = Job::new(queue, 3);
    job.status = JobStatus::Processing;
    job.started_at = Some(Utc::now() - Duration::minutes(started_minutes_ago));
    job
}

pub fn completed_job(queue: &str, duration_seconds: i64, finished_minutes_ago: i64) -> Job {
    let mut job = Job::new(queue, 3);
    let finished = Utc::now() - Duration::minutes(finished_minutes_ago);
    job.status = JobStatus::Completed;
    job.started_at = Some(finished - Duration::seconds(duration_seconds));
    job.finished_at = Some(finished);
    job
}

pub fn failed_job(queue: &str, attempts: i32, max_attempts: i32, failed_minutes_ago: i64) -> Job {
    let mut job = Job::new(queue, max_attempts);
    let finished = Utc::now() - Duration::minutes(failed_minutes_ago);
    job.status = JobStatus::Failed;
    job.attempts = attempts;
    job.started_at = Some(finished - Duration::seconds(30));
    job.finished_at = Some(finished);
    job.last_error = Some("worker raised".to_string());
    job
}

pub fn retrying_job(queue: &str, attempts: i32) -> Job {
    let mut job = Job::new(queue, 3);
    job.status = JobStatus::Retrying;
    job.attempts = attempts;
    job
}

pub fn store_with(jobs: Vec<Job>) -> Arc<InMemoryJobStore> {
    let store = Arc::new(InMemoryJobStore::new());
    for job in jobs {
        store.insert(job);
    }
    store
}

/// Reminder collaborator fake counting invocations.
#[derive(Default)]
pub struct RecordingReminderService {
    pub calls: AtomicU64,
}

#[async_trait]
impl ReminderService for RecordingReminderService {
    async fn process_due(&self) -> Result<ReminderRunReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ReminderRunReport { dispatched: 1 })
    }
}

/// Worker-pool fake recording restart signals.
#[derive(Default)]
pub struct RecordingWorkerPool {
    pub restarts: Mutex<Vec<chrono::DateTime<Utc>>>,
}

#[async_trait]
impl WorkerPool for RecordingWorkerPool {
    async fn restart(&self) -> Result<()> {
        self.restarts.lock().push(Utc::now());
        Ok(())
    }
}
