//! # Background Job Record
//!
//! The unit of background work: one row in the job store, partitioned by
//! logical queue name. Jobs are created by the application's enqueue path and
//! destroyed only by the terminal-record flush; the health engine and retry
//! orchestrator read and transition them, never create or hard-delete them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle states of a background job.
///
/// `pending -> processing -> {completed | failed}`, with
/// `failed -> retrying -> pending` while attempts remain. "Stuck" is a
/// derived condition over `Processing` (see [`Job::is_stuck`]), never a
/// stored status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting in a queue for a worker
    Pending,
    /// Claimed by a worker and executing
    Processing,
    /// Finished successfully
    Completed,
    /// Execution returned an error
    Failed,
    /// Selected for retry, about to be re-enqueued
    Retrying,
}

impl JobStatus {
    /// Stable string form used in the job store and in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Retrying => "retrying",
        }
    }

    /// Check if a job in this status has left the queue for good
    /// (ignoring the attempts counter; see [`Job::is_terminal`]).
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Check if a worker currently holds this job
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Processing)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "retrying" => Ok(Self::Retrying),
            _ => Err(format!("Invalid job status: {s}")),
        }
    }
}

/// A background job record.
///
/// The payload is opaque to this subsystem; workers interpret it. Timestamps
/// follow the lifecycle: `started_at` is set when a worker claims the job,
/// `finished_at` only on a terminal transition (`completed` or `failed`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    /// Logical queue name, the partitioning key for backlog accounting
    pub queue: String,
    /// Opaque work description consumed by workers
    pub payload: serde_json::Value,
    pub status: JobStatus,
    /// Completed execution attempts; invariant `attempts <= max_attempts`
    pub attempts: i32,
    pub max_attempts: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Present only while `status == failed`
    pub last_error: Option<String>,
}

impl Job {
    /// Create a new pending job for the given queue.
    pub fn new(queue: impl Into<String>, max_attempts: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            queue: queue.into(),
            payload: serde_json::Value::Null,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            last_error: None,
        }
    }

    /// Attach a payload to a freshly built job.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Execution duration, defined only for completed jobs.
    pub fn duration(&self) -> Option<Duration> {
        if self.status != JobStatus::Completed {
            return None;
        }
        match (self.started_at, self.finished_at) {
            (Some(started), Some(finished)) => Some(finished - started),
            _ => None,
        }
    }

    /// A job is stuck when a worker has held it longer than the configured
    /// threshold, strongly suggesting a crashed or hung worker.
    pub fn is_stuck(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.status == JobStatus::Processing
            && self
                .started_at
                .map(|started| now - started > threshold)
                .unwrap_or(false)
    }

    /// A failed job that has exhausted its attempts is dead-lettered:
    /// permanently excluded from automatic retry.
    pub fn is_dead_lettered(&self) -> bool {
        self.status == JobStatus::Failed && self.attempts >= self.max_attempts
    }

    /// Check if the retry orchestrator may still pick this job up
    /// (failed with attempts remaining; the age window is policy, not state).
    pub fn can_retry(&self) -> bool {
        self.status == JobStatus::Failed && self.attempts < self.max_attempts
    }

    /// Terminal jobs never transition again: completed, or dead-lettered.
    pub fn is_terminal(&self) -> bool {
        self.status == JobStatus::Completed || self.is_dead_lettered()
    }

    /// Anchor timestamp for failure windows: when the job failed, or when it
    /// was created if it never started.
    pub fn failed_reference_time(&self) -> DateTime<Utc> {
        self.finished_at.unwrap_or(self.created_at)
    }
}
