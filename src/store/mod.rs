//! # Job Store Collaborator
//!
//! ## Overview
//!
//! The job store is the one shared mutable collaborator in the subsystem: the
//! persistent table of job records the queue transport works against. This
//! module defines the narrow seam the health engine, retry orchestrator, and
//! scheduled tasks consume, so every component is testable against the
//! in-memory implementation and runs in production against Postgres.
//!
//! ## Consistency contract
//!
//! Read operations back a *snapshot*: each call is a single bounded query, so
//! the numbers inside one result are mutually consistent, while numbers across
//! two calls may see concurrent transitions in between. Callers treat them as
//! approximate-as-of-call-time.
//!
//! Write operations are compare-and-swap on status: two orchestrator
//! instances racing on the same job cannot both win a transition, which is
//! what keeps the retry attempts counter exact under at-least-once invocation.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::models::Job;

pub use memory::InMemoryJobStore;
pub use postgres::PgJobStore;

/// Per-queue backlog counts from one grouped read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct QueueCounts {
    pub queue: String,
    pub pending: i64,
    pub processing: i64,
}

/// Global lifecycle-state counts from one read. `stuck` is computed inside
/// the same statement (processing jobs started before the threshold cutoff),
/// never stored; stuck jobs are also included in `processing`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StatusCounts {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub retrying: i64,
    pub stuck: i64,
}

/// Failed-job counts over rolling windows, anchored on when the job failed
/// (or was created, if it never started).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FailedCounts {
    pub total: i64,
    pub recent_24h: i64,
    pub recent_1h: i64,
}

/// Persistent store of job records.
///
/// Every method is one atomic operation against the store; implementations
/// must not split a read into independently-timed sub-queries.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Per-queue pending/processing counts, ordered by queue name.
    async fn queue_counts(&self) -> Result<Vec<QueueCounts>>;

    /// Global lifecycle-state counts. `stuck_threshold` controls which
    /// processing jobs are counted as stuck relative to `now`.
    async fn status_counts(
        &self,
        now: DateTime<Utc>,
        stuck_threshold: Duration,
    ) -> Result<StatusCounts>;

    /// Failed-job totals over the trailing 24 hours and hour.
    async fn failed_counts(&self, now: DateTime<Utc>) -> Result<FailedCounts>;

    /// Durations (seconds) of jobs completed after `since`.
    async fn completed_durations_since(&self, since: DateTime<Utc>) -> Result<Vec<f64>>;

    /// Failed jobs still eligible for retry: attempts remaining and failure
    /// no older than `window`, oldest first, at most `limit`.
    async fn failed_eligible(
        &self,
        now: DateTime<Utc>,
        window: Duration,
        limit: i64,
    ) -> Result<Vec<Job>>;

    /// CAS `failed -> retrying`, incrementing attempts and clearing the error,
    /// in one atomic statement. Returns `false` when the job is no longer an
    /// eligible failed row (already retried, exhausted, or raced).
    async fn begin_retry(&self, id: Uuid) -> Result<bool>;

    /// CAS `retrying -> pending`: the hand-back to the store's enqueue path.
    /// Returns `false` if the job was not in `retrying`.
    async fn requeue(&self, id: Uuid) -> Result<bool>;

    /// The store's enqueue path. Not used by the engine or orchestrator;
    /// exposed for the scheduler's dispatch adapters and for fixtures.
    async fn enqueue(&self, job: &Job) -> Result<()>;

    /// Delete terminal records (completed, or dead-lettered failures) whose
    /// reference time is older than `cutoff`. Returns the purged count.
    async fn purge_terminal(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Fetch a single job by id.
    async fn fetch(&self, id: Uuid) -> Result<Option<Job>>;
}
