//! Postgres job store.
//!
//! ## Expected schema
//!
//! The store works against the application's `jobs` table (owned by the queue
//! transport, not this subsystem) and expects:
//!
//! ```sql
//! CREATE TABLE jobs (
//!     id           UUID PRIMARY KEY,
//!     queue        TEXT NOT NULL,
//!     payload      JSONB NOT NULL DEFAULT '{}',
//!     status       TEXT NOT NULL,
//!     attempts     INTEGER NOT NULL DEFAULT 0,
//!     max_attempts INTEGER NOT NULL,
//!     created_at   TIMESTAMPTZ NOT NULL,
//!     started_at   TIMESTAMPTZ,
//!     finished_at  TIMESTAMPTZ,
//!     last_error   TEXT
//! );
//! ```
//!
//! ## Query discipline
//!
//! Every read is one aggregate statement (`count(*) FILTER` / `GROUP BY`), so
//! the counts inside a result are a consistent snapshot rather than a sum of
//! independently-timed queries. Every transition is a single `UPDATE` guarded
//! by the expected current status, with `rows_affected` as the win/lose
//! signal, so concurrent orchestrator instances cannot both win a job.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use super::{FailedCounts, JobStore, QueueCounts, StatusCounts};
use crate::config::DatabaseConfig;
use crate::error::{QueueError, Result};
use crate::models::{Job, JobStatus};

#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

/// Raw row shape; status is stored as text and parsed through
/// [`JobStatus`]'s `FromStr`.
#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    queue: String,
    payload: serde_json::Value,
    status: String,
    attempts: i32,
    max_attempts: i32,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let status: JobStatus = self
            .status
            .parse()
            .map_err(|e: String| QueueError::database("decode", e))?;
        Ok(Job {
            id: self.id,
            queue: self.queue,
            payload: self.payload,
            status,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            last_error: self.last_error,
        })
    }
}

const JOB_COLUMNS: &str =
    "id, queue, payload, status, attempts, max_attempts, created_at, started_at, finished_at, last_error";

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool from configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(config.connect_timeout())
            .connect(&config.url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn queue_counts(&self) -> Result<Vec<QueueCounts>> {
        let counts = sqlx::query_as::<_, QueueCounts>(
            r"
            SELECT queue,
                   count(*) FILTER (WHERE status = 'pending')    AS pending,
                   count(*) FILTER (WHERE status = 'processing') AS processing
            FROM jobs
            WHERE status IN ('pending', 'processing')
            GROUP BY queue
            ORDER BY queue
            ",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }

    async fn status_counts(
        &self,
        now: DateTime<Utc>,
        stuck_threshold: Duration,
    ) -> Result<StatusCounts> {
        let stuck_cutoff = now - stuck_threshold;
        let counts = sqlx::query_as::<_, StatusCounts>(
            r"
            SELECT count(*) FILTER (WHERE status = 'pending')    AS pending,
                   count(*) FILTER (WHERE status = 'processing') AS processing,
                   count(*) FILTER (WHERE status = 'completed')  AS completed,
                   count(*) FILTER (WHERE status = 'failed')     AS failed,
                   count(*) FILTER (WHERE status = 'retrying')   AS retrying,
                   count(*) FILTER (WHERE status = 'processing'
                                      AND started_at IS NOT NULL
                                      AND started_at < $1)       AS stuck
            FROM jobs
            ",
        )
        .bind(stuck_cutoff)
        .fetch_one(&self.pool)
        .await?;
        Ok(counts)
    }

    async fn failed_counts(&self, now: DateTime<Utc>) -> Result<FailedCounts> {
        let counts = sqlx::query_as::<_, FailedCounts>(
            r"
            SELECT count(*) AS total,
                   count(*) FILTER (WHERE coalesce(finished_at, created_at) > $1) AS recent_24h,
                   count(*) FILTER (WHERE coalesce(finished_at, created_at) > $2) AS recent_1h
            FROM jobs
            WHERE status = 'failed'
            ",
        )
        .bind(now - Duration::hours(24))
        .bind(now - Duration::hours(1))
        .fetch_one(&self.pool)
        .await?;
        Ok(counts)
    }

    async fn completed_durations_since(&self, since: DateTime<Utc>) -> Result<Vec<f64>> {
        let durations = sqlx::query_scalar::<_, f64>(
            r"
            SELECT extract(epoch FROM (finished_at - started_at))::float8 AS duration
            FROM jobs
            WHERE status = 'completed'
              AND started_at IS NOT NULL
              AND finished_at > $1
            ORDER BY duration
            ",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(durations)
    }

    async fn failed_eligible(
        &self,
        now: DateTime<Utc>,
        window: Duration,
        limit: i64,
    ) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            r"
            SELECT {JOB_COLUMNS}
            FROM jobs
            WHERE status = 'failed'
              AND attempts < max_attempts
              AND coalesce(finished_at, created_at) > $1
            ORDER BY coalesce(finished_at, created_at)
            LIMIT $2
            "
        ))
        .bind(now - window)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn begin_retry(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE jobs
            SET status = 'retrying', attempts = attempts + 1, last_error = NULL
            WHERE id = $1 AND status = 'failed' AND attempts < max_attempts
            ",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn requeue(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE jobs
            SET status = 'pending', started_at = NULL, finished_at = NULL
            WHERE id = $1 AND status = 'retrying'
            ",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn enqueue(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO jobs (id, queue, payload, status, attempts, max_attempts,
                              created_at, started_at, finished_at, last_error)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(job.id)
        .bind(&job.queue)
        .bind(&job.payload)
        .bind(job.status.as_str())
        .bind(job.attempts)
        .bind(job.max_attempts)
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(&job.last_error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn purge_terminal(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r"
            DELETE FROM jobs
            WHERE (status = 'completed'
                   OR (status = 'failed' AND attempts >= max_attempts))
              AND coalesce(finished_at, created_at) < $1
            ",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(JobRow::into_job).transpose()
    }
}
