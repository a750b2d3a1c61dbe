//! External collaborators.
//!
//! The notification pipeline and the worker fleet live outside this
//! subsystem; the scheduler only governs *when* they are invoked. Both are
//! narrow trait seams with production adapters that ride the existing queue
//! infrastructure, so tests run against recording fakes and no content logic
//! leaks in here.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::models::Job;
use crate::store::JobStore;

/// Outcome of one reminder dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderRunReport {
    pub dispatched: u64,
}

/// The notification subsystem's reminder entry point.
#[async_trait]
pub trait ReminderService: Send + Sync {
    async fn process_due(&self) -> Result<ReminderRunReport>;
}

/// Production adapter: hands reminder processing to the notification workers
/// by dispatching the processing job onto their queue through the store's
/// enqueue path. Reminder selection and rendering stay with the workers.
pub struct QueueReminderService {
    store: Arc<dyn JobStore>,
    queue: String,
    max_attempts: i32,
}

impl QueueReminderService {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            queue: "notifications".to_string(),
            max_attempts: 3,
        }
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }
}

#[async_trait]
impl ReminderService for QueueReminderService {
    async fn process_due(&self) -> Result<ReminderRunReport> {
        let job = Job::new(self.queue.as_str(), self.max_attempts)
            .with_payload(json!({ "job": "notifications.process_reminders" }));
        self.store.enqueue(&job).await?;
        info!(queue = %self.queue, job_id = %job.id, "reminder processing dispatched");
        Ok(ReminderRunReport { dispatched: 1 })
    }
}

/// The worker fleet's restart seam.
#[async_trait]
pub trait WorkerPool: Send + Sync {
    /// Signal a rolling restart. Workers observe the signal and recycle
    /// after finishing their current job; nothing is interrupted mid-claim.
    async fn restart(&self) -> Result<()>;
}

/// Production adapter: records a fleet-visible restart timestamp. Workers
/// compare it against their boot time on each poll and exit when stale,
/// letting the process supervisor bring up fresh ones.
///
/// Expects:
///
/// ```sql
/// CREATE TABLE worker_signals (
///     name         TEXT PRIMARY KEY,
///     signalled_at TIMESTAMPTZ NOT NULL
/// );
/// ```
#[derive(Clone)]
pub struct PgWorkerPool {
    pool: sqlx::PgPool,
}

impl PgWorkerPool {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkerPool for PgWorkerPool {
    async fn restart(&self) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO worker_signals (name, signalled_at)
            VALUES ('restart', $1)
            ON CONFLICT (name) DO UPDATE SET signalled_at = EXCLUDED.signalled_at
            ",
        )
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        info!("worker restart signalled");
        Ok(())
    }
}
