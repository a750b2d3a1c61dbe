//! The registered task table.
//!
//! Wires the periodic work (reminder dispatch, health probe and report,
//! retry sweep, terminal-record flush, worker restart) to the engine,
//! orchestrator, store, and collaborator seams, and builds the standard
//! [`Schedule`] from configuration.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::error::{QueueError, Result};
use crate::health::HealthEngine;
use crate::retry::RetryOrchestrator;
use crate::services::{ReminderService, WorkerPool};
use crate::store::JobStore;

use super::coordinator::ScheduledTask;
use super::schedule::{Cadence, Schedule, TaskDescriptor};

pub const NOTIFICATION_REMINDERS: &str = "notification-reminders";
pub const QUEUE_HEALTH_PROBE: &str = "queue-health-probe";
pub const QUEUE_HEALTH_REPORT: &str = "queue-health-report";
pub const RETRY_FAILED_JOBS: &str = "retry-failed-jobs";
pub const FLUSH_TERMINAL_JOBS: &str = "flush-terminal-jobs";
pub const RESTART_WORKERS: &str = "restart-workers";

/// Dispatch due reminders through the notification collaborator.
pub struct ReminderDispatchTask {
    reminders: Arc<dyn ReminderService>,
}

impl ReminderDispatchTask {
    pub fn new(reminders: Arc<dyn ReminderService>) -> Self {
        Self { reminders }
    }
}

#[async_trait]
impl ScheduledTask for ReminderDispatchTask {
    async fn run(&self) -> Result<serde_json::Value> {
        let report = self.reminders.process_due().await?;
        Ok(json!({ "dispatched": report.dispatched }))
    }
}

/// Check-only health probe: succeeds quietly when healthy, fails (routing to
/// the alert channel) naming the violated thresholds when not.
pub struct HealthProbeTask {
    engine: Arc<HealthEngine>,
}

impl HealthProbeTask {
    pub fn new(engine: Arc<HealthEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl ScheduledTask for HealthProbeTask {
    async fn run(&self) -> Result<serde_json::Value> {
        let verdict = self.engine.verdict().await?;
        if verdict.healthy {
            Ok(json!({ "healthy": true }))
        } else {
            Err(QueueError::unhealthy(verdict.reasons.join("; ")))
        }
    }
}

/// Full snapshot appended to the report log via the success event.
pub struct HealthReportTask {
    engine: Arc<HealthEngine>,
}

impl HealthReportTask {
    pub fn new(engine: Arc<HealthEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl ScheduledTask for HealthReportTask {
    async fn run(&self) -> Result<serde_json::Value> {
        let snapshot = self.engine.snapshot().await?;
        Ok(serde_json::to_value(snapshot)?)
    }
}

/// Hourly retry sweep over eligible failed jobs.
pub struct RetrySweepTask {
    orchestrator: Arc<RetryOrchestrator>,
}

impl RetrySweepTask {
    pub fn new(orchestrator: Arc<RetryOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl ScheduledTask for RetrySweepTask {
    async fn run(&self) -> Result<serde_json::Value> {
        let report = self.orchestrator.run().await?;
        Ok(serde_json::to_value(report)?)
    }
}

/// Daily purge of terminal records past retention.
pub struct FlushTask {
    store: Arc<dyn JobStore>,
    retention: Duration,
}

impl FlushTask {
    pub fn new(store: Arc<dyn JobStore>, retention: Duration) -> Self {
        Self { store, retention }
    }
}

#[async_trait]
impl ScheduledTask for FlushTask {
    async fn run(&self) -> Result<serde_json::Value> {
        let cutoff = Utc::now() - self.retention;
        let purged = self.store.purge_terminal(cutoff).await?;
        Ok(json!({ "purged": purged }))
    }
}

/// Daily rolling worker restart signal.
pub struct WorkerRestartTask {
    pool: Arc<dyn WorkerPool>,
}

impl WorkerRestartTask {
    pub fn new(pool: Arc<dyn WorkerPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScheduledTask for WorkerRestartTask {
    async fn run(&self) -> Result<serde_json::Value> {
        self.pool.restart().await?;
        Ok(json!({ "signalled": true }))
    }
}

/// The standard task table: cadence and exclusivity per task.
///
/// | task | cadence | cluster-exclusive |
/// |---|---|---|
/// | notification-reminders | every 5 min | yes |
/// | queue-health-probe | every 1 min | yes |
/// | queue-health-report | every 5 min | no |
/// | retry-failed-jobs | hourly | yes |
/// | flush-terminal-jobs | daily (configured) | yes |
/// | restart-workers | daily (configured) | no |
pub fn standard_schedule(config: &SchedulerConfig) -> Result<Schedule> {
    let deadline = config.task_deadline();
    Schedule::new(vec![
        TaskDescriptor::new(NOTIFICATION_REMINDERS, Cadence::EveryMinutes(5), true, deadline),
        TaskDescriptor::new(QUEUE_HEALTH_PROBE, Cadence::EveryMinutes(1), true, deadline),
        TaskDescriptor::new(QUEUE_HEALTH_REPORT, Cadence::EveryMinutes(5), false, deadline),
        TaskDescriptor::new(RETRY_FAILED_JOBS, Cadence::Hourly, true, deadline),
        TaskDescriptor::new(
            FLUSH_TERMINAL_JOBS,
            Cadence::DailyAt {
                hour: config.flush_at.hour,
                minute: config.flush_at.minute,
            },
            true,
            deadline,
        ),
        TaskDescriptor::new(
            RESTART_WORKERS,
            Cadence::DailyAt {
                hour: config.restart_at.hour,
                minute: config.restart_at.minute,
            },
            false,
            deadline,
        ),
    ])
}

/// Handlers for the standard schedule.
pub fn standard_tasks(
    engine: Arc<HealthEngine>,
    orchestrator: Arc<RetryOrchestrator>,
    store: Arc<dyn JobStore>,
    reminders: Arc<dyn ReminderService>,
    worker_pool: Arc<dyn WorkerPool>,
    config: &SchedulerConfig,
) -> HashMap<String, Arc<dyn ScheduledTask>> {
    let mut handlers: HashMap<String, Arc<dyn ScheduledTask>> = HashMap::new();
    handlers.insert(
        NOTIFICATION_REMINDERS.to_string(),
        Arc::new(ReminderDispatchTask::new(reminders)),
    );
    handlers.insert(
        QUEUE_HEALTH_PROBE.to_string(),
        Arc::new(HealthProbeTask::new(Arc::clone(&engine))),
    );
    handlers.insert(
        QUEUE_HEALTH_REPORT.to_string(),
        Arc::new(HealthReportTask::new(engine)),
    );
    handlers.insert(
        RETRY_FAILED_JOBS.to_string(),
        Arc::new(RetrySweepTask::new(orchestrator)),
    );
    handlers.insert(
        FLUSH_TERMINAL_JOBS.to_string(),
        Arc::new(FlushTask::new(store, config.retention())),
    );
    handlers.insert(
        RESTART_WORKERS.to_string(),
        Arc::new(WorkerRestartTask::new(worker_pool)),
    );
    handlers
}
