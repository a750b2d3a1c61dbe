//! # Queue Subsystem Configuration
//!
//! Typed configuration for every policy knob the monitoring subsystem carries:
//! stuck-job threshold, failure and backlog ceilings, retry window, retention,
//! and scheduler timing. Nothing in the engine or orchestrator hard-codes these
//! numbers; the defaults below are the documented starting points and every
//! field can be overridden by a config file or a `TASKLIGHT_`-prefixed
//! environment variable (`TASKLIGHT_HEALTH__STUCK_THRESHOLD_SECONDS=900`).

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration as StdDuration;

use crate::error::{QueueError, Result};

/// Root configuration for the queue monitoring subsystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub database: DatabaseConfig,
    pub health: HealthPolicy,
    pub retry: RetryPolicy,
    pub scheduler: SchedulerConfig,
}

/// Job store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    pub connect_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/tasklight_development".to_string(),
            pool_size: 10,
            connect_timeout_seconds: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.connect_timeout_seconds)
    }
}

/// Thresholds behind the health verdict. The engine reports raw numbers; this
/// policy is the single place the `healthy` boolean is decided from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthPolicy {
    /// Processing time after which a job counts as stuck (seconds)
    pub stuck_threshold_seconds: u64,
    /// Ceiling on failures in the trailing hour before the queue is unhealthy
    pub max_recent_failures_1h: i64,
    /// Per-queue pending backlog ceiling
    pub max_pending_per_queue: i64,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            stuck_threshold_seconds: 1800,
            max_recent_failures_1h: 10,
            max_pending_per_queue: 1000,
        }
    }
}

impl HealthPolicy {
    pub fn stuck_threshold(&self) -> Duration {
        Duration::seconds(self.stuck_threshold_seconds as i64)
    }
}

/// Bounds on the retry sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Failures older than this are stale and never resurrected (hours)
    pub retry_window_hours: u64,
    /// Upper bound on jobs examined per sweep
    pub batch_limit: i64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_window_hours: 24,
            batch_limit: 500,
        }
    }
}

impl RetryPolicy {
    pub fn retry_window(&self) -> Duration {
        Duration::hours(self.retry_window_hours as i64)
    }
}

/// Wall-clock time of day for a daily task, in UTC.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyTime {
    pub hour: u32,
    pub minute: u32,
}

impl Default for DailyTime {
    fn default() -> Self {
        Self { hour: 3, minute: 30 }
    }
}

/// Coordinator timing and maintenance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Granularity of the dispatch loop (milliseconds). Task cadence is
    /// minute-based; this only bounds how quickly a new minute is noticed.
    pub tick_interval_ms: u64,
    /// Deadline applied to every task execution (seconds)
    pub task_deadline_seconds: u64,
    /// Added to the deadline when computing lease TTLs, so a crashed holder
    /// frees the next tick rather than the current one
    pub lease_grace_seconds: u64,
    /// When the daily terminal-record flush runs
    pub flush_at: DailyTime,
    /// When the daily rolling worker restart is signalled
    pub restart_at: DailyTime,
    /// Terminal records older than this are purged by the flush task (days)
    pub retention_days: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 500,
            task_deadline_seconds: 300,
            lease_grace_seconds: 30,
            flush_at: DailyTime { hour: 3, minute: 30 },
            restart_at: DailyTime { hour: 4, minute: 0 },
            retention_days: 7,
        }
    }
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> StdDuration {
        StdDuration::from_millis(self.tick_interval_ms)
    }

    pub fn task_deadline(&self) -> StdDuration {
        StdDuration::from_secs(self.task_deadline_seconds)
    }

    pub fn lease_grace(&self) -> StdDuration {
        StdDuration::from_secs(self.lease_grace_seconds)
    }

    pub fn retention(&self) -> Duration {
        Duration::days(self.retention_days as i64)
    }
}

impl QueueConfig {
    /// Load configuration from the environment only (defaults plus
    /// `TASKLIGHT_`-prefixed overrides).
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional file layered between the defaults
    /// and the environment. Later sources win: defaults < file < environment.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&Self::default())
            .map_err(|e| QueueError::configuration(e.to_string()))?;

        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path.to_path_buf()));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("TASKLIGHT")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .map_err(|e| QueueError::configuration(e.to_string()))?
            .try_deserialize()
            .map_err(|e| QueueError::configuration(e.to_string()))
    }
}
