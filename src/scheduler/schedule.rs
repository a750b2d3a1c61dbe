//! Schedule value object.
//!
//! An explicit list of task descriptors passed into the coordinator
//! constructor; there is no process-wide registration, so tests can run
//! multiple independent coordinators against different schedules.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration as StdDuration;

use crate::error::{QueueError, Result};

/// When a task fires, in cron-like minute terms. Cadence is evaluated against
/// the minute-truncated tick, so a tick either matches or it does not; there
/// is no "catch up" on missed ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    /// Every `n` minutes, aligned to minutes-of-day (`EveryMinutes(5)` fires
    /// at :00, :05, :10, ...)
    EveryMinutes(u32),
    /// At the top of every hour
    Hourly,
    /// Once a day at the given UTC time
    DailyAt { hour: u32, minute: u32 },
}

impl Cadence {
    /// Truncate a wall-clock instant to its scheduling tick (the minute).
    pub fn tick(now: DateTime<Utc>) -> DateTime<Utc> {
        now.with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(now)
    }

    /// Whether this cadence fires on the given tick.
    pub fn matches(&self, tick: DateTime<Utc>) -> bool {
        let minute_of_day = tick.hour() * 60 + tick.minute();
        match self {
            Cadence::EveryMinutes(n) => minute_of_day % (*n).max(1) == 0,
            Cadence::Hourly => tick.minute() == 0,
            Cadence::DailyAt { hour, minute } => tick.hour() == *hour && tick.minute() == *minute,
        }
    }
}

/// One registered task: its name, cadence, cluster-exclusivity flag, and
/// execution deadline.
#[derive(Debug, Clone)]
pub struct TaskDescriptor {
    pub name: String,
    pub cadence: Cadence,
    /// When set, exactly one coordinator node in the fleet executes a given
    /// tick; the rest observe it and no-op.
    pub cluster_exclusive: bool,
    /// Executions exceeding this are treated as failed and their lease is
    /// left to expire.
    pub deadline: StdDuration,
}

impl TaskDescriptor {
    pub fn new(
        name: impl Into<String>,
        cadence: Cadence,
        cluster_exclusive: bool,
        deadline: StdDuration,
    ) -> Self {
        Self {
            name: name.into(),
            cadence,
            cluster_exclusive,
            deadline,
        }
    }
}

/// The full task table handed to a coordinator. Task names must be unique;
/// they key the overlap guard and the lease namespace.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    tasks: Vec<TaskDescriptor>,
}

impl Schedule {
    pub fn new(tasks: Vec<TaskDescriptor>) -> Result<Self> {
        let mut seen = std::collections::HashSet::new();
        for task in &tasks {
            if !seen.insert(task.name.as_str()) {
                return Err(QueueError::configuration(format!(
                    "duplicate scheduled task name: {}",
                    task.name
                )));
            }
        }
        Ok(Self { tasks })
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskDescriptor> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&TaskDescriptor> {
        self.tasks.iter().find(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 6, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_every_minutes_alignment() {
        let cadence = Cadence::EveryMinutes(5);
        assert!(cadence.matches(at(10, 0)));
        assert!(cadence.matches(at(10, 5)));
        assert!(!cadence.matches(at(10, 3)));

        assert!(Cadence::EveryMinutes(1).matches(at(23, 59)));
    }

    #[test]
    fn test_hourly_and_daily() {
        assert!(Cadence::Hourly.matches(at(7, 0)));
        assert!(!Cadence::Hourly.matches(at(7, 1)));

        let daily = Cadence::DailyAt { hour: 3, minute: 30 };
        assert!(daily.matches(at(3, 30)));
        assert!(!daily.matches(at(3, 31)));
        assert!(!daily.matches(at(4, 30)));
    }

    #[test]
    fn test_tick_truncates_to_minute() {
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 10, 5, 42).unwrap();
        assert_eq!(Cadence::tick(now), at(10, 5));
    }

    #[test]
    fn test_schedule_rejects_duplicate_names() {
        let deadline = StdDuration::from_secs(60);
        let result = Schedule::new(vec![
            TaskDescriptor::new("probe", Cadence::EveryMinutes(1), true, deadline),
            TaskDescriptor::new("probe", Cadence::Hourly, false, deadline),
        ]);
        assert!(matches!(result, Err(QueueError::Configuration { .. })));
    }
}
