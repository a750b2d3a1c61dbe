//! Structured task execution events.
//!
//! Every task execution is observable: successes carry a JSON meta payload
//! (the task's report), failures carry the error, and skips carry why the
//! tick was not executed on this node. The coordinator is decoupled from any
//! specific logging backend through the [`EventSink`] trait; the production
//! sink routes to the report log and the alert channel via tracing targets.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::QueueError;

/// Why a tick was observed but not executed on this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The previous run of this task is still in flight on this node
    Overlapping,
    /// Another fleet node holds the tick's lease
    LeaseHeld,
}

pub trait EventSink: Send + Sync {
    fn on_success(&self, task: &str, meta: &serde_json::Value);
    fn on_failure(&self, task: &str, error: &QueueError);
    fn on_skipped(&self, task: &str, reason: SkipReason);
}

/// Production sink: success events go to the `scheduler::report` target
/// (the append-only report log), failure events to `scheduler::alert`
/// (the alerting channel). Skips are debug-level; lease contention is the
/// normal non-leader path and must not be noisy.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn on_success(&self, task: &str, meta: &serde_json::Value) {
        info!(target: "scheduler::report", task, %meta, "task completed");
    }

    fn on_failure(&self, task: &str, error: &QueueError) {
        error!(target: "scheduler::alert", task, error = %error, "task failed");
    }

    fn on_skipped(&self, task: &str, reason: SkipReason) {
        debug!(target: "scheduler::report", task, reason = ?reason, "task skipped");
    }
}

/// One recorded task event.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    Succeeded { task: String, meta: serde_json::Value },
    Failed { task: String, message: String },
    Skipped { task: String, reason: SkipReason },
}

/// Capturing sink for tests and embedded inspection.
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<TaskEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TaskEvent> {
        self.events.lock().clone()
    }

    pub fn ran_count(&self, task: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, TaskEvent::Succeeded { task: t, .. } if t == task))
            .count()
    }

    pub fn failed_count(&self, task: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, TaskEvent::Failed { task: t, .. } if t == task))
            .count()
    }

    pub fn skipped_count(&self, task: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, TaskEvent::Skipped { task: t, .. } if t == task))
            .count()
    }
}

impl EventSink for RecordingEventSink {
    fn on_success(&self, task: &str, meta: &serde_json::Value) {
        self.events.lock().push(TaskEvent::Succeeded {
            task: task.to_string(),
            meta: meta.clone(),
        });
    }

    fn on_failure(&self, task: &str, error: &QueueError) {
        self.events.lock().push(TaskEvent::Failed {
            task: task.to_string(),
            message: error.to_string(),
        });
    }

    fn on_skipped(&self, task: &str, reason: SkipReason) {
        self.events.lock().push(TaskEvent::Skipped {
            task: task.to_string(),
            reason,
        });
    }
}
