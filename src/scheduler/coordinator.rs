//! # Scheduler / Leader Coordinator
//!
//! ## Overview
//!
//! One coordinator runs per fleet node. Its cooperative loop watches the
//! clock and, on every minute tick, dispatches the scheduled tasks that are
//! due. Dispatched executions run as independent tokio tasks so a slow task
//! never delays the next tick's dispatch decision for other tasks.
//!
//! ## Execution guarantees
//!
//! Two independent guards apply to every dispatch:
//!
//! 1. **Overlap guard (single node)**: a task whose previous run is still in
//!    flight on this node is skipped, not queued and not run in parallel with
//!    itself.
//! 2. **Cluster exclusivity (fleet)**: tasks flagged `cluster_exclusive`
//!    race for a lease keyed by task name + tick; exactly one node wins and
//!    executes, the rest record a skip. Non-exclusive tasks run on every
//!    node.
//!
//! Each execution carries a deadline. Overrunning it is a failure event and
//! the tick's lease is simply left to expire; any job the task had mid-claim
//! surfaces as stuck on the next health probe rather than being silently
//! lost.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::error::{QueueError, Result};

use super::events::{EventSink, SkipReason};
use super::lease::LeaseProvider;
use super::schedule::{Cadence, Schedule, TaskDescriptor};

/// The body of a scheduled task. The returned JSON is the success event's
/// meta payload (a report, counts, whatever the task wants observed).
#[async_trait]
pub trait ScheduledTask: Send + Sync {
    async fn run(&self) -> Result<serde_json::Value>;
}

pub struct Coordinator {
    node_id: Uuid,
    schedule: Schedule,
    handlers: HashMap<String, Arc<dyn ScheduledTask>>,
    leases: Arc<dyn LeaseProvider>,
    events: Arc<dyn EventSink>,
    /// Tasks currently executing on this node, keyed by name
    in_flight: Arc<DashMap<String, DateTime<Utc>>>,
    /// Last tick dispatched per task, so one tick fires at most once locally
    last_tick: Mutex<HashMap<String, DateTime<Utc>>>,
    tick_interval: StdDuration,
    lease_grace: StdDuration,
}

/// Removes the in-flight marker when an execution ends, even if it panics.
struct InFlightGuard {
    map: Arc<DashMap<String, DateTime<Utc>>>,
    name: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.map.remove(&self.name);
    }
}

impl Coordinator {
    /// Build a coordinator for the given schedule. Every descriptor must have
    /// a handler; a missing one is a wiring bug surfaced at construction.
    pub fn new(
        schedule: Schedule,
        handlers: HashMap<String, Arc<dyn ScheduledTask>>,
        leases: Arc<dyn LeaseProvider>,
        events: Arc<dyn EventSink>,
        config: &SchedulerConfig,
    ) -> Result<Self> {
        for descriptor in schedule.iter() {
            if !handlers.contains_key(&descriptor.name) {
                return Err(QueueError::configuration(format!(
                    "scheduled task {} has no handler",
                    descriptor.name
                )));
            }
        }

        Ok(Self {
            node_id: Uuid::new_v4(),
            schedule,
            handlers,
            leases,
            events,
            in_flight: Arc::new(DashMap::new()),
            last_tick: Mutex::new(HashMap::new()),
            tick_interval: config.tick_interval(),
            lease_grace: config.lease_grace(),
        })
    }

    pub fn node_id(&self) -> Uuid {
        self.node_id
    }

    /// Run the dispatch loop until the shutdown signal flips to `true`.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) -> Result<()> {
        info!(node_id = %self.node_id, tasks = self.schedule.len(), "coordinator started");
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.dispatch_due(Utc::now()).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(node_id = %self.node_id, "coordinator stopped");
        Ok(())
    }

    /// One dispatch pass for the given instant. Returns the join handles of
    /// the executions spawned on this pass so callers (tests, shutdown paths)
    /// can await them; the loop itself never does.
    pub async fn dispatch_due(&self, now: DateTime<Utc>) -> Vec<JoinHandle<()>> {
        let tick = Cadence::tick(now);
        let mut spawned = Vec::new();

        for descriptor in self.schedule.iter() {
            if !descriptor.cadence.matches(tick) {
                continue;
            }
            if !self.claim_local_tick(&descriptor.name, tick) {
                continue;
            }

            // Overlap guard: previous run still in flight means skip, not queue.
            if self.in_flight.contains_key(&descriptor.name) {
                self.events
                    .on_skipped(&descriptor.name, SkipReason::Overlapping);
                continue;
            }

            if descriptor.cluster_exclusive && !self.try_acquire_lease(descriptor, tick).await {
                continue;
            }

            if let Some(handle) = self.spawn_execution(descriptor, tick) {
                spawned.push(handle);
            }
        }

        spawned
    }

    /// A tick fires at most once per task on this node, however often the
    /// loop samples the clock within the minute.
    fn claim_local_tick(&self, name: &str, tick: DateTime<Utc>) -> bool {
        let mut last = self.last_tick.lock();
        if last.get(name) == Some(&tick) {
            return false;
        }
        last.insert(name.to_string(), tick);
        true
    }

    async fn try_acquire_lease(&self, descriptor: &TaskDescriptor, tick: DateTime<Utc>) -> bool {
        let key = format!("{}:{}", descriptor.name, tick.timestamp());
        let ttl = descriptor.deadline + self.lease_grace;
        match self
            .leases
            .acquire(&key, &self.node_id.to_string(), ttl)
            .await
        {
            Ok(true) => true,
            Ok(false) => {
                self.events
                    .on_skipped(&descriptor.name, SkipReason::LeaseHeld);
                false
            }
            Err(err) => {
                // Coordination store trouble: alert and let the next tick retry.
                self.events.on_failure(&descriptor.name, &err);
                false
            }
        }
    }

    fn spawn_execution(
        &self,
        descriptor: &TaskDescriptor,
        tick: DateTime<Utc>,
    ) -> Option<JoinHandle<()>> {
        let handler = Arc::clone(self.handlers.get(&descriptor.name)?);
        let events = Arc::clone(&self.events);
        let name = descriptor.name.clone();
        let deadline = descriptor.deadline;

        self.in_flight.insert(name.clone(), tick);
        let guard = InFlightGuard {
            map: Arc::clone(&self.in_flight),
            name: name.clone(),
        };

        debug!(task = %name, tick = %tick, "dispatching task");
        Some(tokio::spawn(async move {
            let _guard = guard;
            match tokio::time::timeout(deadline, handler.run()).await {
                Ok(Ok(meta)) => events.on_success(&name, &meta),
                Ok(Err(err)) => events.on_failure(&name, &err),
                Err(_) => {
                    let err = QueueError::TaskTimeout {
                        task: name.clone(),
                        deadline_seconds: deadline.as_secs(),
                    };
                    warn!(task = %name, "task exceeded its deadline");
                    events.on_failure(&name, &err);
                }
            }
        }))
    }
}
