//! # Scheduler
//!
//! Periodic task dispatch with single-node overlap prevention and
//! cluster-wide single execution. The [`Coordinator`] runs one dispatch loop
//! per fleet node; the [`Schedule`] is an explicit value object (no global
//! registration); exclusivity is a [`LeaseProvider`] strategy injected by the
//! caller; execution outcomes flow through an [`EventSink`].

pub mod coordinator;
pub mod events;
pub mod lease;
pub mod schedule;
pub mod tasks;

pub use coordinator::{Coordinator, ScheduledTask};
pub use events::{EventSink, RecordingEventSink, SkipReason, TaskEvent, TracingEventSink};
pub use lease::{InMemoryLeaseProvider, LeaseProvider, PgLeaseProvider};
pub use schedule::{Cadence, Schedule, TaskDescriptor};
pub use tasks::{standard_schedule, standard_tasks};
