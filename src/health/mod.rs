//! # Queue Health Engine
//!
//! Pure aggregation and decision logic over job store snapshots: per-queue
//! backlogs, lifecycle-state counts, stuck-job detection, failure windows,
//! latency percentiles, and the single `healthy` verdict the probe and the
//! CLI gate on. The engine only reads; it holds no locks and caches nothing
//! across calls.

pub mod engine;
pub mod snapshot;

pub use engine::HealthEngine;
pub use snapshot::{HealthSnapshot, HealthVerdict, PerformanceMetrics, QueueBacklog};
