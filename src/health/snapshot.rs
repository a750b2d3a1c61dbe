//! Health snapshot types.
//!
//! These are computed views, never persisted: each one is the result of a
//! point-in-time read against the job store. Serde field names on
//! [`HealthSnapshot`] are the machine-readable monitor contract and must stay
//! stable for external ingestion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::store::{FailedCounts, StatusCounts};

/// Key of the aggregated entry in the per-queue backlog map.
pub const TOTAL_QUEUE_KEY: &str = "total";

/// Pending/processing backlog of one queue (or the `total` aggregate).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueBacklog {
    pub pending: i64,
    pub processing: i64,
}

/// Latency metrics over jobs completed in the trailing 24 hours.
///
/// With zero completed jobs every field is zero; an empty window is a normal
/// quiet period, not an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub jobs_completed_24h: i64,
    pub avg_duration_seconds: f64,
    pub min_duration_seconds: f64,
    pub max_duration_seconds: f64,
    pub median_duration_seconds: f64,
}

impl PerformanceMetrics {
    /// Summarize a set of completed-job durations (seconds). Median follows
    /// the standard midpoint rule: middle element for an odd count, mean of
    /// the two middle elements for an even count.
    pub fn from_durations(durations: &[f64]) -> Self {
        if durations.is_empty() {
            return Self::default();
        }

        let mut sorted = durations.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();
        let mid = count / 2;
        let median = if count % 2 == 1 {
            sorted[mid]
        } else {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        };

        Self {
            jobs_completed_24h: count as i64,
            avg_duration_seconds: sum / count as f64,
            min_duration_seconds: sorted[0],
            max_duration_seconds: sorted[count - 1],
            median_duration_seconds: median,
        }
    }
}

/// The health decision with the thresholds that failed it, for probe alerts
/// and human output. An empty `reasons` list means healthy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthVerdict {
    pub healthy: bool,
    pub reasons: Vec<String>,
}

impl HealthVerdict {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            reasons: Vec::new(),
        }
    }
}

/// The engine's point-in-time aggregate view of the queue system.
///
/// Counts are approximate-as-of-call-time: each section is one consistent
/// read, but concurrent workers may transition jobs between the sections'
/// reads. Field names are the fixed JSON monitor shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub timestamp: DateTime<Utc>,
    pub queues: BTreeMap<String, QueueBacklog>,
    pub job_stats: StatusCounts,
    pub failed_jobs: FailedCounts,
    pub performance: PerformanceMetrics,
    pub healthy: bool,
}
