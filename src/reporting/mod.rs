//! # Reporting Surface
//!
//! Renders health snapshots for the CLI: human-readable tables by default,
//! performance metrics in verbose mode, a fixed-shape JSON object for machine
//! ingestion, and a render-nothing check mode for automated gating. Mode
//! precedence is explicit in [`ReportMode::from_flags`] so flag combinations
//! never behave ambiguously.

use std::fmt::Write as _;

use crate::error::{QueueError, Result};
use crate::health::HealthSnapshot;

/// How a monitor invocation renders. Precedence when several flags are set:
/// `--check` short-circuits everything, then `--json`, then `--verbose`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    /// No output; the exit code is the verdict
    Check,
    /// One machine-parseable JSON object
    Json,
    /// Tables plus performance metrics
    Verbose,
    /// Tables for queue status, job-status stats, and failed-job stats
    Table,
}

impl ReportMode {
    pub fn from_flags(check: bool, json: bool, verbose: bool) -> Self {
        if check {
            Self::Check
        } else if json {
            Self::Json
        } else if verbose {
            Self::Verbose
        } else {
            Self::Table
        }
    }
}

/// Render a snapshot in the given mode. `Check` renders nothing.
pub fn render(snapshot: &HealthSnapshot, mode: ReportMode) -> Result<String> {
    match mode {
        ReportMode::Check => Ok(String::new()),
        ReportMode::Json => render_json(snapshot),
        ReportMode::Verbose => Ok(render_tables(snapshot, true)),
        ReportMode::Table => Ok(render_tables(snapshot, false)),
    }
}

/// The fixed-shape JSON object: `timestamp`, `queues`, `job_stats`,
/// `failed_jobs`, `performance`, `healthy`.
pub fn render_json(snapshot: &HealthSnapshot) -> Result<String> {
    Ok(serde_json::to_string(snapshot)?)
}

/// Valid-JSON error envelope for `--json` mode, so consumers never see
/// malformed partial output.
pub fn render_json_error(error: &QueueError) -> String {
    serde_json::json!({
        "timestamp": chrono::Utc::now(),
        "error": error.to_string(),
    })
    .to_string()
}

fn render_tables(snapshot: &HealthSnapshot, verbose: bool) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Queue Status");
    let _ = writeln!(out, "  {:<24} {:>8} {:>11}", "QUEUE", "PENDING", "PROCESSING");
    for (queue, backlog) in &snapshot.queues {
        let _ = writeln!(
            out,
            "  {:<24} {:>8} {:>11}",
            queue, backlog.pending, backlog.processing
        );
    }

    let stats = &snapshot.job_stats;
    let _ = writeln!(out, "\nJob Status");
    let _ = writeln!(out, "  {:<12} {:>8}", "pending", stats.pending);
    let _ = writeln!(out, "  {:<12} {:>8}", "processing", stats.processing);
    let _ = writeln!(out, "  {:<12} {:>8}", "completed", stats.completed);
    let _ = writeln!(out, "  {:<12} {:>8}", "failed", stats.failed);
    let _ = writeln!(out, "  {:<12} {:>8}", "retrying", stats.retrying);
    let _ = writeln!(out, "  {:<12} {:>8}", "stuck", stats.stuck);

    let failed = &snapshot.failed_jobs;
    let _ = writeln!(out, "\nFailed Jobs");
    let _ = writeln!(out, "  {:<12} {:>8}", "total", failed.total);
    let _ = writeln!(out, "  {:<12} {:>8}", "last 24h", failed.recent_24h);
    let _ = writeln!(out, "  {:<12} {:>8}", "last 1h", failed.recent_1h);

    if verbose {
        let perf = &snapshot.performance;
        let _ = writeln!(out, "\nPerformance (completed, last 24h)");
        let _ = writeln!(out, "  {:<12} {:>10}", "jobs", perf.jobs_completed_24h);
        let _ = writeln!(out, "  {:<12} {:>10.3}", "avg (s)", perf.avg_duration_seconds);
        let _ = writeln!(out, "  {:<12} {:>10.3}", "min (s)", perf.min_duration_seconds);
        let _ = writeln!(out, "  {:<12} {:>10.3}", "max (s)", perf.max_duration_seconds);
        let _ = writeln!(
            out,
            "  {:<12} {:>10.3}",
            "median (s)", perf.median_duration_seconds
        );
    }

    let _ = writeln!(
        out,
        "\nHealthy: {}",
        if snapshot.healthy { "yes" } else { "no" }
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{PerformanceMetrics, QueueBacklog};
    use crate::store::{FailedCounts, StatusCounts};
    use std::collections::BTreeMap;

    fn snapshot(healthy: bool) -> HealthSnapshot {
        let mut queues = BTreeMap::new();
        queues.insert(
            "notifications".to_string(),
            QueueBacklog {
                pending: 12,
                processing: 3,
            },
        );
        queues.insert(
            "total".to_string(),
            QueueBacklog {
                pending: 12,
                processing: 3,
            },
        );
        HealthSnapshot {
            timestamp: chrono::Utc::now(),
            queues,
            job_stats: StatusCounts {
                pending: 12,
                processing: 3,
                completed: 40,
                failed: 2,
                retrying: 1,
                stuck: if healthy { 0 } else { 3 },
            },
            failed_jobs: FailedCounts {
                total: 2,
                recent_24h: 2,
                recent_1h: 1,
            },
            performance: PerformanceMetrics::from_durations(&[1.0, 2.0, 3.0]),
            healthy,
        }
    }

    #[test]
    fn test_mode_precedence() {
        assert_eq!(ReportMode::from_flags(true, true, true), ReportMode::Check);
        assert_eq!(ReportMode::from_flags(false, true, true), ReportMode::Json);
        assert_eq!(
            ReportMode::from_flags(false, false, true),
            ReportMode::Verbose
        );
        assert_eq!(
            ReportMode::from_flags(false, false, false),
            ReportMode::Table
        );
    }

    #[test]
    fn test_check_renders_nothing() {
        let rendered = render(&snapshot(false), ReportMode::Check).unwrap();
        assert!(rendered.is_empty());
    }

    #[test]
    fn test_json_shape_is_stable() {
        for healthy in [true, false] {
            let rendered = render_json(&snapshot(healthy)).unwrap();
            let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
            let object = value.as_object().unwrap();
            for key in [
                "timestamp",
                "queues",
                "job_stats",
                "failed_jobs",
                "performance",
                "healthy",
            ] {
                assert!(object.contains_key(key), "missing key {key}");
            }
            assert_eq!(object["healthy"].as_bool(), Some(healthy));
            assert!(object["queues"]["total"]["pending"].is_i64());
        }
    }

    #[test]
    fn test_verbose_adds_performance_section() {
        let plain = render(&snapshot(true), ReportMode::Table).unwrap();
        let verbose = render(&snapshot(true), ReportMode::Verbose).unwrap();
        assert!(!plain.contains("Performance"));
        assert!(verbose.contains("Performance"));
        assert!(verbose.contains("median"));
    }

    #[test]
    fn test_error_envelope_is_valid_json() {
        let rendered = render_json_error(&QueueError::store_unavailable("connection refused"));
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert!(value["error"]
            .as_str()
            .unwrap()
            .contains("connection refused"));
    }
}
