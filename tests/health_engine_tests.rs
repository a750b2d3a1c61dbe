//! Health engine behavior against seeded job sets.

mod common;

use proptest::prelude::*;
use std::sync::Arc;

use common::{completed_job, failed_job, pending_job, processing_job, store_with};
use tasklight_queue::config::{HealthPolicy, RetryPolicy};
use tasklight_queue::health::{HealthEngine, PerformanceMetrics};
use tasklight_queue::retry::RetryOrchestrator;

fn engine(store: Arc<tasklight_queue::store::InMemoryJobStore>, policy: HealthPolicy) -> HealthEngine {
    HealthEngine::new(store, policy)
}

fn default_policy() -> HealthPolicy {
    HealthPolicy::default()
}

#[tokio::test]
async fn test_stuck_jobs_counted_and_fail_health() {
    // 10 jobs, 3 of them processing for 2 hours against a 30 minute threshold
    let store = store_with(vec![
        processing_job("notifications", 120),
        processing_job("notifications", 120),
        processing_job("reminders", 120),
        processing_job("reminders", 5),
        pending_job("notifications"),
        pending_job("notifications"),
        pending_job("reminders"),
        completed_job("notifications", 10, 30),
        completed_job("reminders", 20, 60),
        failed_job("notifications", 1, 3, 30),
    ]);
    let policy = HealthPolicy {
        stuck_threshold_seconds: 1800,
        ..default_policy()
    };
    let engine = engine(store, policy);

    let stats = engine.job_status_stats().await.unwrap();
    assert_eq!(stats.processing, 4);
    assert_eq!(stats.stuck, 3);
    assert_eq!(stats.pending, 3);
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.failed, 1);

    // stuck > 0 makes the system unhealthy regardless of everything else
    assert!(!engine.is_healthy().await.unwrap());
    let snapshot = engine.snapshot().await.unwrap();
    assert!(!snapshot.healthy);
    assert_eq!(snapshot.job_stats.stuck, 3);
}

#[tokio::test]
async fn test_stuck_threshold_boundary() {
    let policy = HealthPolicy {
        stuck_threshold_seconds: 1800,
        ..default_policy()
    };
    let store = store_with(vec![
        processing_job("notifications", 29),
        processing_job("notifications", 31),
    ]);
    let engine = engine(store, policy);

    let stats = engine.job_status_stats().await.unwrap();
    assert_eq!(stats.stuck, 1);
}

#[tokio::test]
async fn test_recent_failures_recover_after_retry_sweep() {
    // 5 failures in the last hour against a ceiling of 3: unhealthy. After the
    // sweep re-enqueues the 4 retryable ones, a fresh probe sees 1: healthy.
    let store = store_with(vec![
        failed_job("notifications", 1, 3, 10),
        failed_job("notifications", 1, 3, 20),
        failed_job("reminders", 2, 3, 30),
        failed_job("reminders", 0, 3, 40),
        failed_job("notifications", 3, 3, 50), // dead-lettered, not retryable
    ]);
    let policy = HealthPolicy {
        max_recent_failures_1h: 3,
        ..default_policy()
    };
    let engine = engine(Arc::clone(&store), policy);

    let failed = engine.failed_job_stats().await.unwrap();
    assert_eq!(failed.total, 5);
    assert_eq!(failed.recent_1h, 5);
    assert!(!engine.is_healthy().await.unwrap());

    let sweep_store: Arc<dyn tasklight_queue::store::JobStore> = store.clone();
    let orchestrator = RetryOrchestrator::new(sweep_store, RetryPolicy::default());
    let report = orchestrator.run().await.unwrap();
    assert_eq!(report.attempted, 4);
    assert_eq!(report.succeeded, 4);

    let failed = engine.failed_job_stats().await.unwrap();
    assert_eq!(failed.recent_1h, 1);
    assert!(engine.is_healthy().await.unwrap());
}

#[tokio::test]
async fn test_failure_windows_anchor_on_finish_time() {
    let store = store_with(vec![
        failed_job("notifications", 1, 3, 30),           // in both windows
        failed_job("notifications", 1, 3, 90),           // 24h only
        failed_job("notifications", 1, 3, 60 * 25),      // total only
    ]);
    let engine = engine(store, default_policy());

    let failed = engine.failed_job_stats().await.unwrap();
    assert_eq!(failed.total, 3);
    assert_eq!(failed.recent_24h, 2);
    assert_eq!(failed.recent_1h, 1);
}

#[tokio::test]
async fn test_backlog_ceiling_fails_health_per_queue() {
    let policy = HealthPolicy {
        max_pending_per_queue: 5,
        ..default_policy()
    };
    let mut jobs: Vec<_> = (0..6).map(|_| pending_job("notifications")).collect();
    jobs.push(pending_job("reminders"));
    let engine = engine(store_with(jobs), policy);

    let queues = engine.queue_status().await.unwrap();
    assert_eq!(queues["notifications"].pending, 6);
    assert_eq!(queues["reminders"].pending, 1);
    assert_eq!(queues["total"].pending, 7);

    assert!(!engine.is_healthy().await.unwrap());
}

#[tokio::test]
async fn test_queue_status_aggregates_total() {
    let store = store_with(vec![
        pending_job("notifications"),
        pending_job("notifications"),
        processing_job("reminders", 1),
        completed_job("reminders", 5, 10), // terminal states do not count
    ]);
    let engine = engine(store, default_policy());

    let queues = engine.queue_status().await.unwrap();
    assert_eq!(queues.len(), 3);
    assert_eq!(queues["notifications"].pending, 2);
    assert_eq!(queues["reminders"].processing, 1);
    assert_eq!(queues["total"].pending, 2);
    assert_eq!(queues["total"].processing, 1);
}

#[tokio::test]
async fn test_no_completed_jobs_yields_zero_metrics() {
    let store = store_with(vec![pending_job("notifications")]);
    let engine = engine(store, default_policy());

    let metrics = engine.performance_metrics().await.unwrap();
    assert_eq!(metrics, PerformanceMetrics::default());
    assert!(engine.is_healthy().await.unwrap());
}

#[tokio::test]
async fn test_performance_metrics_over_24h_window() {
    let store = store_with(vec![
        completed_job("notifications", 10, 30),
        completed_job("notifications", 20, 60),
        completed_job("notifications", 60, 120),
        completed_job("notifications", 999, 60 * 25), // outside the window
    ]);
    let engine = engine(store, default_policy());

    let metrics = engine.performance_metrics().await.unwrap();
    assert_eq!(metrics.jobs_completed_24h, 3);
    assert_eq!(metrics.min_duration_seconds, 10.0);
    assert_eq!(metrics.max_duration_seconds, 60.0);
    assert_eq!(metrics.median_duration_seconds, 20.0);
    assert!((metrics.avg_duration_seconds - 30.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_unreachable_store_surfaces_typed_error() {
    let store = store_with(vec![pending_job("notifications")]);
    store.set_unavailable(true);
    let engine = engine(store, default_policy());

    assert!(engine.queue_status().await.unwrap_err().is_store_unavailable());
    assert!(engine.job_status_stats().await.unwrap_err().is_store_unavailable());
    assert!(engine.failed_job_stats().await.unwrap_err().is_store_unavailable());
    assert!(engine.performance_metrics().await.unwrap_err().is_store_unavailable());
    assert!(engine.is_healthy().await.unwrap_err().is_store_unavailable());
    assert!(engine.snapshot().await.unwrap_err().is_store_unavailable());
}

proptest! {
    #[test]
    fn prop_duration_summary_is_ordered(durations in prop::collection::vec(0.0f64..10_000.0, 1..200)) {
        let metrics = PerformanceMetrics::from_durations(&durations);
        prop_assert_eq!(metrics.jobs_completed_24h as usize, durations.len());
        prop_assert!(metrics.min_duration_seconds <= metrics.median_duration_seconds);
        prop_assert!(metrics.median_duration_seconds <= metrics.max_duration_seconds);
        prop_assert!(metrics.avg_duration_seconds >= metrics.min_duration_seconds - 1e-9);
        prop_assert!(metrics.avg_duration_seconds <= metrics.max_duration_seconds + 1e-9);
    }
}
