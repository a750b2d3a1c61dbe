//! Retry orchestrator semantics: eligibility, CAS idempotence, batch reports.

mod common;

use std::sync::Arc;

use common::{failed_job, pending_job, store_with};
use tasklight_queue::config::RetryPolicy;
use tasklight_queue::models::JobStatus;
use tasklight_queue::retry::{RetryOrchestrator, RetryOutcome, SkipCause};
use tasklight_queue::store::{InMemoryJobStore, JobStore};

fn orchestrator(store: &Arc<InMemoryJobStore>) -> RetryOrchestrator {
    let store: Arc<dyn JobStore> = store.clone();
    RetryOrchestrator::new(store, RetryPolicy::default())
}

#[tokio::test]
async fn test_eligibility_excludes_exhausted_and_stale() {
    let fresh = failed_job("notifications", 1, 3, 10);
    let fresh_id = fresh.id;
    let store = store_with(vec![
        fresh,
        failed_job("notifications", 3, 3, 10), // attempts exhausted
        failed_job("notifications", 1, 3, 60 * 25), // outside the 24h window
        pending_job("notifications"),
    ]);

    let eligible = orchestrator(&store).retry_eligible().await.unwrap();
    assert_eq!(eligible.len(), 1);
    assert_eq!(eligible[0].id, fresh_id);
}

#[tokio::test]
async fn test_retry_moves_job_back_to_pending() {
    let job = failed_job("notifications", 1, 3, 10);
    let id = job.id;
    let store = store_with(vec![job.clone()]);

    let outcome = orchestrator(&store).retry(&job).await.unwrap();
    assert_eq!(outcome, RetryOutcome::Requeued);

    let stored = store.fetch(id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Pending);
    assert_eq!(stored.attempts, 2);
    assert!(stored.last_error.is_none());
    assert!(stored.started_at.is_none());
    assert!(stored.finished_at.is_none());
}

#[tokio::test]
async fn test_concurrent_retry_increments_attempts_exactly_once() {
    let job = failed_job("notifications", 1, 3, 10);
    let id = job.id;
    let store = store_with(vec![job.clone()]);

    // Two orchestrator instances racing on the same stale job snapshot, as
    // two fleet nodes would.
    let first = orchestrator(&store);
    let second = orchestrator(&store);
    let job_a = job.clone();
    let job_b = job;

    let (a, b) = tokio::join!(
        async move { first.retry(&job_a).await.unwrap() },
        async move { second.retry(&job_b).await.unwrap() },
    );

    let requeued = [a, b]
        .iter()
        .filter(|o| **o == RetryOutcome::Requeued)
        .count();
    assert_eq!(requeued, 1, "exactly one instance wins the CAS");

    let stored = store.fetch(id).await.unwrap().unwrap();
    assert_eq!(stored.attempts, 2, "attempts incremented exactly once");
    assert_eq!(stored.status, JobStatus::Pending);
}

#[tokio::test]
async fn test_retry_with_stale_snapshot_is_a_skip() {
    let job = failed_job("notifications", 1, 3, 10);
    let store = store_with(vec![job.clone()]);
    let orchestrator = orchestrator(&store);

    assert_eq!(
        orchestrator.retry(&job).await.unwrap(),
        RetryOutcome::Requeued
    );
    // Re-delivery of the same snapshot: the job is pending now, the store CAS
    // finds nothing to win.
    assert_eq!(
        orchestrator.retry(&job).await.unwrap(),
        RetryOutcome::Skipped(SkipCause::LostRace)
    );

    let stored = store.fetch(job.id).await.unwrap().unwrap();
    assert_eq!(stored.attempts, 2);
}

#[tokio::test]
async fn test_dead_lettered_job_is_skipped_without_store_write() {
    let job = failed_job("notifications", 3, 3, 10);
    let store = store_with(vec![job.clone()]);

    let outcome = orchestrator(&store).retry(&job).await.unwrap();
    assert_eq!(outcome, RetryOutcome::Skipped(SkipCause::Exhausted));

    let stored = store.fetch(job.id).await.unwrap().unwrap();
    assert_eq!(stored.attempts, 3);
    assert_eq!(stored.status, JobStatus::Failed);
}

#[tokio::test]
async fn test_batch_continues_past_individual_failures() {
    let poisoned = failed_job("notifications", 1, 3, 20);
    let store = store_with(vec![
        failed_job("notifications", 1, 3, 10),
        poisoned.clone(),
        failed_job("reminders", 0, 3, 30),
    ]);
    store.poison(poisoned.id);

    let report = orchestrator(&store).run().await.unwrap();
    assert_eq!(report.attempted, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 0);

    // the poisoned job is untouched, the others were re-enqueued
    let stored = store.fetch(poisoned.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
}

#[tokio::test]
async fn test_run_against_unavailable_store_fails_fast() {
    let store = store_with(vec![failed_job("notifications", 1, 3, 10)]);
    store.set_unavailable(true);

    let err = orchestrator(&store).run().await.unwrap_err();
    assert!(err.is_store_unavailable());
}
