//! Cluster-wide exclusivity leases.
//!
//! A lease is a time-bounded exclusivity grant keyed by task name plus
//! scheduled tick. Every coordinator node races to acquire the key for a
//! tick; exactly one wins and executes, the rest observe a held lease and
//! no-op. Losing the race is the expected non-leader path, never an error.
//!
//! The TTL is the task deadline plus a grace period: if the holding node
//! crashes mid-task the lease expires before the *next* tick's key is
//! contested, so the fleet picks up the next tick rather than resuming the
//! crashed one (idempotent task design covers the gap).

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration as StdDuration, Instant};

use crate::error::Result;

#[async_trait]
pub trait LeaseProvider: Send + Sync {
    /// Try to take the lease for `key` on behalf of `holder`. Returns `true`
    /// when this caller now holds it, `false` when another holder does.
    async fn acquire(&self, key: &str, holder: &str, ttl: StdDuration) -> Result<bool>;
}

/// In-process lease table. Shared (via `Arc`) between coordinators in tests
/// to model a fleet without standing up shared infrastructure.
#[derive(Default)]
pub struct InMemoryLeaseProvider {
    leases: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryLeaseProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current holder of a key, if the lease is still live.
    pub fn holder_of(&self, key: &str) -> Option<String> {
        let leases = self.leases.lock();
        leases.get(key).and_then(|(holder, expires)| {
            (*expires > Instant::now()).then(|| holder.clone())
        })
    }
}

#[async_trait]
impl LeaseProvider for InMemoryLeaseProvider {
    async fn acquire(&self, key: &str, holder: &str, ttl: StdDuration) -> Result<bool> {
        let mut leases = self.leases.lock();
        let now = Instant::now();
        let held = leases
            .get(key)
            .map_or(false, |(_, expires)| *expires > now);
        if held {
            return Ok(false);
        }
        leases.insert(key.to_string(), (holder.to_string(), now + ttl));
        Ok(true)
    }
}

/// Postgres-backed lease table, the production provider.
///
/// Expects:
///
/// ```sql
/// CREATE TABLE scheduler_leases (
///     key        TEXT PRIMARY KEY,
///     holder     TEXT NOT NULL,
///     expires_at TIMESTAMPTZ NOT NULL
/// );
/// ```
///
/// Acquisition is a single upsert that only overwrites an expired row, so the
/// race between fleet nodes is settled by one atomic statement.
#[derive(Clone)]
pub struct PgLeaseProvider {
    pool: sqlx::PgPool,
}

impl PgLeaseProvider {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeaseProvider for PgLeaseProvider {
    async fn acquire(&self, key: &str, holder: &str, ttl: StdDuration) -> Result<bool> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(1));
        let expires_at = Utc::now() + ttl;
        let result = sqlx::query(
            r"
            INSERT INTO scheduler_leases (key, holder, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE
            SET holder = EXCLUDED.holder, expires_at = EXCLUDED.expires_at
            WHERE scheduler_leases.expires_at < now()
            ",
        )
        .bind(key)
        .bind(holder)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_winner_per_key() {
        tokio_test::block_on(async {
            let leases = InMemoryLeaseProvider::new();
            let ttl = StdDuration::from_secs(60);

            assert!(leases.acquire("probe:1000", "node-a", ttl).await.unwrap());
            assert!(!leases.acquire("probe:1000", "node-b", ttl).await.unwrap());
            assert_eq!(leases.holder_of("probe:1000").as_deref(), Some("node-a"));

            // a different tick is a different race
            assert!(leases.acquire("probe:1060", "node-b", ttl).await.unwrap());
        });
    }

    #[test]
    fn test_expired_lease_is_reacquirable() {
        tokio_test::block_on(async {
            let leases = InMemoryLeaseProvider::new();
            assert!(leases
                .acquire("probe:1000", "node-a", StdDuration::from_millis(10))
                .await
                .unwrap());
            tokio::time::sleep(StdDuration::from_millis(20)).await;
            assert!(leases
                .acquire("probe:1000", "node-b", StdDuration::from_secs(60))
                .await
                .unwrap());
        });
    }
}
