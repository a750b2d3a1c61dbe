#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Tasklight Queue Core
//!
//! Queue health monitoring and job-lifecycle management for the Tasklight
//! task platform's background processing (notification delivery, reminder
//! dispatch).
//!
//! ## Overview
//!
//! The crate classifies every background job's lifecycle state, detects jobs
//! stuck mid-execution, computes failure and latency statistics, decides
//! programmatically whether the queue system is healthy, and drives the
//! bounded-attempts retry policy, while any number of scheduler instances
//! run concurrently across a fleet without duplicating work.
//!
//! ## Module Organization
//!
//! - [`models`] - The job record and lifecycle states
//! - [`store`] - The job store collaborator seam (Postgres + in-memory)
//! - [`health`] - Snapshot aggregation and the health verdict
//! - [`retry`] - The bounded-attempts retry orchestrator
//! - [`scheduler`] - Periodic dispatch with overlap and cluster-exclusivity guards
//! - [`services`] - Notification and worker-fleet collaborator seams
//! - [`reporting`] - CLI rendering (tables, JSON, check mode)
//! - [`config`] - Every policy knob, externally configurable
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tasklight_queue::config::QueueConfig;
//! use tasklight_queue::health::HealthEngine;
//! use tasklight_queue::store::PgJobStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = QueueConfig::load()?;
//! let store = Arc::new(PgJobStore::connect(&config.database).await?);
//! let engine = HealthEngine::new(store, config.health.clone());
//!
//! let snapshot = engine.snapshot().await?;
//! println!("healthy: {}", snapshot.healthy);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod models;
pub mod reporting;
pub mod retry;
pub mod scheduler;
pub mod services;
pub mod store;

pub use config::{DatabaseConfig, HealthPolicy, QueueConfig, RetryPolicy, SchedulerConfig};
pub use error::{QueueError, Result};
pub use health::{HealthEngine, HealthSnapshot, HealthVerdict, PerformanceMetrics};
pub use models::{Job, JobStatus};
pub use retry::{RetryOrchestrator, RetryOutcome, RetryRunReport, SkipCause};
pub use scheduler::{Cadence, Coordinator, Schedule, ScheduledTask, TaskDescriptor};
pub use store::{FailedCounts, InMemoryJobStore, JobStore, PgJobStore, QueueCounts, StatusCounts};
