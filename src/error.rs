//! # Queue Error Types
//!
//! Structured error handling for the queue monitoring subsystem using thiserror.
//! The one distinction callers are expected to branch on is `StoreUnavailable`:
//! the job store could not be reached at all, as opposed to a query that the
//! store rejected. The scheduler is the only layer that turns these errors into
//! alerts; the engine and orchestrator just surface them.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the health engine, retry orchestrator, and scheduler.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Job store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Job store query failed: {operation}: {message}")]
    Database { operation: String, message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid job transition for {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: Uuid,
        from: String,
        to: String,
    },

    #[error("Queue unhealthy: {message}")]
    Unhealthy { message: String },

    #[error("Collaborator call failed: {service}: {message}")]
    Collaborator { service: String, message: String },

    #[error("Task {task} exceeded its deadline of {deadline_seconds}s")]
    TaskTimeout { task: String, deadline_seconds: u64 },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl QueueError {
    /// Create a store-unavailable error
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Create a database query error
    pub fn database(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an unhealthy-verdict error
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::Unhealthy {
            message: message.into(),
        }
    }

    /// Create a collaborator error
    pub fn collaborator(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error means the job store itself was unreachable.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}

/// Conversion from sqlx::Error, classifying connection-class failures as
/// `StoreUnavailable` so callers can tell "store down" from "query rejected".
impl From<sqlx::Error> for QueueError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => QueueError::store_unavailable(err.to_string()),
            sqlx::Error::Configuration(source) => QueueError::configuration(source.to_string()),
            other => QueueError::database("query", other.to_string()),
        }
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        QueueError::internal(err.to_string())
    }
}

/// Result type alias for queue subsystem operations
pub type Result<T> = std::result::Result<T, QueueError>;
