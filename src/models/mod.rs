//! Data layer for the queue monitoring subsystem.
//!
//! The only persisted record this subsystem reads and transitions is the
//! background [`Job`]. Everything else (health snapshots, retry reports) is
//! computed on demand and never stored.

pub mod job;

pub use job::{Job, JobStatus};
