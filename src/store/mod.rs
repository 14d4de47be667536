//! Job record persistence.
//!
//! The store holds exactly the work currently of interest: one job row in
//! SQLite. Submission replaces whatever was there, the dispatch loop claims
//! and mutates it, and cancellation deletes it.

mod job;
mod job_store;

pub use job::{generate_job_id, now_ms, Job, JobInput, JobStatus, JobType, SyncPayload};
pub use job_store::{JobStore, UpdateOutcome};
