//! Job record types for store persistence.
//!
//! This module defines the single `Job` entity. The `job_type` field selects
//! the processing strategy; the input and result payloads are kept as raw
//! JSON text so the status boundary can degrade gracefully when a stored
//! payload is malformed, while strategies parse strictly.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Result;
use crate::prompt::PromptCategory;
use crate::tracker::TrackerConnection;

/// The persisted job record.
///
/// At most one job exists at a time; `submit` on the store replaces any
/// previous record. All mutation while `Running` goes through the dispatch
/// loop and the strategy it invokes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    /// Timestamp-based ID, assigned on creation, immutable
    pub id: String,

    /// Strategy discriminator
    pub job_type: JobType,

    /// Current lifecycle state
    pub status: JobStatus,

    /// Number of units of work in the input
    pub total_units: u32,

    /// Units committed so far; `0 <= completed_units <= total_units`
    pub completed_units: u32,

    /// Raw input payload: a JSON array of items, or for sync jobs a bundle
    /// of connection parameters plus items. Immutable after creation.
    pub input_json: String,

    /// Raw result payload: a JSON array, one entry per committed unit
    /// (singleton for generation jobs)
    pub results_json: String,

    /// Backend model selector, immutable
    pub model: String,

    /// Requested prompt strategy name, immutable
    pub strategy: String,

    /// Unix timestamp in milliseconds
    pub created_at: i64,

    /// Unix timestamp in milliseconds
    pub updated_at: i64,
}

impl Job {
    fn new(job_type: JobType, total_units: u32, input_json: String, model: &str, strategy: &str) -> Self {
        let now = now_ms();
        Self {
            id: generate_job_id(),
            job_type,
            status: JobStatus::Pending,
            total_units,
            completed_units: 0,
            input_json,
            results_json: "[]".to_string(),
            model: model.to_string(),
            strategy: strategy.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a classification job over an ordered batch of review texts.
    pub fn new_classify(job_type: JobType, items: &[String], model: &str, strategy: &str) -> Result<Self> {
        let input = serde_json::to_string(items)?;
        Ok(Self::new(job_type, items.len() as u32, input, model, strategy))
    }

    /// Create a generation job from a single combined input text.
    pub fn new_generate(job_type: JobType, input_text: &str, model: &str, strategy: &str) -> Result<Self> {
        let input = serde_json::to_string(&[input_text])?;
        Ok(Self::new(job_type, 1, input, model, strategy))
    }

    /// Create an external-sync job carrying connection parameters plus items.
    pub fn new_sync(connection: TrackerConnection, items: &[String]) -> Result<Self> {
        let payload = SyncPayload {
            connection,
            items: items.to_vec(),
        };
        let input = serde_json::to_string(&payload)?;
        Ok(Self::new(JobType::SyncExternal, items.len() as u32, input, "N/A", "N/A"))
    }

    /// Parse the input payload strictly. Used by strategies; a malformed
    /// payload propagates as an error and fails the job.
    pub fn input(&self) -> Result<JobInput> {
        Ok(serde_json::from_str(&self.input_json)?)
    }

    /// Overwrite the result payload with the given entries.
    pub fn set_results(&mut self, results: &[String]) -> Result<()> {
        self.results_json = serde_json::to_string(results)?;
        Ok(())
    }

    /// Result entries, or an empty sequence when the stored payload is
    /// malformed. Used by the status boundary.
    pub fn results_lenient(&self) -> Vec<String> {
        serde_json::from_str(&self.results_json).unwrap_or_default()
    }

    /// Input items, or an empty sequence when the stored payload is
    /// malformed. Used by the status boundary.
    pub fn items_lenient(&self) -> Vec<String> {
        match self.input() {
            Ok(JobInput::Items(items)) => items,
            Ok(JobInput::Sync(payload)) => payload.items,
            Err(_) => Vec::new(),
        }
    }

    /// Update the timestamp to now.
    pub fn touch(&mut self) {
        self.updated_at = now_ms();
    }
}

/// Parsed input payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum JobInput {
    /// Connection parameters plus item titles, for sync jobs
    Sync(SyncPayload),
    /// Ordered review/input texts, for classify and generate jobs
    Items(Vec<String>),
}

/// Input bundle for `SYNC_EXTERNAL` jobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncPayload {
    pub connection: TrackerConnection,
    pub items: Vec<String>,
}

/// Job type discriminator. Selects the processing strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobType {
    #[serde(rename = "CLASSIFY_FR")]
    ClassifyFr,
    #[serde(rename = "CLASSIFY_NFR")]
    ClassifyNfr,
    #[serde(rename = "GENERATE_SRS")]
    GenerateSrs,
    #[serde(rename = "GENERATE_USER_STORIES")]
    GenerateUserStories,
    #[serde(rename = "SYNC_EXTERNAL")]
    SyncExternal,
}

impl JobType {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::ClassifyFr => "CLASSIFY_FR",
            JobType::ClassifyNfr => "CLASSIFY_NFR",
            JobType::GenerateSrs => "GENERATE_SRS",
            JobType::GenerateUserStories => "GENERATE_USER_STORIES",
            JobType::SyncExternal => "SYNC_EXTERNAL",
        }
    }

    /// Parse from the string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CLASSIFY_FR" => Some(JobType::ClassifyFr),
            "CLASSIFY_NFR" => Some(JobType::ClassifyNfr),
            "GENERATE_SRS" => Some(JobType::GenerateSrs),
            "GENERATE_USER_STORIES" => Some(JobType::GenerateUserStories),
            "SYNC_EXTERNAL" => Some(JobType::SyncExternal),
            _ => None,
        }
    }

    /// Prompt category this job type resolves templates under.
    /// Sync jobs need no template.
    pub fn category(&self) -> Option<PromptCategory> {
        match self {
            JobType::ClassifyFr => Some(PromptCategory::Fr),
            JobType::ClassifyNfr => Some(PromptCategory::Nfr),
            JobType::GenerateSrs => Some(PromptCategory::Srs),
            JobType::GenerateUserStories => Some(PromptCategory::UserStories),
            JobType::SyncExternal => None,
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Job status state machine.
///
/// Monotonic: `Pending -> Running -> {Completed, Failed}`. No transition
/// leaves a terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
}

impl JobStatus {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// Parse from the string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(JobStatus::Pending),
            "RUNNING" => Some(JobStatus::Running),
            "COMPLETED" => Some(JobStatus::Completed),
            "FAILED" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Check if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Generate a unique job ID based on timestamp with sub-second precision.
///
/// Format: seconds + microseconds suffix + counter (e.g. "17378028001234560001").
/// This ensures uniqueness even when creating multiple records per second.
pub fn generate_job_id() -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards");

    let secs = duration.as_secs();
    let micros = duration.subsec_micros();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);

    format!("{}{:06}{:04}", secs, micros, counter % 10000)
}

/// Get current time in milliseconds since epoch.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
