//! Issue tracker capability.
//!
//! Sync jobs push item titles into an external tracker one at a time. The
//! core sees only this trait: create one issue, get back the tracker's key
//! or an error. Per-item failures are recorded as data, never retried.

mod jira;

pub use jira::{JiraTracker, JiraTrackerConfig};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Connection parameters for one sync job. Carried in the job's input
/// payload, not in process configuration - each submission brings its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackerConnection {
    /// Tracker host, with or without scheme
    pub domain: String,
    /// Account email for basic auth
    pub email: String,
    /// API token for basic auth
    pub token: String,
    /// Destination project key
    pub project: String,
}

/// Errors that can occur during an issue-creation call
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Issue-creation capability.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Create a single issue; returns the tracker-assigned key.
    async fn create_issue(
        &self,
        conn: &TrackerConnection,
        summary: &str,
        description: &str,
    ) -> Result<String, TrackerError>;
}

/// Test tracker that hands out sequential keys, or always fails.
pub struct MockTracker {
    fail: bool,
    counter: AtomicUsize,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockTracker {
    /// Every call succeeds with keys PROJ-1, PROJ-2, ...
    pub fn succeeding() -> Self {
        Self {
            fail: false,
            counter: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            counter: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Recorded (summary, description) pairs.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IssueTracker for MockTracker {
    async fn create_issue(
        &self,
        conn: &TrackerConnection,
        summary: &str,
        description: &str,
    ) -> Result<String, TrackerError> {
        self.calls
            .lock()
            .unwrap()
            .push((summary.to_string(), description.to_string()));

        if self.fail {
            return Err(TrackerError::Api {
                status: 400,
                message: "mock failure".to_string(),
            });
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("{}-{}", conn.project, n))
    }
}
