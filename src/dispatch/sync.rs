//! External-sync strategy - one tracker issue per item, committed per item.
//!
//! Each item title becomes an issue in the configured tracker. The summary
//! is the title truncated to the tracker's limit; the full title goes into
//! the description. Per-item failures are recorded as `Failed` markers and
//! never abort the batch. A pause between items keeps the tracker's rate
//! limiter happy.

use std::time::Duration;

use tracing::warn;

use crate::dispatch::StrategyOutcome;
use crate::error::{ReqsmithError, Result};
use crate::store::{Job, JobInput, JobStore, UpdateOutcome};
use crate::tracker::IssueTracker;

/// Maximum summary length accepted by the tracker
const SUMMARY_MAX_CHARS: usize = 200;

/// Result marker recorded when issue creation fails for an item
pub const FAILED_MARKER: &str = "Failed";

pub(super) async fn run<T: IssueTracker>(
    store: &JobStore,
    tracker: &T,
    job: &mut Job,
    delay: Duration,
) -> Result<StrategyOutcome> {
    let payload = match job.input()? {
        JobInput::Sync(payload) => payload,
        JobInput::Items(_) => {
            return Err(ReqsmithError::InvalidInput(
                "sync job is missing connection parameters".to_string(),
            ))
        }
    };

    let mut results = Vec::with_capacity(payload.items.len());
    for (index, item) in payload.items.iter().enumerate() {
        if !store.exists(&job.id)? {
            return Ok(StrategyOutcome::Vanished);
        }

        let summary: String = item.chars().take(SUMMARY_MAX_CHARS).collect();
        let entry = match tracker.create_issue(&payload.connection, &summary, item).await {
            Ok(key) => format!("Created {}", key),
            Err(e) => {
                warn!(job_id = %job.id, item = index, error = %e, "issue creation failed");
                FAILED_MARKER.to_string()
            }
        };
        results.push(entry);

        job.completed_units = (index + 1) as u32;
        job.set_results(&results)?;
        job.touch();
        if store.update(job)? == UpdateOutcome::Missing {
            return Ok(StrategyOutcome::Vanished);
        }

        tokio::time::sleep(delay).await;
    }

    Ok(StrategyOutcome::Finished)
}
