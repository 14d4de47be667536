//! Classification strategy - one label per item, committed per item.
//!
//! Each review text is rendered into the resolved template, sent to the
//! inference backend, and the reply normalized into a known label. Progress
//! is persisted after every item so the status boundary always sees a
//! consistent prefix of results.

use tracing::warn;

use crate::dispatch::StrategyOutcome;
use crate::error::{ReqsmithError, Result};
use crate::llm::InferenceClient;
use crate::prompt::PromptCatalog;
use crate::store::{Job, JobInput, JobStore, UpdateOutcome};

/// Labels a model reply can normalize to, in match priority order.
/// Anything that matches none of these becomes `Other`.
pub const LABELS: &[&str] = &[
    "Feature",
    "Bug",
    "Performance",
    "Usability",
    "Reliability",
    "Security",
    "FR_Category_1",
    "FR_Category_2",
    "Other",
];

/// Result marker recorded when the inference call for an item fails.
/// The item counts as processed; the job keeps going.
pub const ERROR_LLM: &str = "ERROR_LLM";

/// Normalize a raw model reply to a known label.
///
/// Case-insensitive substring match against the label set, first hit wins.
/// Model replies are often chatty ("This review describes a bug in...");
/// substring matching extracts the label without demanding exact output.
pub fn normalize_label(raw: &str) -> &'static str {
    let lowered = raw.to_lowercase();
    LABELS
        .iter()
        .find(|label| lowered.contains(&label.to_lowercase()))
        .copied()
        .unwrap_or("Other")
}

pub(super) async fn run<I: InferenceClient>(
    store: &JobStore,
    inference: &I,
    job: &mut Job,
    template: &str,
) -> Result<StrategyOutcome> {
    let items = match job.input()? {
        JobInput::Items(items) => items,
        JobInput::Sync(_) => {
            return Err(ReqsmithError::InvalidInput(
                "classification job carries a sync bundle".to_string(),
            ))
        }
    };

    let mut results = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        // Liveness check before spending an inference call
        if !store.exists(&job.id)? {
            return Ok(StrategyOutcome::Vanished);
        }

        let prompt = PromptCatalog::render(template, item);
        let label = match inference.infer(&job.model, &prompt).await {
            Ok(reply) => normalize_label(&reply).to_string(),
            Err(e) => {
                warn!(job_id = %job.id, item = index, error = %e, "inference failed for item");
                ERROR_LLM.to_string()
            }
        };
        results.push(label);

        job.completed_units = (index + 1) as u32;
        job.set_results(&results)?;
        job.touch();
        if store.update(job)? == UpdateOutcome::Missing {
            return Ok(StrategyOutcome::Vanished);
        }
    }

    Ok(StrategyOutcome::Finished)
}
