//! Generation strategy - one inference call, one commit.
//!
//! SRS and user-story jobs carry a single combined input text. The result
//! is a singleton list; progress jumps from zero to total in the final
//! update, so observers never see a partial generation.

use tracing::warn;

use crate::dispatch::StrategyOutcome;
use crate::error::Result;
use crate::llm::InferenceClient;
use crate::prompt::PromptCatalog;
use crate::store::{Job, JobInput, JobStore, UpdateOutcome};

/// Result marker prefix recorded when the inference call fails.
pub const ERROR_GENERATION: &str = "ERROR_GENERATION";

pub(super) async fn run<I: InferenceClient>(
    store: &JobStore,
    inference: &I,
    job: &mut Job,
    template: &str,
) -> Result<StrategyOutcome> {
    // Generation input is a singleton list; anything else is treated as the
    // raw text rather than rejected.
    let combined = match job.input() {
        Ok(JobInput::Items(items)) if !items.is_empty() => {
            items.into_iter().next().unwrap_or_default()
        }
        _ => job.input_json.clone(),
    };

    let prompt = PromptCatalog::render(template, &combined);
    let result = match inference.infer(&job.model, &prompt).await {
        Ok(text) => text,
        Err(e) => {
            warn!(job_id = %job.id, error = %e, "inference failed for generation");
            format!("{}: {}", ERROR_GENERATION, e)
        }
    };

    job.set_results(&[result])?;
    job.completed_units = job.total_units;
    job.touch();
    match store.update(job)? {
        UpdateOutcome::Updated => Ok(StrategyOutcome::Finished),
        UpdateOutcome::Missing => Ok(StrategyOutcome::Vanished),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockInference;
    use crate::store::JobType;

    #[tokio::test]
    async fn test_run_single_commit() {
        let store = JobStore::open_in_memory().unwrap();
        let inference = MockInference::always("## Generated SRS");

        let mut job =
            Job::new_generate(JobType::GenerateSrs, "all the reviews", "llama3", "zero-shot").unwrap();
        store.submit(&job).unwrap();

        let outcome = run(&store, &inference, &mut job, "SRS from: {review_text}")
            .await
            .unwrap();

        assert_eq!(outcome, StrategyOutcome::Finished);
        assert_eq!(job.completed_units, job.total_units);
        assert_eq!(job.results_lenient(), vec!["## Generated SRS".to_string()]);
        assert_eq!(inference.calls()[0].1, "SRS from: all the reviews");
    }

    #[tokio::test]
    async fn test_run_inference_failure_becomes_marker() {
        let store = JobStore::open_in_memory().unwrap();
        let inference = MockInference::failing("model not loaded");

        let mut job =
            Job::new_generate(JobType::GenerateUserStories, "input", "llama3", "zero-shot").unwrap();
        store.submit(&job).unwrap();

        let outcome = run(&store, &inference, &mut job, "{review_text}").await.unwrap();

        // A failed call is recorded as data; the job still finishes
        assert_eq!(outcome, StrategyOutcome::Finished);
        let results = job.results_lenient();
        assert_eq!(results.len(), 1);
        assert!(results[0].starts_with(ERROR_GENERATION));
    }

    #[tokio::test]
    async fn test_run_malformed_input_uses_raw_text() {
        let store = JobStore::open_in_memory().unwrap();
        let inference = MockInference::always("ok");

        let mut job = Job::new_generate(JobType::GenerateSrs, "x", "llama3", "zero-shot").unwrap();
        job.input_json = "not a json array".to_string();
        store.submit(&job).unwrap();

        run(&store, &inference, &mut job, "{review_text}").await.unwrap();
        assert_eq!(inference.calls()[0].1, "not a json array");
    }

    #[tokio::test]
    async fn test_run_deleted_record_vanishes() {
        let store = JobStore::open_in_memory().unwrap();
        let inference = MockInference::always("text");

        let mut job = Job::new_generate(JobType::GenerateSrs, "x", "llama3", "zero-shot").unwrap();
        // Record never stored: the single commit finds nothing to update

        let outcome = run(&store, &inference, &mut job, "{review_text}").await.unwrap();
        assert_eq!(outcome, StrategyOutcome::Vanished);
    }
}
