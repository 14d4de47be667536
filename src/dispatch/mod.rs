//! Dispatch loop - claims and executes jobs, one at a time.
//!
//! A single dispatcher task polls the store for the oldest pending job,
//! transitions it through its state machine, and delegates to the strategy
//! matching the job type. It is the sole writer of `status` and the sole
//! invoker of strategies. The loop survives any single job's failure; a job
//! record vanishing mid-run is cooperative cancellation, not an error.

mod classify;
mod generate;
mod sync;

pub use classify::normalize_label;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::llm::InferenceClient;
use crate::prompt::PromptCatalog;
use crate::store::{Job, JobStatus, JobStore, JobType, UpdateOutcome};
use crate::tracker::IssueTracker;

/// Configuration for the dispatch loop
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Interval between idle polls of the store
    pub poll_interval: Duration,
    /// Pause between sync items, to respect tracker rate limits
    pub sync_delay: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            sync_delay: Duration::from_millis(500),
        }
    }
}

/// How a strategy run ended, short of a structural error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyOutcome {
    /// All units processed; the loop marks the job COMPLETED
    Finished,
    /// The job record disappeared at a liveness check; abort silently
    Vanished,
}

/// Single-consumer job dispatcher.
pub struct Dispatcher<I, T>
where
    I: InferenceClient,
    T: IssueTracker,
{
    store: JobStore,
    catalog: Arc<PromptCatalog>,
    inference: Arc<I>,
    tracker: Arc<T>,
    config: DispatchConfig,
}

impl<I, T> Dispatcher<I, T>
where
    I: InferenceClient,
    T: IssueTracker,
{
    /// Create a new dispatcher over the shared store and capabilities.
    pub fn new(
        store: JobStore,
        catalog: Arc<PromptCatalog>,
        inference: Arc<I>,
        tracker: Arc<T>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            inference,
            tracker,
            config,
        }
    }

    /// Run the polling loop until the shutdown signal flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(poll_interval_ms = self.config.poll_interval.as_millis() as u64, "dispatcher started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            match self.poll_once().await {
                Ok(true) => {
                    // A job just finished; look again immediately
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    // Store unavailable; log and keep polling
                    error!(error = %e, "poll failed");
                }
            }
            tokio::select! {
                _ = shutdown.changed() => {}
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
        info!("dispatcher stopped");
    }

    /// One scan-and-process round: claim the oldest pending job, if any,
    /// and run it to a terminal state. Returns whether a job was processed.
    pub async fn poll_once(&self) -> Result<bool> {
        match self.store.claim_oldest_pending()? {
            Some(job) => {
                self.process_job(job).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drive one claimed job through its state machine. Never panics and
    /// never propagates: every fault ends as a FAILED status (best effort)
    /// or a silent abort when the record is already gone.
    async fn process_job(&self, mut job: Job) {
        info!(job_id = %job.id, job_type = %job.job_type, units = job.total_units, "starting job");

        job.status = JobStatus::Running;
        job.touch();
        match self.store.update(&job) {
            Ok(UpdateOutcome::Updated) => {}
            Ok(UpdateOutcome::Missing) => {
                debug!(job_id = %job.id, "job cancelled before start");
                return;
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "could not mark job running");
                return;
            }
        }

        // Resolve the template up front; sync jobs need none, everything
        // else fails here without a single external call.
        let template = match job.job_type.category() {
            Some(category) => match self.catalog.resolve(category, &job.strategy) {
                Some(t) => Some(t.to_string()),
                None => {
                    warn!(
                        job_id = %job.id,
                        category = %category,
                        strategy = %job.strategy,
                        "no template resolved, failing job"
                    );
                    self.fail_job(&mut job);
                    return;
                }
            },
            None => None,
        };
        let template = template.as_deref().unwrap_or_default();

        let outcome = match job.job_type {
            JobType::ClassifyFr | JobType::ClassifyNfr => {
                classify::run(&self.store, self.inference.as_ref(), &mut job, template).await
            }
            JobType::GenerateSrs | JobType::GenerateUserStories => {
                generate::run(&self.store, self.inference.as_ref(), &mut job, template).await
            }
            JobType::SyncExternal => {
                sync::run(&self.store, self.tracker.as_ref(), &mut job, self.config.sync_delay).await
            }
        };

        match outcome {
            Ok(StrategyOutcome::Finished) => {
                job.status = JobStatus::Completed;
                job.touch();
                match self.store.update(&job) {
                    Ok(UpdateOutcome::Updated) => {
                        info!(job_id = %job.id, units = job.completed_units, "job completed");
                    }
                    Ok(UpdateOutcome::Missing) => {
                        debug!(job_id = %job.id, "job cancelled at completion");
                    }
                    Err(e) => {
                        error!(job_id = %job.id, error = %e, "could not persist COMPLETED status");
                    }
                }
            }
            Ok(StrategyOutcome::Vanished) => {
                debug!(job_id = %job.id, "job cancelled mid-run");
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "job failed");
                self.fail_job(&mut job);
            }
        }
    }

    /// Mark the job FAILED, best effort. A failure to persist FAILED is
    /// logged and swallowed; the loop must keep serving submissions.
    fn fail_job(&self, job: &mut Job) {
        job.status = JobStatus::Failed;
        job.touch();
        if let Err(e) = self.store.update(job) {
            error!(job_id = %job.id, error = %e, "could not persist FAILED status");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockInference;
    use crate::prompt::PromptCategory;
    use crate::store::JobInput;
    use crate::tracker::{MockTracker, TrackerConnection};
    use serde_json::json;

    fn catalog() -> Arc<PromptCatalog> {
        Arc::new(
            PromptCatalog::from_value(json!({
                "llm_map": {"Llama 3": "llama3"},
                "FR": {"zero-shot": "Classify FR: {review_text}"},
                "NFR": {"zero-shot": "Classify NFR: {review_text}"},
                "SRS": {"zero-shot": "SRS from: {review_text}"},
                "USER_STORIES": {"zero-shot": "Stories from: {review_text}"}
            }))
            .unwrap(),
        )
    }

    fn fast_config() -> DispatchConfig {
        DispatchConfig {
            poll_interval: Duration::from_millis(1),
            sync_delay: Duration::ZERO,
        }
    }

    fn dispatcher(
        store: &JobStore,
        inference: Arc<MockInference>,
        tracker: Arc<MockTracker>,
    ) -> Dispatcher<MockInference, MockTracker> {
        Dispatcher::new(store.clone(), catalog(), inference, tracker, fast_config())
    }

    fn connection() -> TrackerConnection {
        TrackerConnection {
            domain: "example.atlassian.net".to_string(),
            email: "dev@example.com".to_string(),
            token: "t".to_string(),
            project: "PROJ".to_string(),
        }
    }

    #[tokio::test]
    async fn test_poll_once_idle() {
        let store = JobStore::open_in_memory().unwrap();
        let d = dispatcher(&store, Arc::new(MockInference::always("Bug")), Arc::new(MockTracker::succeeding()));
        assert!(!d.poll_once().await.unwrap());
    }

    #[tokio::test]
    async fn test_classify_job_runs_to_completion() {
        let store = JobStore::open_in_memory().unwrap();
        let inference = Arc::new(MockInference::scripted(vec![
            Ok("This is clearly a Bug".to_string()),
            Ok("feature request".to_string()),
        ]));
        let d = dispatcher(&store, inference.clone(), Arc::new(MockTracker::succeeding()));

        let items = vec!["app crashes".to_string(), "please add dark mode".to_string()];
        let job = Job::new_classify(JobType::ClassifyFr, &items, "llama3", "zero-shot").unwrap();
        store.submit(&job).unwrap();

        assert!(d.poll_once().await.unwrap());

        let done = store.get(&job.id).unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.completed_units, 2);
        assert_eq!(done.results_lenient(), vec!["Bug".to_string(), "Feature".to_string()]);
        // Prompts were rendered through the template
        assert!(inference.calls()[0].1.starts_with("Classify FR: app crashes"));
    }

    #[tokio::test]
    async fn test_missing_template_fails_without_external_calls() {
        let store = JobStore::open_in_memory().unwrap();
        let inference = Arc::new(MockInference::always("Bug"));
        let d = dispatcher(&store, inference.clone(), Arc::new(MockTracker::succeeding()));

        let job = Job::new_classify(
            JobType::ClassifyNfr,
            &["slow startup".to_string()],
            "llama3",
            "chain-of-thought",
        )
        .unwrap();
        store.submit(&job).unwrap();

        d.poll_once().await.unwrap();

        let failed = store.get(&job.id).unwrap().unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.completed_units, 0);
        assert_eq!(inference.call_count(), 0);
    }

    #[tokio::test]
    async fn test_generation_falls_back_to_zero_shot() {
        let store = JobStore::open_in_memory().unwrap();
        let inference = Arc::new(MockInference::always("## SRS Document"));
        let d = dispatcher(&store, inference.clone(), Arc::new(MockTracker::succeeding()));

        let job =
            Job::new_generate(JobType::GenerateSrs, "reviews text", "llama3", "no-such-strategy").unwrap();
        store.submit(&job).unwrap();

        d.poll_once().await.unwrap();

        let done = store.get(&job.id).unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.completed_units, done.total_units);
        assert_eq!(done.results_lenient(), vec!["## SRS Document".to_string()]);
        // The zero-shot template was used
        assert!(inference.calls()[0].1.starts_with("SRS from:"));
    }

    #[tokio::test]
    async fn test_corrupt_input_fails_job_and_loop_survives() {
        let store = JobStore::open_in_memory().unwrap();
        let d = dispatcher(&store, Arc::new(MockInference::always("Bug")), Arc::new(MockTracker::succeeding()));

        let mut job =
            Job::new_classify(JobType::ClassifyFr, &["x".to_string()], "llama3", "zero-shot").unwrap();
        job.input_json = "{broken".to_string();
        store.submit(&job).unwrap();

        d.poll_once().await.unwrap();
        assert_eq!(store.get(&job.id).unwrap().unwrap().status, JobStatus::Failed);

        // The loop keeps serving subsequent submissions
        let next = Job::new_classify(JobType::ClassifyFr, &["y".to_string()], "llama3", "zero-shot").unwrap();
        store.submit(&next).unwrap();
        d.poll_once().await.unwrap();
        assert_eq!(store.get(&next.id).unwrap().unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_aborts_silently() {
        let store = JobStore::open_in_memory().unwrap();
        let inference = Arc::new(MockInference::always("Bug"));
        let d = dispatcher(&store, inference.clone(), Arc::new(MockTracker::succeeding()));

        let job = Job::new_classify(JobType::ClassifyFr, &["x".to_string()], "llama3", "zero-shot").unwrap();
        store.submit(&job).unwrap();
        let claimed = store.claim_oldest_pending().unwrap().unwrap();
        store.delete_all().unwrap();

        d.process_job(claimed).await;

        assert!(store.get(&job.id).unwrap().is_none());
        assert_eq!(inference.call_count(), 0);
    }

    #[tokio::test]
    async fn test_sync_job_with_failing_tracker_still_completes() {
        let store = JobStore::open_in_memory().unwrap();
        let tracker = Arc::new(MockTracker::failing());
        let d = dispatcher(&store, Arc::new(MockInference::always("unused")), tracker.clone());

        let items = vec!["s1".to_string(), "s2".to_string(), "s3".to_string()];
        let job = Job::new_sync(connection(), &items).unwrap();
        store.submit(&job).unwrap();

        d.poll_once().await.unwrap();

        let done = store.get(&job.id).unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.completed_units, 3);
        assert_eq!(done.results_lenient(), vec!["Failed"; 3]);
        assert_eq!(tracker.call_count(), 3);
    }

    #[tokio::test]
    async fn test_run_honors_shutdown() {
        let store = JobStore::open_in_memory().unwrap();
        let d = dispatcher(&store, Arc::new(MockInference::always("Bug")), Arc::new(MockTracker::succeeding()));

        let (tx, rx) = watch::channel(true);
        // Already signalled: run returns promptly
        d.run(rx).await;
        drop(tx);
    }

    #[test]
    fn test_job_type_routes_through_category() {
        // Every non-sync type resolves under some category; the dispatcher
        // relies on this to decide whether a template is required.
        for jt in [
            JobType::ClassifyFr,
            JobType::ClassifyNfr,
            JobType::GenerateSrs,
            JobType::GenerateUserStories,
        ] {
            assert!(jt.category().is_some());
        }
        assert!(JobType::SyncExternal.category().is_none());
    }

    #[test]
    fn test_sync_payload_still_readable_as_input() {
        let job = Job::new_sync(connection(), &["a".to_string()]).unwrap();
        assert!(matches!(job.input().unwrap(), JobInput::Sync(_)));
    }

    #[test]
    fn test_default_dispatch_config() {
        let c = DispatchConfig::default();
        assert_eq!(c.poll_interval, Duration::from_secs(1));
        assert_eq!(c.sync_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_catalog_resolution_matrix() {
        let catalog = catalog();
        assert!(catalog.resolve(PromptCategory::Fr, "zero-shot").is_some());
        assert!(catalog.resolve(PromptCategory::Fr, "missing").is_none());
        assert!(catalog.resolve(PromptCategory::Srs, "missing").is_some());
    }
}
