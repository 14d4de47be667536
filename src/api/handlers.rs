//! Request handlers for the job API.

use axum::extract::{Path, State};
use axum::Json;
use tracing::info;

use crate::api::{
    ApiError, AppState, CancelResponse, ClassifyRequest, GenerateRequest, JobStatusResponse,
    OptionsResponse, SubmitResponse, SyncRequest,
};
use crate::prompt::PromptCategory;
use crate::store::{Job, JobType};

/// Submit a classification job over a batch of review texts.
pub async fn submit_classify(
    State(state): State<AppState>,
    Json(req): Json<ClassifyRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    if !matches!(req.job_type, JobType::ClassifyFr | JobType::ClassifyNfr) {
        return Err(ApiError::bad_request(format!(
            "'{}' is not a classification job type",
            req.job_type
        )));
    }
    if req.items.is_empty() {
        return Err(ApiError::bad_request("'items' must not be empty"));
    }
    let model = backend_model(&state, &req.model)?;

    let job = Job::new_classify(req.job_type, &req.items, model, &req.strategy)?;
    state.store.submit(&job)?;
    info!(job_id = %job.id, job_type = %job.job_type, units = job.total_units, "classification job submitted");

    Ok(Json(SubmitResponse {
        job_id: job.id,
        status: job.status,
    }))
}

/// Submit a generation job over one combined input text.
pub async fn submit_generate(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    if !matches!(req.job_type, JobType::GenerateSrs | JobType::GenerateUserStories) {
        return Err(ApiError::bad_request(format!(
            "'{}' is not a generation job type",
            req.job_type
        )));
    }
    if req.input_text.trim().is_empty() {
        return Err(ApiError::bad_request("'input_text' must not be empty"));
    }
    let model = backend_model(&state, &req.model)?;

    let job = Job::new_generate(req.job_type, &req.input_text, model, &req.strategy)?;
    state.store.submit(&job)?;
    info!(job_id = %job.id, job_type = %job.job_type, "generation job submitted");

    Ok(Json(SubmitResponse {
        job_id: job.id,
        status: job.status,
    }))
}

/// Submit an external-sync job: one tracker issue per item.
pub async fn submit_sync(
    State(state): State<AppState>,
    Json(req): Json<SyncRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    if req.items.is_empty() {
        return Err(ApiError::bad_request("'items' must not be empty"));
    }

    let job = Job::new_sync(req.connection, &req.items)?;
    state.store.submit(&job)?;
    info!(job_id = %job.id, units = job.total_units, "sync job submitted");

    Ok(Json(SubmitResponse {
        job_id: job.id,
        status: job.status,
    }))
}

/// Poll one job's progress. Safe against corrupted stored payloads: items
/// and results degrade to empty sequences rather than failing the read.
pub async fn job_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let job = state
        .store
        .get(&id)?
        .ok_or_else(|| ApiError::not_found(format!("no job with id '{}'", id)))?;

    Ok(Json(JobStatusResponse {
        items: job.items_lenient(),
        results: job.results_lenient(),
        id: job.id,
        job_type: job.job_type,
        status: job.status,
        total_units: job.total_units,
        completed_units: job.completed_units,
        model: job.model,
        strategy: job.strategy,
        created_at: job.created_at,
        updated_at: job.updated_at,
    }))
}

/// Cancel whatever job exists. The dispatch loop observes the deletion at
/// its next liveness check; cancellation is cooperative, never instant.
pub async fn cancel(State(state): State<AppState>) -> Result<Json<CancelResponse>, ApiError> {
    let cancelled = state.store.delete_all()?;
    if cancelled > 0 {
        info!(cancelled, "job cancelled");
    }
    Ok(Json(CancelResponse { cancelled }))
}

/// List the frontend model names and the strategy names per category.
pub async fn options(State(state): State<AppState>) -> Json<OptionsResponse> {
    let models = state.catalog.model_names().iter().map(|s| s.to_string()).collect();
    let strategies = PromptCategory::all()
        .into_iter()
        .map(|category| {
            let names = state
                .catalog
                .strategy_names(category)
                .iter()
                .map(|s| s.to_string())
                .collect();
            (category.as_str().to_string(), names)
        })
        .collect();

    Json(OptionsResponse { models, strategies })
}

/// Map a frontend model name through the catalog, rejecting unknown names
/// before a job record is ever created.
fn backend_model<'a>(state: &'a AppState, frontend_name: &str) -> Result<&'a str, ApiError> {
    state
        .catalog
        .backend_model(frontend_name)
        .ok_or_else(|| ApiError::bad_request(format!("unknown model '{}'", frontend_name)))
}
