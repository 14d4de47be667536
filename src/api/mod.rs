//! HTTP boundary - thin submission/status/cancellation layer over the store.
//!
//! Handlers never run jobs; they write and read job records. Everything the
//! dispatch loop needs travels through the store, so the handlers and the
//! loop share nothing else.

mod handlers;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ReqsmithError;
use crate::prompt::PromptCatalog;
use crate::store::{JobStatus, JobStore, JobType};
use crate::tracker::TrackerConnection;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: JobStore,
    pub catalog: Arc<PromptCatalog>,
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/jobs/classify", post(handlers::submit_classify))
        .route("/jobs/generate", post(handlers::submit_generate))
        .route("/jobs/sync", post(handlers::submit_sync))
        .route("/jobs/{id}", get(handlers::job_status))
        .route("/jobs", delete(handlers::cancel))
        .route("/options", get(handlers::options))
        .with_state(state)
}

/// Classification submission: an ordered batch of review texts.
#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub job_type: JobType,
    pub items: Vec<String>,
    pub model: String,
    pub strategy: String,
}

/// Generation submission: one combined input text.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub job_type: JobType,
    pub input_text: String,
    pub model: String,
    pub strategy: String,
}

/// Sync submission: tracker connection plus item titles.
#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub connection: TrackerConnection,
    pub items: Vec<String>,
}

/// Reply to any submission.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: JobStatus,
}

/// Full job snapshot served to status polls.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub id: String,
    pub job_type: JobType,
    pub status: JobStatus,
    pub total_units: u32,
    pub completed_units: u32,
    pub items: Vec<String>,
    pub results: Vec<String>,
    pub model: String,
    pub strategy: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Reply to cancellation.
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: usize,
}

/// Frontend model names and per-category strategy names.
#[derive(Debug, Serialize)]
pub struct OptionsResponse {
    pub models: Vec<String>,
    pub strategies: BTreeMap<String, Vec<String>>,
}

/// Handler-level error: an HTTP status plus a message body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<ReqsmithError> for ApiError {
    fn from(e: ReqsmithError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
