//! REST API handlers.
//!
//! Every mutating call returns the new authoritative assignment state, so
//! callers never need a speculative re-fetch after a mutation.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use psytest_core::error::{EngineError, StoreError};
use psytest_core::lifecycle::AnswerFlag;
use psytest_core::model::{AggregateProfile, Assignment, AssignmentStatus, ScoreResult};

use crate::error::ApiError;
use crate::state::AppState;

/// Build the full application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/assignments", post(create_assignment))
        .route("/assignments/:id", get(get_assignment))
        .route("/assignments/:id/start", post(start_assignment))
        .route("/assignments/:id/answers", post(submit_answer))
        .route("/assignments/:id/complete", post(complete_assignment))
        .route("/assignments/:id/revoke", post(revoke_assignment))
        .route("/cohorts/:cohort_id/aggregate", get(cohort_aggregate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: i64,
    pub instrument_types: Vec<String>,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let mut instrument_types: Vec<String> = state
        .engine
        .catalog()
        .instrument_types()
        .map(String::from)
        .collect();
    instrument_types.sort();

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        instrument_types,
    })
}

/// Request body for `POST /assignments`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateAssignmentRequest {
    pub student_id: Uuid,
    pub instrument_type: String,
    #[serde(default)]
    pub assigned_by: Option<String>,
}

async fn create_assignment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateAssignmentRequest>,
) -> Result<(StatusCode, Json<Assignment>), ApiError> {
    let assigned_by = req.assigned_by.as_deref().unwrap_or("system");
    let assignment = state
        .engine
        .assign(req.student_id, &req.instrument_type, assigned_by)
        .await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

/// Revoked assignments are unreadable through the student-facing surface;
/// the record itself is retained for audit.
async fn get_assignment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Assignment>, ApiError> {
    let assignment = state.engine.get(id).await?;
    if assignment.status == AssignmentStatus::Revoked {
        return Err(EngineError::AssignmentNotFound(id).into());
    }
    Ok(Json(assignment))
}

async fn start_assignment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Assignment>, ApiError> {
    Ok(Json(state.engine.start(id).await?))
}

/// Request body for `POST /assignments/{id}/answers`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitAnswerRequest {
    pub question_index: usize,
    pub value: u8,
    pub time_spent_ms: u64,
}

/// Response for an accepted answer.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitAnswerResponse {
    pub accepted: bool,
    pub flags: Vec<AnswerFlag>,
    pub answered_count: usize,
}

async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<Json<SubmitAnswerResponse>, ApiError> {
    let outcome = state
        .engine
        .submit_answer(id, req.question_index, req.value, req.time_spent_ms)
        .await?;
    Ok(Json(SubmitAnswerResponse {
        accepted: true,
        flags: outcome.flags,
        answered_count: outcome.assignment.answered_count(),
    }))
}

/// Response for `POST /assignments/{id}/complete`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteResponse {
    pub assignment: Assignment,
    pub score: ScoreResult,
}

async fn complete_assignment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CompleteResponse>, ApiError> {
    let assignment = state.engine.complete(id).await?;
    // Completion always scores; a missing score here is a storage fault.
    let score = assignment.score.clone().ok_or_else(|| {
        EngineError::Store(StoreError::Backend(
            "completed assignment is missing its score".into(),
        ))
    })?;
    Ok(Json(CompleteResponse { assignment, score }))
}

async fn revoke_assignment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Assignment>, ApiError> {
    Ok(Json(state.engine.revoke(id).await?))
}

/// Query parameters for the cohort aggregate endpoint.
#[derive(Debug, Deserialize)]
pub struct AggregateQuery {
    pub instrument_type: String,
}

async fn cohort_aggregate(
    State(state): State<Arc<AppState>>,
    Path(cohort_id): Path<String>,
    Query(query): Query<AggregateQuery>,
) -> Result<Json<AggregateProfile>, ApiError> {
    let students = state
        .roster
        .students_in(&cohort_id)
        .await
        .map_err(EngineError::from)?
        .ok_or_else(|| EngineError::UnknownCohort(cohort_id.clone()))?;

    let profile = state
        .engine
        .aggregate(&students, &query.instrument_type)
        .await?;
    Ok(Json(profile))
}
