//! Server error types and HTTP status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use psytest_core::error::EngineError;

/// Errors that can occur in the psytest server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O failure while serving.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An engine error carried through a handler, rendered as a single JSON
/// error shape: `{"error": <kebab-case code>, "message": <human text>}`.
#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            EngineError::UnknownInstrument(_)
            | EngineError::UnknownCohort(_)
            | EngineError::AssignmentNotFound(_) => StatusCode::NOT_FOUND,

            EngineError::DuplicateActiveAssignment { .. }
            | EngineError::InvalidState { .. }
            | EngineError::AlreadyTerminal(_)
            | EngineError::StatePrecondition
            | EngineError::AnswerAlreadyRecorded { .. } => StatusCode::CONFLICT,

            EngineError::CooldownActive { .. } | EngineError::MaxAttemptsReached { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }

            EngineError::InvalidValue { .. } | EngineError::InvalidQuestionIndex { .. } => {
                StatusCode::BAD_REQUEST
            }

            EngineError::IncompleteAnswers { .. } | EngineError::InsufficientData { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }

            EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = json!({
            "error": self.0.code(),
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
