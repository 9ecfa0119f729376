//! Engine error taxonomy.
//!
//! Defined in `psytest-core` so callers can classify failures without
//! string matching: precondition violations are surfaced and never retried
//! by the engine, validation errors require corrected input, and
//! resource-state errors are valid outcomes rather than bugs.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::model::AssignmentStatus;

/// Errors produced by an `AssignmentStore` implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No assignment with the given id exists.
    #[error("assignment not found: {0}")]
    NotFound(Uuid),

    /// The unique active-attempt index rejected the insert.
    #[error("an active assignment already exists for this student and instrument")]
    DuplicateActive,

    /// The stored version no longer matches what the caller observed.
    #[error("version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: u64, found: u64 },

    /// Backend failure (I/O, connection, serialization).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by the assignment lifecycle and aggregation engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown instrument type: {0}")]
    UnknownInstrument(String),

    #[error("unknown cohort: {0}")]
    UnknownCohort(String),

    #[error("assignment not found: {0}")]
    AssignmentNotFound(Uuid),

    /// The single-active-attempt invariant would be violated.
    #[error("student {student_id} already has an active '{instrument_type}' assignment")]
    DuplicateActiveAssignment {
        student_id: Uuid,
        instrument_type: String,
    },

    /// The most recent completed attempt is still inside the cooldown window.
    #[error("cooldown active until {until}")]
    CooldownActive { until: DateTime<Utc> },

    #[error("maximum attempts reached ({max_attempts})")]
    MaxAttemptsReached { max_attempts: u32 },

    /// The assignment is not in the state the operation requires.
    #[error("invalid state: expected {expected}, found {found}")]
    InvalidState {
        expected: AssignmentStatus,
        found: AssignmentStatus,
    },

    #[error("assignment is already terminal ({0})")]
    AlreadyTerminal(AssignmentStatus),

    /// The stored record changed underneath the caller; a re-read is required.
    #[error("state precondition failed: assignment was modified concurrently")]
    StatePrecondition,

    #[error("question index {index} out of range (question count {count})")]
    InvalidQuestionIndex { index: usize, count: usize },

    #[error("answer value {value} outside ordinal range {min}..={max}")]
    InvalidValue { value: u8, min: u8, max: u8 },

    #[error("answer for question index {index} already recorded")]
    AnswerAlreadyRecorded { index: usize },

    #[error("incomplete answers: {answered} answered, {required} required")]
    IncompleteAnswers { answered: usize, required: usize },

    /// Aggregating fewer than 2 completed results is a valid outcome of
    /// querying a too-small cohort, not a bug.
    #[error("insufficient data: {count} completed result(s), need at least 2")]
    InsufficientData { count: usize },

    #[error(transparent)]
    Store(StoreError),
}

impl EngineError {
    /// Stable kebab-case code for wire responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::UnknownInstrument(_) => "unknown-instrument",
            EngineError::UnknownCohort(_) => "unknown-cohort",
            EngineError::AssignmentNotFound(_) => "assignment-not-found",
            EngineError::DuplicateActiveAssignment { .. } => "duplicate-active-assignment",
            EngineError::CooldownActive { .. } => "cooldown-active",
            EngineError::MaxAttemptsReached { .. } => "max-attempts-reached",
            EngineError::InvalidState { .. } => "invalid-state",
            EngineError::AlreadyTerminal(_) => "already-terminal",
            EngineError::StatePrecondition => "state-precondition",
            EngineError::InvalidQuestionIndex { .. } => "invalid-question-index",
            EngineError::InvalidValue { .. } => "invalid-value",
            EngineError::AnswerAlreadyRecorded { .. } => "answer-already-recorded",
            EngineError::IncompleteAnswers { .. } => "incomplete-answers",
            EngineError::InsufficientData { .. } => "insufficient-data",
            EngineError::Store(_) => "storage-error",
        }
    }

    /// Returns `true` for validation errors where a retry cannot help and
    /// the caller must correct its input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidQuestionIndex { .. }
                | EngineError::InvalidValue { .. }
                | EngineError::IncompleteAnswers { .. }
        )
    }

    /// Returns `true` for precondition violations on shared state.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            EngineError::DuplicateActiveAssignment { .. }
                | EngineError::InvalidState { .. }
                | EngineError::AlreadyTerminal(_)
                | EngineError::StatePrecondition
                | EngineError::AnswerAlreadyRecorded { .. }
        )
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => EngineError::AssignmentNotFound(id),
            StoreError::VersionConflict { .. } => EngineError::StatePrecondition,
            other => EngineError::Store(other),
        }
    }
}
