//! Assignment lifecycle engine.
//!
//! Orchestrates the assignment state machine over the `AssignmentStore`
//! seam: assign, start, answer submission, completion (with synchronous
//! scoring), revocation, and cohort aggregation. Every mutation is an
//! optimistic compare-and-swap; a losing writer observes
//! `StatePrecondition` and the caller re-reads.

use std::fmt;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{self, InstrumentCatalog};
use crate::error::{EngineError, StoreError};
use crate::model::{
    AggregateProfile, Answer, Assignment, AssignmentStatus, InstrumentDefinition, ScoreResult,
};
use crate::scoring;
use crate::statistics;
use crate::traits::AssignmentStore;

/// Data-quality flags attached to an accepted answer submission.
/// These never block the workflow; they annotate the record for analytics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnswerFlag {
    /// Submitted below `min_time_per_question_ms`.
    FastAnswer,
    /// The attempt's quick-answer count reached the configured threshold.
    SuspiciousPattern,
}

impl fmt::Display for AnswerFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerFlag::FastAnswer => write!(f, "fast-answer"),
            AnswerFlag::SuspiciousPattern => write!(f, "suspicious-pattern"),
        }
    }
}

/// Result of an accepted answer submission.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub assignment: Assignment,
    pub flags: Vec<AnswerFlag>,
}

/// The central lifecycle engine.
pub struct AssignmentEngine {
    catalog: Arc<InstrumentCatalog>,
    store: Arc<dyn AssignmentStore>,
}

impl AssignmentEngine {
    pub fn new(catalog: Arc<InstrumentCatalog>, store: Arc<dyn AssignmentStore>) -> Self {
        Self { catalog, store }
    }

    pub fn catalog(&self) -> &InstrumentCatalog {
        &self.catalog
    }

    /// Create a new `pending` assignment for `(student, instrument)`.
    ///
    /// Enforces the single-active-attempt invariant through the store's
    /// atomic check-and-insert, and the attempt/cooldown policy over the
    /// student's completed history. Only completed attempts consume an
    /// attempt or start a cooldown; revocations do neither.
    pub async fn assign(
        &self,
        student_id: Uuid,
        instrument_type: &str,
        assigned_by: &str,
    ) -> Result<Assignment, EngineError> {
        let instrument = self
            .catalog
            .latest(instrument_type)
            .ok_or_else(|| EngineError::UnknownInstrument(instrument_type.to_string()))?;

        let history = self.store.attempts_for(student_id, instrument_type).await?;

        let completed: Vec<&Assignment> = history
            .iter()
            .filter(|a| a.status == AssignmentStatus::Completed)
            .collect();

        if completed.len() as u32 >= instrument.config.max_attempts {
            return Err(EngineError::MaxAttemptsReached {
                max_attempts: instrument.config.max_attempts,
            });
        }

        if let Some(last) = completed
            .iter()
            .filter_map(|a| a.completed_at)
            .max()
        {
            let until = last + Duration::hours(instrument.config.cooldown_hours);
            if Utc::now() < until {
                return Err(EngineError::CooldownActive { until });
            }
        }

        let id = Uuid::new_v4();
        let question_count = instrument.question_count();
        let question_order = if instrument.config.shuffle_questions {
            catalog::shuffled_order(question_count, id)
        } else {
            catalog::sequential_order(question_count)
        };

        let assignment = Assignment {
            id,
            student_id,
            instrument_type: instrument_type.to_string(),
            instrument_version: instrument.version,
            status: AssignmentStatus::Pending,
            assigned_at: Utc::now(),
            assigned_by: assigned_by.to_string(),
            started_at: None,
            completed_at: None,
            question_order,
            answers: vec![None; question_count],
            attempt_number: history.len() as u32 + 1,
            quick_answer_count: 0,
            suspicious_pattern: false,
            score: None,
            version: 0,
        };

        match self.store.insert(assignment).await {
            Ok(created) => {
                tracing::info!(
                    assignment_id = %created.id,
                    student_id = %student_id,
                    instrument = instrument_type,
                    attempt = created.attempt_number,
                    "assignment created"
                );
                Ok(created)
            }
            Err(StoreError::DuplicateActive) => Err(EngineError::DuplicateActiveAssignment {
                student_id,
                instrument_type: instrument_type.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch an assignment by id.
    pub async fn get(&self, id: Uuid) -> Result<Assignment, EngineError> {
        Ok(self.store.get(id).await?)
    }

    /// Transition `pending -> in_progress`. Idempotent for an assignment
    /// already `in_progress`, to tolerate client retries.
    pub async fn start(&self, id: Uuid) -> Result<Assignment, EngineError> {
        let mut assignment = self.store.get(id).await?;

        match assignment.status {
            AssignmentStatus::Pending => {}
            AssignmentStatus::InProgress => return Ok(assignment),
            found => {
                return Err(EngineError::InvalidState {
                    expected: AssignmentStatus::Pending,
                    found,
                })
            }
        }

        let expected = assignment.version;
        assignment.status = AssignmentStatus::InProgress;
        assignment.started_at = Some(Utc::now());
        let updated = self.store.update(expected, assignment).await?;
        tracing::info!(assignment_id = %id, "assignment started");
        Ok(updated)
    }

    /// Validate and record one answer against an `in_progress` assignment.
    ///
    /// Idempotent per `(assignment, question_index)` under the backtrack
    /// policy: a duplicate retry either overwrites (when `allow_backtrack`)
    /// or is rejected with `AnswerAlreadyRecorded`. A version conflict
    /// triggers exactly one re-read and re-validation.
    pub async fn submit_answer(
        &self,
        id: Uuid,
        question_index: usize,
        value: u8,
        time_spent_ms: u64,
    ) -> Result<SubmitOutcome, EngineError> {
        for attempt in 0..2 {
            let assignment = self.store.get(id).await?;
            let instrument = self.instrument_for(&assignment)?;

            let (candidate, expected, flags) = self.apply_answer(
                assignment,
                &instrument,
                question_index,
                value,
                time_spent_ms,
            )?;

            match self.store.update(expected, candidate).await {
                Ok(updated) => {
                    return Ok(SubmitOutcome {
                        assignment: updated,
                        flags,
                    })
                }
                Err(StoreError::VersionConflict { .. }) if attempt == 0 => {
                    tracing::debug!(assignment_id = %id, "answer write lost the race, re-reading");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(EngineError::StatePrecondition)
    }

    /// Pure validation + mutation step of `submit_answer`.
    fn apply_answer(
        &self,
        mut assignment: Assignment,
        instrument: &InstrumentDefinition,
        question_index: usize,
        value: u8,
        time_spent_ms: u64,
    ) -> Result<(Assignment, u64, Vec<AnswerFlag>), EngineError> {
        if assignment.status != AssignmentStatus::InProgress {
            return Err(EngineError::InvalidState {
                expected: AssignmentStatus::InProgress,
                found: assignment.status,
            });
        }

        let count = assignment.question_order.len();
        if question_index >= count {
            return Err(EngineError::InvalidQuestionIndex {
                index: question_index,
                count,
            });
        }

        let config = &instrument.config;
        if value < config.scale_min || value > config.scale_max {
            return Err(EngineError::InvalidValue {
                value,
                min: config.scale_min,
                max: config.scale_max,
            });
        }

        let revision = match &assignment.answers[question_index] {
            Some(existing) => {
                if !config.allow_backtrack {
                    return Err(EngineError::AnswerAlreadyRecorded {
                        index: question_index,
                    });
                }
                existing.revision + 1
            }
            None => 0,
        };

        let flagged_fast = time_spent_ms < config.min_time_per_question_ms;
        if time_spent_ms > config.max_time_per_question_ms {
            tracing::debug!(
                assignment_id = %assignment.id,
                question_index,
                time_spent_ms,
                "answer exceeded max time per question"
            );
        }

        let mut flags = Vec::new();
        if flagged_fast {
            flags.push(AnswerFlag::FastAnswer);
            assignment.quick_answer_count += 1;
            if !assignment.suspicious_pattern
                && assignment.quick_answer_count >= config.fast_answer_threshold
            {
                assignment.suspicious_pattern = true;
                tracing::warn!(
                    assignment_id = %assignment.id,
                    quick_answers = assignment.quick_answer_count,
                    "suspicious answer pattern detected"
                );
            }
        }
        if assignment.suspicious_pattern {
            flags.push(AnswerFlag::SuspiciousPattern);
        }

        assignment.answers[question_index] = Some(Answer {
            question_index,
            value,
            submitted_at: Utc::now(),
            time_spent_ms,
            flagged_fast,
            revision,
        });

        let expected = assignment.version;
        Ok((assignment, expected, flags))
    }

    /// Transition `in_progress -> completed`, scoring synchronously and
    /// storing the result on the assignment.
    pub async fn complete(&self, id: Uuid) -> Result<Assignment, EngineError> {
        let mut assignment = self.store.get(id).await?;
        let instrument = self.instrument_for(&assignment)?;

        if assignment.status != AssignmentStatus::InProgress {
            return Err(EngineError::InvalidState {
                expected: AssignmentStatus::InProgress,
                found: assignment.status,
            });
        }

        let answered = assignment.answered_count();
        let required = instrument.config.min_questions;
        if answered < required {
            return Err(EngineError::IncompleteAnswers { answered, required });
        }

        let now = Utc::now();
        if let Some(started) = assignment.started_at {
            let limit = Duration::minutes(instrument.config.time_limit_minutes as i64);
            if now - started > limit {
                // Data-quality signal only; overruns never block completion.
                tracing::warn!(
                    assignment_id = %id,
                    elapsed_minutes = (now - started).num_minutes(),
                    limit_minutes = instrument.config.time_limit_minutes,
                    "attempt exceeded its time limit"
                );
            }
        }

        let expected = assignment.version;
        assignment.status = AssignmentStatus::Completed;
        assignment.completed_at = Some(now);
        assignment.score = Some(scoring::score(&assignment, &instrument));

        let updated = self.store.update(expected, assignment).await?;
        tracing::info!(
            assignment_id = %id,
            dominant = %updated.score.as_ref().map(|s| s.dominant_category.as_str()).unwrap_or(""),
            "assignment completed and scored"
        );
        Ok(updated)
    }

    /// Revoke a `pending` or `in_progress` assignment. Collected answers are
    /// kept for audit; the record simply becomes terminal.
    pub async fn revoke(&self, id: Uuid) -> Result<Assignment, EngineError> {
        let mut assignment = self.store.get(id).await?;

        if assignment.status.is_terminal() {
            return Err(EngineError::AlreadyTerminal(assignment.status));
        }

        let expected = assignment.version;
        assignment.status = AssignmentStatus::Revoked;
        let updated = self.store.update(expected, assignment).await?;
        tracing::info!(assignment_id = %id, "assignment revoked");
        Ok(updated)
    }

    /// Aggregate the completed results of a student cohort for one
    /// instrument type. Operates on a consistent store snapshot; scores
    /// missing from older records are re-derived (idempotent).
    pub async fn aggregate(
        &self,
        student_ids: &[Uuid],
        instrument_type: &str,
    ) -> Result<AggregateProfile, EngineError> {
        let instrument = self
            .catalog
            .latest(instrument_type)
            .ok_or_else(|| EngineError::UnknownInstrument(instrument_type.to_string()))?;

        let snapshot = self
            .store
            .completed_snapshot(student_ids, instrument_type)
            .await?;

        let results: Vec<ScoreResult> = snapshot
            .iter()
            .map(|a| match &a.score {
                Some(score) => Ok(score.clone()),
                None => {
                    let def = self.instrument_for(a)?;
                    Ok(scoring::score(a, &def))
                }
            })
            .collect::<Result<_, EngineError>>()?;

        statistics::aggregate(&results, &instrument, student_ids.len())
    }

    /// Resolve the exact instrument version an assignment was created
    /// against. Answers are recorded against that version's question order,
    /// so no other version may ever stand in for it; a missing version is an
    /// error, never a substitution.
    fn instrument_for(
        &self,
        assignment: &Assignment,
    ) -> Result<Arc<InstrumentDefinition>, EngineError> {
        self.catalog
            .get(&assignment.instrument_type, assignment.instrument_version)
            .ok_or_else(|| {
                EngineError::UnknownInstrument(format!(
                    "{} v{}",
                    assignment.instrument_type, assignment.instrument_version
                ))
            })
    }
}
