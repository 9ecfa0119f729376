//! Storage and roster trait seams.
//!
//! These async traits are implemented by the `psytest-store` crate (and by
//! any future database-backed adapter). The engine only ever talks to
//! assignments through `AssignmentStore`, and to class membership through
//! `CohortRoster`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::Assignment;

/// Persistent assignment records with optimistic concurrency.
///
/// Implementations must guarantee two atomicity properties:
/// - `insert` is a check-and-insert against the unique
///   `(student_id, instrument_type, active status)` index, so concurrent
///   inserts for the same pair cannot both succeed.
/// - `update` is a compare-and-swap on `Assignment::version`; the stored
///   record is replaced only if its version equals `expected_version`, and
///   the stored version is bumped on success.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Insert a new assignment, enforcing the single-active-attempt invariant.
    async fn insert(&self, assignment: Assignment) -> Result<Assignment, StoreError>;

    /// Fetch an assignment by id.
    async fn get(&self, id: Uuid) -> Result<Assignment, StoreError>;

    /// Replace an assignment if the stored version matches `expected_version`.
    /// Returns the stored record with its new version on success.
    async fn update(
        &self,
        expected_version: u64,
        assignment: Assignment,
    ) -> Result<Assignment, StoreError>;

    /// Every attempt (any status) for a `(student, instrument)` pair,
    /// ordered by `assigned_at`.
    async fn attempts_for(
        &self,
        student_id: Uuid,
        instrument_type: &str,
    ) -> Result<Vec<Assignment>, StoreError>;

    /// A consistent snapshot of completed assignments for the given students.
    /// Must be taken atomically so aggregate counts stay mutually consistent.
    async fn completed_snapshot(
        &self,
        student_ids: &[Uuid],
        instrument_type: &str,
    ) -> Result<Vec<Assignment>, StoreError>;
}

/// External collaborator: resolves a cohort id to its student roster.
#[async_trait]
pub trait CohortRoster: Send + Sync {
    /// Students in a cohort, or `None` if the cohort is unknown.
    async fn students_in(&self, cohort_id: &str) -> Result<Option<Vec<Uuid>>, StoreError>;
}
