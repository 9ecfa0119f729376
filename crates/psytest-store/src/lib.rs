//! psytest-store — In-memory assignment storage and roster adapters.
//!
//! `MemoryStore` implements the `AssignmentStore` seam with the two
//! atomicity guarantees the engine relies on: a unique index over active
//! `(student, instrument)` pairs enforced inside the insert, and
//! compare-and-swap updates keyed on the assignment version. `StaticRoster`
//! is the TOML-backed stand-in for the external class-roster collaborator.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use psytest_core::error::StoreError;
use psytest_core::model::{Assignment, AssignmentStatus};
use psytest_core::traits::{AssignmentStore, CohortRoster};

/// In-memory assignment store.
///
/// A single mutex guards both the assignment map and the active-pair index,
/// so check-and-insert and CAS updates are atomic with respect to each
/// other, and `completed_snapshot` observes a consistent state.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    assignments: HashMap<Uuid, Assignment>,
    /// Unique index over `(student_id, instrument_type)` pairs with an
    /// active (pending or in-progress) assignment.
    active: HashSet<(Uuid, String)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoreInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))
    }

    /// Number of stored assignments, any status.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.assignments.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AssignmentStore for MemoryStore {
    async fn insert(&self, assignment: Assignment) -> Result<Assignment, StoreError> {
        let mut inner = self.lock()?;
        let key = (assignment.student_id, assignment.instrument_type.clone());
        if inner.active.contains(&key) {
            return Err(StoreError::DuplicateActive);
        }
        inner.active.insert(key);
        inner.assignments.insert(assignment.id, assignment.clone());
        Ok(assignment)
    }

    async fn get(&self, id: Uuid) -> Result<Assignment, StoreError> {
        let inner = self.lock()?;
        inner
            .assignments
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn update(
        &self,
        expected_version: u64,
        mut assignment: Assignment,
    ) -> Result<Assignment, StoreError> {
        let mut inner = self.lock()?;
        let stored = inner
            .assignments
            .get(&assignment.id)
            .ok_or(StoreError::NotFound(assignment.id))?;

        if stored.version != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                found: stored.version,
            });
        }

        assignment.version = expected_version + 1;
        if assignment.status.is_terminal() {
            let key = (assignment.student_id, assignment.instrument_type.clone());
            inner.active.remove(&key);
        }
        inner.assignments.insert(assignment.id, assignment.clone());
        Ok(assignment)
    }

    async fn attempts_for(
        &self,
        student_id: Uuid,
        instrument_type: &str,
    ) -> Result<Vec<Assignment>, StoreError> {
        let inner = self.lock()?;
        let mut attempts: Vec<Assignment> = inner
            .assignments
            .values()
            .filter(|a| a.student_id == student_id && a.instrument_type == instrument_type)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| a.assigned_at);
        Ok(attempts)
    }

    async fn completed_snapshot(
        &self,
        student_ids: &[Uuid],
        instrument_type: &str,
    ) -> Result<Vec<Assignment>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .assignments
            .values()
            .filter(|a| {
                a.status == AssignmentStatus::Completed
                    && a.instrument_type == instrument_type
                    && student_ids.contains(&a.student_id)
            })
            .cloned()
            .collect())
    }
}

/// Cohort roster loaded once from a TOML file.
///
/// File shape:
///
/// ```toml
/// [cohorts]
/// "3A" = ["7f8d6a1e-...", "c0ffee00-..."]
/// ```
#[derive(Debug, Default, Clone)]
pub struct StaticRoster {
    cohorts: HashMap<String, Vec<Uuid>>,
}

#[derive(Debug, Deserialize)]
struct RosterFile {
    #[serde(default)]
    cohorts: HashMap<String, Vec<Uuid>>,
}

impl StaticRoster {
    pub fn new(cohorts: HashMap<String, Vec<Uuid>>) -> Self {
        Self { cohorts }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read roster file: {}", path.display()))?;
        let parsed: RosterFile = toml::from_str(&content)
            .with_context(|| format!("failed to parse roster TOML: {}", path.display()))?;
        Ok(Self {
            cohorts: parsed.cohorts,
        })
    }

    pub fn cohort_ids(&self) -> impl Iterator<Item = &str> {
        self.cohorts.keys().map(String::as_str)
    }
}

#[async_trait]
impl CohortRoster for StaticRoster {
    async fn students_in(&self, cohort_id: &str) -> Result<Option<Vec<Uuid>>, StoreError> {
        Ok(self.cohorts.get(cohort_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use psytest_core::catalog::InstrumentCatalog;
    use psytest_core::error::EngineError;
    use psytest_core::lifecycle::AssignmentEngine;
    use psytest_core::model::{InstrumentConfig, InstrumentDefinition, Polarity, Question};

    fn pending_assignment(student_id: Uuid, instrument_type: &str) -> Assignment {
        Assignment {
            id: Uuid::new_v4(),
            student_id,
            instrument_type: instrument_type.into(),
            instrument_version: 1,
            status: AssignmentStatus::Pending,
            assigned_at: Utc::now(),
            assigned_by: "test".into(),
            started_at: None,
            completed_at: None,
            question_order: vec![0, 1],
            answers: vec![None, None],
            attempt_number: 1,
            quick_answer_count: 0,
            suspicious_pattern: false,
            score: None,
            version: 0,
        }
    }

    #[tokio::test]
    async fn insert_enforces_active_uniqueness() {
        let store = MemoryStore::new();
        let student = Uuid::new_v4();

        store
            .insert(pending_assignment(student, "csi"))
            .await
            .unwrap();
        let err = store
            .insert(pending_assignment(student, "csi"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateActive));

        // A different instrument type is a different index entry.
        store
            .insert(pending_assignment(student, "other"))
            .await
            .unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn terminal_update_releases_active_slot() {
        let store = MemoryStore::new();
        let student = Uuid::new_v4();

        let a = store
            .insert(pending_assignment(student, "csi"))
            .await
            .unwrap();

        let mut revoked = a.clone();
        revoked.status = AssignmentStatus::Revoked;
        store.update(a.version, revoked).await.unwrap();

        // Slot is free again.
        store
            .insert(pending_assignment(student, "csi"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn update_is_compare_and_swap() {
        let store = MemoryStore::new();
        let a = store
            .insert(pending_assignment(Uuid::new_v4(), "csi"))
            .await
            .unwrap();

        let mut first = a.clone();
        first.status = AssignmentStatus::InProgress;
        let stored = store.update(a.version, first).await.unwrap();
        assert_eq!(stored.version, a.version + 1);

        // A writer holding the stale version loses.
        let mut stale = a.clone();
        stale.status = AssignmentStatus::Revoked;
        let err = store.update(a.version, stale).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict {
                expected: 0,
                found: 1
            }
        ));
    }

    #[tokio::test]
    async fn get_unknown_id_is_not_found() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(
            store.get(id).await.unwrap_err(),
            StoreError::NotFound(got) if got == id
        ));
    }

    #[tokio::test]
    async fn snapshot_only_includes_completed_cohort_members() {
        let store = MemoryStore::new();
        let in_cohort = Uuid::new_v4();
        let outsider = Uuid::new_v4();

        let a = store
            .insert(pending_assignment(in_cohort, "csi"))
            .await
            .unwrap();
        let mut done = a.clone();
        done.status = AssignmentStatus::Completed;
        done.completed_at = Some(Utc::now());
        store.update(a.version, done).await.unwrap();

        store
            .insert(pending_assignment(outsider, "csi"))
            .await
            .unwrap();

        let snapshot = store.completed_snapshot(&[in_cohort], "csi").await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].student_id, in_cohort);
    }

    fn engine() -> AssignmentEngine {
        let instrument = InstrumentDefinition {
            id: "csi".into(),
            version: 1,
            name: "CSI".into(),
            categories: vec!["analytic".into(), "intuitive".into()],
            questions: vec![
                Question {
                    id: "q1".into(),
                    text: "one".into(),
                    category: "analytic".into(),
                    weight: 1.0,
                    polarity: Polarity::Positive,
                },
                Question {
                    id: "q2".into(),
                    text: "two".into(),
                    category: "intuitive".into(),
                    weight: 1.0,
                    polarity: Polarity::Positive,
                },
            ],
            config: InstrumentConfig {
                min_questions: 2,
                ..InstrumentConfig::default()
            },
        };
        AssignmentEngine::new(
            Arc::new(InstrumentCatalog::from_definitions(vec![instrument])),
            Arc::new(MemoryStore::new()),
        )
    }

    #[tokio::test]
    async fn concurrent_assigns_admit_exactly_one() {
        // Two racing assigns for the same (student, instrument): exactly one
        // wins, the other observes the duplicate-active precondition.
        let engine = Arc::new(engine());
        let student = Uuid::new_v4();

        let (left, right) = tokio::join!(
            engine.assign(student, "csi", "teacher"),
            engine.assign(student, "csi", "teacher"),
        );

        let outcomes = [left, right];
        let successes = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert!(outcomes.iter().any(|r| matches!(
            r,
            Err(EngineError::DuplicateActiveAssignment { .. })
        )));
    }

    #[tokio::test]
    async fn concurrent_duplicate_answer_retries_settle() {
        // Duplicate network retries of the same answer are idempotent under
        // the no-backtrack policy: one write lands, the other is rejected.
        let engine = Arc::new(engine());
        let a = engine
            .assign(Uuid::new_v4(), "csi", "teacher")
            .await
            .unwrap();
        engine.start(a.id).await.unwrap();

        let (left, right) = tokio::join!(
            engine.submit_answer(a.id, 0, 4, 5_000),
            engine.submit_answer(a.id, 0, 4, 5_000),
        );

        let outcomes = [left, right];
        let successes = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert!(outcomes.iter().any(|r| matches!(
            r,
            Err(EngineError::AnswerAlreadyRecorded { index: 0 })
        )));
    }

    #[tokio::test]
    async fn end_to_end_through_memory_store() {
        let engine = engine();
        let students: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();

        for (i, &student) in students.iter().enumerate() {
            let a = engine.assign(student, "csi", "teacher").await.unwrap();
            engine.start(a.id).await.unwrap();
            engine
                .submit_answer(a.id, 0, 1 + (i as u8 * 2), 5_000)
                .await
                .unwrap();
            engine.submit_answer(a.id, 1, 3, 5_000).await.unwrap();
            engine.complete(a.id).await.unwrap();
        }

        let profile = engine.aggregate(&students, "csi").await.unwrap();
        assert_eq!(profile.total_completed_tests, 3);
        assert_eq!(profile.total_students, 3);
    }

    #[tokio::test]
    async fn roster_loads_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.toml");
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        std::fs::write(
            &path,
            format!("[cohorts]\n\"3A\" = [\"{a}\", \"{b}\"]\n\"3B\" = []\n"),
        )
        .unwrap();

        let roster = StaticRoster::load(&path).unwrap();
        assert_eq!(roster.cohort_ids().count(), 2);

        let students = roster.students_in("3A").await.unwrap().unwrap();
        assert_eq!(students, vec![a, b]);
        assert!(roster.students_in("missing").await.unwrap().is_none());
    }
}
