//! Core data model types for psytest.
//!
//! These are the fundamental types the entire psytest system uses to
//! represent instruments, assignments, answers, and derived results.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether a question's raw answer scale must be inverted before scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Positive,
    Negative,
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarity::Positive => write!(f, "positive"),
            Polarity::Negative => write!(f, "negative"),
        }
    }
}

impl FromStr for Polarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "positive" | "+" => Ok(Polarity::Positive),
            "negative" | "-" => Ok(Polarity::Negative),
            other => Err(format!("unknown polarity: {other}")),
        }
    }
}

/// A single question inside an instrument version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier within the instrument.
    pub id: String,
    /// The question text shown to the student.
    pub text: String,
    /// Trait category this question contributes to.
    pub category: String,
    /// Scoring weight, expected in (0, 10].
    pub weight: f64,
    /// Scale polarity.
    #[serde(default = "default_polarity")]
    pub polarity: Polarity,
}

fn default_polarity() -> Polarity {
    Polarity::Positive
}

/// Per-instrument behavioral configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Minimum number of answered questions required to complete an attempt.
    #[serde(default = "default_min_questions")]
    pub min_questions: usize,
    /// Wall-clock limit for a whole attempt; overruns are logged, not rejected.
    #[serde(default = "default_time_limit")]
    pub time_limit_minutes: u64,
    /// Answers faster than this are flagged as quick answers.
    #[serde(default = "default_min_time_ms")]
    pub min_time_per_question_ms: u64,
    /// Answers slower than this are logged as a data-quality signal.
    #[serde(default = "default_max_time_ms")]
    pub max_time_per_question_ms: u64,
    /// Maximum completed attempts per (student, instrument).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Hours a student must wait after a completed attempt before reassignment.
    #[serde(default = "default_cooldown_hours")]
    pub cooldown_hours: i64,
    /// Whether an in-progress attempt may overwrite an already-answered index.
    #[serde(default)]
    pub allow_backtrack: bool,
    /// Whether the snapshotted question order is shuffled per assignment.
    #[serde(default)]
    pub shuffle_questions: bool,
    /// Quick-answer count at which the attempt is marked suspicious.
    #[serde(default = "default_fast_threshold")]
    pub fast_answer_threshold: u32,
    /// Lower bound of the ordinal answer scale.
    #[serde(default = "default_scale_min")]
    pub scale_min: u8,
    /// Upper bound of the ordinal answer scale.
    #[serde(default = "default_scale_max")]
    pub scale_max: u8,
}

fn default_min_questions() -> usize {
    1
}
fn default_time_limit() -> u64 {
    30
}
fn default_min_time_ms() -> u64 {
    1_500
}
fn default_max_time_ms() -> u64 {
    120_000
}
fn default_max_attempts() -> u32 {
    3
}
fn default_cooldown_hours() -> i64 {
    24
}
fn default_fast_threshold() -> u32 {
    5
}
fn default_scale_min() -> u8 {
    1
}
fn default_scale_max() -> u8 {
    5
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            min_questions: default_min_questions(),
            time_limit_minutes: default_time_limit(),
            min_time_per_question_ms: default_min_time_ms(),
            max_time_per_question_ms: default_max_time_ms(),
            max_attempts: default_max_attempts(),
            cooldown_hours: default_cooldown_hours(),
            allow_backtrack: false,
            shuffle_questions: false,
            fast_answer_threshold: default_fast_threshold(),
            scale_min: default_scale_min(),
            scale_max: default_scale_max(),
        }
    }
}

/// An immutable instrument version: the question catalog an assignment snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentDefinition {
    /// Instrument type identifier (e.g. "csi").
    pub id: String,
    /// Version of this definition.
    pub version: u32,
    /// Human-readable name.
    pub name: String,
    /// Trait categories in declaration order; this order breaks scoring ties.
    pub categories: Vec<String>,
    /// Ordered question set.
    pub questions: Vec<Question>,
    /// Behavioral configuration.
    #[serde(default)]
    pub config: InstrumentConfig,
}

impl InstrumentDefinition {
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }
}

/// Lifecycle states of an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    InProgress,
    Completed,
    Revoked,
}

impl AssignmentStatus {
    /// `completed` and `revoked` are terminal: no transition leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, AssignmentStatus::Completed | AssignmentStatus::Revoked)
    }

    /// The explicit transition table of the state machine.
    pub fn can_transition_to(self, next: AssignmentStatus) -> bool {
        use AssignmentStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress) | (InProgress, Completed) | (Pending, Revoked) | (InProgress, Revoked)
        )
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentStatus::Pending => write!(f, "pending"),
            AssignmentStatus::InProgress => write!(f, "in_progress"),
            AssignmentStatus::Completed => write!(f, "completed"),
            AssignmentStatus::Revoked => write!(f, "revoked"),
        }
    }
}

/// One recorded answer, indexed by position in the snapshotted question order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Position in the assignment's question order.
    pub question_index: usize,
    /// Ordinal value on the instrument's scale.
    pub value: u8,
    /// When this answer (or its latest revision) was submitted.
    pub submitted_at: DateTime<Utc>,
    /// Client-measured time spent on the question.
    pub time_spent_ms: u64,
    /// True when the answer came in under the minimum time per question.
    #[serde(default)]
    pub flagged_fast: bool,
    /// Number of overwrites of this index; 0 for a first submission.
    #[serde(default)]
    pub revision: u32,
}

/// One tracked attempt binding a student to an instrument version.
///
/// Never physically deleted: `completed` and `revoked` are terminal states,
/// not deletions, so the answer trail survives for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub instrument_type: String,
    pub instrument_version: u32,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
    pub assigned_by: String,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Snapshot of the question order (indices into the instrument's
    /// question set), shuffled at assignment time when configured.
    pub question_order: Vec<usize>,
    /// Answers indexed by question order; `None` until answered.
    pub answers: Vec<Option<Answer>>,
    /// 1-based attempt counter across this (student, instrument) pair.
    pub attempt_number: u32,
    /// Running count of flagged quick answers.
    #[serde(default)]
    pub quick_answer_count: u32,
    /// Set once the quick-answer count reaches the configured threshold.
    #[serde(default)]
    pub suspicious_pattern: bool,
    /// Score stored at completion time; regenerable from the answers.
    #[serde(default)]
    pub score: Option<ScoreResult>,
    /// Optimistic-concurrency version, bumped by every store update.
    #[serde(default)]
    pub version: u64,
}

impl Assignment {
    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_some()).count()
    }
}

/// Scored outcome of one completed assignment. Pure derivation of
/// `(answers, instrument definition)`; recomputing it is idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    pub assignment_id: Uuid,
    pub student_id: Uuid,
    /// Normalized 0–100 score per answered category.
    pub per_category: BTreeMap<String, f64>,
    /// Category whose score deviates most from the scale midpoint (50).
    pub dominant_category: String,
    /// Carried from the assignment's quick-answer analysis.
    #[serde(default)]
    pub suspicious: bool,
    pub computed_at: DateTime<Utc>,
    pub scoring_version: u32,
}

/// Score bucket boundaries: low [0,40), medium [40,70], high (70,100].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Low,
    Medium,
    High,
}

impl Bucket {
    pub fn for_score(score: f64) -> Bucket {
        if score < 40.0 {
            Bucket::Low
        } else if score <= 70.0 {
            Bucket::Medium
        } else {
            Bucket::High
        }
    }
}

/// Per-category score distribution tallies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Distribution {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl Distribution {
    pub fn tally(&mut self, bucket: Bucket) {
        match bucket {
            Bucket::Low => self.low += 1,
            Bucket::Medium => self.medium += 1,
            Bucket::High => self.high += 1,
        }
    }
}

/// Statistics for one category across a cohort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryStats {
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub distribution: Distribution,
}

/// Aggregated profile over a cohort's completed results.
///
/// Ephemeral and cache-friendly: recomputable at any time from the set of
/// completed assignments, never an independent source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateProfile {
    pub instrument_type: String,
    pub instrument_version: u32,
    pub total_students: usize,
    pub total_completed_tests: usize,
    pub per_category: BTreeMap<String, CategoryStats>,
    pub dominant_style_counts: BTreeMap<String, usize>,
    pub most_common_style: String,
    /// Normalized entropy of the dominant-style distribution, 0–10.
    pub diversity_index: f64,
    /// Results whose source assignment carried a suspicious answer pattern.
    pub flagged_results: usize,
    pub computed_at: DateTime<Utc>,
}
