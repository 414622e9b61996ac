//! Storage layer for the decision journal.
//!
//! This module defines the journal records (decisions and their outcomes), the
//! narrow read interface the analytics core consumes, the write interface used
//! for ingestion, and a SQLite implementation of both.

mod sqlite;

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;

pub use sqlite::SqliteStorage;

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{StorageResult, ValidationError};

/// Lowest value on the 1-10 quality and information scales.
pub const SCALE_MIN: u8 = 1;
/// Highest value on the 1-10 quality and information scales.
pub const SCALE_MAX: u8 = 10;

/// Decision category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Direction-setting decisions.
    Strategic,
    /// Engineering and architecture decisions.
    Technical,
    /// Hiring, staffing and team decisions.
    People,
    /// Budget and investment decisions.
    Financial,
    /// Product scope and roadmap decisions.
    Product,
    /// Day-to-day operational decisions.
    Operational,
}

impl Category {
    /// Every category, in reporting order.
    pub const ALL: [Category; 6] = [
        Category::Strategic,
        Category::Technical,
        Category::People,
        Category::Financial,
        Category::Product,
        Category::Operational,
    ];
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Strategic => write!(f, "strategic"),
            Category::Technical => write!(f, "technical"),
            Category::People => write!(f, "people"),
            Category::Financial => write!(f, "financial"),
            Category::Product => write!(f, "product"),
            Category::Operational => write!(f, "operational"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strategic" => Ok(Category::Strategic),
            "technical" => Ok(Category::Technical),
            "people" => Ok(Category::People),
            "financial" => Ok(Category::Financial),
            "product" => Ok(Category::Product),
            "operational" => Ok(Category::Operational),
            _ => Err(ValidationError::InvalidCategory {
                input: s.to_string(),
            }),
        }
    }
}

/// Time pressure under which a decision was made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePressure {
    /// Ample time to deliberate.
    Low,
    /// Normal working cadence.
    #[default]
    Medium,
    /// Decided under a tight deadline.
    High,
}

impl std::fmt::Display for TimePressure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimePressure::Low => write!(f, "low"),
            TimePressure::Medium => write!(f, "medium"),
            TimePressure::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for TimePressure {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(TimePressure::Low),
            "medium" => Ok(TimePressure::Medium),
            "high" => Ok(TimePressure::High),
            _ => Err(format!("Unknown time pressure: {}", s)),
        }
    }
}

/// How hard a decision is to undo once made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reversibility {
    /// Cheap to walk back.
    #[default]
    Reversible,
    /// Costly or impossible to walk back.
    DifficultToReverse,
}

impl std::fmt::Display for Reversibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reversibility::Reversible => write!(f, "reversible"),
            Reversibility::DifficultToReverse => write!(f, "difficult_to_reverse"),
        }
    }
}

impl std::str::FromStr for Reversibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reversible" => Ok(Reversibility::Reversible),
            "difficult_to_reverse" => Ok(Reversibility::DifficultToReverse),
            _ => Err(format!("Unknown reversibility: {}", s)),
        }
    }
}

/// Whether the expected outcome of a decision materialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correctness {
    /// The expected outcome happened.
    Correct,
    /// The expected outcome did not happen.
    Incorrect,
    /// No judgment has been made yet.
    #[default]
    Unresolved,
}

impl Correctness {
    /// The judgment as a boolean, or `None` while unresolved.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Correctness::Correct => Some(true),
            Correctness::Incorrect => Some(false),
            Correctness::Unresolved => None,
        }
    }
}

impl From<bool> for Correctness {
    fn from(correct: bool) -> Self {
        if correct {
            Correctness::Correct
        } else {
            Correctness::Incorrect
        }
    }
}

impl std::fmt::Display for Correctness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Correctness::Correct => write!(f, "correct"),
            Correctness::Incorrect => write!(f, "incorrect"),
            Correctness::Unresolved => write!(f, "unresolved"),
        }
    }
}

impl std::str::FromStr for Correctness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "correct" => Ok(Correctness::Correct),
            "incorrect" => Ok(Correctness::Incorrect),
            "unresolved" => Ok(Correctness::Unresolved),
            _ => Err(format!("Unknown correctness: {}", s)),
        }
    }
}

/// A decision recorded at the time it was made.
///
/// Entries are immutable once stored, apart from the append-only `lessons`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionEntry {
    /// Unique decision identifier, never reused.
    pub id: String,
    /// When the decision was made. Entries are ordered by this field.
    pub timestamp: DateTime<Utc>,
    /// Short human-readable title.
    pub title: String,
    /// Decision category.
    pub category: Category,
    /// Stated probability (0.0-1.0) that the expected outcome occurs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// What the decision maker expected to happen.
    pub expected_outcome: String,
    /// Situation at decision time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Why this option was chosen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Free-form filter keys.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Time pressure at decision time.
    #[serde(default)]
    pub time_pressure: TimePressure,
    /// How hard the decision is to undo.
    #[serde(default)]
    pub reversibility: Reversibility,
    /// How complete the available information was (1-10).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub information_completeness: Option<u8>,
    /// Lessons appended after the fact.
    #[serde(default)]
    pub lessons: Vec<String>,
}

impl DecisionEntry {
    /// Create a new decision entry stamped with the current time
    pub fn new(
        title: impl Into<String>,
        category: Category,
        expected_outcome: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            title: title.into(),
            category,
            confidence: None,
            expected_outcome: expected_outcome.into(),
            context: None,
            reasoning: None,
            tags: BTreeSet::new(),
            time_pressure: TimePressure::default(),
            reversibility: Reversibility::default(),
            information_completeness: None,
            lessons: Vec::new(),
        }
    }

    /// Set the decision time (for backfilled entries)
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the stated confidence. Out-of-range values are rejected by `validate`.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Set the decision context
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Set the reasoning
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Set the time pressure
    pub fn with_time_pressure(mut self, time_pressure: TimePressure) -> Self {
        self.time_pressure = time_pressure;
        self
    }

    /// Set the reversibility
    pub fn with_reversibility(mut self, reversibility: Reversibility) -> Self {
        self.reversibility = reversibility;
        self
    }

    /// Set the information completeness (1-10)
    pub fn with_information_completeness(mut self, completeness: u8) -> Self {
        self.information_completeness = Some(completeness);
        self
    }

    /// Check the entry against the ingestion invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "id" });
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "title" });
        }
        if self.expected_outcome.trim().is_empty() {
            return Err(ValidationError::EmptyField {
                field: "expected_outcome",
            });
        }
        if let Some(confidence) = self.confidence {
            if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
                return Err(ValidationError::ConfidenceOutOfRange {
                    decision_id: self.id.clone(),
                    value: confidence,
                });
            }
        }
        if let Some(completeness) = self.information_completeness {
            if !(SCALE_MIN..=SCALE_MAX).contains(&completeness) {
                return Err(ValidationError::InformationOutOfRange {
                    decision_id: self.id.clone(),
                    value: i64::from(completeness),
                });
            }
        }
        Ok(())
    }
}

/// The realized outcome of a decision. At most one per decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    /// Unique outcome identifier.
    pub id: String,
    /// The decision this outcome resolves.
    pub decision_id: String,
    /// What actually happened.
    pub actual_outcome: String,
    /// How good the result was (1-10), independent of process.
    pub outcome_quality: u8,
    /// How good the decision process was (1-10), independent of result.
    pub process_quality: u8,
    /// Whether the expected outcome materialized.
    #[serde(default)]
    pub correct: Correctness,
    /// When the outcome was judged.
    pub resolved_at: DateTime<Utc>,
    /// Optional reviewer notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl OutcomeRecord {
    /// Create a new, not yet judged, outcome for a decision
    pub fn new(
        decision_id: impl Into<String>,
        actual_outcome: impl Into<String>,
        outcome_quality: u8,
        process_quality: u8,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            decision_id: decision_id.into(),
            actual_outcome: actual_outcome.into(),
            outcome_quality,
            process_quality,
            correct: Correctness::Unresolved,
            resolved_at: Utc::now(),
            notes: None,
        }
    }

    /// Record whether the expected outcome materialized
    pub fn with_correct(mut self, correct: bool) -> Self {
        self.correct = Correctness::from(correct);
        self
    }

    /// Set the resolution time
    pub fn with_resolved_at(mut self, resolved_at: DateTime<Utc>) -> Self {
        self.resolved_at = resolved_at;
        self
    }

    /// Set reviewer notes
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Check the record's own fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.decision_id.trim().is_empty() {
            return Err(ValidationError::EmptyField {
                field: "decision_id",
            });
        }
        if self.actual_outcome.trim().is_empty() {
            return Err(ValidationError::EmptyField {
                field: "actual_outcome",
            });
        }
        check_quality("outcome_quality", self.outcome_quality)?;
        check_quality("process_quality", self.process_quality)?;
        Ok(())
    }

    /// Check the record against the decision it claims to resolve.
    pub fn validate_against(&self, entry: &DecisionEntry) -> Result<(), ValidationError> {
        self.validate()?;
        if self.decision_id != entry.id {
            return Err(ValidationError::OutcomeMismatch {
                decision_id: entry.id.clone(),
                outcome_decision_id: self.decision_id.clone(),
            });
        }
        if self.resolved_at < entry.timestamp {
            return Err(ValidationError::ResolvedBeforeDecision {
                decision_id: entry.id.clone(),
                decided_at: entry.timestamp.to_rfc3339(),
                resolved_at: self.resolved_at.to_rfc3339(),
            });
        }
        Ok(())
    }
}

fn check_quality(field: &'static str, value: u8) -> Result<(), ValidationError> {
    if (SCALE_MIN..=SCALE_MAX).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::QualityOutOfRange {
            field,
            value: i64::from(value),
        })
    }
}

// ============================================================================
// Store interfaces
// ============================================================================

/// Read-only query interface consumed by the analytics core.
///
/// Implementations must return a consistent snapshot for each call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DecisionStore: Send + Sync {
    /// Decisions with `start <= timestamp < end`, ordered by timestamp then id.
    async fn entries_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<DecisionEntry>>;

    /// The outcome attached to a decision, if any.
    async fn outcome_for(&self, decision_id: &str) -> StorageResult<Option<OutcomeRecord>>;
}

/// Ingestion interface. Every write validates before touching storage.
#[async_trait]
pub trait JournalStore: DecisionStore {
    /// Record a new decision.
    async fn record_decision(&self, entry: &DecisionEntry) -> StorageResult<()>;

    /// Attach the single outcome for an existing decision.
    async fn record_outcome(&self, outcome: &OutcomeRecord) -> StorageResult<()>;

    /// Append a lesson note to a decision.
    async fn append_lesson(&self, decision_id: &str, lesson: &str) -> StorageResult<()>;

    /// Fetch one decision by id.
    async fn get_decision(&self, id: &str) -> StorageResult<Option<DecisionEntry>>;
}

#[async_trait]
impl<T: DecisionStore + ?Sized> DecisionStore for Arc<T> {
    async fn entries_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<DecisionEntry>> {
        (**self).entries_in_range(start, end).await
    }

    async fn outcome_for(&self, decision_id: &str) -> StorageResult<Option<OutcomeRecord>> {
        (**self).outcome_for(decision_id).await
    }
}
