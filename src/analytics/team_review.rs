//! Consensus across several participants' assessments of one decision.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{ensure_finite, stats, Measurement};
use crate::error::{AnalysisResult, ValidationError};
use crate::storage::{SCALE_MAX, SCALE_MIN};

/// Largest possible population standard deviation of scores on the 1-10 scale.
const MAX_SCORE_STD_DEV: f64 = (SCALE_MAX - SCALE_MIN) as f64 / 2.0;

/// One participant's assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// Who made the assessment
    pub participant: String,
    /// Process quality (1-10)
    pub process_score: u8,
    /// Outcome quality (1-10)
    pub outcome_score: u8,
    /// Main takeaway
    #[serde(default)]
    pub key_lesson: String,
}

/// Consensus summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamReviewSummary {
    /// Decision reviewed
    pub decision_id: String,
    /// Distinct participants
    pub participant_count: usize,
    /// Mean process score
    pub avg_process: Measurement,
    /// Mean outcome score
    pub avg_outcome: Measurement,
    /// `1 - std_dev(process) / 4.5`, clamped to [0, 1]
    pub agreement_score: Measurement,
    /// Distinct lessons, in order of first appearance
    pub synthesized_lessons: Vec<String>,
}

/// Collects assessments for a single decision.
///
/// A second assessment from the same participant replaces the first, keeping
/// its original position.
#[derive(Debug, Clone)]
pub struct TeamReviewAggregator {
    decision_id: String,
    assessments: Vec<Assessment>,
}

impl TeamReviewAggregator {
    /// Start a review of a decision
    pub fn new(decision_id: impl Into<String>) -> Self {
        Self {
            decision_id: decision_id.into(),
            assessments: Vec::new(),
        }
    }

    /// Decision under review
    pub fn decision_id(&self) -> &str {
        &self.decision_id
    }

    /// Assessments so far
    pub fn assessments(&self) -> &[Assessment] {
        &self.assessments
    }

    /// Add or replace a participant's assessment.
    pub fn submit(&mut self, assessment: Assessment) -> Result<(), ValidationError> {
        let participant = assessment.participant.trim();
        if participant.is_empty() {
            return Err(ValidationError::EmptyParticipant);
        }
        for (field, value) in [
            ("process_score", assessment.process_score),
            ("outcome_score", assessment.outcome_score),
        ] {
            if !(SCALE_MIN..=SCALE_MAX).contains(&value) {
                return Err(ValidationError::QualityOutOfRange {
                    field,
                    value: i64::from(value),
                });
            }
        }

        let assessment = Assessment {
            participant: participant.to_string(),
            ..assessment
        };
        match self
            .assessments
            .iter_mut()
            .find(|a| a.participant == assessment.participant)
        {
            Some(existing) => *existing = assessment,
            None => self.assessments.push(assessment),
        }
        Ok(())
    }

    /// Summarize the current assessments. Can be called any number of times.
    pub fn summarize(&self) -> AnalysisResult<TeamReviewSummary> {
        let process: Vec<f64> = self
            .assessments
            .iter()
            .map(|a| f64::from(a.process_score))
            .collect();
        let outcome: Vec<f64> = self
            .assessments
            .iter()
            .map(|a| f64::from(a.outcome_score))
            .collect();

        let agreement_score = if self.assessments.len() < 2 {
            Measurement::InsufficientData {
                sample_count: self.assessments.len(),
                required: 2,
            }
        } else {
            let std_dev = stats::population_std_dev(&process).unwrap_or_default();
            let value = (1.0 - std_dev / MAX_SCORE_STD_DEV).clamp(0.0, 1.0);
            Measurement::Computed {
                value: ensure_finite("agreement score", value)?,
            }
        };

        let mut seen = HashSet::new();
        let synthesized_lessons = self
            .assessments
            .iter()
            .map(|a| a.key_lesson.trim())
            .filter(|lesson| !lesson.is_empty())
            .filter(|lesson| seen.insert(*lesson))
            .map(str::to_string)
            .collect();

        Ok(TeamReviewSummary {
            decision_id: self.decision_id.clone(),
            participant_count: self.assessments.len(),
            avg_process: Measurement::mean_of("average process score", &process)?,
            avg_outcome: Measurement::mean_of("average outcome score", &outcome)?,
            agreement_score,
            synthesized_lessons,
        })
    }
}
