//! Full audit: one composite report over a timeframe.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::bias::{detect, BiasPattern};
use super::calibration::{calibrate, CalibrationReport};
use super::config::AnalyticsConfig;
use super::view::{AnalysisScope, EntryFilter, JournalSnapshot};
use super::Measurement;
use crate::error::AnalysisResult;
use crate::storage::{Category, DecisionStore};
use crate::timeframe::{TimeRange, Timeframe};

/// Per-category aggregates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBreakdown {
    /// Category
    pub category: Category,
    /// Decisions in the window
    pub decisions: usize,
    /// Decisions with an outcome attached
    pub with_outcome: usize,
    /// Fraction correct among resolved decisions
    pub hit_rate: Measurement,
    /// Mean process quality over decisions with an outcome
    pub avg_process_quality: Measurement,
    /// Mean outcome quality over decisions with an outcome
    pub avg_outcome_quality: Measurement,
}

/// Composite audit report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditReport {
    /// The timeframe as requested
    pub timeframe: String,
    /// The concrete window it resolved to
    pub window: TimeRange,
    /// Decisions in the window
    pub total_decisions: usize,
    /// Decisions with an outcome attached
    pub decisions_with_outcome: usize,
    /// Decisions with a correctness judgment
    pub resolved_decisions: usize,
    /// Mean process quality over decisions with an outcome
    pub avg_process_quality: Measurement,
    /// Mean outcome quality over decisions with an outcome
    pub avg_outcome_quality: Measurement,
    /// Calibration score, copied from `calibration`
    pub calibration_score: Measurement,
    /// Full calibration report
    pub calibration: CalibrationReport,
    /// Ranked bias patterns
    pub detected_biases: Vec<BiasPattern>,
    /// Non-empty categories in fixed order
    pub category_breakdown: Vec<CategoryBreakdown>,
}

/// Orchestrates calibration, bias detection and quality aggregates over one
/// snapshot. Errors from any step abort the audit.
pub struct AuditEngine<S: DecisionStore> {
    store: S,
    config: AnalyticsConfig,
    scope: AnalysisScope,
}

impl<S: DecisionStore> AuditEngine<S> {
    /// Create a new audit engine
    pub fn new(store: S, config: AnalyticsConfig) -> Self {
        Self {
            store,
            config,
            scope: AnalysisScope::default(),
        }
    }

    /// Narrow the entries audited
    pub fn with_filter(mut self, filter: EntryFilter) -> Self {
        self.scope.filter = filter;
        self
    }

    /// Pin "now" for relative timeframes
    pub fn with_reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.scope.reference_time = Some(now);
        self
    }

    /// Run a full audit over a timeframe.
    pub async fn full_audit(&self, timeframe: &Timeframe) -> AnalysisResult<AuditReport> {
        self.full_audit_filtered(timeframe, &self.scope.filter).await
    }

    /// Run a full audit with a per-call filter in place of the configured one.
    pub async fn full_audit_filtered(
        &self,
        timeframe: &Timeframe,
        filter: &EntryFilter,
    ) -> AnalysisResult<AuditReport> {
        let range = self.scope.resolve(timeframe)?;
        let snapshot = JournalSnapshot::load(&self.store, range, filter).await?;
        let report = audit_snapshot(timeframe, &snapshot, &self.config)?;

        info!(
            timeframe = %timeframe,
            total_decisions = report.total_decisions,
            resolved_decisions = report.resolved_decisions,
            biases = report.detected_biases.len(),
            "Audit complete"
        );
        Ok(report)
    }
}

/// Build the audit report for a loaded snapshot.
pub(crate) fn audit_snapshot(
    timeframe: &Timeframe,
    snapshot: &JournalSnapshot,
    config: &AnalyticsConfig,
) -> AnalysisResult<AuditReport> {
    let calibration = calibrate(snapshot, &config.calibration)?;
    let detected_biases = detect(snapshot, &calibration, &config.bias);

    let process: Vec<f64> = snapshot
        .with_outcome()
        .map(|(_, o)| f64::from(o.process_quality))
        .collect();
    let outcome: Vec<f64> = snapshot
        .with_outcome()
        .map(|(_, o)| f64::from(o.outcome_quality))
        .collect();

    let mut category_breakdown = Vec::new();
    for category in Category::ALL {
        let decisions = snapshot
            .decisions()
            .iter()
            .filter(|d| d.entry.category == category)
            .count();
        if decisions == 0 {
            continue;
        }
        let outcomes: Vec<_> = snapshot
            .with_outcome()
            .filter(|(d, _)| d.entry.category == category)
            .map(|(_, o)| o)
            .collect();
        let hits: Vec<f64> = snapshot
            .resolved()
            .filter(|(d, _)| d.entry.category == category)
            .map(|(_, correct)| if correct { 1.0 } else { 0.0 })
            .collect();
        let process: Vec<f64> = outcomes
            .iter()
            .map(|o| f64::from(o.process_quality))
            .collect();
        let quality: Vec<f64> = outcomes
            .iter()
            .map(|o| f64::from(o.outcome_quality))
            .collect();

        category_breakdown.push(CategoryBreakdown {
            category,
            decisions,
            with_outcome: outcomes.len(),
            hit_rate: Measurement::mean_of("category hit rate", &hits)?,
            avg_process_quality: Measurement::mean_of("category process quality", &process)?,
            avg_outcome_quality: Measurement::mean_of("category outcome quality", &quality)?,
        });
    }

    Ok(AuditReport {
        timeframe: timeframe.to_string(),
        window: snapshot.range(),
        total_decisions: snapshot.decisions().len(),
        decisions_with_outcome: process.len(),
        resolved_decisions: snapshot.resolved().count(),
        avg_process_quality: Measurement::mean_of("average process quality", &process)?,
        avg_outcome_quality: Measurement::mean_of("average outcome quality", &outcome)?,
        calibration_score: calibration.overall_score,
        calibration,
        detected_biases,
        category_breakdown,
    })
}
