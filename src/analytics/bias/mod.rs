//! Bias-pattern detection.
//!
//! The catalog is a fixed, ordered list of independent check functions over a
//! shared [`BiasView`]. A check never sees another check's output, so a single
//! decision may contribute to several patterns. Adding a check means writing a
//! function and appending it to [`CATALOG`].

mod checks;

#[cfg(test)]
#[path = "bias_tests.rs"]
mod bias_tests;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::calibration::{calibrate, CalibrationReport};
use super::config::{AnalyticsConfig, BiasConfig};
use super::view::{AnalysisScope, EntryFilter, JournalSnapshot, ObservedDecision};
use crate::error::AnalysisResult;
use crate::storage::{DecisionStore, OutcomeRecord};
use crate::timeframe::Timeframe;

/// Kind of recurring pattern, from the fixed catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasKind {
    /// High stated confidence, wrong anyway.
    OverconfidenceCluster,
    /// Low stated confidence, right anyway.
    UnderconfidenceCluster,
    /// Sound process let down by the result.
    GoodProcessBadOutcome,
    /// Weak process rescued by the result.
    BadProcessGoodOutcome,
    /// Process quality drops under deadline pressure.
    TimePressureDegradation,
    /// Hard-to-undo calls made on thin information that went badly.
    ReversibilityMismatch,
    /// A category that goes wrong unusually often for no catalogued reason.
    UnclassifiedCluster,
}

impl BiasKind {
    /// Human-readable pattern name.
    pub fn name(&self) -> &'static str {
        match self {
            BiasKind::OverconfidenceCluster => "Overconfidence cluster",
            BiasKind::UnderconfidenceCluster => "Underconfidence cluster",
            BiasKind::GoodProcessBadOutcome => "Good process, bad outcome",
            BiasKind::BadProcessGoodOutcome => "Bad process, good outcome",
            BiasKind::TimePressureDegradation => "Time-pressure degradation",
            BiasKind::ReversibilityMismatch => "Reversibility mismatch",
            BiasKind::UnclassifiedCluster => "Unclassified cluster",
        }
    }

    /// Fixed recommendation for the pattern.
    pub fn mitigation(&self) -> &'static str {
        match self {
            BiasKind::OverconfidenceCluster => {
                "Before committing to a high-confidence call, write down what would have to be true for it to fail and seek one dissenting view."
            }
            BiasKind::UnderconfidenceCluster => {
                "Your low-confidence calls land more often than you expect; act sooner on them instead of waiting for more certainty."
            }
            BiasKind::GoodProcessBadOutcome => {
                "Keep the process. Review these outcomes for variance you could not control rather than changing how you decide."
            }
            BiasKind::BadProcessGoodOutcome => {
                "Do not let good results reinforce a weak process; revisit the reasoning behind these decisions before repeating it."
            }
            BiasKind::TimePressureDegradation => {
                "Under deadline pressure, use a short checklist and, where possible, negotiate more time or make a smaller reversible step first."
            }
            BiasKind::ReversibilityMismatch => {
                "For hard-to-reverse decisions, gather more information first or restructure the decision into reversible stages."
            }
            BiasKind::UnclassifiedCluster => {
                "Decisions in this category go wrong more often than elsewhere; hold a focused retrospective on them."
            }
        }
    }
}

impl std::fmt::Display for BiasKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A detected recurring pattern.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BiasPattern {
    /// Catalog kind
    pub kind: BiasKind,
    /// Pattern name
    pub name: String,
    /// Number of affected decisions
    pub frequency: usize,
    /// Confidence that the pattern is genuine, scaled down for small samples
    pub confidence: f64,
    /// Id-bound justifications
    pub evidence: Vec<String>,
    /// Affected decision ids, in timestamp order, without duplicates
    pub affected_decisions: Vec<String>,
    /// Recommendation
    pub mitigation: String,
}

/// Resolved and outcome-bearing decisions shared by every check.
pub struct BiasView<'a> {
    /// Decisions with an outcome attached
    pub with_outcome: Vec<(&'a ObservedDecision, &'a OutcomeRecord)>,
    /// Decisions with a correctness judgment
    pub resolved: Vec<(&'a ObservedDecision, bool)>,
    /// Calibration over the same window
    pub calibration: &'a CalibrationReport,
}

impl<'a> BiasView<'a> {
    /// Build a view over a snapshot.
    pub fn new(snapshot: &'a JournalSnapshot, calibration: &'a CalibrationReport) -> Self {
        Self {
            with_outcome: snapshot.with_outcome().collect(),
            resolved: snapshot.resolved().collect(),
            calibration,
        }
    }
}

/// A bias check: pure function from the view to zero or more patterns.
pub type BiasCheck = fn(&BiasView<'_>, &BiasConfig) -> Vec<BiasPattern>;

/// Evaluation order of the catalog.
pub const CATALOG: &[BiasCheck] = &[
    checks::overconfidence_cluster,
    checks::underconfidence_cluster,
    checks::good_process_bad_outcome,
    checks::bad_process_good_outcome,
    checks::time_pressure_degradation,
    checks::reversibility_mismatch,
    checks::unclassified_cluster,
];

/// Assemble a pattern, or nothing if it does not reach the frequency floor.
pub(crate) fn build_pattern<'a>(
    kind: BiasKind,
    affected: impl IntoIterator<Item = &'a ObservedDecision>,
    evidence: Vec<String>,
    config: &BiasConfig,
) -> Option<BiasPattern> {
    let mut seen = HashSet::new();
    let affected_decisions: Vec<String> = affected
        .into_iter()
        .filter(|d| seen.insert(d.id().to_string()))
        .map(|d| d.id().to_string())
        .collect();

    let frequency = affected_decisions.len();
    if frequency == 0 || frequency < config.min_frequency {
        return None;
    }

    Some(BiasPattern {
        kind,
        name: kind.name().to_string(),
        frequency,
        confidence: config.attenuate(frequency),
        evidence,
        affected_decisions,
        mitigation: kind.mitigation().to_string(),
    })
}

/// Run the whole catalog over a snapshot and rank the results.
///
/// Ranked by frequency descending, then confidence descending, then name.
pub fn detect(
    snapshot: &JournalSnapshot,
    calibration: &CalibrationReport,
    config: &BiasConfig,
) -> Vec<BiasPattern> {
    let view = BiasView::new(snapshot, calibration);
    let mut patterns: Vec<BiasPattern> = CATALOG
        .iter()
        .flat_map(|check| check(&view, config))
        .collect();

    patterns.sort_by(|a, b| {
        b.frequency
            .cmp(&a.frequency)
            .then_with(|| b.confidence.total_cmp(&a.confidence))
            .then_with(|| a.name.cmp(&b.name))
    });

    debug!(
        with_outcome = view.with_outcome.len(),
        resolved = view.resolved.len(),
        patterns = patterns.len(),
        "Bias catalog evaluated"
    );
    patterns
}

/// Store-facing bias scan.
pub struct BiasDetector<S: DecisionStore> {
    store: S,
    config: AnalyticsConfig,
    scope: AnalysisScope,
}

impl<S: DecisionStore> BiasDetector<S> {
    /// Create a new detector. Calibration settings are needed for the
    /// calibration signal fed into the over/underconfidence checks.
    pub fn new(store: S, config: AnalyticsConfig) -> Self {
        Self {
            store,
            config,
            scope: AnalysisScope::default(),
        }
    }

    /// Narrow the entries scanned
    pub fn with_filter(mut self, filter: EntryFilter) -> Self {
        self.scope.filter = filter;
        self
    }

    /// Pin "now" for relative timeframes
    pub fn with_reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.scope.reference_time = Some(now);
        self
    }

    /// Scan a timeframe for recurring patterns. An empty window yields an
    /// empty list.
    pub async fn scan(&self, timeframe: &Timeframe) -> AnalysisResult<Vec<BiasPattern>> {
        self.scan_filtered(timeframe, &self.scope.filter).await
    }

    /// Scan with a per-call filter in place of the configured one.
    pub async fn scan_filtered(
        &self,
        timeframe: &Timeframe,
        filter: &EntryFilter,
    ) -> AnalysisResult<Vec<BiasPattern>> {
        let range = self.scope.resolve(timeframe)?;
        let snapshot = JournalSnapshot::load(&self.store, range, filter).await?;
        let calibration = calibrate(&snapshot, &self.config.calibration)?;
        let patterns = detect(&snapshot, &calibration, &self.config.bias);

        info!(
            timeframe = %timeframe,
            decisions = snapshot.decisions().len(),
            patterns = patterns.len(),
            "Bias scan complete"
        );
        Ok(patterns)
    }
}
