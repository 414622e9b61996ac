//! Calibration scoring: stated confidence against realized correctness.
//!
//! The unit interval is split into fixed-width bands; the last band is closed
//! at 1.0. The overall score is `1 - mean((confidence - outcome)^2)` where
//! `outcome` is 1.0 for a correct decision and 0.0 otherwise, so a perfect
//! predictor scores exactly 1.0 and the worst possible scores 0.0.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::config::CalibrationConfig;
use super::view::{AnalysisScope, EntryFilter, JournalSnapshot};
use super::{ensure_finite, Measurement};
use crate::error::AnalysisResult;
use crate::storage::DecisionStore;
use crate::timeframe::Timeframe;

/// Direction of miscalibration across the population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tendency {
    /// Stated confidence exceeds the hit rate.
    Overconfident,
    /// Hit rate exceeds stated confidence.
    Underconfident,
    /// Within the configured margin.
    WellCalibrated,
    /// Too few samples to say.
    InsufficientData,
}

impl std::fmt::Display for Tendency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tendency::Overconfident => write!(f, "overconfident"),
            Tendency::Underconfident => write!(f, "underconfident"),
            Tendency::WellCalibrated => write!(f, "well-calibrated"),
            Tendency::InsufficientData => write!(f, "insufficient data"),
        }
    }
}

/// One confidence band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationBucket {
    /// Inclusive lower edge
    pub lower: f64,
    /// Upper edge, exclusive except for the last band
    pub upper: f64,
    /// Mean stated confidence of entries in the band
    pub stated_mean: f64,
    /// Fraction of entries in the band that were correct
    pub actual_rate: f64,
    /// Entries in the band
    pub sample_count: usize,
    /// Set when `sample_count` is below the bucket minimum
    pub low_confidence: bool,
}

/// Calibration curve and summary for one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationReport {
    /// Non-empty bands in ascending order
    pub buckets: Vec<CalibrationBucket>,
    /// `1 - brier_score`
    pub overall_score: Measurement,
    /// Population direction of miscalibration
    pub tendency: Tendency,
    /// Resolved, confidence-bearing entries considered
    pub sample_count: usize,
    /// Mean stated confidence
    pub mean_confidence: Option<f64>,
    /// Fraction correct
    pub accuracy: Option<f64>,
    /// Mean squared error between confidence and outcome
    pub brier_score: Option<f64>,
    /// Sample-weighted mean gap between stated mean and hit rate per band
    pub expected_calibration_error: Option<f64>,
}

impl CalibrationReport {
    fn insufficient(sample_count: usize, required: usize) -> Self {
        Self {
            buckets: Vec::new(),
            overall_score: Measurement::InsufficientData {
                sample_count,
                required,
            },
            tendency: Tendency::InsufficientData,
            sample_count,
            mean_confidence: None,
            accuracy: None,
            brier_score: None,
            expected_calibration_error: None,
        }
    }
}

#[derive(Default)]
struct BandTally {
    confidence_sum: f64,
    hits: usize,
    count: usize,
}

/// Band index for a confidence value. The epsilon keeps values such as 0.3,
/// whose product with the band count lands just under an integer, in the band
/// whose lower edge they equal.
fn band_index(confidence: f64, band_count: usize) -> usize {
    let raw = (confidence * band_count as f64 + 1e-9).floor();
    (raw.max(0.0) as usize).min(band_count - 1)
}

/// Score calibration over a snapshot.
pub fn calibrate(
    snapshot: &JournalSnapshot,
    config: &CalibrationConfig,
) -> AnalysisResult<CalibrationReport> {
    let samples: Vec<(f64, bool)> = snapshot
        .calibration_samples()
        .map(|(_, confidence, correct)| (confidence, correct))
        .collect();

    // An empty window never yields a score, whatever the configured floor
    let required = config.min_samples.max(1);
    if samples.len() < required {
        debug!(
            sample_count = samples.len(),
            required,
            "Not enough resolved decisions for calibration"
        );
        return Ok(CalibrationReport::insufficient(samples.len(), required));
    }

    let band_count = config.band_count();
    let mut tallies: Vec<BandTally> = (0..band_count).map(|_| BandTally::default()).collect();
    let mut squared_error = 0.0;
    let mut confidence_sum = 0.0;
    let mut hits = 0usize;

    for &(confidence, correct) in &samples {
        let outcome = if correct { 1.0 } else { 0.0 };
        squared_error += (confidence - outcome).powi(2);
        confidence_sum += confidence;
        if correct {
            hits += 1;
        }

        let tally = &mut tallies[band_index(confidence, band_count)];
        tally.confidence_sum += confidence;
        tally.count += 1;
        if correct {
            tally.hits += 1;
        }
    }

    let n = samples.len() as f64;
    let mut buckets = Vec::new();
    let mut ece = 0.0;
    for (index, tally) in tallies.iter().enumerate() {
        if tally.count == 0 {
            continue;
        }
        let stated_mean = tally.confidence_sum / tally.count as f64;
        let actual_rate = tally.hits as f64 / tally.count as f64;
        ece += (tally.count as f64 / n) * (stated_mean - actual_rate).abs();
        buckets.push(CalibrationBucket {
            lower: index as f64 / band_count as f64,
            upper: (index + 1) as f64 / band_count as f64,
            stated_mean,
            actual_rate,
            sample_count: tally.count,
            low_confidence: tally.count < config.min_bucket_samples,
        });
    }

    let brier = ensure_finite("brier score", squared_error / n)?;
    let mean_confidence = ensure_finite("mean confidence", confidence_sum / n)?;
    let accuracy = hits as f64 / n;
    let ece = ensure_finite("expected calibration error", ece)?;

    let gap = mean_confidence - accuracy;
    let tendency = if gap > config.tendency_margin {
        Tendency::Overconfident
    } else if -gap > config.tendency_margin {
        Tendency::Underconfident
    } else {
        Tendency::WellCalibrated
    };

    Ok(CalibrationReport {
        buckets,
        overall_score: Measurement::Computed {
            value: 1.0 - brier,
        },
        tendency,
        sample_count: samples.len(),
        mean_confidence: Some(mean_confidence),
        accuracy: Some(accuracy),
        brier_score: Some(brier),
        expected_calibration_error: Some(ece),
    })
}

/// Store-facing calibration analysis.
pub struct CalibrationAnalyzer<S: DecisionStore> {
    store: S,
    config: CalibrationConfig,
    scope: AnalysisScope,
}

impl<S: DecisionStore> CalibrationAnalyzer<S> {
    /// Create a new analyzer
    pub fn new(store: S, config: CalibrationConfig) -> Self {
        Self {
            store,
            config,
            scope: AnalysisScope::default(),
        }
    }

    /// Narrow the entries analyzed
    pub fn with_filter(mut self, filter: EntryFilter) -> Self {
        self.scope.filter = filter;
        self
    }

    /// Pin "now" for relative timeframes
    pub fn with_reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.scope.reference_time = Some(now);
        self
    }

    /// Analyze calibration over a timeframe.
    pub async fn analyze(&self, timeframe: &Timeframe) -> AnalysisResult<CalibrationReport> {
        self.analyze_filtered(timeframe, &self.scope.filter).await
    }

    /// Analyze calibration with a per-call filter in place of the configured one.
    pub async fn analyze_filtered(
        &self,
        timeframe: &Timeframe,
        filter: &EntryFilter,
    ) -> AnalysisResult<CalibrationReport> {
        let range = self.scope.resolve(timeframe)?;
        let snapshot = JournalSnapshot::load(&self.store, range, filter).await?;
        let report = calibrate(&snapshot, &self.config)?;

        info!(
            timeframe = %timeframe,
            sample_count = report.sample_count,
            tendency = %report.tendency,
            "Calibration analyzed"
        );
        Ok(report)
    }
}
