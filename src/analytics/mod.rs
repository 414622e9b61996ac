//! Analytics core: calibration scoring, bias detection, audits and team review.
//!
//! Every component works over a [`JournalSnapshot`] loaded once at the start of
//! an operation. Nothing here holds state across calls or writes to the store.

mod audit;
pub mod bias;
mod calibration;
mod config;
mod stats;
mod team_review;
mod view;

pub use audit::{AuditEngine, AuditReport, CategoryBreakdown};
pub use bias::{detect, BiasDetector, BiasKind, BiasPattern};
pub use calibration::{calibrate, CalibrationAnalyzer, CalibrationBucket, CalibrationReport, Tendency};
pub use config::{AnalyticsConfig, BiasConfig, CalibrationConfig};
pub use team_review::{Assessment, TeamReviewAggregator, TeamReviewSummary};
pub use view::{AnalysisScope, EntryFilter, JournalSnapshot, ObservedDecision};

use serde::Serialize;

use crate::error::{AnalysisError, AnalysisResult};

/// A statistic that is either computed or explicitly withheld for lack of data.
///
/// Withholding is not an error: callers can tell "zero signal, computed
/// correctly" apart from "no attempt was made".
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Measurement {
    /// The statistic was computed.
    Computed {
        /// Computed value
        value: f64,
    },
    /// Too few samples to compute the statistic.
    InsufficientData {
        /// Samples available
        sample_count: usize,
        /// Samples required
        required: usize,
    },
}

impl Measurement {
    /// The computed value, if any.
    pub fn value(&self) -> Option<f64> {
        match self {
            Measurement::Computed { value } => Some(*value),
            Measurement::InsufficientData { .. } => None,
        }
    }

    /// Whether the statistic was computed.
    pub fn is_computed(&self) -> bool {
        matches!(self, Measurement::Computed { .. })
    }

    /// Arithmetic mean of `values`, withheld when there are none.
    pub(crate) fn mean_of(label: &str, values: &[f64]) -> AnalysisResult<Self> {
        match stats::mean(values) {
            Some(value) => Ok(Measurement::Computed {
                value: ensure_finite(label, value)?,
            }),
            None => Ok(Measurement::InsufficientData {
                sample_count: 0,
                required: 1,
            }),
        }
    }
}

/// Guard against arithmetic degeneracy that slipped past a sample-size check.
pub(crate) fn ensure_finite(label: &str, value: f64) -> AnalysisResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AnalysisError::Computation {
            message: format!("{} evaluated to {}", label, value),
        })
    }
}
