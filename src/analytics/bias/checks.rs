//! The bias check catalog. Each function is independent and pure.

use super::{build_pattern, BiasKind, BiasPattern, BiasView};
use crate::analytics::calibration::Tendency;
use crate::analytics::config::BiasConfig;
use crate::analytics::stats;
use crate::analytics::view::ObservedDecision;
use crate::storage::{Category, Reversibility, TimePressure};

fn id_list<'a>(decisions: impl IntoIterator<Item = &'a ObservedDecision>) -> String {
    decisions
        .into_iter()
        .map(|d| d.id())
        .collect::<Vec<_>>()
        .join(", ")
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}

/// Stated-confidence band a cluster check looks at.
struct ConfidenceBand {
    kind: BiasKind,
    label: &'static str,
    bound: String,
    in_band: fn(f64, &BiasConfig) -> bool,
    surprising: bool,
    outcome_word: &'static str,
    tendency: Tendency,
}

fn is_high(confidence: f64, config: &BiasConfig) -> bool {
    confidence >= config.high_confidence
}

fn is_low(confidence: f64, config: &BiasConfig) -> bool {
    confidence <= config.low_confidence
}

/// Whether a resolved decision falls into either confidence cluster.
pub(super) fn in_confidence_cluster(
    decision: &ObservedDecision,
    correct: bool,
    config: &BiasConfig,
) -> bool {
    match decision.entry.confidence {
        Some(c) => (is_high(c, config) && !correct) || (is_low(c, config) && correct),
        None => false,
    }
}

fn confidence_cluster(view: &BiasView<'_>, config: &BiasConfig, band: ConfidenceBand) -> Vec<BiasPattern> {
    let in_band: Vec<(&ObservedDecision, bool)> = view
        .resolved
        .iter()
        .copied()
        .filter(|(d, _)| d.entry.confidence.map_or(false, |c| (band.in_band)(c, config)))
        .collect();
    let hits: Vec<&ObservedDecision> = in_band
        .iter()
        .filter(|(_, correct)| *correct == band.surprising)
        .map(|(d, _)| *d)
        .collect();
    if hits.is_empty() {
        return Vec::new();
    }

    let mut evidence = vec![format!(
        "{} of {} {} decisions ({}) were {}",
        hits.len(),
        in_band.len(),
        band.label,
        band.bound,
        band.outcome_word
    )];

    for category in Category::ALL {
        let category_band = in_band
            .iter()
            .filter(|(d, _)| d.entry.category == category)
            .count();
        let category_hits: Vec<&ObservedDecision> = hits
            .iter()
            .copied()
            .filter(|d| d.entry.category == category)
            .collect();
        if category_hits.is_empty() {
            continue;
        }
        evidence.push(format!(
            "{} of {} {} {} decisions were {}: {}",
            category_hits.len(),
            category_band,
            band.label,
            category,
            band.outcome_word,
            id_list(category_hits.iter().copied())
        ));
    }

    let calibration = view.calibration;
    if calibration.tendency == band.tendency {
        if let (Some(stated), Some(actual)) = (calibration.mean_confidence, calibration.accuracy) {
            evidence.push(format!(
                "Population calibration is {}: mean stated confidence {:.2} vs realized accuracy {:.2} across {} decisions",
                calibration.tendency, stated, actual, calibration.sample_count
            ));
        }
    }

    build_pattern(band.kind, hits, evidence, config)
        .into_iter()
        .collect()
}

/// High stated confidence, incorrect outcome.
pub(super) fn overconfidence_cluster(view: &BiasView<'_>, config: &BiasConfig) -> Vec<BiasPattern> {
    confidence_cluster(
        view,
        config,
        ConfidenceBand {
            kind: BiasKind::OverconfidenceCluster,
            label: "high-confidence",
            bound: format!("confidence >= {:.2}", config.high_confidence),
            in_band: is_high,
            surprising: false,
            outcome_word: "incorrect",
            tendency: Tendency::Overconfident,
        },
    )
}

/// Low stated confidence, correct outcome.
pub(super) fn underconfidence_cluster(view: &BiasView<'_>, config: &BiasConfig) -> Vec<BiasPattern> {
    confidence_cluster(
        view,
        config,
        ConfidenceBand {
            kind: BiasKind::UnderconfidenceCluster,
            label: "low-confidence",
            bound: format!("confidence <= {:.2}", config.low_confidence),
            in_band: is_low,
            surprising: true,
            outcome_word: "correct",
            tendency: Tendency::Underconfident,
        },
    )
}

fn divergence(
    view: &BiasView<'_>,
    config: &BiasConfig,
    kind: BiasKind,
    gap: fn(i16, i16) -> i16,
    description: &str,
) -> Vec<BiasPattern> {
    let threshold = i16::from(config.quality_gap);
    let affected: Vec<_> = view
        .with_outcome
        .iter()
        .filter(|(_, o)| {
            gap(i16::from(o.process_quality), i16::from(o.outcome_quality)) > threshold
        })
        .collect();
    if affected.is_empty() {
        return Vec::new();
    }

    let mut evidence = vec![format!(
        "{} of {} decisions with an outcome scored {} by more than {} points",
        affected.len(),
        view.with_outcome.len(),
        description,
        config.quality_gap
    )];
    evidence.extend(affected.iter().map(|(d, o)| {
        format!(
            "{}: process quality {} vs outcome quality {}",
            d.id(),
            o.process_quality,
            o.outcome_quality
        )
    }));

    build_pattern(kind, affected.iter().map(|(d, _)| *d), evidence, config)
        .into_iter()
        .collect()
}

/// Process quality well above outcome quality.
pub(super) fn good_process_bad_outcome(view: &BiasView<'_>, config: &BiasConfig) -> Vec<BiasPattern> {
    divergence(
        view,
        config,
        BiasKind::GoodProcessBadOutcome,
        |process, outcome| process - outcome,
        "process above outcome",
    )
}

/// Outcome quality well above process quality.
pub(super) fn bad_process_good_outcome(view: &BiasView<'_>, config: &BiasConfig) -> Vec<BiasPattern> {
    divergence(
        view,
        config,
        BiasKind::BadProcessGoodOutcome,
        |process, outcome| outcome - process,
        "outcome above process",
    )
}

/// High-pressure decisions whose mean process quality sits more than the
/// configured number of standard deviations below the cohort mean.
pub(super) fn time_pressure_degradation(view: &BiasView<'_>, config: &BiasConfig) -> Vec<BiasPattern> {
    let cohort = &view.with_outcome;
    if cohort.len() < config.min_cohort {
        return Vec::new();
    }

    let process: Vec<f64> = cohort
        .iter()
        .map(|(_, o)| f64::from(o.process_quality))
        .collect();
    let (Some(cohort_mean), Some(std_dev)) =
        (stats::mean(&process), stats::population_std_dev(&process))
    else {
        return Vec::new();
    };

    let pressured: Vec<_> = cohort
        .iter()
        .filter(|(d, _)| d.entry.time_pressure == TimePressure::High)
        .collect();
    if pressured.len() < config.min_frequency {
        return Vec::new();
    }
    let pressured_process: Vec<f64> = pressured
        .iter()
        .map(|(_, o)| f64::from(o.process_quality))
        .collect();
    let Some(pressured_mean) = stats::mean(&pressured_process) else {
        return Vec::new();
    };

    let threshold = cohort_mean - config.std_multiplier * std_dev;
    if pressured_mean >= threshold {
        return Vec::new();
    }

    let evidence = vec![
        format!(
            "{} high-pressure decisions averaged process quality {:.2} against a cohort mean of {:.2} (population std dev {:.2}, n = {})",
            pressured.len(),
            pressured_mean,
            cohort_mean,
            std_dev,
            cohort.len()
        ),
        format!(
            "High-pressure decisions: {}",
            id_list(pressured.iter().map(|(d, _)| *d))
        ),
    ];

    build_pattern(
        BiasKind::TimePressureDegradation,
        pressured.iter().map(|(d, _)| *d),
        evidence,
        config,
    )
    .into_iter()
    .collect()
}

/// Difficult-to-reverse decisions made on low information that landed below
/// the median outcome quality.
pub(super) fn reversibility_mismatch(view: &BiasView<'_>, config: &BiasConfig) -> Vec<BiasPattern> {
    let outcomes: Vec<f64> = view
        .with_outcome
        .iter()
        .map(|(_, o)| f64::from(o.outcome_quality))
        .collect();
    let Some(median) = stats::median(&outcomes) else {
        return Vec::new();
    };

    let affected: Vec<_> = view
        .with_outcome
        .iter()
        .filter(|(d, o)| {
            d.entry.reversibility == Reversibility::DifficultToReverse
                && d.entry
                    .information_completeness
                    .map_or(false, |info| info <= config.low_information)
                && f64::from(o.outcome_quality) < median
        })
        .collect();
    if affected.is_empty() {
        return Vec::new();
    }

    let mut evidence = vec![format!(
        "{} difficult-to-reverse decisions made with information completeness <= {} had outcome quality below the median of {:.1}",
        affected.len(),
        config.low_information,
        median
    )];
    evidence.extend(affected.iter().map(|(d, o)| {
        format!(
            "{}: information completeness {}, outcome quality {}",
            d.id(),
            d.entry.information_completeness.unwrap_or_default(),
            o.outcome_quality
        )
    }));

    build_pattern(
        BiasKind::ReversibilityMismatch,
        affected.iter().map(|(d, _)| *d),
        evidence,
        config,
    )
    .into_iter()
    .collect()
}

/// Categories whose miss rate stands well above the overall rate, counting
/// only misses no confidence cluster accounts for.
pub(super) fn unclassified_cluster(view: &BiasView<'_>, config: &BiasConfig) -> Vec<BiasPattern> {
    let resolved = &view.resolved;
    if resolved.is_empty() {
        return Vec::new();
    }
    let incorrect_total = resolved.iter().filter(|(_, correct)| !correct).count();
    let overall_rate = incorrect_total as f64 / resolved.len() as f64;

    let mut patterns = Vec::new();
    for category in Category::ALL {
        let in_category: Vec<(&ObservedDecision, bool)> = resolved
            .iter()
            .copied()
            .filter(|(d, _)| d.entry.category == category)
            .collect();
        if in_category.is_empty() {
            continue;
        }
        let incorrect = in_category.iter().filter(|(_, correct)| !correct).count();
        let rate = incorrect as f64 / in_category.len() as f64;
        if rate <= overall_rate + config.category_margin {
            continue;
        }

        let unexplained: Vec<&ObservedDecision> = in_category
            .iter()
            .filter(|(d, correct)| !correct && !in_confidence_cluster(d, *correct, config))
            .map(|(d, _)| *d)
            .collect();
        if unexplained.is_empty() {
            continue;
        }

        let evidence = vec![
            format!(
                "{} of {} resolved {} decisions were incorrect ({:.0}% vs {:.0}% overall)",
                incorrect,
                in_category.len(),
                category,
                percent(incorrect, in_category.len()),
                100.0 * overall_rate
            ),
            format!(
                "{} of them are not explained by a confidence cluster: {}",
                unexplained.len(),
                id_list(unexplained.iter().copied())
            ),
        ];

        patterns.extend(build_pattern(
            BiasKind::UnclassifiedCluster,
            unexplained,
            evidence,
            config,
        ));
    }
    patterns
}
