//! Tests for the bias catalog and its ranking.

use super::*;
use crate::analytics::calibration::Tendency;
use crate::analytics::config::CalibrationConfig;
use crate::storage::{Category, DecisionEntry, Reversibility, TimePressure};
use crate::timeframe::TimeRange;
use chrono::{Duration, TimeZone};
use pretty_assertions::assert_eq;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Builds decisions one hour apart so ids line up with timestamp order.
#[derive(Default)]
struct Journal {
    decisions: Vec<ObservedDecision>,
}

impl Journal {
    fn add(
        &mut self,
        category: Category,
        confidence: Option<f64>,
        correct: Option<bool>,
        process: u8,
        outcome: u8,
        adjust: impl FnOnce(DecisionEntry) -> DecisionEntry,
    ) -> String {
        let n = self.decisions.len();
        let mut entry = DecisionEntry::new(format!("decision {n}"), category, "expected")
            .with_timestamp(base() + Duration::hours(n as i64));
        entry.id = format!("d{:02}", n);
        if let Some(c) = confidence {
            entry = entry.with_confidence(c);
        }
        let entry = adjust(entry);

        let mut record = OutcomeRecord::new(entry.id.clone(), "happened", outcome, process)
            .with_resolved_at(base() + Duration::days(200));
        if let Some(correct) = correct {
            record = record.with_correct(correct);
        }
        let id = entry.id.clone();
        self.decisions.push(ObservedDecision {
            entry,
            outcome: Some(record),
        });
        id
    }

    fn add_pending(&mut self, category: Category, confidence: f64) {
        let n = self.decisions.len();
        let mut entry = DecisionEntry::new(format!("decision {n}"), category, "expected")
            .with_timestamp(base() + Duration::hours(n as i64))
            .with_confidence(confidence);
        entry.id = format!("d{:02}", n);
        self.decisions.push(ObservedDecision {
            entry,
            outcome: None,
        });
    }

    fn snapshot(self) -> JournalSnapshot {
        let range = TimeRange::new(base(), base() + Duration::days(365)).unwrap();
        JournalSnapshot::from_decisions(range, self.decisions).unwrap()
    }
}

fn run(snapshot: &JournalSnapshot) -> Vec<BiasPattern> {
    let calibration = calibrate(snapshot, &CalibrationConfig::default()).unwrap();
    detect(snapshot, &calibration, &BiasConfig::default())
}

fn same(entry: DecisionEntry) -> DecisionEntry {
    entry
}

#[test]
fn test_empty_window_yields_no_patterns() {
    let patterns = run(&Journal::default().snapshot());
    assert!(patterns.is_empty());
}

#[test]
fn test_empty_window_with_zero_sample_floor() {
    let snapshot = Journal::default().snapshot();
    let config = CalibrationConfig {
        min_samples: 0,
        ..Default::default()
    };
    let calibration = calibrate(&snapshot, &config).unwrap();
    assert_eq!(calibration.tendency, Tendency::InsufficientData);
    assert!(detect(&snapshot, &calibration, &BiasConfig::default()).is_empty());
}

#[test]
fn test_overconfidence_cluster_end_to_end() {
    let mut journal = Journal::default();
    for i in 0..10 {
        journal.add(Category::Product, Some(0.9), Some(i < 2), 6, 5, same);
    }
    let snapshot = journal.snapshot();
    let calibration = calibrate(&snapshot, &CalibrationConfig::default()).unwrap();
    assert_eq!(calibration.tendency, Tendency::Overconfident);

    let patterns = detect(&snapshot, &calibration, &BiasConfig::default());
    assert_eq!(patterns.len(), 1);

    let pattern = &patterns[0];
    assert_eq!(pattern.kind, BiasKind::OverconfidenceCluster);
    assert_eq!(pattern.name, "Overconfidence cluster");
    assert_eq!(pattern.frequency, 8);
    assert!((pattern.confidence - 0.8).abs() < 1e-12);
    assert_eq!(
        pattern.affected_decisions,
        vec!["d02", "d03", "d04", "d05", "d06", "d07", "d08", "d09"]
    );
    assert_eq!(
        pattern.evidence[0],
        "8 of 10 high-confidence decisions (confidence >= 0.80) were incorrect"
    );
    assert_eq!(
        pattern.evidence[1],
        "8 of 10 high-confidence product decisions were incorrect: d02, d03, d04, d05, d06, d07, d08, d09"
    );
    assert_eq!(
        pattern.evidence[2],
        "Population calibration is overconfident: mean stated confidence 0.90 vs realized accuracy 0.20 across 10 decisions"
    );
    assert_eq!(pattern.mitigation, BiasKind::OverconfidenceCluster.mitigation());
}

#[test]
fn test_overconfidence_below_floor_is_not_reported() {
    let mut journal = Journal::default();
    journal.add(Category::Technical, Some(0.85), Some(false), 6, 5, same);
    journal.add(Category::Technical, Some(0.95), Some(false), 6, 5, same);
    journal.add(Category::Technical, Some(0.95), Some(true), 6, 5, same);
    assert!(run(&journal.snapshot()).is_empty());
}

#[test]
fn test_unresolved_and_missing_outcomes_do_not_count_as_misses() {
    let mut journal = Journal::default();
    journal.add(Category::Technical, Some(0.9), Some(false), 6, 5, same);
    journal.add(Category::Technical, Some(0.9), Some(false), 6, 5, same);
    journal.add(Category::Technical, Some(0.9), None, 6, 5, same);
    journal.add_pending(Category::Technical, 0.9);
    assert!(run(&journal.snapshot()).is_empty());
}

#[test]
fn test_underconfidence_cluster() {
    let mut journal = Journal::default();
    for _ in 0..3 {
        journal.add(Category::People, Some(0.2), Some(true), 6, 6, same);
    }
    journal.add(Category::People, Some(0.3), Some(false), 6, 6, same);

    let patterns = run(&journal.snapshot());
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].kind, BiasKind::UnderconfidenceCluster);
    assert_eq!(patterns[0].frequency, 3);
    assert_eq!(
        patterns[0].evidence[0],
        "3 of 4 low-confidence decisions (confidence <= 0.30) were correct"
    );
}

#[test]
fn test_process_outcome_divergence_is_split_by_direction() {
    let mut journal = Journal::default();
    for _ in 0..3 {
        journal.add(Category::Operational, None, None, 9, 5, same);
    }
    // A gap of exactly the threshold is normal variance
    for _ in 0..2 {
        journal.add(Category::Operational, None, None, 8, 5, same);
    }
    for _ in 0..4 {
        journal.add(Category::Operational, None, None, 2, 9, same);
    }

    let patterns = run(&journal.snapshot());
    let kinds: Vec<_> = patterns.iter().map(|p| (p.kind, p.frequency)).collect();
    assert_eq!(
        kinds,
        vec![
            (BiasKind::BadProcessGoodOutcome, 4),
            (BiasKind::GoodProcessBadOutcome, 3),
        ]
    );
    assert_eq!(patterns[1].affected_decisions, vec!["d00", "d01", "d02"]);
    assert_eq!(
        patterns[1].evidence[1],
        "d00: process quality 9 vs outcome quality 5"
    );
}

#[test]
fn test_ties_break_by_name() {
    let mut journal = Journal::default();
    for _ in 0..3 {
        journal.add(Category::Financial, None, None, 9, 4, same);
    }
    for _ in 0..3 {
        journal.add(Category::Financial, None, None, 3, 8, same);
    }

    let names: Vec<_> = run(&journal.snapshot())
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(
        names,
        vec!["Bad process, good outcome", "Good process, bad outcome"]
    );
}

fn pressured_journal(calm: usize) -> Journal {
    let mut journal = Journal::default();
    for _ in 0..calm {
        journal.add(Category::Technical, None, None, 8, 5, same);
    }
    for _ in 0..3 {
        journal.add(Category::Technical, None, None, 3, 5, |e| {
            e.with_time_pressure(TimePressure::High)
        });
    }
    journal
}

#[test]
fn test_time_pressure_degradation() {
    let patterns = run(&pressured_journal(9).snapshot());
    assert_eq!(patterns.len(), 1);

    let pattern = &patterns[0];
    assert_eq!(pattern.kind, BiasKind::TimePressureDegradation);
    assert_eq!(pattern.frequency, 3);
    assert_eq!(pattern.affected_decisions, vec!["d09", "d10", "d11"]);
    assert!(pattern.evidence[0].starts_with(
        "3 high-pressure decisions averaged process quality 3.00 against a cohort mean of 6.75"
    ));
}

#[test]
fn test_time_pressure_skipped_for_small_cohort() {
    assert!(run(&pressured_journal(6).snapshot()).is_empty());
}

#[test]
fn test_reversibility_mismatch() {
    let mut journal = Journal::default();
    for _ in 0..3 {
        journal.add(Category::Strategic, None, None, 4, 2, |e| {
            e.with_reversibility(Reversibility::DifficultToReverse)
                .with_information_completeness(3)
        });
    }
    // Difficult to reverse but well informed
    journal.add(Category::Strategic, None, None, 7, 8, |e| {
        e.with_reversibility(Reversibility::DifficultToReverse)
            .with_information_completeness(8)
    });
    for _ in 0..3 {
        journal.add(Category::Strategic, None, None, 7, 8, same);
    }

    let patterns = run(&journal.snapshot());
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].kind, BiasKind::ReversibilityMismatch);
    assert_eq!(patterns[0].affected_decisions, vec!["d00", "d01", "d02"]);
    assert_eq!(
        patterns[0].evidence[0],
        "3 difficult-to-reverse decisions made with information completeness <= 4 had outcome quality below the median of 8.0"
    );
}

#[test]
fn test_unclassified_cluster_excludes_confidence_misses() {
    let mut journal = Journal::default();
    journal.add(Category::Technical, Some(0.9), Some(false), 6, 5, same);
    for _ in 0..3 {
        journal.add(Category::Technical, None, Some(false), 6, 5, same);
    }
    for _ in 0..6 {
        journal.add(Category::Product, None, Some(true), 6, 5, same);
    }

    let patterns = run(&journal.snapshot());
    assert_eq!(patterns.len(), 1);

    let pattern = &patterns[0];
    assert_eq!(pattern.kind, BiasKind::UnclassifiedCluster);
    assert_eq!(pattern.frequency, 3);
    assert_eq!(pattern.affected_decisions, vec!["d01", "d02", "d03"]);
    assert_eq!(
        pattern.evidence[0],
        "4 of 4 resolved technical decisions were incorrect (100% vs 40% overall)"
    );
}

#[test]
fn test_detection_is_deterministic() {
    let mut journal = Journal::default();
    for i in 0..12 {
        journal.add(Category::Technical, Some(0.9), Some(i % 3 == 0), 9, 4, same);
    }
    let snapshot = journal.snapshot();
    let first = run(&snapshot);
    let second = run(&snapshot);
    assert!(!first.is_empty());
    assert_eq!(first, second);

    // One decision can back several patterns
    let overconfident = first
        .iter()
        .find(|p| p.kind == BiasKind::OverconfidenceCluster)
        .unwrap();
    let divergent = first
        .iter()
        .find(|p| p.kind == BiasKind::GoodProcessBadOutcome)
        .unwrap();
    assert!(overconfident
        .affected_decisions
        .iter()
        .any(|id| divergent.affected_decisions.contains(id)));
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_build_pattern_dedupes_and_never_reports_zero() {
    let mut journal = Journal::default();
    for _ in 0..3 {
        journal.add(Category::People, None, None, 5, 5, same);
    }
    let snapshot = journal.snapshot();
    let config = BiasConfig {
        min_frequency: 1,
        ..Default::default()
    };

    let decisions = snapshot.decisions();
    let repeated = decisions.iter().chain(decisions.iter());
    let pattern = build_pattern(BiasKind::UnclassifiedCluster, repeated, vec![], &config).unwrap();
    assert_eq!(pattern.frequency, 3);
    assert_eq!(pattern.affected_decisions, vec!["d00", "d01", "d02"]);

    let none = std::iter::empty::<&ObservedDecision>();
    assert!(build_pattern(BiasKind::UnclassifiedCluster, none, vec![], &config).is_none());
}
