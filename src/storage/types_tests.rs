//! Unit tests for journal record types and their validation rules.

use super::*;
use chrono::{Duration, TimeZone};

fn decided_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

fn entry() -> DecisionEntry {
    DecisionEntry::new("Adopt Postgres", Category::Technical, "Migration done by Q2")
        .with_timestamp(decided_at())
        .with_confidence(0.7)
}

// ============================================================================
// Enum tests
// ============================================================================

#[test]
fn test_category_round_trip_names() {
    for category in Category::ALL {
        let parsed: Category = category.to_string().parse().unwrap();
        assert_eq!(parsed, category);
    }
}

#[test]
fn test_category_parse_is_case_insensitive() {
    assert_eq!("Financial".parse::<Category>().unwrap(), Category::Financial);
    assert_eq!(" people ".parse::<Category>().unwrap(), Category::People);
}

#[test]
fn test_category_parse_unknown() {
    let err = "legal".parse::<Category>().unwrap_err();
    assert_eq!(
        err,
        ValidationError::InvalidCategory {
            input: "legal".to_string()
        }
    );
}

#[test]
fn test_correctness_as_bool() {
    assert_eq!(Correctness::Correct.as_bool(), Some(true));
    assert_eq!(Correctness::Incorrect.as_bool(), Some(false));
    assert_eq!(Correctness::Unresolved.as_bool(), None);
    assert_eq!(Correctness::from(true), Correctness::Correct);
}

#[test]
fn test_reversibility_serde_name() {
    let json = serde_json::to_string(&Reversibility::DifficultToReverse).unwrap();
    assert_eq!(json, "\"difficult_to_reverse\"");
    assert_eq!(
        "difficult_to_reverse".parse::<Reversibility>().unwrap(),
        Reversibility::DifficultToReverse
    );
}

#[test]
fn test_time_pressure_default_is_medium() {
    assert_eq!(TimePressure::default(), TimePressure::Medium);
    assert!("urgent".parse::<TimePressure>().is_err());
}

// ============================================================================
// DecisionEntry tests
// ============================================================================

#[test]
fn test_decision_entry_new() {
    let entry = DecisionEntry::new("Hire SRE", Category::People, "On-call load halves");
    assert!(!entry.id.is_empty());
    assert_eq!(entry.category, Category::People);
    assert!(entry.confidence.is_none());
    assert!(entry.tags.is_empty());
    assert!(entry.lessons.is_empty());
    assert_eq!(entry.time_pressure, TimePressure::Medium);
    assert_eq!(entry.reversibility, Reversibility::Reversible);
}

#[test]
fn test_decision_entry_ids_are_unique() {
    let a = DecisionEntry::new("A", Category::Product, "x");
    let b = DecisionEntry::new("A", Category::Product, "x");
    assert_ne!(a.id, b.id);
}

#[test]
fn test_decision_entry_builders() {
    let entry = entry()
        .with_tag("q2")
        .with_tag("q2")
        .with_context("Legacy MySQL at capacity")
        .with_reasoning("Team knows Postgres")
        .with_time_pressure(TimePressure::High)
        .with_reversibility(Reversibility::DifficultToReverse)
        .with_information_completeness(4);

    assert_eq!(entry.tags.len(), 1);
    assert_eq!(entry.confidence, Some(0.7));
    assert_eq!(entry.time_pressure, TimePressure::High);
    assert_eq!(entry.information_completeness, Some(4));
    assert!(entry.validate().is_ok());
}

#[test]
fn test_decision_entry_confidence_is_not_clamped() {
    let entry = entry().with_confidence(1.2);
    assert_eq!(entry.confidence, Some(1.2));

    let err = entry.validate().unwrap_err();
    assert!(matches!(
        err,
        ValidationError::ConfidenceOutOfRange { value, .. } if value == 1.2
    ));
}

#[test]
fn test_decision_entry_rejects_negative_and_nan_confidence() {
    assert!(entry().with_confidence(-0.01).validate().is_err());
    assert!(entry().with_confidence(f64::NAN).validate().is_err());
}

#[test]
fn test_decision_entry_accepts_confidence_bounds() {
    assert!(entry().with_confidence(0.0).validate().is_ok());
    assert!(entry().with_confidence(1.0).validate().is_ok());
}

#[test]
fn test_decision_entry_rejects_empty_title() {
    let entry = DecisionEntry::new("  ", Category::Strategic, "Expected");
    assert_eq!(
        entry.validate().unwrap_err(),
        ValidationError::EmptyField { field: "title" }
    );
}

#[test]
fn test_decision_entry_rejects_information_out_of_range() {
    assert!(entry().with_information_completeness(0).validate().is_err());
    assert!(entry().with_information_completeness(11).validate().is_err());
    assert!(entry().with_information_completeness(10).validate().is_ok());
}

#[test]
fn test_decision_entry_serialization_skips_empty_options() {
    let entry = DecisionEntry::new("Title", Category::Operational, "Expected");
    let json = serde_json::to_value(&entry).unwrap();
    assert!(json.get("confidence").is_none());
    assert!(json.get("context").is_none());
    assert_eq!(json["category"], "operational");
}

// ============================================================================
// OutcomeRecord tests
// ============================================================================

#[test]
fn test_outcome_record_new_is_unresolved() {
    let outcome = OutcomeRecord::new("dec-1", "Shipped late", 5, 7);
    assert_eq!(outcome.correct, Correctness::Unresolved);
    assert_eq!(outcome.outcome_quality, 5);
    assert_eq!(outcome.process_quality, 7);
    assert!(outcome.validate().is_ok());
}

#[test]
fn test_outcome_record_rejects_quality_out_of_range() {
    let err = OutcomeRecord::new("dec-1", "x", 0, 5).validate().unwrap_err();
    assert_eq!(
        err,
        ValidationError::QualityOutOfRange {
            field: "outcome_quality",
            value: 0
        }
    );

    let err = OutcomeRecord::new("dec-1", "x", 5, 11).validate().unwrap_err();
    assert_eq!(
        err,
        ValidationError::QualityOutOfRange {
            field: "process_quality",
            value: 11
        }
    );
}

#[test]
fn test_outcome_record_rejects_resolution_before_decision() {
    let entry = entry();
    let outcome = OutcomeRecord::new(entry.id.clone(), "Done", 6, 6)
        .with_resolved_at(decided_at() - Duration::days(1));

    let err = outcome.validate_against(&entry).unwrap_err();
    assert!(matches!(err, ValidationError::ResolvedBeforeDecision { .. }));
}

#[test]
fn test_outcome_record_accepts_resolution_at_decision_time() {
    let entry = entry();
    let outcome = OutcomeRecord::new(entry.id.clone(), "Done", 6, 6)
        .with_correct(true)
        .with_resolved_at(decided_at());

    assert!(outcome.validate_against(&entry).is_ok());
}

#[test]
fn test_outcome_record_rejects_other_decision() {
    let entry = entry();
    let outcome = OutcomeRecord::new("someone-else", "Done", 6, 6)
        .with_resolved_at(decided_at() + Duration::days(3));

    let err = outcome.validate_against(&entry).unwrap_err();
    assert!(matches!(err, ValidationError::OutcomeMismatch { .. }));
}
