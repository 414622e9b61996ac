use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::SharedState;
use crate::analytics::{
    Assessment, BiasPattern, EntryFilter, TeamReviewAggregator, TeamReviewSummary,
};
use crate::error::{McpError, McpResult};
use crate::storage::{
    Category, DecisionEntry, JournalStore, OutcomeRecord, Reversibility, TimePressure,
};
use crate::timeframe::Timeframe;

/// Route tool calls to appropriate handlers
pub async fn handle_tool_call(
    state: &SharedState,
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<Value> {
    info!(tool = %tool_name, "Routing tool call");

    match tool_name {
        // Journal ingestion
        "journal_record_decision" => handle_record_decision(state, arguments).await,
        "journal_record_outcome" => handle_record_outcome(state, arguments).await,
        "journal_add_lesson" => handle_add_lesson(state, arguments).await,
        // Analytics
        "audit_full" => handle_audit_full(state, arguments).await,
        "audit_calibration" => handle_audit_calibration(state, arguments).await,
        "audit_biases" => handle_audit_biases(state, arguments).await,
        // Team review
        "team_review_summarize" => handle_team_review(arguments).await,
        _ => Err(McpError::UnknownTool {
            tool_name: tool_name.to_string(),
        }),
    }
}

// ============================================================================
// Journal handlers
// ============================================================================

/// Parameters for journal_record_decision
#[derive(Debug, Deserialize)]
pub struct RecordDecisionParams {
    /// Short title
    pub title: String,
    /// Decision category
    pub category: Category,
    /// What is expected to happen
    pub expected_outcome: String,
    /// Stated probability of the expected outcome
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Situation at decision time
    #[serde(default)]
    pub context: Option<String>,
    /// Why this option was chosen
    #[serde(default)]
    pub reasoning: Option<String>,
    /// Filter tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Time pressure
    #[serde(default)]
    pub time_pressure: TimePressure,
    /// Reversibility
    #[serde(default)]
    pub reversibility: Reversibility,
    /// Information completeness (1-10)
    #[serde(default)]
    pub information_completeness: Option<u8>,
    /// Decision time, defaults to now
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl RecordDecisionParams {
    fn into_entry(self) -> DecisionEntry {
        let mut entry = DecisionEntry::new(self.title, self.category, self.expected_outcome)
            .with_time_pressure(self.time_pressure)
            .with_reversibility(self.reversibility);
        if let Some(timestamp) = self.timestamp {
            entry = entry.with_timestamp(timestamp);
        }
        if let Some(confidence) = self.confidence {
            entry = entry.with_confidence(confidence);
        }
        if let Some(context) = self.context {
            entry = entry.with_context(context);
        }
        if let Some(reasoning) = self.reasoning {
            entry = entry.with_reasoning(reasoning);
        }
        if let Some(completeness) = self.information_completeness {
            entry = entry.with_information_completeness(completeness);
        }
        for tag in self.tags {
            entry = entry.with_tag(tag);
        }
        entry
    }
}

/// Response for journal_record_decision
#[derive(Debug, Serialize)]
pub struct RecordDecisionResponse {
    /// Assigned decision id
    pub decision_id: String,
    /// Recorded decision time
    pub timestamp: DateTime<Utc>,
}

async fn handle_record_decision(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    execute_handler(
        "journal_record_decision",
        arguments,
        |params: RecordDecisionParams| async move {
            let entry = params.into_entry();
            state.storage.record_decision(&entry).await?;
            Ok::<_, crate::error::StorageError>(RecordDecisionResponse {
                decision_id: entry.id,
                timestamp: entry.timestamp,
            })
        },
    )
    .await
}

/// Parameters for journal_record_outcome
#[derive(Debug, Deserialize)]
pub struct RecordOutcomeParams {
    /// Decision being resolved
    pub decision_id: String,
    /// What actually happened
    pub actual_outcome: String,
    /// Outcome quality (1-10)
    pub outcome_quality: u8,
    /// Process quality (1-10)
    pub process_quality: u8,
    /// Whether the expected outcome materialized; omit while undecided
    #[serde(default)]
    pub correct: Option<bool>,
    /// Resolution time, defaults to now
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Reviewer notes
    #[serde(default)]
    pub notes: Option<String>,
}

/// Response for journal_record_outcome
#[derive(Debug, Serialize)]
pub struct RecordOutcomeResponse {
    /// Assigned outcome id
    pub outcome_id: String,
    /// Decision resolved
    pub decision_id: String,
}

async fn handle_record_outcome(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    execute_handler(
        "journal_record_outcome",
        arguments,
        |params: RecordOutcomeParams| async move {
            let mut outcome = OutcomeRecord::new(
                params.decision_id,
                params.actual_outcome,
                params.outcome_quality,
                params.process_quality,
            );
            if let Some(correct) = params.correct {
                outcome = outcome.with_correct(correct);
            }
            if let Some(resolved_at) = params.resolved_at {
                outcome = outcome.with_resolved_at(resolved_at);
            }
            if let Some(notes) = params.notes {
                outcome = outcome.with_notes(notes);
            }
            state.storage.record_outcome(&outcome).await?;
            Ok::<_, crate::error::StorageError>(RecordOutcomeResponse {
                outcome_id: outcome.id,
                decision_id: outcome.decision_id,
            })
        },
    )
    .await
}

/// Parameters for journal_add_lesson
#[derive(Debug, Deserialize)]
pub struct AddLessonParams {
    /// Decision to annotate
    pub decision_id: String,
    /// Lesson text
    pub lesson: String,
}

/// Response for journal_add_lesson
#[derive(Debug, Serialize)]
pub struct AddLessonResponse {
    /// Decision annotated
    pub decision_id: String,
    /// All lessons on the decision, oldest first
    pub lessons: Vec<String>,
}

async fn handle_add_lesson(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    execute_handler(
        "journal_add_lesson",
        arguments,
        |params: AddLessonParams| async move {
            state
                .storage
                .append_lesson(&params.decision_id, &params.lesson)
                .await?;
            let lessons = state
                .storage
                .get_decision(&params.decision_id)
                .await?
                .map(|entry| entry.lessons)
                .unwrap_or_default();
            Ok::<_, crate::error::StorageError>(AddLessonResponse {
                decision_id: params.decision_id,
                lessons,
            })
        },
    )
    .await
}

// ============================================================================
// Analytics handlers
// ============================================================================

/// Window selection shared by the analytics tools
#[derive(Debug, Deserialize)]
pub struct WindowParams {
    /// Timeframe expression, e.g. "2024", "2024-Q2", "last_6_months"
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    /// Only decisions in this category
    #[serde(default)]
    pub category: Option<Category>,
    /// Only decisions carrying this tag
    #[serde(default)]
    pub tag: Option<String>,
}

fn default_timeframe() -> String {
    "all".to_string()
}

impl WindowParams {
    fn resolve(self, tool_name: &str) -> McpResult<(Timeframe, EntryFilter)> {
        let timeframe: Timeframe =
            self.timeframe
                .parse()
                .map_err(|e: crate::error::ValidationError| McpError::InvalidParameters {
                    tool_name: tool_name.to_string(),
                    message: e.to_string(),
                })?;
        let filter = EntryFilter {
            category: self.category,
            tag: self.tag,
        };
        Ok((timeframe, filter))
    }
}

/// Response for audit_biases
#[derive(Debug, Serialize)]
pub struct BiasScanResponse {
    /// Timeframe scanned
    pub timeframe: String,
    /// Ranked patterns
    pub patterns: Vec<BiasPattern>,
}

async fn handle_audit_full(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: WindowParams = parse_optional_arguments("audit_full", arguments)?;
    let (timeframe, filter) = params.resolve("audit_full")?;

    let report = state
        .audit_engine
        .full_audit_filtered(&timeframe, &filter)
        .await
        .map_err(|e| McpError::ExecutionFailed {
            message: e.to_string(),
        })?;

    serde_json::to_value(report).map_err(McpError::Json)
}

async fn handle_audit_calibration(
    state: &SharedState,
    arguments: Option<Value>,
) -> McpResult<Value> {
    let params: WindowParams = parse_optional_arguments("audit_calibration", arguments)?;
    let (timeframe, filter) = params.resolve("audit_calibration")?;

    let report = state
        .calibration_analyzer
        .analyze_filtered(&timeframe, &filter)
        .await
        .map_err(|e| McpError::ExecutionFailed {
            message: e.to_string(),
        })?;

    serde_json::to_value(report).map_err(McpError::Json)
}

async fn handle_audit_biases(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: WindowParams = parse_optional_arguments("audit_biases", arguments)?;
    let (timeframe, filter) = params.resolve("audit_biases")?;

    let patterns = state
        .bias_detector
        .scan_filtered(&timeframe, &filter)
        .await
        .map_err(|e| McpError::ExecutionFailed {
            message: e.to_string(),
        })?;

    serde_json::to_value(BiasScanResponse {
        timeframe: timeframe.to_string(),
        patterns,
    })
    .map_err(McpError::Json)
}

// ============================================================================
// Team review handler
// ============================================================================

/// Parameters for team_review_summarize
#[derive(Debug, Deserialize)]
pub struct TeamReviewParams {
    /// Decision under review
    pub decision_id: String,
    /// Assessments in submission order; later ones from the same participant win
    pub assessments: Vec<Assessment>,
}

async fn handle_team_review(arguments: Option<Value>) -> McpResult<Value> {
    execute_handler(
        "team_review_summarize",
        arguments,
        |params: TeamReviewParams| async move {
            let mut review = TeamReviewAggregator::new(params.decision_id);
            for assessment in params.assessments {
                review.submit(assessment)?;
            }
            let summary: TeamReviewSummary = review.summarize()?;
            Ok::<_, crate::error::AnalysisError>(summary)
        },
    )
    .await
}

// ============================================================================
// Helper functions
// ============================================================================

/// Helper to parse arguments with consistent error handling
fn parse_arguments<T: serde::de::DeserializeOwned>(
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<T> {
    match arguments {
        Some(args) => serde_json::from_value(args).map_err(|e| McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: e.to_string(),
        }),
        None => Err(McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: "Missing arguments".to_string(),
        }),
    }
}

/// Like `parse_arguments`, but absent arguments mean "all defaults".
fn parse_optional_arguments<T: serde::de::DeserializeOwned>(
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<T> {
    parse_arguments(
        tool_name,
        Some(arguments.unwrap_or_else(|| Value::Object(Default::default()))),
    )
}

/// Generic handler that executes an operation with consistent error handling.
///
/// Parses typed parameters, maps the operation's error to
/// `McpError::ExecutionFailed` and serializes the result.
async fn execute_handler<P, R, E, F, Fut>(
    tool_name: &str,
    arguments: Option<Value>,
    operation: F,
) -> McpResult<Value>
where
    P: serde::de::DeserializeOwned,
    R: Serialize,
    E: std::fmt::Display,
    F: FnOnce(P) -> Fut,
    Fut: std::future::Future<Output = Result<R, E>>,
{
    let params: P = parse_arguments(tool_name, arguments)?;

    let result = operation(params)
        .await
        .map_err(|e| McpError::ExecutionFailed {
            message: e.to_string(),
        })?;

    serde_json::to_value(result).map_err(McpError::Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_arguments_into_journal_params() {
        let params: AddLessonParams = parse_arguments(
            "journal_add_lesson",
            Some(json!({"decision_id": "dec-7", "lesson": "Ask finance before signing"})),
        )
        .unwrap();
        assert_eq!(params.decision_id, "dec-7");
        assert_eq!(params.lesson, "Ask finance before signing");
    }

    #[test]
    fn test_parse_arguments_missing_arguments() {
        let result: McpResult<AddLessonParams> = parse_arguments("journal_add_lesson", None);

        let err = result.unwrap_err();
        assert!(matches!(err, McpError::InvalidParameters { .. }));
        assert!(err.to_string().contains("Missing arguments"));
        assert!(err.to_string().contains("journal_add_lesson"));
    }

    #[test]
    fn test_parse_arguments_rejects_out_of_range_quality() {
        // u8 fields refuse negative scores before validation runs
        let result: McpResult<RecordOutcomeParams> = parse_arguments(
            "journal_record_outcome",
            Some(json!({
                "decision_id": "dec-7",
                "actual_outcome": "late",
                "outcome_quality": -1,
                "process_quality": 5
            })),
        );
        assert!(matches!(
            result.unwrap_err(),
            McpError::InvalidParameters { .. }
        ));
    }

    #[test]
    fn test_parse_optional_arguments_defaults() {
        let params: WindowParams = parse_optional_arguments("audit_full", None).unwrap();
        assert_eq!(params.timeframe, "all");
        assert!(params.category.is_none());
        assert!(params.tag.is_none());
    }

    #[test]
    fn test_window_params_resolve() {
        let params: WindowParams = parse_arguments(
            "audit_full",
            Some(json!({"timeframe": "2024-Q2", "category": "technical", "tag": "infra"})),
        )
        .unwrap();
        let (timeframe, filter) = params.resolve("audit_full").unwrap();
        assert_eq!(
            timeframe,
            Timeframe::Quarter {
                year: 2024,
                quarter: 2
            }
        );
        assert_eq!(filter.category, Some(Category::Technical));
        assert_eq!(filter.tag.as_deref(), Some("infra"));
    }

    #[test]
    fn test_window_params_reject_bad_timeframe() {
        let params: WindowParams =
            parse_arguments("audit_full", Some(json!({"timeframe": "someday"}))).unwrap();
        let err = params.resolve("audit_full").unwrap_err();
        assert!(matches!(err, McpError::InvalidParameters { .. }));
        assert!(err.to_string().contains("someday"));
    }

    #[test]
    fn test_record_decision_params_into_entry() {
        let params: RecordDecisionParams = parse_arguments(
            "journal_record_decision",
            Some(json!({
                "title": "Adopt Rust for the ingest service",
                "category": "technical",
                "expected_outcome": "p99 latency halves",
                "confidence": 0.75,
                "tags": ["infra", "infra", "q3"],
                "time_pressure": "high",
                "reversibility": "difficult_to_reverse",
                "information_completeness": 6,
                "timestamp": "2024-07-01T10:00:00Z"
            })),
        )
        .unwrap();
        let entry = params.into_entry();

        assert_eq!(entry.category, Category::Technical);
        assert_eq!(entry.confidence, Some(0.75));
        assert_eq!(entry.tags.len(), 2);
        assert_eq!(entry.time_pressure, TimePressure::High);
        assert_eq!(entry.reversibility, Reversibility::DifficultToReverse);
        assert_eq!(entry.timestamp.to_rfc3339(), "2024-07-01T10:00:00+00:00");
    }

    #[test]
    fn test_unknown_category_is_invalid_parameters() {
        let result: McpResult<RecordDecisionParams> = parse_arguments(
            "journal_record_decision",
            Some(json!({"title": "x", "category": "legal", "expected_outcome": "y"})),
        );
        assert!(matches!(
            result.unwrap_err(),
            McpError::InvalidParameters { .. }
        ));
    }

    #[tokio::test]
    async fn test_team_review_tool() {
        let result = handle_team_review(Some(json!({
            "decision_id": "dec-9",
            "assessments": [
                {"participant": "ana", "process_score": 7, "outcome_score": 5, "key_lesson": "Pilot first"},
                {"participant": "ben", "process_score": 7, "outcome_score": 7, "key_lesson": " Pilot first "},
                {"participant": "chi", "process_score": 7, "outcome_score": 6}
            ]
        })))
        .await
        .unwrap();

        assert_eq!(result["participant_count"], 3);
        assert_eq!(result["agreement_score"]["value"], 1.0);
        assert_eq!(result["avg_outcome"]["value"], 6.0);
        assert_eq!(result["synthesized_lessons"], json!(["Pilot first"]));
    }

    #[tokio::test]
    async fn test_team_review_tool_rejects_bad_score() {
        let err = handle_team_review(Some(json!({
            "decision_id": "dec-9",
            "assessments": [{"participant": "ana", "process_score": 0, "outcome_score": 5}]
        })))
        .await
        .unwrap_err();
        assert!(matches!(err, McpError::ExecutionFailed { .. }));
        assert!(err.to_string().contains("process_score"));
    }
}
