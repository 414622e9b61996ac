use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),
}

/// Malformed input records, rejected at ingestion and never coerced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Confidence {value} for decision {decision_id} is outside [0, 1]")]
    ConfidenceOutOfRange { decision_id: String, value: f64 },

    #[error("{field} {value} is outside [1, 10]")]
    QualityOutOfRange { field: &'static str, value: i64 },

    #[error("Information completeness {value} for decision {decision_id} is outside [1, 10]")]
    InformationOutOfRange { decision_id: String, value: i64 },

    #[error("Outcome references unknown decision: {decision_id}")]
    UnknownDecision { decision_id: String },

    #[error("Outcome for decision {decision_id} resolved at {resolved_at} before the decision was made at {decided_at}")]
    ResolvedBeforeDecision {
        decision_id: String,
        decided_at: String,
        resolved_at: String,
    },

    #[error("Decision {decision_id} already has an outcome")]
    OutcomeAlreadyRecorded { decision_id: String },

    #[error("Outcome for decision {outcome_decision_id} was attached to decision {decision_id}")]
    OutcomeMismatch {
        decision_id: String,
        outcome_decision_id: String,
    },

    #[error("{field} cannot be empty")]
    EmptyField { field: &'static str },

    #[error("Invalid timeframe '{input}': {reason}")]
    InvalidTimeframe { input: String, reason: String },

    #[error("Unknown category: {input}")]
    InvalidCategory { input: String },

    #[error("Assessment participant cannot be empty")]
    EmptyParticipant,
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Decision not found: {decision_id}")]
    DecisionNotFound { decision_id: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Errors raised while computing analytics over a journal snapshot.
///
/// Storage and validation failures are propagated unchanged so an audit either
/// returns a fully consistent report or nothing at all.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Computation error: {message}")]
    Computation { message: String },
}

/// MCP protocol errors
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    #[error("Invalid parameters for {tool_name}: {message}")]
    InvalidParameters { tool_name: String, message: String },

    #[error("Tool execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<AppError> for McpError {
    fn from(err: AppError) -> Self {
        McpError::ExecutionFailed {
            message: err.to_string(),
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for analytics operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Result type alias for MCP operations
pub type McpResult<T> = Result<T, McpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config {
            message: "band width must divide 1.0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Configuration error: band width must divide 1.0"
        );
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::ConfidenceOutOfRange {
            decision_id: "dec-1".to_string(),
            value: 1.5,
        };
        assert_eq!(
            err.to_string(),
            "Confidence 1.5 for decision dec-1 is outside [0, 1]"
        );

        let err = ValidationError::QualityOutOfRange {
            field: "process_quality",
            value: 11,
        };
        assert_eq!(err.to_string(), "process_quality 11 is outside [1, 10]");

        let err = ValidationError::UnknownDecision {
            decision_id: "missing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Outcome references unknown decision: missing"
        );
    }

    #[test]
    fn test_storage_error_wraps_validation() {
        let err: StorageError = ValidationError::EmptyField { field: "title" }.into();
        assert!(matches!(err, StorageError::Validation(_)));
        assert_eq!(err.to_string(), "Validation failed: title cannot be empty");
    }

    #[test]
    fn test_analysis_error_wraps_storage() {
        let err: AnalysisError = StorageError::Query {
            message: "locked".to_string(),
        }
        .into();
        assert!(matches!(err, AnalysisError::Storage(_)));
        assert_eq!(err.to_string(), "Storage error: Query failed: locked");

        let err = AnalysisError::Computation {
            message: "mean of empty set".to_string(),
        };
        assert_eq!(err.to_string(), "Computation error: mean of empty set");
    }

    #[test]
    fn test_app_error_into_mcp_error() {
        let app: AppError = AnalysisError::Computation {
            message: "nan".to_string(),
        }
        .into();
        let mcp: McpError = app.into();
        assert!(matches!(mcp, McpError::ExecutionFailed { .. }));
        assert!(mcp.to_string().contains("Computation error: nan"));
    }

    #[test]
    fn test_mcp_error_display() {
        let err = McpError::UnknownTool {
            tool_name: "audit_everything".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown tool: audit_everything");

        let err = McpError::InvalidParameters {
            tool_name: "audit_full".to_string(),
            message: "missing field".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid parameters for audit_full: missing field"
        );
    }
}
