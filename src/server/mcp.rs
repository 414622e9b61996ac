//! MCP protocol implementation for JSON-RPC 2.0 communication.
//!
//! This module provides the core MCP server implementation including:
//! - JSON-RPC 2.0 request/response handling
//! - Tool definitions and schemas
//! - Stdio-based server communication

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use super::{handle_tool_call, SharedState};

#[cfg(test)]
#[path = "mcp_tests.rs"]
mod mcp_tests;

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request identifier (None for notifications).
    pub id: Option<Value>,
    /// The method name to invoke.
    pub method: String,
    /// Optional parameters for the method.
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request identifier (null for notifications and parse errors).
    pub id: Value,
    /// The result on success (mutually exclusive with error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The error on failure (mutually exclusive with result).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    /// Error code (negative for predefined errors).
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// MCP server information returned during initialization.
#[derive(Debug, Serialize)]
pub struct ServerInfo {
    /// The server name identifier.
    pub name: String,
    /// The server version string.
    pub version: String,
}

/// MCP server capabilities advertised to clients.
#[derive(Debug, Serialize)]
pub struct Capabilities {
    /// Tool-related capabilities.
    pub tools: ToolCapabilities,
}

/// Tool-specific capabilities.
#[derive(Debug, Serialize)]
pub struct ToolCapabilities {
    /// Whether the tool list can change dynamically.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Result of the MCP initialize handshake.
#[derive(Debug, Serialize)]
pub struct InitializeResult {
    /// The MCP protocol version supported.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Server capabilities.
    pub capabilities: Capabilities,
    /// Server identification information.
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

/// MCP tool definition with JSON Schema.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    /// Unique tool name (used in tool calls).
    pub name: String,
    /// Human-readable description of the tool.
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Parameters for a tools/call request.
#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    /// The name of the tool to invoke.
    pub name: String,
    /// Optional arguments for the tool.
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// Content item within a tool result.
#[derive(Debug, Serialize)]
pub struct ToolResultContent {
    /// The content type (e.g., "text").
    #[serde(rename = "type")]
    pub content_type: String,
    /// The text content of the result.
    pub text: String,
}

/// Result of a tool invocation.
#[derive(Debug, Serialize)]
pub struct ToolCallResult {
    /// The result content items.
    pub content: Vec<ToolResultContent>,
    /// Whether the result represents an error.
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// MCP Server running over stdio.
///
/// Handles JSON-RPC 2.0 messages, one per line, for MCP protocol
/// communication with clients.
pub struct McpServer {
    /// Shared application state.
    state: SharedState,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Run the server using async stdio
    pub async fn run(&self) -> std::io::Result<()> {
        info!("Decision audit MCP server starting...");
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve line-delimited JSON-RPC from `reader`, writing responses to `writer`
    /// until EOF.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            // EOF reached
            if bytes_read == 0 {
                info!("EOF received, shutting down");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            debug!(request = %trimmed, "Received request");

            let response = match serde_json::from_str::<JsonRpcRequest>(trimmed) {
                Ok(request) => self.handle_request(request).await,
                Err(e) => {
                    error!(error = %e, "Failed to parse request");
                    Some(JsonRpcResponse::error(
                        None,
                        -32700,
                        format!("Parse error: {}", e),
                    ))
                }
            };

            // Only send response if not a notification (JSON-RPC 2.0)
            if let Some(response) = response {
                let response_json = serde_json::to_string(&response)?;
                debug!(response = %response_json, "Sending response");

                writer.write_all(response_json.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        Ok(())
    }

    /// Handle a single JSON-RPC request
    /// Returns None for notifications (requests without id) as JSON-RPC 2.0 requires
    async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let is_notification = request.id.is_none();

        if request.jsonrpc != "2.0" {
            if is_notification {
                return None;
            }
            return Some(JsonRpcResponse::error(
                request.id,
                -32600,
                format!("Invalid request: unsupported jsonrpc version {}", request.jsonrpc),
            ));
        }

        match request.method.as_str() {
            "initialize" => Some(self.handle_initialize(request.id)),
            "initialized" | "notifications/initialized" => {
                debug!("Received initialized notification");
                None
            }
            "notifications/cancelled" => {
                debug!("Received cancelled notification");
                None
            }
            "tools/list" => Some(self.handle_tools_list(request.id)),
            "tools/call" => Some(self.handle_tool_call(request.id, request.params).await),
            "ping" => Some(JsonRpcResponse::success(
                request.id,
                Value::Object(Default::default()),
            )),
            method => {
                // For unknown methods, only respond if it's a request (has id)
                if is_notification {
                    debug!(method = %method, "Unknown notification, ignoring");
                    None
                } else {
                    error!(method = %method, "Unknown method");
                    Some(JsonRpcResponse::error(
                        request.id,
                        -32601,
                        format!("Method not found: {}", method),
                    ))
                }
            }
        }
    }

    /// Handle initialize request
    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        info!("Handling initialize request");

        let result = InitializeResult {
            protocol_version: "2024-11-05".to_string(),
            capabilities: Capabilities {
                tools: ToolCapabilities {
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: "decision-audit".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        match serde_json::to_value(result) {
            Ok(val) => JsonRpcResponse::success(id, val),
            Err(e) => {
                error!(error = %e, "Failed to serialize initialize result");
                JsonRpcResponse::error(id, -32603, format!("Internal error: {}", e))
            }
        }
    }

    /// Handle tools/list request
    fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        info!("Handling tools/list request");

        JsonRpcResponse::success(
            id,
            serde_json::json!({
                "tools": all_tools()
            }),
        )
    }

    /// Handle tools/call request
    async fn handle_tool_call(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: ToolCallParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(p) => p,
                Err(e) => {
                    return JsonRpcResponse::error(id, -32602, format!("Invalid params: {}", e));
                }
            },
            None => {
                return JsonRpcResponse::error(id, -32602, "Missing params");
            }
        };

        info!(tool = %params.name, "Handling tool call");

        let (content, is_error) =
            match handle_tool_call(&self.state, &params.name, params.arguments).await {
                Ok(result) => {
                    let text = serde_json::to_string_pretty(&result).unwrap_or_else(|e| {
                        error!(error = %e, "Failed to serialize tool result");
                        format!("{{\"error\": \"Serialization failed: {}\"}}", e)
                    });
                    (
                        ToolResultContent {
                            content_type: "text".to_string(),
                            text,
                        },
                        None,
                    )
                }
                Err(e) => {
                    warn!(tool = %params.name, error = %e, "Tool call failed");
                    (
                        ToolResultContent {
                            content_type: "text".to_string(),
                            text: format!("Error: {}", e),
                        },
                        Some(true),
                    )
                }
            };

        let tool_result = ToolCallResult {
            content: vec![content],
            is_error,
        };

        match serde_json::to_value(tool_result) {
            Ok(val) => JsonRpcResponse::success(id, val),
            Err(e) => {
                error!(error = %e, "Failed to serialize tool call result");
                JsonRpcResponse::error(id, -32603, format!("Internal error: {}", e))
            }
        }
    }
}

/// Every tool the server exposes, in listing order.
fn all_tools() -> Vec<Tool> {
    vec![
        get_record_decision_tool(),
        get_record_outcome_tool(),
        get_add_lesson_tool(),
        get_audit_full_tool(),
        get_audit_calibration_tool(),
        get_audit_biases_tool(),
        get_team_review_tool(),
    ]
}

fn category_schema() -> Value {
    serde_json::json!({
        "type": "string",
        "enum": ["strategic", "technical", "people", "financial", "product", "operational"]
    })
}

fn window_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "timeframe": {
                "type": "string",
                "description": "Window to analyze: all, a year (2024), a quarter (2024-Q2), last_N_days, last_N_weeks, last_N_months, last_year, or YYYY-MM-DD..YYYY-MM-DD",
                "default": "all"
            },
            "category": category_schema(),
            "tag": {
                "type": "string",
                "description": "Only include decisions carrying this tag"
            }
        },
        "additionalProperties": false
    })
}

// ============================================================================
// Journal tools
// ============================================================================

/// Get the record decision tool definition
fn get_record_decision_tool() -> Tool {
    Tool {
        name: "journal_record_decision".to_string(),
        description: "Record a decision at the time it is made, with the expected outcome and a stated confidence. Returns the assigned decision id.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "description": "Short title" },
                "category": category_schema(),
                "expected_outcome": {
                    "type": "string",
                    "description": "What you expect to happen"
                },
                "confidence": {
                    "type": "number",
                    "minimum": 0,
                    "maximum": 1,
                    "description": "Probability (0-1) that the expected outcome occurs"
                },
                "context": { "type": "string", "description": "Situation at decision time" },
                "reasoning": { "type": "string", "description": "Why this option was chosen" },
                "tags": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Filter tags"
                },
                "time_pressure": {
                    "type": "string",
                    "enum": ["low", "medium", "high"],
                    "default": "medium"
                },
                "reversibility": {
                    "type": "string",
                    "enum": ["reversible", "difficult_to_reverse"],
                    "default": "reversible"
                },
                "information_completeness": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 10,
                    "description": "How complete the available information was"
                },
                "timestamp": {
                    "type": "string",
                    "format": "date-time",
                    "description": "Decision time for backfilled entries (defaults to now)"
                }
            },
            "required": ["title", "category", "expected_outcome"],
            "additionalProperties": false
        }),
    }
}

/// Get the record outcome tool definition
fn get_record_outcome_tool() -> Tool {
    Tool {
        name: "journal_record_outcome".to_string(),
        description: "Attach the realized outcome to a recorded decision. Process and outcome quality are scored independently; each decision takes exactly one outcome.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "decision_id": { "type": "string", "description": "Decision being resolved" },
                "actual_outcome": { "type": "string", "description": "What actually happened" },
                "outcome_quality": { "type": "integer", "minimum": 1, "maximum": 10 },
                "process_quality": { "type": "integer", "minimum": 1, "maximum": 10 },
                "correct": {
                    "type": "boolean",
                    "description": "Whether the expected outcome materialized (omit if undecided)"
                },
                "resolved_at": {
                    "type": "string",
                    "format": "date-time",
                    "description": "Resolution time (defaults to now)"
                },
                "notes": { "type": "string" }
            },
            "required": ["decision_id", "actual_outcome", "outcome_quality", "process_quality"],
            "additionalProperties": false
        }),
    }
}

/// Get the add lesson tool definition
fn get_add_lesson_tool() -> Tool {
    Tool {
        name: "journal_add_lesson".to_string(),
        description: "Append a lesson note to a recorded decision.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "decision_id": { "type": "string" },
                "lesson": { "type": "string" }
            },
            "required": ["decision_id", "lesson"],
            "additionalProperties": false
        }),
    }
}

// ============================================================================
// Analytics tools
// ============================================================================

/// Get the full audit tool definition
fn get_audit_full_tool() -> Tool {
    Tool {
        name: "audit_full".to_string(),
        description: "Audit decision history over a timeframe: decision counts, average process and outcome quality, calibration, ranked bias patterns, and a per-category breakdown.".to_string(),
        input_schema: window_schema(),
    }
}

/// Get the calibration tool definition
fn get_audit_calibration_tool() -> Tool {
    Tool {
        name: "audit_calibration".to_string(),
        description: "Compare stated confidence with realized correctness: calibration curve by confidence band, overall score (1 - Brier score), and over/underconfidence tendency.".to_string(),
        input_schema: window_schema(),
    }
}

/// Get the bias scan tool definition
fn get_audit_biases_tool() -> Tool {
    Tool {
        name: "audit_biases".to_string(),
        description: "Scan decision history for recurring bias patterns (over/underconfidence clusters, process-outcome divergence, time-pressure degradation, reversibility mismatch). Each pattern carries evidence, affected decision ids and a mitigation.".to_string(),
        input_schema: window_schema(),
    }
}

// ============================================================================
// Team review tool
// ============================================================================

/// Get the team review tool definition
fn get_team_review_tool() -> Tool {
    Tool {
        name: "team_review_summarize".to_string(),
        description: "Combine several participants' assessments of one decision into consensus scores, an agreement score, and a deduplicated list of lessons.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "decision_id": { "type": "string" },
                "assessments": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "participant": { "type": "string" },
                            "process_score": { "type": "integer", "minimum": 1, "maximum": 10 },
                            "outcome_score": { "type": "integer", "minimum": 1, "maximum": 10 },
                            "key_lesson": { "type": "string" }
                        },
                        "required": ["participant", "process_score", "outcome_score"]
                    }
                }
            },
            "required": ["decision_id", "assessments"],
            "additionalProperties": false
        }),
    }
}
