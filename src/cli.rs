//! Command-line interface.
//!
//! Without a subcommand the binary serves MCP over stdio. The report
//! subcommands run one analysis against the configured journal and print
//! the result as JSON.

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::analytics::{AuditEngine, BiasDetector, CalibrationAnalyzer, EntryFilter};
use crate::config::Config;
use crate::storage::{Category, SqliteStorage};
use crate::timeframe::Timeframe;

/// Decision journal analytics.
#[derive(Parser, Debug)]
#[command(name = "decision-audit", version, about)]
pub struct Cli {
    /// Command to run; defaults to `serve`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve MCP over stdio
    Serve,

    /// Run a full audit and print the report
    Audit(WindowArgs),

    /// Print the calibration report
    Calibration(WindowArgs),

    /// Print detected bias patterns
    Biases(WindowArgs),
}

/// Window and filter selection shared by the report subcommands.
#[derive(Args, Debug, Clone)]
pub struct WindowArgs {
    /// Timeframe: all, 2024, 2024-Q2, last_30_days, last_6_months, 2024-01-01..2024-03-31
    #[arg(long, default_value = "all")]
    pub timeframe: Timeframe,

    /// Only decisions in this category
    #[arg(long)]
    pub category: Option<Category>,

    /// Only decisions carrying this tag
    #[arg(long)]
    pub tag: Option<String>,
}

impl WindowArgs {
    fn filter(&self) -> EntryFilter {
        EntryFilter {
            category: self.category,
            tag: self.tag.clone(),
        }
    }
}

/// Result of CLI command execution.
#[derive(Debug)]
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }

    fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_string_pretty(value) {
            Ok(text) => Self::success(text),
            Err(e) => Self::error(format!("Failed to serialize report: {}", e)),
        }
    }
}

/// Execute a report subcommand. `Serve` is handled by the binary.
pub async fn execute_command(command: Commands, config: &Config, storage: SqliteStorage) -> CliResult {
    match command {
        Commands::Serve => CliResult::error("serve is not a report command"),
        Commands::Audit(window) => {
            let engine = AuditEngine::new(storage, config.analytics.clone());
            match engine
                .full_audit_filtered(&window.timeframe, &window.filter())
                .await
            {
                Ok(report) => CliResult::json(&report),
                Err(e) => CliResult::error(format!("Audit failed: {}", e)),
            }
        }
        Commands::Calibration(window) => {
            let analyzer = CalibrationAnalyzer::new(storage, config.analytics.calibration.clone());
            match analyzer
                .analyze_filtered(&window.timeframe, &window.filter())
                .await
            {
                Ok(report) => CliResult::json(&report),
                Err(e) => CliResult::error(format!("Calibration failed: {}", e)),
            }
        }
        Commands::Biases(window) => {
            let detector = BiasDetector::new(storage, config.analytics.clone());
            match detector
                .scan_filtered(&window.timeframe, &window.filter())
                .await
            {
                Ok(patterns) => CliResult::json(&patterns),
                Err(e) => CliResult::error(format!("Bias scan failed: {}", e)),
            }
        }
    }
}
