//! Server module for MCP protocol handling.
//!
//! This module provides:
//! - MCP server implementation over stdio
//! - Tool call handlers and routing
//! - Shared application state management

mod handlers;
mod mcp;

pub use handlers::*;
pub use mcp::*;

use std::sync::Arc;

use crate::analytics::{AuditEngine, BiasDetector, CalibrationAnalyzer};
use crate::config::Config;
use crate::storage::SqliteStorage;

/// Application state shared across handlers.
///
/// Every analytics component reads through its own handle to the same
/// storage pool; none of them keep state between calls.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// SQLite storage backend, used directly for journal writes.
    pub storage: SqliteStorage,
    /// Full-audit orchestrator.
    pub audit_engine: Arc<AuditEngine<SqliteStorage>>,
    /// Calibration analyzer.
    pub calibration_analyzer: Arc<CalibrationAnalyzer<SqliteStorage>>,
    /// Bias detector.
    pub bias_detector: Arc<BiasDetector<SqliteStorage>>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config, storage: SqliteStorage) -> Self {
        tracing::info!(
            band_width = config.analytics.calibration.band_width,
            min_samples = config.analytics.calibration.min_samples,
            min_frequency = config.analytics.bias.min_frequency,
            "AppState initializing with analytics configuration"
        );

        let audit_engine = Arc::new(AuditEngine::new(
            storage.clone(),
            config.analytics.clone(),
        ));
        let calibration_analyzer = Arc::new(CalibrationAnalyzer::new(
            storage.clone(),
            config.analytics.calibration.clone(),
        ));
        let bias_detector = Arc::new(BiasDetector::new(
            storage.clone(),
            config.analytics.clone(),
        ));

        Self {
            config,
            storage,
            audit_engine,
            calibration_analyzer,
            bias_detector,
        }
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;
