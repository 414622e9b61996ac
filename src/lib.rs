//! # Decision Audit
//!
//! Analytics over a decision journal: how well stated confidence matches
//! realized correctness, which recurring bias patterns show up, and how a
//! team's post-mortem assessments of one decision agree. Served to MCP
//! clients over stdio, or run one-shot from the command line.
//!
//! ## Features
//!
//! - **Journal**: Record decisions, their outcomes and lessons in SQLite
//! - **Calibration**: Per-band stated vs. realized accuracy, Brier score and tendency
//! - **Bias Detection**: Ranked patterns from a fixed catalog of checks
//! - **Full Audit**: Averages, calibration, biases and category breakdown for a window
//! - **Team Review**: Consensus and lesson synthesis across participants
//!
//! ## Architecture
//!
//! ```text
//! MCP Client → MCP Server (stdio) → Analytics (pure)
//!                    ↓                    ↑
//!              SQLite (Journal) ──────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use decision_audit::{Config, AppState, McpServer};
//! use decision_audit::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let state = Arc::new(AppState::new(config, storage));
//!     let server = McpServer::new(state);
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Calibration, bias detection, audits and team review.
pub mod analytics;
/// Command-line interface.
pub mod cli;
/// Configuration management.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// MCP server implementation and request handling.
pub mod server;
/// SQLite journal storage.
pub mod storage;
/// Named analysis windows.
pub mod timeframe;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::{AppState, McpServer, SharedState};
