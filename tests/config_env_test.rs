//! Config environment variable tests
//!
//! These tests verify that Config::from_env() correctly reads and applies
//! environment variable overrides. Config::from_env() also loads from a .env
//! file via dotenvy, so these tests focus on override behavior.
//!
//! Tests use #[serial] to prevent race conditions with shared env vars.

use decision_audit::config::{Config, LogFormat};
use decision_audit::AppError;
use serial_test::serial;
use std::env;

#[test]
#[serial]
fn test_config_from_env_loads_successfully() {
    let config = Config::from_env().unwrap();
    assert_eq!(config.analytics.calibration.band_count(), 10);
}

#[test]
#[serial]
fn test_config_from_env_custom_database() {
    env::set_var("DATABASE_PATH", "/custom/path.db");
    env::set_var("DATABASE_MAX_CONNECTIONS", "10");

    let config = Config::from_env().unwrap();
    assert_eq!(config.database.path.to_str().unwrap(), "/custom/path.db");
    assert_eq!(config.database.max_connections, 10);

    env::remove_var("DATABASE_PATH");
    env::remove_var("DATABASE_MAX_CONNECTIONS");
}

#[test]
#[serial]
fn test_config_from_env_json_log_format() {
    env::set_var("LOG_FORMAT", "JSON");
    env::set_var("LOG_LEVEL", "debug");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.logging.level, "debug");

    env::remove_var("LOG_FORMAT");
    env::remove_var("LOG_LEVEL");
}

#[test]
#[serial]
fn test_config_invalid_number_uses_default() {
    env::set_var("DATABASE_MAX_CONNECTIONS", "not-a-number");
    env::set_var("BIAS_MIN_FREQUENCY", "many");

    let config = Config::from_env().unwrap();
    assert_eq!(config.database.max_connections, 5);
    assert_eq!(config.analytics.bias.min_frequency, 3);

    env::remove_var("DATABASE_MAX_CONNECTIONS");
    env::remove_var("BIAS_MIN_FREQUENCY");
}

#[test]
#[serial]
fn test_config_from_env_analytics_thresholds() {
    env::set_var("CALIBRATION_BAND_WIDTH", "0.2");
    env::set_var("CALIBRATION_MIN_SAMPLES", "8");
    env::set_var("BIAS_HIGH_CONFIDENCE", "0.75");
    env::set_var("BIAS_QUALITY_GAP", "4");

    let config = Config::from_env().unwrap();
    assert_eq!(config.analytics.calibration.band_width, 0.2);
    assert_eq!(config.analytics.calibration.band_count(), 5);
    assert_eq!(config.analytics.calibration.min_samples, 8);
    assert_eq!(config.analytics.bias.high_confidence, 0.75);
    assert_eq!(config.analytics.bias.quality_gap, 4);

    env::remove_var("CALIBRATION_BAND_WIDTH");
    env::remove_var("CALIBRATION_MIN_SAMPLES");
    env::remove_var("BIAS_HIGH_CONFIDENCE");
    env::remove_var("BIAS_QUALITY_GAP");
}

#[test]
#[serial]
fn test_config_rejects_uneven_band_width() {
    env::set_var("CALIBRATION_BAND_WIDTH", "0.3");

    let result = Config::from_env();
    assert!(matches!(result, Err(AppError::Config { .. })));

    env::remove_var("CALIBRATION_BAND_WIDTH");
}

#[test]
#[serial]
fn test_config_rejects_inverted_confidence_thresholds() {
    env::set_var("BIAS_LOW_CONFIDENCE", "0.9");

    let err = Config::from_env().unwrap_err();
    assert!(err.to_string().contains("low confidence threshold"));

    env::remove_var("BIAS_LOW_CONFIDENCE");
}
