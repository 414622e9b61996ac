//! Tunable thresholds for the analytics core.
//!
//! Every threshold used by calibration scoring and bias detection lives here so
//! none of them are hardwired into the algorithms.

/// Configuration for the whole analytics core.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyticsConfig {
    /// Calibration scoring configuration
    pub calibration: CalibrationConfig,

    /// Bias detection configuration
    pub bias: BiasConfig,
}

impl AnalyticsConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        Self {
            calibration: CalibrationConfig::from_env(),
            bias: BiasConfig::from_env(),
        }
    }

    /// Check that the thresholds describe a usable configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.calibration.validate()?;
        self.bias.validate()
    }
}

/// Configuration for calibration scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationConfig {
    /// Width of each confidence band. Must divide 1.0 evenly.
    pub band_width: f64,

    /// Buckets with fewer samples are flagged low-confidence
    pub min_bucket_samples: usize,

    /// Minimum eligible entries before any score is reported
    pub min_samples: usize,

    /// Gap between mean stated confidence and hit rate that counts as a tendency
    pub tendency_margin: f64,
}

/// Upper bound on the number of calibration bands.
pub const MAX_BANDS: usize = 1000;

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            band_width: 0.1,
            min_bucket_samples: 5,
            min_samples: 5,
            tendency_margin: 0.05,
        }
    }
}

impl CalibrationConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            band_width: env_or("CALIBRATION_BAND_WIDTH", defaults.band_width),
            min_bucket_samples: env_or(
                "CALIBRATION_MIN_BUCKET_SAMPLES",
                defaults.min_bucket_samples,
            ),
            min_samples: env_or("CALIBRATION_MIN_SAMPLES", defaults.min_samples),
            tendency_margin: env_or("CALIBRATION_TENDENCY_MARGIN", defaults.tendency_margin),
        }
    }

    /// Number of bands the unit interval is split into.
    pub fn band_count(&self) -> usize {
        (1.0 / self.band_width).round() as usize
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.band_width > 0.0 && self.band_width <= 1.0) {
            return Err(format!(
                "calibration band width {} must be in (0, 1]",
                self.band_width
            ));
        }
        let count = self.band_count();
        if count > MAX_BANDS {
            return Err(format!(
                "calibration band width {} gives {} bands, more than {}",
                self.band_width, count, MAX_BANDS
            ));
        }
        if (count as f64 * self.band_width - 1.0).abs() > 1e-9 {
            return Err(format!(
                "calibration band width {} does not divide 1.0 evenly",
                self.band_width
            ));
        }
        if self.min_samples == 0 {
            return Err("calibration minimum sample count must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.tendency_margin) {
            return Err(format!(
                "calibration tendency margin {} must be in [0, 1]",
                self.tendency_margin
            ));
        }
        Ok(())
    }
}

/// Configuration for bias-pattern detection.
#[derive(Debug, Clone, PartialEq)]
pub struct BiasConfig {
    /// Stated confidence at or above this is "high"
    pub high_confidence: f64,

    /// Stated confidence at or below this is "low"
    pub low_confidence: f64,

    /// Fewest affected decisions a pattern needs before it is reported
    pub min_frequency: usize,

    /// Frequency at which a pattern's confidence saturates at 1.0
    pub confidence_saturation: usize,

    /// Process/outcome quality gap that must be exceeded to count as divergence
    pub quality_gap: u8,

    /// Cohort size below which the time-pressure check is skipped
    pub min_cohort: usize,

    /// Standard deviations below the cohort mean that count as degradation
    pub std_multiplier: f64,

    /// Information completeness at or below this is "low"
    pub low_information: u8,

    /// How far a category's miss rate must exceed the overall miss rate
    pub category_margin: f64,
}

impl Default for BiasConfig {
    fn default() -> Self {
        Self {
            high_confidence: 0.8,
            low_confidence: 0.3,
            min_frequency: 3,
            confidence_saturation: 10,
            quality_gap: 3,
            min_cohort: 10,
            std_multiplier: 1.0,
            low_information: 4,
            category_margin: 0.25,
        }
    }
}

impl BiasConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            high_confidence: env_or("BIAS_HIGH_CONFIDENCE", defaults.high_confidence),
            low_confidence: env_or("BIAS_LOW_CONFIDENCE", defaults.low_confidence),
            min_frequency: env_or("BIAS_MIN_FREQUENCY", defaults.min_frequency),
            confidence_saturation: env_or(
                "BIAS_CONFIDENCE_SATURATION",
                defaults.confidence_saturation,
            ),
            quality_gap: env_or("BIAS_QUALITY_GAP", defaults.quality_gap),
            min_cohort: env_or("BIAS_MIN_COHORT", defaults.min_cohort),
            std_multiplier: env_or("BIAS_STD_MULTIPLIER", defaults.std_multiplier),
            low_information: env_or("BIAS_LOW_INFORMATION", defaults.low_information),
            category_margin: env_or("BIAS_CATEGORY_MARGIN", defaults.category_margin),
        }
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.high_confidence) {
            return Err(format!(
                "high confidence threshold {} must be in [0, 1]",
                self.high_confidence
            ));
        }
        if !(0.0..=1.0).contains(&self.low_confidence) {
            return Err(format!(
                "low confidence threshold {} must be in [0, 1]",
                self.low_confidence
            ));
        }
        if self.low_confidence >= self.high_confidence {
            return Err("low confidence threshold must be below the high threshold".to_string());
        }
        if self.min_frequency == 0 {
            return Err("minimum pattern frequency must be at least 1".to_string());
        }
        if self.confidence_saturation == 0 {
            return Err("confidence saturation must be at least 1".to_string());
        }
        if !(self.std_multiplier >= 0.0) {
            return Err(format!(
                "standard deviation multiplier {} must be non-negative",
                self.std_multiplier
            ));
        }
        Ok(())
    }

    /// Linear attenuation of a pattern's confidence by its sample size.
    pub fn attenuate(&self, frequency: usize) -> f64 {
        (frequency as f64 / self.confidence_saturation as f64).min(1.0)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
