//! Session configuration
//!
//! Loaded from a TOML file; every field has a default so an empty file is
//! a valid 4-channel, 1 kHz configuration with 150-sample windows every 50
//! samples.
//!
//! ```toml
//! sample_rate_hz = 1000
//! channels = 3
//! window = 150
//! step = 50
//! classifier = "linear"
//! model_path = "models/hand.json"
//! smoothing = 5
//!
//! [zero_crossing]
//! policy = "mean_crossing"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use myoflex_core::classifier::ClassifierKind;
use myoflex_core::error::ConfigurationError;
use myoflex_core::features::{FeatureLayout, FeatureSet, ZeroCrossing};
use myoflex_core::window::WindowConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Everything needed to assemble a pipeline on the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Nominal sample rate
    pub sample_rate_hz: u32,
    /// Channels per sample
    pub channels: usize,
    /// Window length in samples
    pub window: usize,
    /// Samples between windows
    pub step: usize,
    /// Per-channel feature order
    pub feature_set: FeatureSet,
    /// Zero-crossing policy
    pub zero_crossing: ZeroCrossing,
    /// Inclusive admissible reading range
    pub valid_range: Option<(f32, f32)>,
    /// Classifier strategy the model must use
    pub classifier: String,
    /// Model bundle; `rules` without a bundle uses the built-in hand controller
    pub model_path: Option<PathBuf>,
    /// Per-window processing budget; defaults to one sample period
    pub deadline_us: Option<u64>,
    /// Majority-vote depth, 0 disables smoothing
    pub smoothing: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 1000,
            channels: 4,
            window: 150,
            step: 50,
            feature_set: FeatureSet::TimeDomain6,
            zero_crossing: ZeroCrossing::MeanCrossing,
            valid_range: None,
            classifier: String::from("linear"),
            model_path: None,
            deadline_us: None,
            smoothing: 0,
        }
    }
}

impl SessionConfig {
    /// Parse TOML text.
    ///
    /// # Errors
    ///
    /// Malformed TOML or invalid values (see [`SessionConfig::validate`]).
    pub fn from_toml(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    ///
    /// Relative `model_path` entries are resolved against the file's
    /// directory.
    ///
    /// # Errors
    ///
    /// I/O failure or any [`SessionConfig::from_toml`] error.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&text)?;
        if let (Some(model), Some(dir)) = (config.model_path.as_ref(), path.parent()) {
            if model.is_relative() {
                config.model_path = Some(dir.join(model));
            }
        }
        Ok(config)
    }

    /// Check values without building anything.
    ///
    /// # Errors
    ///
    /// Unknown classifier, zero sample rate, or bad window/feature geometry.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.sample_rate_hz == 0 {
            return Err(ConfigurationError::MissingParameter { name: "sample_rate_hz" });
        }
        self.classifier_kind()?;
        self.feature_layout()?;
        // Geometry is otherwise checked when the windower is built
        if self.step == 0 || self.step > self.window {
            return Err(ConfigurationError::InvalidWindow { reason: "step must be in 1..=window" });
        }
        Ok(())
    }

    /// Parsed classifier strategy.
    ///
    /// # Errors
    ///
    /// `UnknownClassifier`.
    pub fn classifier_kind(&self) -> Result<ClassifierKind, ConfigurationError> {
        ClassifierKind::parse(&self.classifier)
    }

    /// Feature layout the extractor runs with.
    ///
    /// # Errors
    ///
    /// Channel count or zero-crossing fraction out of range.
    pub fn feature_layout(&self) -> Result<FeatureLayout, ConfigurationError> {
        FeatureLayout::new(self.channels, self.feature_set, self.zero_crossing)
    }

    /// Window geometry.
    #[must_use]
    pub fn window_config(&self) -> WindowConfig {
        let config = WindowConfig::new(self.channels, self.window, self.step);
        match self.valid_range {
            Some((min, max)) => config.with_valid_range(min, max),
            None => config,
        }
    }

    /// Sample period in microseconds.
    #[must_use]
    pub fn sample_period_us(&self) -> u64 {
        1_000_000 / u64::from(self.sample_rate_hz.max(1))
    }

    /// Effective per-window budget.
    #[must_use]
    pub fn deadline_budget_us(&self) -> u64 {
        self.deadline_us.unwrap_or_else(|| self.sample_period_us())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = SessionConfig::from_toml("").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.deadline_budget_us(), 1000);
        assert!((config.window_config().overlap() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_full_config() {
        let config = SessionConfig::from_toml(
            r#"
            sample_rate_hz = 500
            channels = 3
            window = 8
            step = 4
            feature_set = "time_domain5"
            valid_range = [0.0, 4095.0]
            classifier = "network"
            deadline_us = 750
            smoothing = 3

            [zero_crossing]
            policy = "thresholded"
            fraction = 0.02
            "#,
        )
        .unwrap();
        assert_eq!(config.sample_period_us(), 2000);
        assert_eq!(config.deadline_budget_us(), 750);
        assert_eq!(config.classifier_kind().unwrap(), ClassifierKind::Network);
        assert_eq!(config.zero_crossing, ZeroCrossing::Thresholded { fraction: 0.02 });
        assert_eq!(config.window_config().valid_range, Some((0.0, 4095.0)));
        assert_eq!(config.feature_layout().unwrap().feature_count(), 15);
    }

    #[test]
    fn test_unknown_classifier_refused() {
        let result = SessionConfig::from_toml(r#"classifier = "forest""#);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid(ConfigurationError::UnknownClassifier { .. }))
        ));
    }

    #[test]
    fn test_bad_step_refused() {
        assert!(SessionConfig::from_toml("window = 10\nstep = 11").is_err());
        assert!(SessionConfig::from_toml("step = 0").is_err());
    }

    #[test]
    fn test_relative_model_path_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "model_path = \"hand.json\"").unwrap();

        let config = SessionConfig::load(&path).unwrap();
        assert_eq!(config.model_path, Some(dir.path().join("hand.json")));
    }
}
