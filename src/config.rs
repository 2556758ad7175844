use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::stream::TelemetryError;

/// Tunables for the per-sensor aggregation pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// A sample is a spike when it sits more than this many standard deviations
    /// from its chunk's mean.
    pub spike_threshold: f64,
    /// Trailing duration kept in every sensor buffer, in time-axis units.
    pub window_duration: f64,
    /// Wire values are fixed-point ticks; divide by this to get real units.
    pub tick_scale: f64,
    /// Maximum distance between two timestamps that still counts as the same
    /// sample when locating an overlap. Zero means exact match.
    pub overlap_tolerance: f64,
}
impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            spike_threshold: 20.0,
            window_duration: 10.0,
            tick_scale: 1000.0,
            overlap_tolerance: 0.0,
        }
    }
}
impl AggregatorConfig {
    pub fn validate(&self) -> Result<(), TelemetryError> {
        if !(self.spike_threshold.is_finite() && self.spike_threshold >= 0.0) {
            return Err(TelemetryError::InvalidConfig(format!(
                "spike_threshold must be a non-negative number, got {}",
                self.spike_threshold
            )));
        }
        if !(self.window_duration.is_finite() && self.window_duration > 0.0) {
            return Err(TelemetryError::InvalidConfig(format!(
                "window_duration must be positive, got {}",
                self.window_duration
            )));
        }
        if !(self.tick_scale.is_finite() && self.tick_scale > 0.0) {
            return Err(TelemetryError::InvalidConfig(format!(
                "tick_scale must be positive, got {}",
                self.tick_scale
            )));
        }
        if !(self.overlap_tolerance.is_finite() && self.overlap_tolerance >= 0.0) {
            return Err(TelemetryError::InvalidConfig(format!(
                "overlap_tolerance must be non-negative, got {}",
                self.overlap_tolerance
            )));
        }
        Ok(())
    }
    pub fn from_json_str(text: &str) -> Result<Self, TelemetryError> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| TelemetryError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TelemetryError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    #[test]
    fn defaults_match_dashboard_constants() {
        let config = AggregatorConfig::default();
        assert_eq!(config.spike_threshold, 20.0);
        assert_eq!(config.window_duration, 10.0);
        assert_eq!(config.tick_scale, 1000.0);
        assert_eq!(config.overlap_tolerance, 0.0);
        assert!(config.validate().is_ok());
    }
    #[test]
    fn partial_json_keeps_other_defaults() {
        let config = AggregatorConfig::from_json_str(r#"{ "window_duration": 5.0 }"#).unwrap();
        assert_eq!(config.window_duration, 5.0);
        assert_eq!(config.spike_threshold, 20.0);
    }
    #[test]
    fn rejects_non_positive_window() {
        let err = AggregatorConfig::from_json_str(r#"{ "window_duration": 0.0 }"#).unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidConfig(_)));
    }
    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "spike_threshold": 3.5, "tick_scale": 100.0 }}"#).unwrap();
        let config = AggregatorConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.spike_threshold, 3.5);
        assert_eq!(config.tick_scale, 100.0);
    }
}
