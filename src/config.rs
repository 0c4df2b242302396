//! Engine configuration
//!
//! Palette, scale, timezone and label patterns, persisted as JSON.

use crate::calendar::{
    FixedOffsetCalendar, PatternFormatter, DEFAULT_DAY_PATTERN, DEFAULT_MONTH_PATTERN,
    DEFAULT_MONTH_SHORT_PATTERN, DEFAULT_YEAR_PATTERN,
};
use crate::color::{ColorInterpolator, PALETTE_GREEN, PALETTE_RED, PALETTE_YELLOW};
use crate::error::MoodError;
use crate::types::Rgb;
use serde::{Deserialize, Serialize};

/// Anchor colors for the low, middle and high end of the scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaletteConfig {
    pub low: Rgb,
    pub mid: Rgb,
    pub high: Rgb,
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            low: PALETTE_RED,
            mid: PALETTE_YELLOW,
            high: PALETTE_GREEN,
        }
    }
}

/// chrono strftime patterns used for bucket labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    pub day: String,
    pub month: String,
    pub month_short: String,
    pub year: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            day: DEFAULT_DAY_PATTERN.to_string(),
            month: DEFAULT_MONTH_PATTERN.to_string(),
            month_short: DEFAULT_MONTH_SHORT_PATTERN.to_string(),
            year: DEFAULT_YEAR_PATTERN.to_string(),
        }
    }
}

/// Engine configuration. Every field is optional in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub palette: PaletteConfig,
    /// Upper control point of the color scale; the midpoint is half of it
    pub scale_max: f64,
    /// `"UTC"`, `"Z"` or a `±HH:MM` offset
    pub timezone: String,
    pub labels: LabelConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            palette: PaletteConfig::default(),
            scale_max: 1.0,
            timezone: "UTC".to_string(),
            labels: LabelConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load and validate configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, MoodError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| MoodError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, MoodError> {
        serde_json::to_string_pretty(self).map_err(|e| MoodError::EncodingError(e.to_string()))
    }

    /// Check that every component can be built
    pub fn validate(&self) -> Result<(), MoodError> {
        self.interpolator()?;
        self.calendar()?;
        self.formatter()?;
        Ok(())
    }

    pub fn interpolator(&self) -> Result<ColorInterpolator, MoodError> {
        ColorInterpolator::new(
            self.palette.low,
            self.palette.mid,
            self.palette.high,
            self.scale_max,
        )
    }

    pub fn calendar(&self) -> Result<FixedOffsetCalendar, MoodError> {
        FixedOffsetCalendar::parse(&self.timezone)
    }

    pub fn formatter(&self) -> Result<PatternFormatter, MoodError> {
        PatternFormatter::new(
            self.labels.day.clone(),
            self.labels.month.clone(),
            self.labels.month_short.clone(),
            self.labels.year.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.interpolator().unwrap(), ColorInterpolator::default());
        assert_eq!(config.calendar().unwrap(), FixedOffsetCalendar::utc());
        assert_eq!(config.formatter().unwrap(), PatternFormatter::default());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{"timezone": "+02:00"}"#).unwrap();

        assert_eq!(config.timezone, "+02:00");
        assert_eq!(config.scale_max, 1.0);
        assert_eq!(config.palette, PaletteConfig::default());
        assert_eq!(config.labels, LabelConfig::default());
    }

    #[test]
    fn test_json_roundtrip() {
        let mut config = EngineConfig::default();
        config.scale_max = 10.0;
        config.labels.month = "%m/%Y".to_string();

        let json = config.to_json().unwrap();
        assert_eq!(EngineConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            EngineConfig::from_json(r#"{"scale_max": 0}"#),
            Err(MoodError::ConfigError(_))
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{"timezone": "Mars/Olympus"}"#),
            Err(MoodError::InvalidTimezone(_))
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{"labels": {"day": "%Q"}}"#),
            Err(MoodError::ConfigError(_))
        ));
        assert!(matches!(
            EngineConfig::from_json("not json"),
            Err(MoodError::ConfigError(_))
        ));
    }
}
