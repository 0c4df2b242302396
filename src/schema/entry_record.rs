//! moodmap.entry.v1 schema definition
//!
//! The storage-agnostic input record for one journal entry. Records carry only
//! what the user entered; color and category are derived when a record is
//! turned into an [`Entry`].

use crate::color::ColorInterpolator;
use crate::types::{Activity, Entry, WeatherCondition};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current schema version
pub const SCHEMA_VERSION: &str = "moodmap.entry.v1";

/// Namespace for ids derived from records that carry none
const DERIVED_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6d6f_6f64_6d61_7005_8e6e_7472_7969_6400);

/// The moodmap.entry.v1 record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    /// Schema version identifier
    pub schema_version: String,
    /// Entry identifier; derived from the record content when missing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// When the entry was recorded (UTC)
    pub timestamp: DateTime<Utc>,
    /// Mood value, nominally 0-1
    pub mood_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub activities: Vec<Activity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherCondition>,
    /// WMO weather interpretation code, used when `weather` is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_code: Option<u16>,
}

impl EntryRecord {
    pub fn new(timestamp: DateTime<Utc>, mood_value: f64) -> Self {
        EntryRecord {
            schema_version: SCHEMA_VERSION.to_string(),
            id: Some(Uuid::new_v4()),
            timestamp,
            mood_value,
            note: None,
            activities: Vec::new(),
            weather: None,
            weather_code: None,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_activities(mut self, activities: Vec<Activity>) -> Self {
        self.activities = activities;
        self
    }

    pub fn with_weather(mut self, weather: WeatherCondition) -> Self {
        self.weather = Some(weather);
        self
    }

    /// Record mirroring an existing entry
    pub fn from_entry(entry: &Entry) -> Self {
        EntryRecord {
            schema_version: SCHEMA_VERSION.to_string(),
            id: Some(entry.id()),
            timestamp: entry.timestamp(),
            mood_value: entry.mood_value(),
            note: entry.note().map(str::to_string),
            activities: entry.activities().to_vec(),
            weather: entry.weather(),
            weather_code: None,
        }
    }

    /// Validate the record schema.
    ///
    /// Finite values outside 0-1 are accepted; they extrapolate in color and
    /// stay unclassified.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ValidationError::InvalidSchemaVersion {
                expected: SCHEMA_VERSION.to_string(),
                actual: self.schema_version.clone(),
            });
        }

        if !self.mood_value.is_finite() {
            return Err(ValidationError::NonFiniteMoodValue(self.mood_value));
        }

        if let (Some(weather), Some(code)) = (self.weather, self.weather_code) {
            if WeatherCondition::from_wmo_code(code) != weather {
                return Err(ValidationError::ConflictingWeather {
                    weather: weather.as_str().to_string(),
                    code,
                });
            }
        }

        Ok(())
    }

    /// Resolved weather condition
    pub fn weather_condition(&self) -> Option<WeatherCondition> {
        self.weather
            .or_else(|| self.weather_code.map(WeatherCondition::from_wmo_code))
    }

    /// Entry id: the record's own, or a v5 id over its timestamp, mood value
    /// and `position` in its batch. The same batch always yields the same ids.
    pub fn entry_id(&self, position: usize) -> Uuid {
        self.id.unwrap_or_else(|| {
            let name = format!(
                "{}|{}|{}",
                self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
                self.mood_value.to_bits(),
                position
            );
            Uuid::new_v5(&DERIVED_ID_NAMESPACE, name.as_bytes())
        })
    }

    /// Build an entry, deriving color and category with `interpolator`.
    ///
    /// `position` is the record's index in its batch; see [`Self::entry_id`].
    pub fn to_entry(&self, position: usize, interpolator: &ColorInterpolator) -> Entry {
        let mut entry = Entry::new(
            self.entry_id(position),
            self.timestamp,
            self.mood_value,
            interpolator,
        )
        .with_activities(self.activities.iter().cloned());
        if let Some(note) = &self.note {
            entry = entry.with_note(note.clone());
        }
        if let Some(weather) = self.weather_condition() {
            entry = entry.with_weather(weather);
        }
        entry
    }
}

/// Validation errors for entry records
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Mood value must be finite, got {0}")]
    NonFiniteMoodValue(f64),

    #[error("Weather {weather} conflicts with weather code {code}")]
    ConflictingWeather { weather: String, code: u16 },
}
