//! Core types for the moodmap engine
//!
//! This module defines the values that flow through the engine: colors, mood
//! categories, journal entries and the calendar keys used to bucket them.

use crate::classifier::MoodClassifier;
use crate::color::ColorInterpolator;
use crate::error::MoodError;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// RGB color with channels nominally in 0-1.
///
/// Channels are never clamped: the interpolator extrapolates outside its
/// configured range and the resulting values are kept as computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl Rgb {
    pub const fn new(red: f64, green: f64, blue: f64) -> Self {
        Self { red, green, blue }
    }

    pub(crate) fn channels(&self) -> [f64; 3] {
        [self.red, self.green, self.blue]
    }

    pub(crate) fn from_channels(channels: [f64; 3]) -> Self {
        Self::new(channels[0], channels[1], channels[2])
    }

    /// Render as `#RRGGBB`, clamping each channel for display only.
    pub fn to_hex(&self) -> String {
        let byte = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!(
            "#{:02X}{:02X}{:02X}",
            byte(self.red),
            byte(self.green),
            byte(self.blue)
        )
    }
}

/// Discrete mood category derived from a mood value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoodCategory {
    Terrible,
    Bad,
    Okay,
    Good,
    Awesome,
}

impl MoodCategory {
    pub const ALL: [MoodCategory; 5] = [
        MoodCategory::Terrible,
        MoodCategory::Bad,
        MoodCategory::Okay,
        MoodCategory::Good,
        MoodCategory::Awesome,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MoodCategory::Terrible => "terrible",
            MoodCategory::Bad => "bad",
            MoodCategory::Okay => "okay",
            MoodCategory::Good => "good",
            MoodCategory::Awesome => "awesome",
        }
    }

    /// Human-facing title shown next to an entry
    pub fn title(&self) -> &'static str {
        match self {
            MoodCategory::Terrible => "Really terrible",
            MoodCategory::Bad => "Kind of bad",
            MoodCategory::Okay => "Okaish",
            MoodCategory::Good => "Good",
            MoodCategory::Awesome => "Awesome",
        }
    }
}

/// Activity tag attached to an entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Work,
    Family,
    Friends,
    School,
    Relationship,
    Traveling,
    Food,
    Exercise,
    Health,
    Hobbies,
    Gaming,
    Weather,
    Shopping,
    Sleep,
    Music,
    Relaxing,
    /// Free-form activity typed by the user
    #[serde(untagged)]
    Other(String),
}

impl Activity {
    /// Stable identifier; free-form activities are prefixed with `other-`.
    pub fn id(&self) -> String {
        match self {
            Activity::Work => "work".to_string(),
            Activity::Family => "family".to_string(),
            Activity::Friends => "friends".to_string(),
            Activity::School => "school".to_string(),
            Activity::Relationship => "relationship".to_string(),
            Activity::Traveling => "traveling".to_string(),
            Activity::Food => "food".to_string(),
            Activity::Exercise => "exercise".to_string(),
            Activity::Health => "health".to_string(),
            Activity::Hobbies => "hobbies".to_string(),
            Activity::Gaming => "gaming".to_string(),
            Activity::Weather => "weather".to_string(),
            Activity::Shopping => "shopping".to_string(),
            Activity::Sleep => "sleep".to_string(),
            Activity::Music => "music".to_string(),
            Activity::Relaxing => "relaxing".to_string(),
            Activity::Other(label) => format!("other-{label}"),
        }
    }

    /// Activity for a label; built-in names resolve to their variant.
    pub fn from_label(label: impl Into<String>) -> Self {
        let label = label.into();
        match label.as_str() {
            "work" => Activity::Work,
            "family" => Activity::Family,
            "friends" => Activity::Friends,
            "school" => Activity::School,
            "relationship" => Activity::Relationship,
            "traveling" => Activity::Traveling,
            "food" => Activity::Food,
            "exercise" => Activity::Exercise,
            "health" => Activity::Health,
            "hobbies" => Activity::Hobbies,
            "gaming" => Activity::Gaming,
            "weather" => Activity::Weather,
            "shopping" => Activity::Shopping,
            "sleep" => Activity::Sleep,
            "music" => Activity::Music,
            "relaxing" => Activity::Relaxing,
            _ => Activity::Other(label),
        }
    }

    /// `Other` carrying a built-in name becomes that variant, so the tag
    /// serializes and reads back unchanged.
    pub fn canonical(self) -> Self {
        match self {
            Activity::Other(label) => Activity::from_label(label),
            activity => activity,
        }
    }
}

/// Weather condition recorded with an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherCondition {
    Sunny,
    Cloudy,
    Overcast,
    Rainy,
    Snowy,
}

impl WeatherCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherCondition::Sunny => "sunny",
            WeatherCondition::Cloudy => "cloudy",
            WeatherCondition::Overcast => "overcast",
            WeatherCondition::Rainy => "rainy",
            WeatherCondition::Snowy => "snowy",
        }
    }

    /// Map a WMO weather interpretation code to a condition.
    ///
    /// Unknown codes (fog, thunderstorms, ...) fall back to `Cloudy`.
    pub fn from_wmo_code(code: u16) -> Self {
        match code {
            0 | 1 => WeatherCondition::Sunny,
            2 => WeatherCondition::Cloudy,
            3 => WeatherCondition::Overcast,
            51 | 53 | 55 | 56 | 57 | 61 | 63 | 65 | 66 | 67 | 80 | 81 | 82 => {
                WeatherCondition::Rainy
            }
            71 | 73 | 75 | 77 | 85 | 86 => WeatherCondition::Snowy,
            _ => WeatherCondition::Cloudy,
        }
    }
}

/// Calendar month key (year, month), ordered chronologically.
///
/// Serialized as `"YYYY-MM"` so it can key JSON maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// Returns `None` when `month` is outside 1-12.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Linear month index, used for distances between months
    pub fn ordinal(&self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }

    /// Number of months from `self` to `other` (negative when `other` is earlier)
    pub fn months_until(&self, other: MonthKey) -> i64 {
        other.ordinal() - self.ordinal()
    }

    pub fn succ(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn pred(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// First calendar day of the month
    pub fn first_day(&self) -> NaiveDate {
        // month is validated on construction; day 1 always exists
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl From<MonthKey> for String {
    fn from(key: MonthKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for MonthKey {
    type Error = MoodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::str::FromStr for MonthKey {
    type Err = MoodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let date = NaiveDate::parse_from_str(&format!("{}-01", s.trim()), "%Y-%m-%d")
            .map_err(|e| MoodError::DateParseError(format!("invalid month key `{s}`: {e}")))?;
        Ok(MonthKey::from_date(date))
    }
}

/// Calendar day key, ordered chronologically.
///
/// Serialized as `"YYYY-MM-DD"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn new(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(DayKey)
    }

    pub fn from_date(date: NaiveDate) -> Self {
        DayKey(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn month_key(&self) -> MonthKey {
        MonthKey::from_date(self.0)
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl From<DayKey> for String {
    fn from(key: DayKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for DayKey {
    type Error = MoodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::str::FromStr for DayKey {
    type Err = MoodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(DayKey)
            .map_err(|e| MoodError::DateParseError(format!("invalid day key `{s}`: {e}")))
    }
}

/// A journal entry.
///
/// `color` and `category` are derived from `mood_value` and cannot be set
/// independently; changing the mood value produces a new entry with both
/// re-derived.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    id: Uuid,
    timestamp: DateTime<Utc>,
    mood_value: f64,
    category: Option<MoodCategory>,
    color: Rgb,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    activities: Vec<Activity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    weather: Option<WeatherCondition>,
}

impl Entry {
    /// Create an entry, deriving color and category from `mood_value`
    pub fn new(
        id: Uuid,
        timestamp: DateTime<Utc>,
        mood_value: f64,
        interpolator: &ColorInterpolator,
    ) -> Self {
        Self {
            id,
            timestamp,
            mood_value,
            category: MoodClassifier::classify(mood_value),
            color: interpolator.color(mood_value),
            note: None,
            activities: Vec::new(),
            weather: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Attach activity tags in canonical form; duplicates are dropped, first
    /// occurrence wins.
    pub fn with_activities(mut self, activities: impl IntoIterator<Item = Activity>) -> Self {
        let mut unique: Vec<Activity> = Vec::new();
        for activity in activities.into_iter().map(Activity::canonical) {
            if !unique.contains(&activity) {
                unique.push(activity);
            }
        }
        self.activities = unique;
        self
    }

    pub fn with_weather(mut self, weather: WeatherCondition) -> Self {
        self.weather = Some(weather);
        self
    }

    /// New entry with a different mood value and freshly derived color/category
    pub fn with_mood_value(self, mood_value: f64, interpolator: &ColorInterpolator) -> Self {
        Self {
            mood_value,
            ..self
        }
        .recolored(interpolator)
    }

    /// Re-derive color and category under `interpolator`
    pub fn recolored(mut self, interpolator: &ColorInterpolator) -> Self {
        self.category = MoodClassifier::classify(self.mood_value);
        self.color = interpolator.color(self.mood_value);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn mood_value(&self) -> f64 {
        self.mood_value
    }

    pub fn category(&self) -> Option<MoodCategory> {
        self.category
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    pub fn weather(&self) -> Option<WeatherCondition> {
        self.weather
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_key_ordering_and_stepping() {
        let dec = MonthKey::new(2023, 12).unwrap();
        let jan = MonthKey::new(2024, 1).unwrap();

        assert!(dec < jan);
        assert_eq!(dec.succ(), jan);
        assert_eq!(jan.pred(), dec);
        assert_eq!(dec.months_until(jan), 1);
        assert_eq!(jan.months_until(dec), -1);
        assert!(MonthKey::new(2024, 13).is_none());
    }

    #[test]
    fn test_keys_serialize_as_strings() {
        let month = MonthKey::new(2024, 3).unwrap();
        let day = DayKey::new(2024, 3, 9).unwrap();

        assert_eq!(serde_json::to_string(&month).unwrap(), "\"2024-03\"");
        assert_eq!(serde_json::to_string(&day).unwrap(), "\"2024-03-09\"");

        let parsed: MonthKey = serde_json::from_str("\"2024-03\"").unwrap();
        assert_eq!(parsed, month);
        let parsed: DayKey = serde_json::from_str("\"2024-03-09\"").unwrap();
        assert_eq!(parsed, day);
        assert_eq!(day.month_key(), month);

        assert!("2024-3x".parse::<MonthKey>().is_err());
    }

    #[test]
    fn test_entry_derives_color_and_category() {
        let interpolator = ColorInterpolator::default();
        let entry = Entry::new(Uuid::new_v4(), Utc::now(), 0.9, &interpolator);

        assert_eq!(entry.category(), Some(MoodCategory::Awesome));
        assert_eq!(entry.color(), interpolator.color(0.9));

        let updated = entry.clone().with_mood_value(0.1, &interpolator);
        assert_eq!(updated.id(), entry.id());
        assert_eq!(updated.category(), Some(MoodCategory::Terrible));
        assert_eq!(updated.color(), interpolator.color(0.1));
    }

    #[test]
    fn test_entry_activities_are_deduplicated() {
        let interpolator = ColorInterpolator::default();
        let entry = Entry::new(Uuid::new_v4(), Utc::now(), 0.5, &interpolator).with_activities(
            vec![
                Activity::Work,
                Activity::Other("climbing".to_string()),
                Activity::Work,
            ],
        );

        assert_eq!(
            entry.activities(),
            &[Activity::Work, Activity::Other("climbing".to_string())]
        );
        assert_eq!(entry.activities()[1].id(), "other-climbing");
    }

    #[test]
    fn test_activity_serde() {
        let json = serde_json::to_string(&vec![Activity::Relaxing, Activity::Other("yoga".into())])
            .unwrap();
        assert_eq!(json, r#"["relaxing","yoga"]"#);

        let parsed: Vec<Activity> = serde_json::from_str(r#"["food","pottery"]"#).unwrap();
        assert_eq!(parsed, vec![Activity::Food, Activity::Other("pottery".into())]);
    }

    #[test]
    fn test_other_with_builtin_name_is_canonical() {
        assert_eq!(Activity::from_label("work"), Activity::Work);
        assert_eq!(
            Activity::from_label("pottery"),
            Activity::Other("pottery".to_string())
        );

        let entry = Entry::new(Uuid::nil(), Utc::now(), 0.5, &ColorInterpolator::default())
            .with_activities(vec![Activity::Other("work".to_string()), Activity::Work]);
        assert_eq!(entry.activities(), &[Activity::Work]);
        assert_eq!(entry.activities()[0].id(), "work");

        let json = serde_json::to_string(entry.activities()).unwrap();
        let parsed: Vec<Activity> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, entry.activities());
    }

    #[test]
    fn test_weather_from_wmo_code() {
        assert_eq!(WeatherCondition::from_wmo_code(0), WeatherCondition::Sunny);
        assert_eq!(WeatherCondition::from_wmo_code(2), WeatherCondition::Cloudy);
        assert_eq!(WeatherCondition::from_wmo_code(3), WeatherCondition::Overcast);
        assert_eq!(WeatherCondition::from_wmo_code(63), WeatherCondition::Rainy);
        assert_eq!(WeatherCondition::from_wmo_code(75), WeatherCondition::Snowy);
        assert_eq!(WeatherCondition::from_wmo_code(95), WeatherCondition::Cloudy);
    }

    #[test]
    fn test_rgb_hex() {
        assert_eq!(Rgb::new(1.0, 0.5, 0.0).to_hex(), "#FF8000");
        assert_eq!(Rgb::new(1.4, -0.2, 0.0).to_hex(), "#FF0000");
    }
}
