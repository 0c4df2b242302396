//! Calendar, clock and label formatting collaborators
//!
//! The engine never reads the system timezone or wall clock on its own. Day and
//! month truncation, "now", and human-readable labels are supplied through the
//! traits in this module.

use crate::error::MoodError;
use crate::types::{DayKey, MonthKey};
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use std::fmt::Write;

/// Truncates timestamps to calendar days and months
pub trait Calendar: Send + Sync {
    fn day_key(&self, timestamp: DateTime<Utc>) -> DayKey;

    fn month_key(&self, timestamp: DateTime<Utc>) -> MonthKey {
        self.day_key(timestamp).month_key()
    }
}

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Produces display labels for days, months and years
pub trait LabelFormatter: Send + Sync {
    fn day_label(&self, day: DayKey) -> String;
    fn month_label(&self, month: MonthKey) -> String;
    fn month_short_label(&self, month: MonthKey) -> String;
    fn year_label(&self, year: i32) -> String;
}

/// Calendar at a fixed UTC offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedOffsetCalendar {
    offset: FixedOffset,
}

impl Default for FixedOffsetCalendar {
    fn default() -> Self {
        Self::utc()
    }
}

impl FixedOffsetCalendar {
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Parse `"UTC"`, `"Z"` or a `±HH:MM` offset
    pub fn parse(timezone: &str) -> Result<Self, MoodError> {
        let tz = timezone.trim();
        if tz.eq_ignore_ascii_case("utc") || tz == "Z" {
            return Ok(Self::utc());
        }

        let invalid = || MoodError::InvalidTimezone(timezone.to_string());

        let (sign, rest) = match tz.chars().next() {
            Some('+') => (1, &tz[1..]),
            Some('-') => (-1, &tz[1..]),
            _ => return Err(invalid()),
        };
        let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
        if hours.len() != 2 || minutes.len() != 2 {
            return Err(invalid());
        }
        let hours: i32 = hours.parse().map_err(|_| invalid())?;
        let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
        if hours > 23 || minutes > 59 {
            return Err(invalid());
        }

        let seconds = sign * (hours * 3600 + minutes * 60);
        FixedOffset::east_opt(seconds)
            .map(Self::new)
            .ok_or_else(invalid)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

impl Calendar for FixedOffsetCalendar {
    fn day_key(&self, timestamp: DateTime<Utc>) -> DayKey {
        DayKey::from_date(timestamp.with_timezone(&self.offset).date_naive())
    }
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant, for tests and reproducible CLI runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub const DEFAULT_DAY_PATTERN: &str = "%A, %b %-d";
pub const DEFAULT_MONTH_PATTERN: &str = "%B %Y";
pub const DEFAULT_MONTH_SHORT_PATTERN: &str = "%b";
pub const DEFAULT_YEAR_PATTERN: &str = "%Y";

/// Label formatter driven by chrono strftime patterns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternFormatter {
    day_pattern: String,
    month_pattern: String,
    month_short_pattern: String,
    year_pattern: String,
}

impl Default for PatternFormatter {
    fn default() -> Self {
        Self {
            day_pattern: DEFAULT_DAY_PATTERN.to_string(),
            month_pattern: DEFAULT_MONTH_PATTERN.to_string(),
            month_short_pattern: DEFAULT_MONTH_SHORT_PATTERN.to_string(),
            year_pattern: DEFAULT_YEAR_PATTERN.to_string(),
        }
    }
}

impl PatternFormatter {
    /// Create a formatter, rejecting patterns chrono cannot render
    pub fn new(
        day_pattern: impl Into<String>,
        month_pattern: impl Into<String>,
        month_short_pattern: impl Into<String>,
        year_pattern: impl Into<String>,
    ) -> Result<Self, MoodError> {
        let formatter = Self {
            day_pattern: day_pattern.into(),
            month_pattern: month_pattern.into(),
            month_short_pattern: month_short_pattern.into(),
            year_pattern: year_pattern.into(),
        };
        for pattern in [
            &formatter.day_pattern,
            &formatter.month_pattern,
            &formatter.month_short_pattern,
            &formatter.year_pattern,
        ] {
            validate_pattern(pattern)?;
        }
        Ok(formatter)
    }
}

/// Reject strftime patterns that cannot render a calendar date, either
/// because of unknown specifiers or because they need a time of day.
pub fn validate_pattern(pattern: &str) -> Result<(), MoodError> {
    let mut rendered = String::new();
    if write!(rendered, "{}", NaiveDate::default().format(pattern)).is_err() {
        return Err(MoodError::ConfigError(format!(
            "invalid label pattern `{pattern}`"
        )));
    }
    Ok(())
}

impl LabelFormatter for PatternFormatter {
    fn day_label(&self, day: DayKey) -> String {
        day.date().format(&self.day_pattern).to_string()
    }

    fn month_label(&self, month: MonthKey) -> String {
        month.first_day().format(&self.month_pattern).to_string()
    }

    fn month_short_label(&self, month: MonthKey) -> String {
        month.first_day().format(&self.month_short_pattern).to_string()
    }

    fn year_label(&self, year: i32) -> String {
        MonthKey::new(year, 1)
            .map(|m| m.first_day().format(&self.year_pattern).to_string())
            .unwrap_or_else(|| year.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_utc_truncation() {
        let calendar = FixedOffsetCalendar::utc();
        let ts = Utc.with_ymd_and_hms(2024, 1, 31, 23, 30, 0).unwrap();

        assert_eq!(calendar.day_key(ts), DayKey::new(2024, 1, 31).unwrap());
        assert_eq!(calendar.month_key(ts), MonthKey::new(2024, 1).unwrap());
    }

    #[test]
    fn test_offset_moves_day_and_month() {
        let calendar = FixedOffsetCalendar::parse("+02:00").unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 1, 31, 23, 30, 0).unwrap();

        assert_eq!(calendar.day_key(ts), DayKey::new(2024, 2, 1).unwrap());
        assert_eq!(calendar.month_key(ts), MonthKey::new(2024, 2).unwrap());

        let calendar = FixedOffsetCalendar::parse("-05:30").unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 3, 0, 0).unwrap();
        assert_eq!(calendar.day_key(ts), DayKey::new(2024, 2, 29).unwrap());
    }

    #[test]
    fn test_parse_timezone() {
        assert_eq!(
            FixedOffsetCalendar::parse("UTC").unwrap(),
            FixedOffsetCalendar::utc()
        );
        assert_eq!(
            FixedOffsetCalendar::parse("Z").unwrap(),
            FixedOffsetCalendar::utc()
        );

        for bad in ["", "Europe/Berlin", "+2:00", "+25:00", "02:00", "+02-00"] {
            assert!(
                matches!(
                    FixedOffsetCalendar::parse(bad),
                    Err(MoodError::InvalidTimezone(_))
                ),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_default_labels() {
        let formatter = PatternFormatter::default();

        assert_eq!(
            formatter.day_label(DayKey::new(2019, 1, 30).unwrap()),
            "Wednesday, Jan 30"
        );
        assert_eq!(
            formatter.month_label(MonthKey::new(2024, 3).unwrap()),
            "March 2024"
        );
        assert_eq!(
            formatter.month_short_label(MonthKey::new(2024, 3).unwrap()),
            "Mar"
        );
        assert_eq!(formatter.year_label(2024), "2024");
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let result = PatternFormatter::new("%Q", "%B %Y", "%b", "%Y");
        assert!(matches!(result, Err(MoodError::ConfigError(_))));

        // Time-of-day fields cannot be rendered from a date
        assert!(validate_pattern("%H:%M").is_err());
        assert!(validate_pattern("%d.%m.%Y").is_ok());
    }

    #[test]
    fn test_fixed_clock() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        assert_eq!(FixedClock(now).now(), now);
    }
}
