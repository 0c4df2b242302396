//! Processing orchestration
//!
//! This module provides the public API for moodmap. `MoodProcessor` owns the
//! aggregator, the month cursor and the last upstream error, and produces the
//! combined [`MoodView`] handed to the presentation layer.

use crate::aggregator::{AggregateIndex, BucketAggregate, EntryAggregator, MonthBucket};
use crate::calendar::{
    Calendar, Clock, FixedClock, FixedOffsetCalendar, LabelFormatter, PatternFormatter, SystemClock,
};
use crate::color::ColorInterpolator;
use crate::config::EngineConfig;
use crate::cursor::{CursorState, MonthCursor, YearGrid};
use crate::encoder::ViewEncoder;
use crate::error::{MoodError, SourceError};
use crate::schema::EntryRecordAdapter;
use crate::types::{Entry, MonthKey, Rgb};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use std::sync::Arc;

/// Non-fatal upstream failure surfaced in the view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub kind: String,
    pub message: String,
}

impl From<&SourceError> for ErrorInfo {
    fn from(error: &SourceError) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

/// Everything the presentation layer needs, as one value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodView {
    pub index: AggregateIndex,
    pub sorted_month_keys: Vec<MonthKey>,
    pub cursor: CursorState,
    /// Bucket of the cursor's current month, if it has entries
    pub visible_month: Option<MonthBucket>,
    /// Screen background: aggregate color of the visible month
    pub background_color: Rgb,
    pub last_error: Option<ErrorInfo>,
}

/// Stateful processor combining the entry index and month navigation.
///
/// Every method is synchronous and infallible; failures from upstream are
/// recorded with [`MoodProcessor::report_failure`].
pub struct MoodProcessor {
    aggregator: EntryAggregator,
    cursor: MonthCursor,
    last_error: Option<ErrorInfo>,
}

impl Default for MoodProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl MoodProcessor {
    /// Create a processor with the default palette, UTC calendar and wall clock
    pub fn new() -> Self {
        Self::with_components(
            ColorInterpolator::default(),
            Arc::new(FixedOffsetCalendar::utc()),
            Arc::new(PatternFormatter::default()),
            &SystemClock,
        )
    }

    /// Create a processor from configuration, reading "now" from `clock`
    pub fn from_config(config: &EngineConfig, clock: &dyn Clock) -> Result<Self, MoodError> {
        Ok(Self::with_components(
            config.interpolator()?,
            Arc::new(config.calendar()?),
            Arc::new(config.formatter()?),
            clock,
        ))
    }

    pub fn with_components(
        interpolator: ColorInterpolator,
        calendar: Arc<dyn Calendar>,
        formatter: Arc<dyn LabelFormatter>,
        clock: &dyn Clock,
    ) -> Self {
        let cursor = MonthCursor::from_clock(clock, calendar.as_ref());
        Self {
            aggregator: EntryAggregator::new(interpolator, calendar, formatter),
            cursor,
            last_error: None,
        }
    }

    pub fn interpolator(&self) -> &ColorInterpolator {
        self.aggregator.interpolator()
    }

    pub fn calendar(&self) -> &Arc<dyn Calendar> {
        self.aggregator.calendar()
    }

    pub fn index(&self) -> &AggregateIndex {
        self.aggregator.index()
    }

    pub fn cursor(&self) -> CursorState {
        self.cursor.state()
    }

    pub fn last_error(&self) -> Option<&ErrorInfo> {
        self.last_error.as_ref()
    }

    /// Replace all data with a full snapshot and clear any previous failure
    pub fn apply_snapshot(&mut self, entries: Vec<Entry>) {
        self.aggregator.rebuild(entries);
        self.cursor.sync(&self.aggregator.index().sorted_month_keys());
        self.last_error = None;
    }

    /// Record an upstream failure; index and cursor are left untouched
    pub fn report_failure(&mut self, error: &SourceError) {
        warn!("snapshot source failed: {error}");
        self.last_error = Some(ErrorInfo::from(error));
    }

    /// Add or replace a single entry
    pub fn insert_one(&mut self, entry: Entry) {
        self.aggregator.insert_one(entry);
        self.cursor.sync(&self.aggregator.index().sorted_month_keys());
    }

    pub fn next_month(&mut self) {
        self.cursor.next();
    }

    pub fn prev_month(&mut self) {
        self.cursor.prev();
    }

    /// Jump to a month; returns `false` when it is not reachable
    pub fn select_month(&mut self, month: MonthKey) -> bool {
        self.cursor.select(month)
    }

    /// Re-read "now" from `clock`, e.g. after the app resumes
    pub fn refresh_now(&mut self, clock: &dyn Clock) {
        let now_month = self.aggregator.calendar().month_key(clock.now());
        if now_month != self.cursor.now_month() {
            debug!("now month changed to {now_month}");
            self.cursor.set_now_month(now_month);
        }
    }

    pub fn year_grid(&self) -> YearGrid {
        self.cursor.year_grid(self.aggregator.formatter().as_ref())
    }

    /// Build the combined view
    pub fn view(&self) -> MoodView {
        let index = self.aggregator.index();
        let visible_month = index.month(self.cursor.current()).cloned();
        let background_color = match &visible_month {
            Some(month) => month.aggregate.color,
            None => BucketAggregate::compute(std::iter::empty(), self.interpolator()).color,
        };

        MoodView {
            index: index.clone(),
            sorted_month_keys: index.sorted_month_keys(),
            cursor: self.cursor.state(),
            visible_month,
            background_color,
            last_error: self.last_error.clone(),
        }
    }
}

/// Convert a JSON array of moodmap.entry.v1 records to an encoded view.
///
/// # Arguments
/// * `records_json` - JSON array of entry records
/// * `config` - Engine configuration (palette, timezone, labels)
/// * `now` - Instant treated as "now" for month navigation
/// * `month` - Month to show instead of the current one, if reachable
///
/// # Example
/// ```ignore
/// let view_json = entries_to_view_json(&records, &EngineConfig::default(), Utc::now(), None)?;
/// ```
pub fn entries_to_view_json(
    records_json: &str,
    config: &EngineConfig,
    now: DateTime<Utc>,
    month: Option<MonthKey>,
) -> Result<String, MoodError> {
    let mut processor = MoodProcessor::from_config(config, &FixedClock(now))?;
    let records = EntryRecordAdapter::parse_array(records_json)?;
    let entries = EntryRecordAdapter::to_entries(&records, processor.interpolator())?;
    processor.apply_snapshot(entries);

    if let Some(month) = month {
        if !processor.select_month(month) {
            return Err(MoodError::DateParseError(format!(
                "month {month} has no entries and is not the current month"
            )));
        }
    }

    ViewEncoder::new().encode_to_json(&processor.view())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DayKey, MoodCategory};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap()
    }

    fn processor() -> MoodProcessor {
        MoodProcessor::from_config(&EngineConfig::default(), &FixedClock(now())).unwrap()
    }

    fn entry(n: u128, y: i32, m: u32, d: u32, value: f64) -> Entry {
        Entry::new(
            Uuid::from_u128(n),
            Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap(),
            value,
            &ColorInterpolator::default(),
        )
    }

    fn month(y: i32, m: u32) -> MonthKey {
        MonthKey::new(y, m).unwrap()
    }

    fn january_and_march() -> Vec<Entry> {
        vec![
            entry(1, 2024, 1, 12, 0.3),
            entry(2, 2024, 3, 4, 0.9),
            entry(3, 2024, 3, 18, 0.65),
        ]
    }

    #[test]
    fn test_snapshot_view() {
        let mut processor = processor();
        processor.apply_snapshot(january_and_march());
        let view = processor.view();

        assert_eq!(view.sorted_month_keys, vec![month(2024, 1), month(2024, 3)]);
        assert_eq!(view.cursor.current_month, month(2024, 3));
        assert!(view.cursor.prev_enabled);
        assert!(!view.cursor.next_enabled);

        let visible = view.visible_month.unwrap();
        assert_eq!(visible.key, month(2024, 3));
        assert_eq!(visible.aggregate.count, 2);
        assert_eq!(visible.aggregate.category, Some(MoodCategory::Good));
        assert_eq!(view.background_color, visible.aggregate.color);
        assert_eq!(view.last_error, None);
    }

    #[test]
    fn test_navigation_through_processor() {
        let mut processor = processor();
        processor.apply_snapshot(january_and_march());

        processor.prev_month();
        let view = processor.view();
        assert_eq!(view.cursor.current_month, month(2024, 1));
        assert_eq!(view.visible_month.unwrap().key, month(2024, 1));

        processor.prev_month();
        assert_eq!(processor.cursor().current_month, month(2024, 1));

        processor.next_month();
        assert_eq!(processor.cursor().current_month, month(2024, 3));
    }

    #[test]
    fn test_failure_keeps_last_good_state() {
        let mut processor = processor();
        processor.apply_snapshot(january_and_march());
        processor.prev_month();
        let before = processor.view();

        processor.report_failure(&SourceError::Fetch("disk read failed".to_string()));
        let after = processor.view();

        assert_eq!(after.index, before.index);
        assert_eq!(after.sorted_month_keys, before.sorted_month_keys);
        assert_eq!(after.cursor, before.cursor);
        assert_eq!(
            after.last_error,
            Some(ErrorInfo {
                kind: "fetch".to_string(),
                message: "fetch failed: disk read failed".to_string(),
            })
        );

        processor.apply_snapshot(january_and_march());
        assert_eq!(processor.view().last_error, None);
    }

    #[test]
    fn test_same_snapshot_twice_is_identical() {
        let mut processor = processor();
        processor.apply_snapshot(january_and_march());
        let first = serde_json::to_string(&processor.view()).unwrap();

        processor.apply_snapshot(january_and_march());
        let second = serde_json::to_string(&processor.view()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_same_snapshot_line_without_ids_is_identical() {
        const LINE: &str = r#"[
            {"schema_version":"moodmap.entry.v1","timestamp":"2024-03-04T10:00:00Z","mood_value":0.9},
            {"schema_version":"moodmap.entry.v1","timestamp":"2024-03-04T10:00:00Z","mood_value":0.2}
        ]"#;

        fn apply_line(processor: &mut MoodProcessor) -> String {
            let entries = EntryRecordAdapter::parse_snapshot_line(LINE, processor.interpolator())
                .unwrap()
                .unwrap();
            processor.apply_snapshot(entries);
            serde_json::to_string(&processor.view()).unwrap()
        }

        let mut first_processor = processor();
        let first = apply_line(&mut first_processor);
        let second = apply_line(&mut first_processor);
        assert_eq!(first, second);

        let mut fresh = processor();
        assert_eq!(apply_line(&mut fresh), first);
    }

    #[test]
    fn test_empty_view() {
        let view = processor().view();

        assert!(view.index.is_empty());
        assert!(view.sorted_month_keys.is_empty());
        assert_eq!(view.visible_month, None);
        assert_eq!(view.cursor.current_month, month(2024, 3));
        assert!(!view.cursor.prev_enabled);
        assert!(!view.cursor.next_enabled);
        assert_eq!(view.background_color, ColorInterpolator::default().color(0.5));
    }

    #[test]
    fn test_insert_one_updates_view() {
        let mut processor = processor();
        processor.apply_snapshot(january_and_march());
        processor.insert_one(entry(4, 2024, 3, 18, 0.1));

        let day = processor
            .index()
            .day(DayKey::new(2024, 3, 18).unwrap())
            .unwrap();
        assert_eq!(day.entries[0].id(), Uuid::from_u128(4));
        assert_eq!(day.aggregate.count, 2);

        let view = processor.view();
        assert_eq!(view.visible_month.unwrap().aggregate.count, 3);
    }

    #[test]
    fn test_refresh_now_moves_cursor() {
        let mut processor = processor();
        processor.apply_snapshot(january_and_march());

        processor.refresh_now(&FixedClock(Utc.with_ymd_and_hms(2024, 4, 2, 8, 0, 0).unwrap()));

        let cursor = processor.cursor();
        assert_eq!(cursor.now_month, month(2024, 4));
        assert_eq!(cursor.current_month, month(2024, 3));
        assert!(cursor.next_enabled);
    }

    #[test]
    fn test_entries_to_view_json() {
        let records = r#"[
            {"schema_version":"moodmap.entry.v1","id":"00000000-0000-0000-0000-000000000001",
             "timestamp":"2024-01-12T10:00:00Z","mood_value":0.3},
            {"schema_version":"moodmap.entry.v1","id":"00000000-0000-0000-0000-000000000002",
             "timestamp":"2024-03-04T10:00:00Z","mood_value":0.9}
        ]"#;

        let json =
            entries_to_view_json(records, &EngineConfig::default(), now(), Some(month(2024, 1)))
                .unwrap();
        let payload: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(payload["view"]["cursor"]["current_month"], "2024-01");
        assert_eq!(payload["view"]["sorted_month_keys"][1], "2024-03");
        assert_eq!(payload["view"]["visible_month"]["label"], "January 2024");
        assert_eq!(payload["summary"]["entry_count"], 2);
    }

    #[test]
    fn test_entries_to_view_json_rejects_unreachable_month() {
        let result = entries_to_view_json("[]", &EngineConfig::default(), now(), Some(month(2023, 5)));
        assert!(result.is_err());
    }

    #[test]
    fn test_entries_to_view_json_invalid_json() {
        let result = entries_to_view_json("not valid json", &EngineConfig::default(), now(), None);
        assert!(matches!(result, Err(MoodError::JsonError(_))));
    }
}
