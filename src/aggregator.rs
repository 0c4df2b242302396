//! Time-bucketed entry index
//!
//! Entries are grouped month → day. Each day bucket and each month bucket
//! carries an aggregate derived from the mean mood value of its entries.
//!
//! Mutation and derivation are separate steps: `rebuild` and `insert_one`
//! first place entries, then call `recompute` on every bucket they touched.

use crate::calendar::{Calendar, LabelFormatter};
use crate::classifier::MoodClassifier;
use crate::color::ColorInterpolator;
use crate::types::{DayKey, Entry, MonthKey, MoodCategory, Rgb};
use log::debug;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

/// Mood value used for the color of an empty bucket
pub const EMPTY_BUCKET_MOOD_VALUE: f64 = 0.5;

/// Aggregate derived from the entries of one bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketAggregate {
    pub mean_mood_value: f64,
    pub color: Rgb,
    pub category: Option<MoodCategory>,
    pub count: usize,
}

impl BucketAggregate {
    /// Aggregate over the given entries.
    ///
    /// Values are summed in ascending order so the result does not depend on
    /// the order entries were supplied in.
    pub fn compute<'a>(
        entries: impl IntoIterator<Item = &'a Entry>,
        interpolator: &ColorInterpolator,
    ) -> Self {
        let mut values: Vec<f64> = entries.into_iter().map(Entry::mood_value).collect();
        if values.is_empty() {
            return Self {
                mean_mood_value: EMPTY_BUCKET_MOOD_VALUE,
                color: interpolator.color(EMPTY_BUCKET_MOOD_VALUE),
                category: None,
                count: 0,
            };
        }

        values.sort_by(f64::total_cmp);
        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;

        Self {
            mean_mood_value: mean,
            color: interpolator.color(mean),
            category: MoodClassifier::classify(mean),
            count,
        }
    }
}

/// Entries of one calendar day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayBucket {
    pub key: DayKey,
    pub label: String,
    pub entries: Vec<Entry>,
    pub aggregate: BucketAggregate,
}

/// Day buckets of one calendar month plus a month-level aggregate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthBucket {
    pub key: MonthKey,
    pub label: String,
    pub days: BTreeMap<DayKey, DayBucket>,
    pub aggregate: BucketAggregate,
}

impl MonthBucket {
    /// All entries of the month, newest day first
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.days.values().rev().flat_map(|day| day.entries.iter())
    }

    /// Day buckets, newest first (display order)
    pub fn days_desc(&self) -> impl Iterator<Item = &DayBucket> {
        self.days.values().rev()
    }
}

/// Month → day → bucket index
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AggregateIndex {
    months: BTreeMap<MonthKey, MonthBucket>,
}

impl AggregateIndex {
    /// Months that hold at least one entry, ascending
    pub fn sorted_month_keys(&self) -> Vec<MonthKey> {
        self.months.keys().copied().collect()
    }

    pub fn month(&self, key: MonthKey) -> Option<&MonthBucket> {
        self.months.get(&key)
    }

    pub fn day(&self, key: DayKey) -> Option<&DayBucket> {
        self.months
            .get(&key.month_key())
            .and_then(|month| month.days.get(&key))
    }

    pub fn months(&self) -> impl Iterator<Item = &MonthBucket> {
        self.months.values()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    /// Total number of indexed entries
    pub fn entry_count(&self) -> usize {
        self.months.values().map(|m| m.aggregate.count).sum()
    }
}

/// Builds and incrementally maintains an [`AggregateIndex`]
pub struct EntryAggregator {
    interpolator: ColorInterpolator,
    calendar: Arc<dyn Calendar>,
    formatter: Arc<dyn LabelFormatter>,
    index: AggregateIndex,
    locations: HashMap<Uuid, DayKey>,
}

impl EntryAggregator {
    pub fn new(
        interpolator: ColorInterpolator,
        calendar: Arc<dyn Calendar>,
        formatter: Arc<dyn LabelFormatter>,
    ) -> Self {
        Self {
            interpolator,
            calendar,
            formatter,
            index: AggregateIndex::default(),
            locations: HashMap::new(),
        }
    }

    pub fn index(&self) -> &AggregateIndex {
        &self.index
    }

    pub fn interpolator(&self) -> &ColorInterpolator {
        &self.interpolator
    }

    pub fn calendar(&self) -> &Arc<dyn Calendar> {
        &self.calendar
    }

    pub fn formatter(&self) -> &Arc<dyn LabelFormatter> {
        &self.formatter
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.locations.contains_key(&id)
    }

    /// Replace the whole index with one built from `entries`.
    ///
    /// When an id appears more than once, the last occurrence wins.
    pub fn rebuild(&mut self, entries: Vec<Entry>) {
        let total = entries.len();
        let mut last_seen: HashMap<Uuid, usize> = HashMap::with_capacity(total);
        for (i, entry) in entries.iter().enumerate() {
            last_seen.insert(entry.id(), i);
        }

        self.index = AggregateIndex::default();
        self.locations.clear();

        let mut touched: Vec<DayKey> = Vec::new();
        for (i, entry) in entries.into_iter().enumerate() {
            if last_seen.get(&entry.id()) != Some(&i) {
                continue;
            }
            let day = self.place(entry, Placement::Append);
            if touched.last() != Some(&day) {
                touched.push(day);
            }
        }

        touched.sort();
        touched.dedup();
        for day in &touched {
            self.sort_day(*day);
        }
        self.recompute(&touched);

        debug!(
            "rebuilt index: {} entries ({} duplicates dropped) across {} months",
            self.locations.len(),
            total - self.locations.len(),
            self.index.months.len()
        );
    }

    /// Add one entry to the front of its day bucket.
    ///
    /// An entry whose id is already indexed replaces the previous version.
    ///
    /// Costs O(m log m) for a month holding m entries: the month aggregate is
    /// recomputed from all of its values, sorted, so it matches `rebuild` exactly.
    pub fn insert_one(&mut self, entry: Entry) {
        let mut touched = Vec::with_capacity(2);
        if let Some(old_day) = self.detach(entry.id()) {
            touched.push(old_day);
        }

        let day = self.place(entry, Placement::Prepend);
        if !touched.contains(&day) {
            touched.push(day);
        }
        self.recompute(&touched);

        debug!("inserted entry into {day}");
    }

    /// Recompute the aggregates of the given days and their months.
    ///
    /// Buckets left without entries are removed.
    pub fn recompute(&mut self, days: &[DayKey]) {
        let mut months: Vec<MonthKey> = Vec::with_capacity(days.len());

        for day in days {
            let month_key = day.month_key();
            if let Some(month) = self.index.months.get_mut(&month_key) {
                let empty = match month.days.get_mut(day) {
                    Some(bucket) => {
                        bucket.aggregate =
                            BucketAggregate::compute(&bucket.entries, &self.interpolator);
                        bucket.entries.is_empty()
                    }
                    None => false,
                };
                if empty {
                    month.days.remove(day);
                }
            }
            if !months.contains(&month_key) {
                months.push(month_key);
            }
        }

        for month_key in months {
            let empty = match self.index.months.get_mut(&month_key) {
                Some(month) => {
                    month.aggregate = BucketAggregate::compute(
                        month.days.values().flat_map(|d| d.entries.iter()),
                        &self.interpolator,
                    );
                    month.days.is_empty()
                }
                None => false,
            };
            if empty {
                self.index.months.remove(&month_key);
            }
        }
    }

    /// Put an entry in its day bucket without touching aggregates
    fn place(&mut self, entry: Entry, placement: Placement) -> DayKey {
        let entry = entry.recolored(&self.interpolator);
        let day_key = self.calendar.day_key(entry.timestamp());
        let month_key = day_key.month_key();

        let interpolator = &self.interpolator;
        let formatter = &self.formatter;
        let month = self
            .index
            .months
            .entry(month_key)
            .or_insert_with(|| MonthBucket {
                key: month_key,
                label: formatter.month_label(month_key),
                days: BTreeMap::new(),
                aggregate: BucketAggregate::compute(std::iter::empty(), interpolator),
            });
        let day = month.days.entry(day_key).or_insert_with(|| DayBucket {
            key: day_key,
            label: formatter.day_label(day_key),
            entries: Vec::new(),
            aggregate: BucketAggregate::compute(std::iter::empty(), interpolator),
        });

        self.locations.insert(entry.id(), day_key);
        match placement {
            Placement::Append => day.entries.push(entry),
            Placement::Prepend => day.entries.insert(0, entry),
        }
        day_key
    }

    /// Remove an indexed entry, returning the day it was in
    fn detach(&mut self, id: Uuid) -> Option<DayKey> {
        let day_key = self.locations.remove(&id)?;
        if let Some(day) = self
            .index
            .months
            .get_mut(&day_key.month_key())
            .and_then(|m| m.days.get_mut(&day_key))
        {
            day.entries.retain(|e| e.id() != id);
        }
        Some(day_key)
    }

    fn sort_day(&mut self, day_key: DayKey) {
        if let Some(day) = self
            .index
            .months
            .get_mut(&day_key.month_key())
            .and_then(|m| m.days.get_mut(&day_key))
        {
            day.entries.sort_by(display_order);
        }
    }
}

#[derive(Clone, Copy)]
enum Placement {
    Append,
    Prepend,
}

/// Newest first; ties broken by ascending id
fn display_order(a: &Entry, b: &Entry) -> Ordering {
    b.timestamp()
        .cmp(&a.timestamp())
        .then_with(|| a.id().cmp(&b.id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{FixedOffsetCalendar, PatternFormatter};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn aggregator() -> EntryAggregator {
        EntryAggregator::new(
            ColorInterpolator::default(),
            Arc::new(FixedOffsetCalendar::utc()),
            Arc::new(PatternFormatter::default()),
        )
    }

    fn ts(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn entry(n: u128, at: DateTime<Utc>, value: f64) -> Entry {
        Entry::new(Uuid::from_u128(n), at, value, &ColorInterpolator::default())
    }

    fn ids(day: &DayBucket) -> Vec<Uuid> {
        day.entries.iter().map(Entry::id).collect()
    }

    #[test]
    fn test_same_day_mean() {
        let mut agg = aggregator();
        agg.rebuild(vec![
            entry(1, ts(2024, 3, 10, 8), 0.1),
            entry(2, ts(2024, 3, 10, 12), 0.5),
            entry(3, ts(2024, 3, 10, 20), 0.9),
        ]);

        let day = agg.index().day(DayKey::new(2024, 3, 10).unwrap()).unwrap();
        assert_eq!(day.aggregate.count, 3);
        assert!((day.aggregate.mean_mood_value - 0.5).abs() < 1e-12);
        assert_eq!(day.aggregate.category, Some(MoodCategory::Okay));
        assert_eq!(
            day.aggregate.color,
            ColorInterpolator::default().color(day.aggregate.mean_mood_value)
        );
        assert_eq!(day.label, "Sunday, Mar 10");

        let month = agg.index().month(MonthKey::new(2024, 3).unwrap()).unwrap();
        assert_eq!(month.aggregate, day.aggregate);
        assert_eq!(month.label, "March 2024");
    }

    #[test]
    fn test_empty_bucket_aggregate() {
        let interpolator = ColorInterpolator::default();
        let aggregate = BucketAggregate::compute(std::iter::empty(), &interpolator);

        assert_eq!(aggregate.count, 0);
        assert_eq!(aggregate.category, None);
        assert_eq!(aggregate.color, interpolator.color(0.5));
    }

    #[test]
    fn test_rebuild_orders_day_entries() {
        let mut agg = aggregator();
        agg.rebuild(vec![
            entry(3, ts(2024, 3, 10, 8), 0.2),
            entry(2, ts(2024, 3, 10, 20), 0.4),
            entry(1, ts(2024, 3, 10, 8), 0.6),
        ]);

        let day = agg.index().day(DayKey::new(2024, 3, 10).unwrap()).unwrap();
        assert_eq!(
            ids(day),
            vec![Uuid::from_u128(2), Uuid::from_u128(1), Uuid::from_u128(3)]
        );
    }

    #[test]
    fn test_rebuild_duplicate_ids_last_wins() {
        let mut agg = aggregator();
        agg.rebuild(vec![
            entry(1, ts(2024, 1, 5, 8), 0.1),
            entry(2, ts(2024, 3, 10, 8), 0.5),
            entry(1, ts(2024, 3, 10, 9), 0.9),
        ]);

        assert_eq!(agg.index().entry_count(), 2);
        assert_eq!(
            agg.index().sorted_month_keys(),
            vec![MonthKey::new(2024, 3).unwrap()]
        );
        let day = agg.index().day(DayKey::new(2024, 3, 10).unwrap()).unwrap();
        assert_eq!(day.entries[0].mood_value(), 0.9);
    }

    #[test]
    fn test_rebuild_discards_previous_state() {
        let mut agg = aggregator();
        agg.rebuild(vec![entry(1, ts(2024, 1, 5, 8), 0.1)]);
        agg.rebuild(vec![entry(2, ts(2024, 2, 5, 8), 0.7)]);

        assert_eq!(
            agg.index().sorted_month_keys(),
            vec![MonthKey::new(2024, 2).unwrap()]
        );
        assert!(!agg.contains(Uuid::from_u128(1)));
    }

    #[test]
    fn test_insert_one_prepends_and_recomputes() {
        let mut agg = aggregator();
        agg.rebuild(vec![entry(1, ts(2024, 3, 10, 8), 0.2)]);
        agg.insert_one(entry(2, ts(2024, 3, 10, 6), 0.8));

        let day = agg.index().day(DayKey::new(2024, 3, 10).unwrap()).unwrap();
        assert_eq!(ids(day), vec![Uuid::from_u128(2), Uuid::from_u128(1)]);
        assert_eq!(day.aggregate.count, 2);
        assert!((day.aggregate.mean_mood_value - 0.5).abs() < 1e-12);

        let month = agg.index().month(MonthKey::new(2024, 3).unwrap()).unwrap();
        assert_eq!(month.aggregate.count, 2);
    }

    #[test]
    fn test_insert_one_creates_new_month() {
        let mut agg = aggregator();
        agg.insert_one(entry(1, ts(2023, 12, 31, 23), 0.3));
        agg.insert_one(entry(2, ts(2024, 1, 1, 0), 0.9));

        assert_eq!(
            agg.index().sorted_month_keys(),
            vec![
                MonthKey::new(2023, 12).unwrap(),
                MonthKey::new(2024, 1).unwrap()
            ]
        );
    }

    #[test]
    fn test_insert_one_replaces_existing_id() {
        let mut agg = aggregator();
        agg.rebuild(vec![
            entry(1, ts(2024, 1, 5, 8), 0.1),
            entry(2, ts(2024, 3, 10, 8), 0.5),
        ]);

        // Same id moved to March with a new value; January empties out
        agg.insert_one(entry(1, ts(2024, 3, 10, 9), 0.9));

        assert_eq!(agg.index().entry_count(), 2);
        assert_eq!(
            agg.index().sorted_month_keys(),
            vec![MonthKey::new(2024, 3).unwrap()]
        );
        let day = agg.index().day(DayKey::new(2024, 3, 10).unwrap()).unwrap();
        assert_eq!(ids(day), vec![Uuid::from_u128(1), Uuid::from_u128(2)]);
        assert!((day.aggregate.mean_mood_value - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_entries_recolored_under_configured_palette() {
        let palette = Rgb::new(0.1, 0.2, 0.3);
        let interpolator = ColorInterpolator::new(palette, palette, palette, 1.0).unwrap();
        let mut agg = EntryAggregator::new(
            interpolator,
            Arc::new(FixedOffsetCalendar::utc()),
            Arc::new(PatternFormatter::default()),
        );

        agg.insert_one(entry(1, ts(2024, 3, 10, 8), 0.9));

        let day = agg.index().day(DayKey::new(2024, 3, 10).unwrap()).unwrap();
        assert_eq!(day.entries[0].color(), palette);
        assert_eq!(day.aggregate.color, palette);
    }

    #[test]
    fn test_out_of_range_values_unclassified() {
        let mut agg = aggregator();
        agg.rebuild(vec![entry(1, ts(2024, 3, 10, 8), 1.4)]);

        let day = agg.index().day(DayKey::new(2024, 3, 10).unwrap()).unwrap();
        assert_eq!(day.entries[0].category(), None);
        assert_eq!(day.aggregate.category, None);
        assert_eq!(day.aggregate.count, 1);
    }

    /// Bucket contents ignoring in-bucket order
    fn membership(index: &AggregateIndex) -> Vec<(DayKey, Vec<Uuid>, BucketAggregate)> {
        index
            .months()
            .flat_map(|m| m.days.values())
            .map(|d| {
                let mut ids = ids(d);
                ids.sort();
                (d.key, ids, d.aggregate.clone())
            })
            .collect()
    }

    fn month_aggregates(index: &AggregateIndex) -> Vec<(MonthKey, BucketAggregate)> {
        index
            .months()
            .map(|m| (m.key, m.aggregate.clone()))
            .collect()
    }

    proptest! {
        #[test]
        fn prop_rebuild_matches_repeated_insert(
            specs in prop::collection::vec((0i64..120, 0i64..24, 0.0f64..=1.0), 0..40),
            seed in any::<u64>(),
        ) {
            let base = ts(2023, 11, 1, 0);
            let entries: Vec<Entry> = specs
                .iter()
                .enumerate()
                .map(|(i, (day, hour, value))| {
                    entry(
                        i as u128 + 1,
                        base + Duration::days(*day) + Duration::hours(*hour),
                        *value,
                    )
                })
                .collect();

            let mut rebuilt = aggregator();
            rebuilt.rebuild(entries.clone());

            // Deterministic shuffle driven by the seed
            let mut shuffled = entries;
            let mut state = seed | 1;
            for i in (1..shuffled.len()).rev() {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                let j = (state % (i as u64 + 1)) as usize;
                shuffled.swap(i, j);
            }

            let mut inserted = aggregator();
            for e in shuffled {
                inserted.insert_one(e);
            }

            prop_assert_eq!(
                rebuilt.index().sorted_month_keys(),
                inserted.index().sorted_month_keys()
            );
            prop_assert_eq!(membership(rebuilt.index()), membership(inserted.index()));
            prop_assert_eq!(
                month_aggregates(rebuilt.index()),
                month_aggregates(inserted.index())
            );
        }
    }
}
