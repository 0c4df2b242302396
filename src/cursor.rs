//! Month navigation
//!
//! The cursor walks over the months that hold entries plus the month containing
//! "now". Going back is only possible towards data; going forward is possible
//! until the cursor reaches the present month.

use crate::calendar::{Calendar, Clock, LabelFormatter};
use crate::types::MonthKey;
use log::debug;
use serde::Serialize;

/// Snapshot of the cursor published to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CursorState {
    pub current_month: MonthKey,
    pub now_month: MonthKey,
    pub prev_enabled: bool,
    pub next_enabled: bool,
}

/// Navigation state machine over `{months with data} ∪ {now month}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthCursor {
    current: MonthKey,
    now: MonthKey,
    data_months: Vec<MonthKey>,
    prev_enabled: bool,
    next_enabled: bool,
}

impl MonthCursor {
    /// Cursor positioned on `now_month` with no data
    pub fn new(now_month: MonthKey) -> Self {
        let mut cursor = Self {
            current: now_month,
            now: now_month,
            data_months: Vec::new(),
            prev_enabled: false,
            next_enabled: false,
        };
        cursor.refresh_flags();
        cursor
    }

    /// Cursor positioned on the month containing the clock's current instant
    pub fn from_clock(clock: &dyn Clock, calendar: &dyn Calendar) -> Self {
        Self::new(calendar.month_key(clock.now()))
    }

    pub fn state(&self) -> CursorState {
        CursorState {
            current_month: self.current,
            now_month: self.now,
            prev_enabled: self.prev_enabled,
            next_enabled: self.next_enabled,
        }
    }

    pub fn current(&self) -> MonthKey {
        self.current
    }

    pub fn now_month(&self) -> MonthKey {
        self.now
    }

    pub fn prev_enabled(&self) -> bool {
        self.prev_enabled
    }

    pub fn next_enabled(&self) -> bool {
        self.next_enabled
    }

    /// Step forward to the next month with data, or to now
    pub fn next(&mut self) {
        if !self.next_enabled {
            return;
        }
        let current = self.current;
        let next = self.union().find(|m| *m > current);
        if let Some(next) = next {
            self.current = next;
        }
        self.refresh_flags();
        debug!("cursor moved forward to {}", self.current);
    }

    /// Step back to the previous month with data
    pub fn prev(&mut self) {
        if !self.prev_enabled {
            return;
        }
        let current = self.current;
        if let Some(prev) = self.data_months.iter().rev().find(|m| **m < current) {
            self.current = *prev;
        }
        self.refresh_flags();
        debug!("cursor moved back to {}", self.current);
    }

    /// Jump to a month of the union. Returns `false` and stays put otherwise.
    pub fn select(&mut self, month: MonthKey) -> bool {
        if month > self.now || !self.union().any(|m| m == month) {
            return false;
        }
        self.current = month;
        self.refresh_flags();
        debug!("cursor jumped to {month}");
        true
    }

    /// Adopt a new set of data months after an index change.
    ///
    /// The current month is clamped to the nearest reachable month; on a tie
    /// the later one is taken. The cursor never lands past now.
    pub fn sync(&mut self, months: &[MonthKey]) {
        let mut data_months = months.to_vec();
        data_months.sort();
        data_months.dedup();
        self.data_months = data_months;

        let current = self.current;
        let reachable = self.union().filter(|m| *m <= self.now);
        let mut best = self.now;
        let mut best_distance = current.months_until(best).abs();
        for candidate in reachable {
            let distance = current.months_until(candidate).abs();
            if distance < best_distance || (distance == best_distance && candidate > best) {
                best = candidate;
                best_distance = distance;
            }
        }
        if best != current {
            debug!("cursor clamped from {current} to {best}");
        }
        self.current = best;
        self.refresh_flags();
    }

    /// Move "now" forward (e.g. after midnight on the first of a month)
    pub fn set_now_month(&mut self, now_month: MonthKey) {
        self.now = now_month;
        let months = std::mem::take(&mut self.data_months);
        self.sync(&months);
    }

    /// Month selector grid for the years with data
    pub fn year_grid(&self, formatter: &dyn LabelFormatter) -> YearGrid {
        year_grid(&self.data_months, self.current, self.now, formatter)
    }

    fn refresh_flags(&mut self) {
        let current = self.current;
        self.prev_enabled = self.data_months.iter().any(|m| *m < current);
        self.next_enabled = current < self.now;
    }

    /// Data months and now, ascending and unique
    fn union(&self) -> impl Iterator<Item = MonthKey> + '_ {
        let now = self.now;
        let insert_at = self.data_months.partition_point(|m| *m < now);
        let has_now = self.data_months.get(insert_at) == Some(&now);
        self.data_months[..insert_at]
            .iter()
            .copied()
            .chain((!has_now).then_some(now))
            .chain(self.data_months[insert_at..].iter().copied())
    }
}

/// One month in the selector grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthCell {
    pub key: MonthKey,
    pub label: String,
    pub has_data: bool,
    pub is_current: bool,
    /// Whether the month can be selected (has data, or is the now month)
    pub is_enabled: bool,
}

/// Twelve month cells of one year
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearRow {
    pub year: i32,
    pub label: String,
    pub months: Vec<MonthCell>,
}

/// Year/month selector grid, years ascending
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct YearGrid {
    pub years: Vec<YearRow>,
}

impl YearGrid {
    pub fn row(&self, year: i32) -> Option<&YearRow> {
        self.years.iter().find(|row| row.year == year)
    }

    /// The closest earlier year in the grid
    pub fn year_before(&self, year: i32) -> Option<i32> {
        self.years.iter().rev().map(|r| r.year).find(|y| *y < year)
    }

    /// The closest later year in the grid
    pub fn year_after(&self, year: i32) -> Option<i32> {
        self.years.iter().map(|r| r.year).find(|y| *y > year)
    }
}

/// Build the selector grid: one row per year with data, twelve cells each
pub fn year_grid(
    months: &[MonthKey],
    current: MonthKey,
    now: MonthKey,
    formatter: &dyn LabelFormatter,
) -> YearGrid {
    let mut years: Vec<i32> = months.iter().map(MonthKey::year).collect();
    years.sort_unstable();
    years.dedup();

    let years = years
        .into_iter()
        .map(|year| {
            let cells = (1..=12)
                .filter_map(|month| MonthKey::new(year, month))
                .map(|key| {
                    let has_data = months.contains(&key);
                    MonthCell {
                        key,
                        label: formatter.month_short_label(key),
                        has_data,
                        is_current: key == current,
                        is_enabled: (has_data && key <= now) || key == now,
                    }
                })
                .collect();
            YearRow {
                year,
                label: formatter.year_label(year),
                months: cells,
            }
        })
        .collect();

    YearGrid { years }
}
