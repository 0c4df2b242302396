//! Mood classification
//!
//! Partitions `[0, 1]` into five half-open bands, the last one closed at 1.0.

use crate::types::MoodCategory;

/// Stateless classifier from mood value to [`MoodCategory`]
pub struct MoodClassifier;

impl MoodClassifier {
    /// Classify a mood value. Returns `None` outside `[0, 1]` and for NaN.
    pub fn classify(value: f64) -> Option<MoodCategory> {
        if !(0.0..=1.0).contains(&value) {
            return None;
        }

        let category = if value < 0.2 {
            MoodCategory::Terrible
        } else if value < 0.4 {
            MoodCategory::Bad
        } else if value < 0.6 {
            MoodCategory::Okay
        } else if value < 0.8 {
            MoodCategory::Good
        } else {
            MoodCategory::Awesome
        };
        Some(category)
    }
}
