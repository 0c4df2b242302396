//! View encoding
//!
//! This module wraps a [`MoodView`] in a versioned `moodmap.view.v1` payload
//! with producer metadata and a compact summary of the visible month.

use crate::error::MoodError;
use crate::pipeline::MoodView;
use crate::{MOODMAP_VERSION, PRODUCER_NAME};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

/// Current view payload version
pub const VIEW_VERSION: &str = "moodmap.view.v1";

/// Producer metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Summary of the view for consumers that do not walk the index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSummary {
    pub entry_count: usize,
    pub month_count: usize,
    pub visible_entry_count: usize,
    /// Mean mood value of the visible month, absent when it has no entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible_mean_mood_value: Option<f64>,
    /// Background color of the visible month as `#RRGGBB`
    pub visible_color_hex: String,
}

/// Encoded view payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewPayload {
    pub view_version: String,
    pub producer: ViewProducer,
    pub computed_at_utc: String,
    pub summary: ViewSummary,
    pub view: MoodView,
}

/// Encoder for `moodmap.view.v1` payloads
pub struct ViewEncoder {
    instance_id: String,
}

impl Default for ViewEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn encode(&self, view: &MoodView) -> ViewPayload {
        let producer = ViewProducer {
            name: PRODUCER_NAME.to_string(),
            version: MOODMAP_VERSION.to_string(),
            instance_id: self.instance_id.clone(),
        };

        ViewPayload {
            view_version: VIEW_VERSION.to_string(),
            producer,
            computed_at_utc: Utc::now().to_rfc3339(),
            summary: summarize(view),
            view: view.clone(),
        }
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json(&self, view: &MoodView) -> Result<String, MoodError> {
        let payload = self.encode(view);
        serde_json::to_string_pretty(&payload).map_err(|e| MoodError::EncodingError(e.to_string()))
    }
}

fn summarize(view: &MoodView) -> ViewSummary {
    let visible = view.visible_month.as_ref().map(|m| &m.aggregate);
    let visible_entry_count = visible.map_or(0, |a| a.count);

    ViewSummary {
        entry_count: view.index.entry_count(),
        month_count: view.sorted_month_keys.len(),
        visible_entry_count,
        visible_mean_mood_value: visible
            .filter(|a| a.count > 0)
            .map(|a| a.mean_mood_value),
        visible_color_hex: view.background_color.to_hex(),
    }
}
