//! moodmap - On-device mood aggregation and color-mapping engine
//!
//! moodmap turns mood journal entries into a navigable, colored calendar view
//! through a deterministic pipeline: entry records → color/category derivation
//! → month/day bucketing with aggregates → month cursor → combined view.
//!
//! ## Modules
//!
//! - **Core**: color interpolation, mood classification, the entry index and
//!   month navigation (all synchronous and infallible)
//! - **Stream**: Tokio bridge from a push-based snapshot source to published views
//! - **Surfaces**: input schema, view encoding, configuration, C FFI and CLI

pub mod aggregator;
pub mod calendar;
pub mod classifier;
pub mod color;
pub mod config;
pub mod cursor;
pub mod encoder;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod schema;
pub mod stream;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use aggregator::{AggregateIndex, BucketAggregate, DayBucket, EntryAggregator, MonthBucket};
pub use calendar::{
    Calendar, Clock, FixedClock, FixedOffsetCalendar, LabelFormatter, PatternFormatter,
    SystemClock,
};
pub use classifier::MoodClassifier;
pub use color::ColorInterpolator;
pub use config::EngineConfig;
pub use cursor::{CursorState, MonthCursor, YearGrid};
pub use error::{MoodError, SourceError};
pub use pipeline::{entries_to_view_json, ErrorInfo, MoodProcessor, MoodView};
pub use stream::{EntryStreamAdapter, MemorySource, SnapshotQuery, SnapshotSource};
pub use types::{Activity, DayKey, Entry, MonthKey, MoodCategory, Rgb, WeatherCondition};

// Schema exports
pub use schema::{EntryRecord, EntryRecordAdapter, SCHEMA_VERSION};

/// moodmap version embedded in all view payloads
pub const MOODMAP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for view payloads
pub const PRODUCER_NAME: &str = "moodmap";
