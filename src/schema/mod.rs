//! moodmap.entry.v1 input schema
//!
//! Storage-agnostic journal entry records, accepted as JSON arrays or NDJSON.

mod entry_record;
mod adapter;

pub use entry_record::*;
pub use adapter::*;
