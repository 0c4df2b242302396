//! Error types for moodmap

use thiserror::Error;

/// Errors raised by the outer surfaces of the engine (parsing, configuration,
/// encoding, upstream sources). The aggregation core itself never fails.
#[derive(Debug, Error)]
pub enum MoodError {
    #[error("Failed to parse entry payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Date parse error: {0}")]
    DateParseError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Invalid entry record: {0}")]
    InvalidRecord(String),

    #[error("Snapshot source error: {0}")]
    Source(#[from] SourceError),

    #[error("Async runtime unavailable: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by an external snapshot source instead of a snapshot.
///
/// These are never fatal: the adapter keeps its last good view and surfaces
/// the failure through `last_error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("snapshot decode failed: {0}")]
    Decode(String),
}

impl SourceError {
    /// Stable machine-readable kind, used in published views.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Fetch(_) => "fetch",
            SourceError::Unavailable(_) => "unavailable",
            SourceError::Decode(_) => "decode",
        }
    }
}
