//! Adapter for converting moodmap.entry.v1 records to entries
//!
//! Handles JSON arrays, NDJSON streams, and the snapshot lines consumed by the
//! `watch` command.

use crate::color::ColorInterpolator;
use crate::error::{MoodError, SourceError};
use crate::schema::entry_record::*;
use crate::types::Entry;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Adapter for converting entry records to [`Entry`] values
pub struct EntryRecordAdapter;

impl EntryRecordAdapter {
    /// Parse a JSON string containing an array of EntryRecords
    pub fn parse_array(json: &str) -> Result<Vec<EntryRecord>, MoodError> {
        let records: Vec<EntryRecord> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Parse NDJSON (newline-delimited JSON) containing EntryRecords
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<EntryRecord>, MoodError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<EntryRecord>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    return Err(MoodError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(records)
    }

    /// Validate every record, then convert them to entries.
    ///
    /// Fails on the first invalid record.
    pub fn to_entries(
        records: &[EntryRecord],
        interpolator: &ColorInterpolator,
    ) -> Result<Vec<Entry>, MoodError> {
        records
            .iter()
            .enumerate()
            .map(|(idx, record)| {
                record.validate().map_err(|e| {
                    MoodError::InvalidRecord(format!("record {}: {}", idx, e))
                })?;
                Ok(record.to_entry(idx, interpolator))
            })
            .collect()
    }

    /// Validate a batch of records, returning only the failures
    pub fn validate_records(records: &[EntryRecord]) -> Vec<ValidationResult> {
        records
            .iter()
            .enumerate()
            .filter_map(|(idx, record)| {
                record.validate().err().map(|error| ValidationResult {
                    index: idx,
                    id: record.id,
                    error,
                })
            })
            .collect()
    }

    /// Parse one snapshot line: either an array of records or a failure object
    pub fn parse_snapshot_line(
        line: &str,
        interpolator: &ColorInterpolator,
    ) -> Result<Result<Vec<Entry>, SourceError>, MoodError> {
        match serde_json::from_str::<SnapshotLine>(line.trim())? {
            SnapshotLine::Snapshot(records) => {
                Ok(Ok(Self::to_entries(&records, interpolator)?))
            }
            SnapshotLine::Failure { error } => Ok(Err(error.into())),
        }
    }
}

/// Failed validation of one record
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub index: usize,
    pub id: Option<Uuid>,
    pub error: ValidationError,
}

/// A line of a snapshot stream
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SnapshotLine {
    Snapshot(Vec<EntryRecord>),
    Failure { error: FailureRecord },
}

/// Upstream failure as written in a snapshot stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub kind: String,
    pub message: String,
}

impl From<FailureRecord> for SourceError {
    fn from(record: FailureRecord) -> Self {
        match record.kind.as_str() {
            "unavailable" => SourceError::Unavailable(record.message),
            "decode" => SourceError::Decode(record.message),
            _ => SourceError::Fetch(record.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_json(id: u128, ts: &str, value: f64) -> String {
        format!(
            r#"{{"schema_version":"moodmap.entry.v1","id":"{}","timestamp":"{}","mood_value":{}}}"#,
            Uuid::from_u128(id),
            ts,
            value
        )
    }

    #[test]
    fn test_parse_array() {
        let json = format!(
            "[{},{}]",
            record_json(1, "2024-03-10T08:00:00Z", 0.2),
            record_json(2, "2024-03-11T08:00:00Z", 0.8)
        );

        let records = EntryRecordAdapter::parse_array(&json).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, Some(Uuid::from_u128(2)));
    }

    #[test]
    fn test_parse_ndjson() {
        let ndjson = format!(
            "{}\n\n{}\n",
            record_json(1, "2024-03-10T08:00:00Z", 0.2),
            record_json(2, "2024-03-11T08:00:00Z", 0.8)
        );

        let records = EntryRecordAdapter::parse_ndjson(&ndjson).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_parse_ndjson_reports_line_number() {
        let ndjson = format!("{}\nnot json\n", record_json(1, "2024-03-10T08:00:00Z", 0.2));

        let err = EntryRecordAdapter::parse_ndjson(&ndjson).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn test_to_entries_rejects_invalid_record() {
        let mut records =
            EntryRecordAdapter::parse_array(&format!("[{}]", record_json(1, "2024-03-10T08:00:00Z", 0.2)))
                .unwrap();
        records[0].schema_version = "other".to_string();

        let result = EntryRecordAdapter::to_entries(&records, &ColorInterpolator::default());
        assert!(matches!(result, Err(MoodError::InvalidRecord(_))));

        let failures = EntryRecordAdapter::validate_records(&records);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].index, 0);
        assert_eq!(failures[0].id, Some(Uuid::from_u128(1)));
    }

    #[test]
    fn test_parse_snapshot_lines() {
        let interpolator = ColorInterpolator::default();

        let line = format!("[{}]", record_json(1, "2024-03-10T08:00:00Z", 0.2));
        let snapshot = EntryRecordAdapter::parse_snapshot_line(&line, &interpolator)
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.len(), 1);

        let empty = EntryRecordAdapter::parse_snapshot_line("[]", &interpolator)
            .unwrap()
            .unwrap();
        assert!(empty.is_empty());

        let failure = EntryRecordAdapter::parse_snapshot_line(
            r#"{"error":{"kind":"unavailable","message":"store locked"}}"#,
            &interpolator,
        )
        .unwrap();
        assert_eq!(
            failure,
            Err(SourceError::Unavailable("store locked".to_string()))
        );

        assert!(EntryRecordAdapter::parse_snapshot_line("{}", &interpolator).is_err());
    }
}
