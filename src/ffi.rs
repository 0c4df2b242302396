//! FFI bindings for moodmap
//!
//! This module provides C-compatible functions for calling moodmap from other
//! languages. All functions use C strings (null-terminated) and return allocated
//! memory that must be freed by the caller using `moodmap_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::{DateTime, Utc};

use crate::calendar::FixedClock;
use crate::classifier::MoodClassifier;
use crate::config::EngineConfig;
use crate::encoder::ViewEncoder;
use crate::error::{MoodError, SourceError};
use crate::logging::init_logging;
use crate::pipeline::{entries_to_view_json, MoodProcessor};
use crate::schema::{EntryRecord, EntryRecordAdapter, FailureRecord};
use crate::types::MoodCategory;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

unsafe fn required_str(ptr: *const c_char, what: &str) -> Result<String, MoodError> {
    cstr_to_string(ptr).ok_or_else(|| MoodError::MissingField(format!("Invalid {what} string pointer")))
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// NULL selects the default configuration
unsafe fn config_from_ptr(config_json: *const c_char) -> Result<EngineConfig, MoodError> {
    match cstr_to_string(config_json) {
        Some(json) => EngineConfig::from_json(&json),
        None => Ok(EngineConfig::default()),
    }
}

/// NULL selects the current wall-clock time
unsafe fn now_from_ptr(now_rfc3339: *const c_char) -> Result<DateTime<Utc>, MoodError> {
    match cstr_to_string(now_rfc3339) {
        Some(now) => DateTime::parse_from_rfc3339(now.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| MoodError::DateParseError(format!("invalid now `{now}`: {e}"))),
        None => Ok(Utc::now()),
    }
}

fn string_result(result: Result<String, MoodError>) -> *mut c_char {
    match result {
        Ok(s) => string_to_cstr(&s),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

fn status_result(result: Result<(), MoodError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Aggregate a JSON array of moodmap.entry.v1 records into an encoded view.
///
/// # Safety
/// - `records_json` must be a valid null-terminated C string.
/// - `config_json` and `now_rfc3339` may be NULL (defaults / wall clock).
/// - Returns a newly allocated string that must be freed with `moodmap_free_string`.
/// - Returns NULL on error; call `moodmap_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn moodmap_entries_to_view(
    records_json: *const c_char,
    config_json: *const c_char,
    now_rfc3339: *const c_char,
) -> *mut c_char {
    clear_last_error();

    string_result((|| -> Result<String, MoodError> {
        let records = required_str(records_json, "records JSON")?;
        let config = config_from_ptr(config_json)?;
        let now = now_from_ptr(now_rfc3339)?;
        entries_to_view_json(&records, &config, now, None)
    })())
}

/// Color for a mood value as JSON `{"red","green","blue","hex"}`.
///
/// # Safety
/// - `config_json` may be NULL for the default palette.
/// - Returns a newly allocated string that must be freed with `moodmap_free_string`.
#[no_mangle]
pub unsafe extern "C" fn moodmap_color_for_value(
    value: f64,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    string_result((|| -> Result<String, MoodError> {
        let interpolator = config_from_ptr(config_json)?.interpolator()?;
        let color = interpolator.color(value);
        let json = serde_json::json!({
            "red": color.red,
            "green": color.green,
            "blue": color.blue,
            "hex": color.to_hex(),
        });
        Ok(json.to_string())
    })())
}

/// Classify a mood value.
///
/// Returns 0 (terrible) through 4 (awesome), or -1 when the value is outside
/// `[0, 1]` or NaN.
#[no_mangle]
pub extern "C" fn moodmap_classify(value: f64) -> i32 {
    match MoodClassifier::classify(value) {
        Some(category) => MoodCategory::ALL
            .iter()
            .position(|c| *c == category)
            .map_or(-1, |i| i as i32),
        None => -1,
    }
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a MoodProcessor
pub struct MoodProcessorHandle {
    processor: MoodProcessor,
    encoder: ViewEncoder,
}

/// Create a new processor.
///
/// # Safety
/// - `config_json` may be NULL for defaults.
/// - `now_rfc3339` may be NULL to use the wall clock.
/// - Must be freed with `moodmap_processor_free`.
/// - Returns NULL on error; call `moodmap_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn moodmap_processor_new(
    config_json: *const c_char,
    now_rfc3339: *const c_char,
) -> *mut MoodProcessorHandle {
    clear_last_error();

    let result = (|| -> Result<MoodProcessor, MoodError> {
        let config = config_from_ptr(config_json)?;
        let now = now_from_ptr(now_rfc3339)?;
        MoodProcessor::from_config(&config, &FixedClock(now))
    })();

    match result {
        Ok(processor) => Box::into_raw(Box::new(MoodProcessorHandle {
            processor,
            encoder: ViewEncoder::new(),
        })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `moodmap_processor_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn moodmap_processor_free(processor: *mut MoodProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

unsafe fn handle_mut<'a>(
    processor: *mut MoodProcessorHandle,
) -> Result<&'a mut MoodProcessorHandle, MoodError> {
    processor
        .as_mut()
        .ok_or_else(|| MoodError::MissingField("Null processor pointer".to_string()))
}

/// Replace the processor's data with a JSON array of entry records.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `moodmap_processor_new`.
/// - `records_json` must be a valid null-terminated C string.
/// - Returns 0 on success, -1 on error (see `moodmap_last_error`).
#[no_mangle]
pub unsafe extern "C" fn moodmap_processor_apply_snapshot(
    processor: *mut MoodProcessorHandle,
    records_json: *const c_char,
) -> i32 {
    clear_last_error();

    status_result((|| -> Result<(), MoodError> {
        let handle = handle_mut(processor)?;
        let json = required_str(records_json, "records JSON")?;
        let records = EntryRecordAdapter::parse_array(&json)?;
        let entries = EntryRecordAdapter::to_entries(&records, handle.processor.interpolator())?;
        handle.processor.apply_snapshot(entries);
        Ok(())
    })())
}

/// Record an upstream failure. `kind` is `fetch`, `unavailable` or `decode`.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `moodmap_processor_new`.
/// - `kind` and `message` must be valid null-terminated C strings.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn moodmap_processor_report_failure(
    processor: *mut MoodProcessorHandle,
    kind: *const c_char,
    message: *const c_char,
) -> i32 {
    clear_last_error();

    status_result((|| -> Result<(), MoodError> {
        let handle = handle_mut(processor)?;
        let failure = FailureRecord {
            kind: required_str(kind, "kind")?,
            message: required_str(message, "message")?,
        };
        handle.processor.report_failure(&SourceError::from(failure));
        Ok(())
    })())
}

/// Insert or replace one entry given as a single moodmap.entry.v1 JSON object.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `moodmap_processor_new`.
/// - `record_json` must be a valid null-terminated C string.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn moodmap_processor_insert(
    processor: *mut MoodProcessorHandle,
    record_json: *const c_char,
) -> i32 {
    clear_last_error();

    status_result((|| -> Result<(), MoodError> {
        let handle = handle_mut(processor)?;
        let json = required_str(record_json, "record JSON")?;
        let record: EntryRecord = serde_json::from_str(&json)?;
        let mut entries =
            EntryRecordAdapter::to_entries(std::slice::from_ref(&record), handle.processor.interpolator())?;
        if let Some(entry) = entries.pop() {
            handle.processor.insert_one(entry);
        }
        Ok(())
    })())
}

/// Move the cursor to the next month.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `moodmap_processor_new`.
/// - Returns 0 on success (including a no-op at the end), -1 on error.
#[no_mangle]
pub unsafe extern "C" fn moodmap_processor_next_month(processor: *mut MoodProcessorHandle) -> i32 {
    clear_last_error();
    status_result(handle_mut(processor).map(|h| h.processor.next_month()))
}

/// Move the cursor to the previous month with data.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `moodmap_processor_new`.
/// - Returns 0 on success (including a no-op at the start), -1 on error.
#[no_mangle]
pub unsafe extern "C" fn moodmap_processor_prev_month(processor: *mut MoodProcessorHandle) -> i32 {
    clear_last_error();
    status_result(handle_mut(processor).map(|h| h.processor.prev_month()))
}

/// Current view as an encoded moodmap.view.v1 payload.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `moodmap_processor_new`.
/// - Returns a newly allocated string that must be freed with `moodmap_free_string`.
/// - Returns NULL on error.
#[no_mangle]
pub unsafe extern "C" fn moodmap_processor_view(processor: *mut MoodProcessorHandle) -> *mut c_char {
    clear_last_error();

    string_result((|| -> Result<String, MoodError> {
        let handle = handle_mut(processor)?;
        handle.encoder.encode_to_json(&handle.processor.view())
    })())
}

// ============================================================================
// Logging
// ============================================================================

/// Initialize logging once per process.
///
/// # Safety
/// - `level` must be a valid null-terminated C string.
/// - `log_dir` may be NULL to log to stderr; otherwise an absolute path.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn moodmap_init_logging(level: *const c_char, log_dir: *const c_char) -> i32 {
    clear_last_error();

    status_result((|| -> Result<(), MoodError> {
        let level = required_str(level, "level")?;
        let log_dir = cstr_to_string(log_dir);
        init_logging(&level, log_dir.as_deref())
    })())
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by moodmap functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a moodmap function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn moodmap_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next moodmap function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn moodmap_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the moodmap library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn moodmap_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
