//! Logging bootstrap
//!
//! The library logs through the `log` facade only. Binaries and FFI hosts call
//! [`init_logging`] once to install a `flexi_logger` backend: stderr when no
//! directory is given, size-rotated files otherwise.
//!
//! Initialization is idempotent for identical settings and rejects attempts to
//! switch level or target afterwards.

use crate::error::MoodError;
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::info;
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "moodmap";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 5 * 1024 * 1024;
const MAX_LOG_FILES: usize = 3;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();

/// Where log records go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    Directory(PathBuf),
}

impl std::fmt::Display for LogTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogTarget::Stderr => write!(f, "stderr"),
            LogTarget::Directory(dir) => write!(f, "{}", dir.display()),
        }
    }
}

struct LoggingState {
    level: &'static str,
    target: LogTarget,
    _logger: LoggerHandle,
}

/// Initialize logging with `level` and an optional absolute log directory.
pub fn init_logging(level: &str, log_dir: Option<&str>) -> Result<(), MoodError> {
    let level = normalize_level(level)?;
    let target = match log_dir {
        Some(dir) => LogTarget::Directory(normalize_log_dir(dir)?),
        None => LogTarget::Stderr,
    };

    let state = LOGGING_STATE.get_or_try_init(|| start_logger(level, &target))?;

    if state.target != target {
        return Err(MoodError::ConfigError(format!(
            "logging already initialized to `{}`; refusing to switch to `{}`",
            state.target, target
        )));
    }
    if state.level != level {
        return Err(MoodError::ConfigError(format!(
            "logging already initialized with level `{}`; refusing to switch to `{}`",
            state.level, level
        )));
    }
    Ok(())
}

/// Active `(level, target)`, or `None` before initialization
pub fn logging_status() -> Option<(&'static str, LogTarget)> {
    LOGGING_STATE
        .get()
        .map(|state| (state.level, state.target.clone()))
}

fn start_logger(level: &'static str, target: &LogTarget) -> Result<LoggingState, MoodError> {
    let logger = Logger::try_with_str(level)
        .map_err(|e| MoodError::ConfigError(format!("invalid log level `{level}`: {e}")))?;

    let logger = match target {
        LogTarget::Stderr => logger.log_to_stderr(),
        LogTarget::Directory(dir) => {
            std::fs::create_dir_all(dir)?;
            logger
                .log_to_file(
                    FileSpec::default()
                        .directory(dir.as_path())
                        .basename(LOG_FILE_BASENAME),
                )
                .rotate(
                    Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
                    Naming::Numbers,
                    Cleanup::KeepLogFiles(MAX_LOG_FILES),
                )
                .write_mode(WriteMode::BufferAndFlush)
                .append()
                .format_for_files(flexi_logger::detailed_format)
        }
    };

    let handle = logger
        .start()
        .map_err(|e| MoodError::ConfigError(format!("failed to start logger: {e}")))?;

    info!(
        "moodmap {} logging started: level={} target={}",
        env!("CARGO_PKG_VERSION"),
        level,
        target
    );

    Ok(LoggingState {
        level,
        target: target.clone(),
        _logger: handle,
    })
}

fn normalize_level(level: &str) -> Result<&'static str, MoodError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        "off" => Ok("off"),
        other => Err(MoodError::ConfigError(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error|off"
        ))),
    }
}

fn normalize_log_dir(log_dir: &str) -> Result<PathBuf, MoodError> {
    let trimmed = log_dir.trim();
    if trimmed.is_empty() {
        return Err(MoodError::ConfigError("log_dir cannot be empty".to_string()));
    }
    let path = Path::new(trimmed);
    if !path.is_absolute() {
        return Err(MoodError::ConfigError(format!(
            "log_dir must be an absolute path, got `{trimmed}`"
        )));
    }
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_level() {
        assert_eq!(normalize_level("INFO").unwrap(), "info");
        assert_eq!(normalize_level(" warning ").unwrap(), "warn");
        assert!(normalize_level("verbose").is_err());
    }

    #[test]
    fn test_normalize_log_dir_rejects_relative_path() {
        let err = normalize_log_dir("logs/dev").unwrap_err();
        assert!(err.to_string().contains("absolute"));
        assert!(normalize_log_dir("  ").is_err());
    }

    // The only test that installs the global logger
    #[test]
    fn test_init_logging_is_idempotent_and_rejects_conflicts() {
        let dir = std::env::temp_dir().join(format!("moodmap-logging-{}", std::process::id()));
        let dir_str = dir.to_str().unwrap().to_string();

        init_logging("info", Some(&dir_str)).unwrap();
        init_logging("info", Some(&dir_str)).unwrap();

        let err = init_logging("debug", Some(&dir_str)).unwrap_err();
        assert!(err.to_string().contains("refusing to switch"));

        let err = init_logging("info", None).unwrap_err();
        assert!(err.to_string().contains("refusing to switch"));

        let (level, target) = logging_status().unwrap();
        assert_eq!(level, "info");
        assert_eq!(target, LogTarget::Directory(dir));
    }
}
