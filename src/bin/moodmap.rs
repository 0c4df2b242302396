//! moodmap CLI - Command-line interface for the mood aggregation engine
//!
//! Commands:
//! - aggregate: Turn entry records into an encoded calendar view (batch mode)
//! - watch: Feed NDJSON snapshots from stdin through the stream adapter
//! - color / classify: Inspect the color and category of a single mood value
//! - validate: Validate entry records against the input schema
//! - doctor: Diagnose configuration and environment

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moodmap::encoder::{ViewEncoder, VIEW_VERSION};
use moodmap::logging::init_logging;
use moodmap::schema::{EntryRecord, EntryRecordAdapter, SCHEMA_VERSION};
use moodmap::{
    EngineConfig, EntryStreamAdapter, FixedClock, MemorySource, MonthKey, MoodClassifier,
    MoodError, MoodProcessor, SnapshotQuery, MOODMAP_VERSION, PRODUCER_NAME,
};

/// How long `watch` waits for a snapshot to be published before giving up
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// moodmap - On-device mood aggregation and color-mapping engine
#[derive(Parser)]
#[command(name = "moodmap")]
#[command(author = "MyMood Contributors")]
#[command(version = MOODMAP_VERSION)]
#[command(about = "Aggregate mood entries into a colored calendar view", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Write rotating log files to this absolute directory instead of stderr
    #[arg(long, global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate entry records into a view (batch mode)
    Aggregate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,

        /// Engine configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Instant treated as now (RFC 3339), defaults to the system clock
        #[arg(long)]
        now: Option<String>,

        /// Month to display (YYYY-MM) instead of the current one
        #[arg(long)]
        month: Option<String>,
    },

    /// Read snapshot lines from stdin and print one view per line (streaming mode)
    ///
    /// Each line is either a JSON array of entry records or a failure object
    /// such as {"error": {"kind": "unavailable", "message": "..."}}.
    Watch {
        /// Engine configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Instant treated as now (RFC 3339), defaults to the system clock
        #[arg(long)]
        now: Option<String>,

        /// Flush stdout after every view
        #[arg(long)]
        flush: bool,
    },

    /// Print the color for a mood value
    Color {
        /// Mood value on the configured scale
        #[arg(allow_hyphen_values = true)]
        value: f64,

        /// Engine configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the mood category for a value on the unit scale
    Classify {
        #[arg(allow_hyphen_values = true)]
        value: f64,
    },

    /// Validate entry records
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Engine configuration file to check
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema type to display
        #[arg(default_value = "input")]
        schema_type: SchemaType,

        /// Output as JSON Schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Compact JSON on one line
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, Copy, ValueEnum)]
enum SchemaType {
    /// Input schema (moodmap.entry.v1)
    Input,
    /// Output schema (moodmap.view.v1)
    Output,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let error = CliError::from(e);
            let json = serde_json::to_string(&error).unwrap_or_else(|_| {
                format!(r#"{{"code":"{}","message":"{}"}}"#, error.code, error.message)
            });
            eprintln!("{}", json);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), MoodCliError> {
    init_logging(&cli.log_level, cli.log_dir.as_deref())?;

    match cli.command {
        Commands::Aggregate {
            input,
            output,
            input_format,
            output_format,
            config,
            now,
            month,
        } => cmd_aggregate(
            &input,
            &output,
            input_format,
            output_format,
            config.as_deref(),
            now.as_deref(),
            month.as_deref(),
        ),
        Commands::Watch { config, now, flush } => {
            cmd_watch(config.as_deref(), now.as_deref(), flush)
        }
        Commands::Color { value, config } => cmd_color(value, config.as_deref()),
        Commands::Classify { value } => cmd_classify(value),
        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),
        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

fn cmd_aggregate(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: Option<&Path>,
    now: Option<&str>,
    month: Option<&str>,
) -> Result<(), MoodCliError> {
    let config = load_config(config)?;
    let now = parse_now(now)?;
    let records = read_records(input, input_format)?;

    let mut processor = MoodProcessor::from_config(&config, &FixedClock(now))?;
    let entries = EntryRecordAdapter::to_entries(&records, processor.interpolator())?;
    processor.apply_snapshot(entries);

    if let Some(month) = month {
        let month: MonthKey = month.parse()?;
        if !processor.select_month(month) {
            return Err(MoodCliError::UnreachableMonth(month));
        }
    }

    let payload = ViewEncoder::new().encode(&processor.view());
    let rendered = match output_format {
        OutputFormat::Json => serde_json::to_string(&payload)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&payload)?,
    };

    if output.to_string_lossy() == "-" {
        let mut stdout = io::stdout();
        writeln!(stdout, "{}", rendered)?;
    } else {
        fs::write(output, rendered + "\n")?;
    }

    Ok(())
}

fn cmd_watch(config: Option<&Path>, now: Option<&str>, flush: bool) -> Result<(), MoodCliError> {
    let config = load_config(config)?;
    let now = parse_now(now)?;
    let processor = MoodProcessor::from_config(&config, &FixedClock(now))?;
    let interpolator = processor.interpolator().clone();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let source = MemorySource::default();
        let mut adapter = EntryStreamAdapter::new(processor);
        let mut views = adapter.views();
        adapter.subscribe(&source, SnapshotQuery::All)?;

        // Initial (empty) snapshot delivered on subscribe
        wait_for_view(&mut views).await?;

        let encoder = ViewEncoder::new();
        let stdin = io::stdin();
        let mut stdout = io::stdout();

        for (idx, line) in stdin.lock().lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let item = EntryRecordAdapter::parse_snapshot_line(&line, &interpolator).map_err(
                |e| MoodCliError::ParseError(format!("Failed to parse line {}: {}", idx + 1, e)),
            )?;
            match item {
                Ok(entries) => source.replace_all(entries).await,
                Err(error) => source.fail(error).await,
            }

            wait_for_view(&mut views).await?;
            let view = views.borrow_and_update().clone();
            writeln!(stdout, "{}", serde_json::to_string(&encoder.encode(&view))?)?;
            if flush {
                stdout.flush()?;
            }
        }

        adapter.shutdown().await;
        stdout.flush()?;
        Ok::<(), MoodCliError>(())
    })
}

async fn wait_for_view(
    views: &mut tokio::sync::watch::Receiver<moodmap::MoodView>,
) -> Result<(), MoodCliError> {
    match tokio::time::timeout(PUBLISH_TIMEOUT, views.changed()).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) => Err(MoodCliError::StreamClosed),
        Err(_) => Err(MoodCliError::StreamTimeout),
    }
}

fn cmd_color(value: f64, config: Option<&Path>) -> Result<(), MoodCliError> {
    let config = load_config(config)?;
    let interpolator = config.interpolator()?;
    let color = interpolator.color(value);

    let report = ColorReport {
        value,
        red: color.red,
        green: color.green,
        blue: color.blue,
        hex: color.to_hex(),
        category: MoodClassifier::classify(value).map(|c| c.as_str().to_string()),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_classify(value: f64) -> Result<(), MoodCliError> {
    println!("{}", classify_label(value));
    Ok(())
}

/// Category name, or `unclassified` outside the unit range
fn classify_label(value: f64) -> &'static str {
    MoodClassifier::classify(value).map_or("unclassified", |category| category.as_str())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), MoodCliError> {
    let records = read_records(input, input_format)?;
    let results = EntryRecordAdapter::validate_records(&records);

    let report = ValidationReport {
        total_records: records.len(),
        valid_records: records.len() - results.len(),
        invalid_records: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                id: r.id.map(|id| id.to_string()),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Record {} (index {}): {}",
                    err.id.as_deref().unwrap_or("without id"),
                    err.index,
                    err.error
                );
            }
        }
    }

    if report.invalid_records > 0 {
        Err(MoodCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), MoodCliError> {
    let mut checks: Vec<DoctorCheck> = vec![
        DoctorCheck::ok("moodmap_version", format!("moodmap version {}", MOODMAP_VERSION)),
        DoctorCheck::ok("schema_version", format!("Input schema: {}", SCHEMA_VERSION)),
        DoctorCheck::ok("view_version", format!("Output schema: {}", VIEW_VERSION)),
    ];

    match config {
        Some(path) if !path.exists() => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: format!("Config file {} does not exist", path.display()),
        }),
        Some(path) => {
            let loaded = fs::read_to_string(path)
                .map_err(MoodError::from)
                .and_then(|content| EngineConfig::from_json(&content));
            match loaded {
                Ok(config) => {
                    checks.push(DoctorCheck::ok(
                        "config",
                        format!(
                            "Config valid (timezone {}, scale max {})",
                            config.timezone, config.scale_max
                        ),
                    ));
                }
                Err(e) => checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: e.to_string(),
                }),
            }
        }
        None => checks.push(DoctorCheck::ok(
            "config",
            "Using default palette and UTC calendar".to_string(),
        )),
    }

    let stdin_message = if atty::is(atty::Stream::Stdin) {
        "stdin is a TTY (interactive mode)"
    } else {
        "stdin is a pipe (watch mode ready)"
    };
    checks.push(DoctorCheck::ok("stdin", stdin_message.to_string()));

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: MOODMAP_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("moodmap Doctor Report");
        println!("=====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(MoodCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), MoodCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input Schema: {}", SCHEMA_VERSION);
                println!();
                println!("Each record describes one journal entry:");
                println!();
                println!("- schema_version: must be {}", SCHEMA_VERSION);
                println!("- id: UUID (optional, generated when missing)");
                println!("- timestamp: RFC 3339 instant");
                println!("- mood_value: finite number, 0.0 (worst) to 1.0 (best)");
                println!("- note: free text (optional)");
                println!("- activities: list of activity ids (optional)");
                println!("- weather or weather_code: condition name or WMO code (optional)");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", get_output_json_schema());
            } else {
                println!("Output Schema: {}", VIEW_VERSION);
                println!();
                println!("- view_version: Schema version");
                println!("- producer: {{ name, version, instance_id }}");
                println!("- computed_at_utc: RFC 3339 instant");
                println!("- summary: {{ entry_count, month_count, visible_entry_count, ... }}");
                println!("- view:");
                println!("  - index: months keyed YYYY-MM, each with days keyed YYYY-MM-DD");
                println!("  - sorted_month_keys: months with data, ascending");
                println!("  - cursor: {{ current_month, now_month, prev_enabled, next_enabled }}");
                println!("  - visible_month: bucket of the current month, if it has data");
                println!("  - background_color: {{ red, green, blue }}");
                println!("  - last_error: {{ kind, message }} after an upstream failure");
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, MoodCliError> {
    match path {
        Some(path) => Ok(EngineConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(EngineConfig::default()),
    }
}

fn parse_now(now: Option<&str>) -> Result<DateTime<Utc>, MoodCliError> {
    match now {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| MoodCliError::ParseError(format!("Invalid --now `{}`: {}", raw, e))),
        None => Ok(Utc::now()),
    }
}

fn read_records(input: &Path, format: InputFormat) -> Result<Vec<EntryRecord>, MoodCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let records = match format {
        InputFormat::Ndjson => EntryRecordAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => EntryRecordAdapter::parse_array(&input_data)?,
    };
    Ok(records)
}

fn get_input_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": SCHEMA_VERSION,
        "description": "moodmap journal entry record",
        "type": "object",
        "required": ["schema_version", "timestamp", "mood_value"],
        "properties": {
            "schema_version": { "type": "string", "const": SCHEMA_VERSION },
            "id": { "type": "string", "format": "uuid" },
            "timestamp": { "type": "string", "format": "date-time" },
            "mood_value": { "type": "number" },
            "note": { "type": "string" },
            "activities": { "type": "array", "items": { "type": "string" } },
            "weather": {
                "type": "string",
                "enum": ["sunny", "cloudy", "overcast", "rainy", "snowy"]
            },
            "weather_code": { "type": "integer", "minimum": 0 }
        }
    })
    .to_string()
}

fn get_output_json_schema() -> String {
    let rgb = serde_json::json!({
        "type": "object",
        "properties": {
            "red": { "type": "number" },
            "green": { "type": "number" },
            "blue": { "type": "number" }
        }
    });

    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": VIEW_VERSION,
        "description": "moodmap calendar view",
        "type": "object",
        "required": ["view_version", "producer", "computed_at_utc", "summary", "view"],
        "properties": {
            "view_version": { "type": "string" },
            "producer": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "version": { "type": "string" },
                    "instance_id": { "type": "string" }
                }
            },
            "computed_at_utc": { "type": "string" },
            "summary": { "type": "object" },
            "view": {
                "type": "object",
                "required": ["index", "sorted_month_keys", "cursor", "background_color"],
                "properties": {
                    "index": { "type": "object" },
                    "sorted_month_keys": { "type": "array", "items": { "type": "string" } },
                    "cursor": {
                        "type": "object",
                        "properties": {
                            "current_month": { "type": "string" },
                            "now_month": { "type": "string" },
                            "prev_enabled": { "type": "boolean" },
                            "next_enabled": { "type": "boolean" }
                        }
                    },
                    "visible_month": { "type": ["object", "null"] },
                    "background_color": rgb,
                    "last_error": { "type": ["object", "null"] }
                }
            }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum MoodCliError {
    Io(io::Error),
    Mood(MoodError),
    Json(serde_json::Error),
    ParseError(String),
    UnreachableMonth(MonthKey),
    ValidationFailed(usize),
    DoctorFailed,
    StreamClosed,
    StreamTimeout,
}

impl From<io::Error> for MoodCliError {
    fn from(e: io::Error) -> Self {
        MoodCliError::Io(e)
    }
}

impl From<MoodError> for MoodCliError {
    fn from(e: MoodError) -> Self {
        MoodCliError::Mood(e)
    }
}

impl From<serde_json::Error> for MoodCliError {
    fn from(e: serde_json::Error) -> Self {
        MoodCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<MoodCliError> for CliError {
    fn from(e: MoodCliError) -> Self {
        match e {
            MoodCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            MoodCliError::Mood(MoodError::ConfigError(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'moodmap doctor --config <file>' for details".to_string()),
            },
            MoodCliError::Mood(MoodError::InvalidTimezone(tz)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: format!("Invalid timezone: {}", tz),
                hint: Some("Use UTC or a fixed offset such as +02:00".to_string()),
            },
            MoodCliError::Mood(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(format!("Ensure input matches {} schema", SCHEMA_VERSION)),
            },
            MoodCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            MoodCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
            MoodCliError::UnreachableMonth(month) => CliError {
                code: "UNREACHABLE_MONTH".to_string(),
                message: format!("Month {} has no entries and is not the current month", month),
                hint: Some("Pick a month listed in sorted_month_keys".to_string()),
            },
            MoodCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            MoodCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            MoodCliError::StreamClosed => CliError {
                code: "STREAM_CLOSED".to_string(),
                message: "View channel closed unexpectedly".to_string(),
                hint: None,
            },
            MoodCliError::StreamTimeout => CliError {
                code: "STREAM_TIMEOUT".to_string(),
                message: "Snapshot was not published in time".to_string(),
                hint: Some("Re-run with --log-level debug".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ColorReport {
    value: f64,
    red: f64,
    green: f64,
    blue: f64,
    hex: String,
    category: Option<String>,
}

#[derive(serde::Serialize)]
struct ValidationReport {
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    id: Option<String>,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

impl DoctorCheck {
    fn ok(name: &str, message: String) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message,
        }
    }
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_label() {
        assert_eq!(classify_label(0.65), "good");
        assert_eq!(classify_label(1.0), "awesome");
        assert_eq!(classify_label(1.2), "unclassified");
        assert_eq!(classify_label(-0.1), "unclassified");
        assert_eq!(classify_label(f64::NAN), "unclassified");
    }
}
