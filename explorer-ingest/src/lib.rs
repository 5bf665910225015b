//! CSV ingestion for exported conversation traces
//!
//! The export has one row per trace. `input` and `output` hold JSON objects
//! with a `messages` array; the output usually repeats the whole thread, so
//! output turns whose text was already seen are skipped. Rows without any
//! conversation are dropped, malformed rows are logged and skipped.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use explorer_core::{Message, Role, Trace};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("No CSV export found in {0}")]
    NoExport(String),
}

/// Why a single row was rejected.
#[derive(Error, Debug)]
enum RowError {
    #[error("invalid JSON in `{field}`: {source}")]
    Json {
        field: &'static str,
        source: serde_json::Error,
    },

    #[error("unparseable timestamp {0:?}")]
    Timestamp(String),

    #[error("invalid number in `{field}`: {value:?}")]
    Number { field: &'static str, value: String },
}

/// One raw export row. Every column is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ExportRow {
    id: String,
    timestamp: String,
    name: String,
    #[serde(rename = "sessionId")]
    session_id: String,
    #[serde(rename = "userId")]
    user_id: String,
    input: String,
    output: String,
    latency: String,
    #[serde(rename = "inputTokens")]
    input_tokens: String,
    #[serde(rename = "outputTokens")]
    output_tokens: String,
    #[serde(rename = "totalCost")]
    total_cost: String,
    #[serde(rename = "errorCount")]
    error_count: String,
}

/// Pick the export to load from `dir`: a `.csv` whose name mentions "trace",
/// otherwise the first `.csv` in name order.
pub fn discover_csv(dir: &Path) -> Result<PathBuf, IngestError> {
    let mut csvs: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .collect();
    csvs.sort();

    let preferred = csvs.iter().find(|p| {
        p.file_name()
            .map(|n| n.to_string_lossy().to_lowercase().contains("trace"))
            .unwrap_or(false)
    });

    preferred
        .or_else(|| csvs.first())
        .cloned()
        .ok_or_else(|| IngestError::NoExport(dir.display().to_string()))
}

/// Parse an export file into traces.
pub fn parse_traces(path: &Path) -> Result<Vec<Trace>, IngestError> {
    let file = File::open(path)?;
    let traces = parse_traces_from_reader(file)?;
    tracing::info!(
        path = %path.display(),
        count = traces.len(),
        "Loaded traces from CSV export"
    );
    Ok(traces)
}

/// Parse export rows from any reader.
pub fn parse_traces_from_reader<R: Read>(reader: R) -> Result<Vec<Trace>, IngestError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut traces = Vec::new();

    for (line, record) in csv_reader.deserialize::<ExportRow>().enumerate() {
        let row = match record {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(row = line + 1, error = %e, "Skipping unreadable CSV row");
                continue;
            }
        };

        match parse_row(row) {
            Ok(Some(trace)) => traces.push(trace),
            Ok(None) => {}
            Err(e) => tracing::warn!(row = line + 1, error = %e, "Error parsing trace"),
        }
    }

    Ok(traces)
}

fn parse_row(row: ExportRow) -> Result<Option<Trace>, RowError> {
    let input = parse_json_column("input", &row.input)?;
    let output = parse_json_column("output", &row.output)?;

    let mut conversation: Vec<Message> = Vec::new();

    for msg in messages(&input) {
        if let Some(Value::String(content)) = msg.get("content") {
            if !content.is_empty() {
                conversation.push(Message::new(role_of(msg, "human"), content.clone()));
            }
        }
    }

    for msg in messages(&output) {
        let content = message_text(msg.get("content"));
        if content.is_empty() || conversation.iter().any(|m| m.content == content) {
            continue;
        }
        conversation.push(Message::new(role_of(msg, "ai"), content));
    }

    if conversation.is_empty() {
        return Ok(None);
    }

    let timestamp = match parse_timestamp(&row.timestamp) {
        Ok(ts) => ts,
        Err(e) => {
            tracing::warn!(trace_id = %row.id, error = %e, "Unreadable timestamp, using the Unix epoch");
            DateTime::<Utc>::default()
        }
    };
    let mut trace = Trace::new(row.id, timestamp, conversation);
    trace.name = row.name;
    trace.session_id = non_empty(row.session_id);
    trace.user_id = non_empty(row.user_id);
    trace.latency = parse_number("latency", &row.latency)?;
    trace.input_tokens = parse_number::<f64>("inputTokens", &row.input_tokens)? as u64;
    trace.output_tokens = parse_number::<f64>("outputTokens", &row.output_tokens)? as u64;
    trace.total_cost = parse_number("totalCost", &row.total_cost)?;
    trace.error_count = parse_number::<f64>("errorCount", &row.error_count)? as u64;

    Ok(Some(trace))
}

fn parse_json_column(field: &'static str, raw: &str) -> Result<Value, RowError> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw).map_err(|source| RowError::Json { field, source })
}

fn messages(payload: &Value) -> impl Iterator<Item = &Value> {
    payload
        .get("messages")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn role_of(msg: &Value, default: &str) -> Role {
    let raw = msg.get("type").and_then(Value::as_str).unwrap_or(default);
    Role::from(raw.to_string())
}

/// Content is either a string or a list of parts; only `text` parts count.
fn message_text(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RowError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(RowError::Timestamp(raw.to_string()))
}

fn parse_number<T: std::str::FromStr + Default>(
    field: &'static str,
    raw: &str,
) -> Result<T, RowError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(T::default());
    }
    raw.parse().map_err(|_| RowError::Number {
        field,
        value: raw.to_string(),
    })
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
