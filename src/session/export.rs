//! Flattening the session log into CSV-compatible rows.
//!
//! `to_rows` is pure data shaping; the file writer below it is the
//! only part of the session that touches disk.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::SecondsFormat;
use serde::Serialize;
use thiserror::Error;

use super::{SessionEntry, SessionLog};
use crate::tracker::DowntimeInterval;

/// Export error types.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub const CSV_HEADER: &str =
    "timestamp,server_name,server_type,status,response_time_ms,error_message,downtime_periods_json";

/// One flat export row.
#[derive(Debug, Clone)]
pub struct ExportRow {
    pub timestamp: String,
    pub server_name: String,
    pub server_type: String,
    pub status: String,
    pub response_time_ms: u64,
    pub error_message: String,
    pub downtime_periods_json: String,
}

/// Wire shape of one downtime period in the export column. A null
/// `endTime` is the explicit sentinel for an open interval.
#[derive(Serialize)]
struct Period {
    #[serde(rename = "startTime")]
    start_time: i64,
    #[serde(rename = "endTime")]
    end_time: Option<i64>,
}

/// Flatten the session log, preserving insertion order.
pub fn to_rows(log: &SessionLog) -> Result<Vec<ExportRow>, ExportError> {
    log.entries().iter().map(row_for).collect()
}

fn row_for(entry: &SessionEntry) -> Result<ExportRow, ExportError> {
    Ok(ExportRow {
        timestamp: entry.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        server_name: entry.target_name.clone(),
        server_type: entry.engine.clone(),
        status: entry.status.to_string(),
        response_time_ms: entry.elapsed_ms,
        error_message: entry.error.clone().unwrap_or_default(),
        downtime_periods_json: periods_json(&entry.downtime_snapshot)?,
    })
}

fn periods_json(intervals: &[DowntimeInterval]) -> Result<String, ExportError> {
    let periods: Vec<Period> = intervals
        .iter()
        .map(|i| Period {
            start_time: i.start.timestamp_millis(),
            end_time: i.end.map(|e| e.timestamp_millis()),
        })
        .collect();
    Ok(serde_json::to_string(&periods)?)
}

/// Write the header and all rows as CSV.
pub fn write_csv<W: Write>(rows: &[ExportRow], mut out: W) -> Result<(), ExportError> {
    writeln!(out, "{}", CSV_HEADER)?;
    for row in rows {
        writeln!(
            out,
            "{},{},{},{},{},{},{}",
            escape(&row.timestamp),
            escape(&row.server_name),
            escape(&row.server_type),
            row.status,
            row.response_time_ms,
            escape(&row.error_message),
            escape(&row.downtime_periods_json),
        )?;
    }
    Ok(())
}

/// Export the full session log to a CSV file, returning the row count.
pub fn export_to_file<P: AsRef<Path>>(log: &SessionLog, path: P) -> Result<usize, ExportError> {
    let rows = to_rows(log)?;
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);
    write_csv(&rows, &mut out)?;
    out.flush()?;
    Ok(rows.len())
}

/// Quote a field when it contains a delimiter, quote or newline.
fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProbeOutcome, Target};
    use crate::tracker::TargetState;
    use chrono::{DateTime, Utc};

    fn ts(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    fn target(name: &str) -> Target {
        Target {
            name: name.to_string(),
            engine: "mysql".to_string(),
            host: "localhost".to_string(),
            port: 3306,
            database: String::new(),
            user: String::new(),
            password: String::new(),
            tls_required: false,
        }
    }

    fn sample_log() -> SessionLog {
        let target = target("replica");
        let mut state = TargetState::new();
        let mut log = SessionLog::new();

        let down = ProbeOutcome::down(7, "connection refused");
        state.apply(down.status, ts(1000));
        log.record(&target, &down, &state, ts(1000));

        let up = ProbeOutcome::up(3);
        state.apply(up.status, ts(2000));
        log.record(&target, &up, &state, ts(2000));

        log
    }

    #[test]
    fn test_rows_preserve_insertion_order() {
        let log = sample_log();
        let rows = to_rows(&log).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].status, "DOWN");
        assert_eq!(rows[1].status, "UP");
        assert_eq!(rows[0].server_name, "replica");
        assert_eq!(rows[0].server_type, "mysql");
        assert_eq!(rows[0].error_message, "connection refused");
        assert_eq!(rows[1].error_message, "");
    }

    #[test]
    fn test_open_interval_serializes_null_end() {
        let log = sample_log();
        let rows = to_rows(&log).unwrap();
        // First entry was recorded while the interval was still open.
        assert_eq!(
            rows[0].downtime_periods_json,
            r#"[{"startTime":1000,"endTime":null}]"#
        );
        assert_eq!(
            rows[1].downtime_periods_json,
            r#"[{"startTime":1000,"endTime":2000}]"#
        );
    }

    #[test]
    fn test_timestamp_is_rfc3339() {
        let rows = to_rows(&sample_log()).unwrap();
        assert_eq!(rows[0].timestamp, "1970-01-01T00:00:01.000Z");
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn test_write_csv_quotes_json_column() {
        let rows = to_rows(&sample_log()).unwrap();
        let mut buf = Vec::new();
        write_csv(&rows, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        // The JSON column contains commas, so it must be quoted.
        let first = lines.next().unwrap();
        assert!(first.ends_with(r#""[{""startTime"":1000,""endTime"":null}]""#));
        assert_eq!(lines.count(), 1);
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.csv");
        let log = sample_log();

        let written = export_to_file(&log, &path).unwrap();
        assert_eq!(written, 2);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3); // header + 2 rows
        assert!(text.starts_with(CSV_HEADER));
    }

    #[test]
    fn test_empty_log_exports_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        let written = export_to_file(&SessionLog::new(), &path).unwrap();
        assert_eq!(written, 0);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_end(), CSV_HEADER);
    }
}
