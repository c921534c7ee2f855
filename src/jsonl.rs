//! JSONL helpers used by the `jsonl` subcommands: CSV conversion, validation
//! and building a file from records given on the command line.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::BatchError;

/// Result of [`validate_jsonl`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Non-blank lines that parsed before the first error (or in total).
    pub records: usize,
    pub first_error: Option<LineError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineError {
    /// 1-based line number.
    pub line: usize,
    pub message: String,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.first_error.is_none()
    }
}

/// Converts a CSV file with a header row into JSONL. Each row becomes an object
/// whose keys follow the header order and whose values are strings.
pub fn csv_to_jsonl(csv_path: &Path, jsonl_path: &Path) -> Result<usize, BatchError> {
    tracing::info!(csv = %csv_path.display(), jsonl = %jsonl_path.display(), "converting CSV to JSONL");

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(csv_path)?;
    let headers = reader.headers()?.clone();

    let out = File::create(jsonl_path).map_err(|e| BatchError::io(jsonl_path, e))?;
    let mut out = BufWriter::new(out);
    let mut rows = 0;

    for record in reader.records() {
        let record = record?;
        let object: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        write_line(&mut out, &Value::Object(object), jsonl_path)?;
        rows += 1;
    }
    out.flush().map_err(|e| BatchError::io(jsonl_path, e))?;

    tracing::info!(rows, "converted CSV to JSONL");
    Ok(rows)
}

/// Checks that every non-blank line of `path` is a JSON value.
///
/// Invalid content is reported, not returned as an error; an unreadable file is an error.
pub fn validate_jsonl(path: &Path) -> Result<ValidationReport, BatchError> {
    tracing::info!(path = %path.display(), "validating JSONL file");
    let file = File::open(path).map_err(|e| BatchError::io(path, e))?;

    let mut reader = BufReader::new(file);
    let mut line = Vec::new();
    let mut number = 0;
    let mut records = 0;
    loop {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .map_err(|e| BatchError::io(path, e))?;
        if read == 0 {
            break;
        }
        number += 1;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        // Bytes, not `str`: a line that is not UTF-8 is invalid content, not a read failure.
        if let Err(e) = serde_json::from_slice::<Value>(&line) {
            let first_error = LineError {
                line: number,
                message: e.to_string(),
            };
            tracing::error!(line = first_error.line, error = %first_error.message, "invalid JSON");
            return Ok(ValidationReport {
                records,
                first_error: Some(first_error),
            });
        }
        records += 1;
    }

    tracing::info!(records, "JSONL file is valid");
    Ok(ValidationReport {
        records,
        first_error: None,
    })
}

/// Writes each record on its own line.
pub fn create_jsonl(path: &Path, records: &[Value]) -> Result<(), BatchError> {
    tracing::info!(path = %path.display(), records = records.len(), "creating JSONL file");
    let file = File::create(path).map_err(|e| BatchError::io(path, e))?;
    let mut out = BufWriter::new(file);
    for record in records {
        write_line(&mut out, record, path)?;
    }
    out.flush().map_err(|e| BatchError::io(path, e))
}

/// Builds one JSON object from `(key, value)` pairs; later keys overwrite earlier ones.
pub fn record_from_pairs<I, K, V>(pairs: I) -> Value
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let object: Map<String, Value> = pairs
        .into_iter()
        .map(|(k, v)| (k.into(), Value::String(v.into())))
        .collect();
    Value::Object(object)
}

fn write_line<W: Write>(out: &mut W, value: &Value, path: &Path) -> Result<(), BatchError> {
    serde_json::to_writer(&mut *out, value)?;
    out.write_all(b"\n").map_err(|e| BatchError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn read_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn csv_rows_become_string_objects() {
        let dir = TempDir::new().unwrap();
        let csv = dir.path().join("people.csv");
        let jsonl = dir.path().join("people.jsonl");
        std::fs::write(&csv, "name,age\nAlice,30\nBob,25\n").unwrap();

        let rows = csv_to_jsonl(&csv, &jsonl).unwrap();

        assert_eq!(rows, 2);
        assert_eq!(
            read_lines(&jsonl),
            vec![
                json!({"name": "Alice", "age": "30"}),
                json!({"name": "Bob", "age": "25"})
            ]
        );
    }

    #[test]
    fn csv_keys_keep_header_order_and_quoted_fields() {
        let dir = TempDir::new().unwrap();
        let csv = dir.path().join("q.csv");
        let jsonl = dir.path().join("q.jsonl");
        std::fs::write(&csv, "zeta,alpha\n\"a, b\",\"line1\nline2\"\n").unwrap();

        csv_to_jsonl(&csv, &jsonl).unwrap();

        let text = std::fs::read_to_string(&jsonl).unwrap();
        assert_eq!(text, "{\"zeta\":\"a, b\",\"alpha\":\"line1\\nline2\"}\n");
    }

    #[test]
    fn validate_accepts_converted_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ok.jsonl");
        std::fs::write(&path, "{\"a\":1}\n\n[1,2]\n").unwrap();

        let report = validate_jsonl(&path).unwrap();
        assert!(report.is_valid());
        assert_eq!(report.records, 2);
    }

    #[test]
    fn validate_reports_first_invalid_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{\"name\": \"Alice\", \"age\": 30}\nInvalid JSON Line\n{}\n").unwrap();

        let report = validate_jsonl(&path).unwrap();
        assert!(!report.is_valid());
        assert_eq!(report.records, 1);
        assert_eq!(report.first_error.unwrap().line, 2);
    }

    #[test]
    fn validate_reports_non_utf8_line_as_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("binary.jsonl");
        std::fs::write(&path, b"{\"a\":1}\n\xff\xfe\n").unwrap();

        let report = validate_jsonl(&path).unwrap();
        assert_eq!(report.records, 1);
        assert_eq!(report.first_error.unwrap().line, 2);
    }

    #[test]
    fn validate_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(validate_jsonl(&dir.path().join("missing.jsonl")).is_err());
    }

    #[test]
    fn create_writes_one_record_per_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manual.jsonl");
        let records = vec![
            json!({"name": "Charlie", "age": "22"}),
            json!({"name": "Dana", "age": "28"}),
        ];

        create_jsonl(&path, &records).unwrap();
        assert_eq!(read_lines(&path), records);
    }

    #[test]
    fn record_from_pairs_builds_single_object() {
        let record = record_from_pairs([("key1", "value1"), ("key2", "value2"), ("key1", "again")]);
        assert_eq!(record, json!({"key1": "again", "key2": "value2"}));
    }
}
