//! Read-only access to completed result files.
//!
//! Result files are comma-separated text with a header row. Fields may be
//! quoted, and quoted fields may span several lines (the worker writes
//! multi-line issue lists). Rows whose field count does not match the
//! header are skipped rather than failing the whole read.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Column holding the subject (field) identifier.
pub const COLUMN_SUBJECT: &str = "字段名";

/// Column holding the human-readable meaning of the field.
pub const COLUMN_MEANING: &str = "字段含义";

/// Column holding the verdict classification.
pub const COLUMN_VERDICT: &str = "判断结果";

/// Column holding the issue categories.
pub const COLUMN_ISSUES: &str = "问题类别";

/// Column holding the remediation advice.
pub const COLUMN_REMEDIATION: &str = "清洗建议";

/// A verdict containing this marker classifies the row as non-conforming.
pub const NEGATIVE_VERDICT_MARKER: char = '不';

/// Default and maximum page size for paginated row reads.
pub const DEFAULT_PAGE_LIMIT: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 500;

/// One decoded record of a result file, keyed by header name in column
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultRow(IndexMap<String, String>);

impl ResultRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }

    pub fn subject(&self) -> Option<&str> {
        self.get(COLUMN_SUBJECT)
    }

    pub fn verdict(&self) -> Option<&str> {
        self.get(COLUMN_VERDICT)
    }

    pub fn issues(&self) -> Option<&str> {
        self.get(COLUMN_ISSUES)
    }

    pub fn remediation(&self) -> Option<&str> {
        self.get(COLUMN_REMEDIATION)
    }

    /// Whether the verdict marks this field as conforming to the standard.
    /// Rows without a verdict count as conforming.
    pub fn is_conforming(&self) -> bool {
        !self
            .verdict()
            .is_some_and(|v| v.contains(NEGATIVE_VERDICT_MARKER))
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Verdict tally over a result file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResultSummary {
    pub total: usize,
    pub conforming: usize,
    pub non_conforming: usize,
}

impl ResultSummary {
    pub fn from_rows(rows: &[ResultRow]) -> Self {
        let conforming = rows.iter().filter(|r| r.is_conforming()).count();
        Self {
            total: rows.len(),
            conforming,
            non_conforming: rows.len() - conforming,
        }
    }
}

/// Resolves result file names inside one directory.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Map a result name to its path. Names that would escape the results
    /// directory are reported as not found.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, CoreError> {
        if name.is_empty()
            || name.contains(['/', '\\', '\0'])
            || name == "."
            || name.contains("..")
        {
            return Err(not_found(name));
        }
        Ok(self.dir.join(name))
    }

    /// Raw bytes of a result file, for whole-file download.
    pub async fn read_bytes(&self, name: &str) -> Result<Vec<u8>, CoreError> {
        let path = self.resolve(name)?;
        tokio::fs::read(&path).await.map_err(|e| io_error(name, e))
    }

    /// Open a result file for streaming.
    pub async fn open(&self, name: &str) -> Result<tokio::fs::File, CoreError> {
        let path = self.resolve(name)?;
        tokio::fs::File::open(&path)
            .await
            .map_err(|e| io_error(name, e))
    }

    /// All rows of a result file, in file order.
    pub async fn read_rows(&self, name: &str) -> Result<Vec<ResultRow>, CoreError> {
        let bytes = self.read_bytes(name).await?;
        parse_rows(&bytes)
    }
}

fn not_found(name: &str) -> CoreError {
    CoreError::NotFound {
        entity: "ResultFile",
        id: name.to_string(),
    }
}

fn io_error(name: &str, err: std::io::Error) -> CoreError {
    if err.kind() == std::io::ErrorKind::NotFound {
        not_found(name)
    } else {
        CoreError::Storage(format!("Failed to read result file '{name}': {err}"))
    }
}

/// Parse result file bytes into rows.
///
/// The first record is the header. Empty lines never form a record. Records
/// with a field count different from the header are skipped with a warning.
pub fn parse_rows(data: &[u8]) -> Result<Vec<ResultRow>, CoreError> {
    let text = std::str::from_utf8(data)
        .map_err(|e| CoreError::Storage(format!("Result file is not valid UTF-8: {e}")))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut records = split_records(text).into_iter();

    let headers = records
        .next()
        .ok_or_else(|| CoreError::Storage("Result file has no header row".into()))?;

    let mut rows = Vec::new();
    for (index, record) in records.enumerate() {
        if record.len() != headers.len() {
            tracing::warn!(
                record = index + 1,
                expected = headers.len(),
                actual = record.len(),
                "Skipping malformed result row",
            );
            continue;
        }
        rows.push(ResultRow(
            headers.iter().cloned().zip(record).collect(),
        ));
    }

    Ok(rows)
}

/// Slice `rows` for one page.
///
/// `limit` is clamped to `1..=MAX_PAGE_LIMIT` (default [`DEFAULT_PAGE_LIMIT`]),
/// `offset` to non-negative.
pub fn paginate(rows: &[ResultRow], limit: Option<i64>, offset: Option<i64>) -> &[ResultRow] {
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT) as usize;
    let offset = offset.unwrap_or(0).max(0) as usize;
    let start = offset.min(rows.len());
    let end = start.saturating_add(limit).min(rows.len());
    &rows[start..end]
}

/// Split CSV text into records of fields, honouring quotes that may
/// contain commas, doubled quotes and line breaks. A line with no
/// characters at all yields no record; `""` or `,` on a line still do.
fn split_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line_started = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(ch);
            }
            continue;
        }

        match ch {
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                if line_started {
                    record.push(std::mem::take(&mut field));
                    records.push(std::mem::take(&mut record));
                }
                line_started = false;
            }
            '"' => {
                in_quotes = true;
                line_started = true;
            }
            ',' => {
                record.push(std::mem::take(&mut field));
                line_started = true;
            }
            _ => {
                field.push(ch);
                line_started = true;
            }
        }
    }

    if line_started {
        record.push(field);
        records.push(record);
    }

    records
}
