//! CSV ingest.
//!
//! Turns a header-driven CSV export into an in-memory [`Dataset`]: the header
//! list in file order plus one [`RawRow`] per record. Nothing here knows which
//! columns matter; that is decided once per dataset by `schema::resolver`.
//!
//! Design goals:
//! - **Tolerant parsing**: ragged rows are kept (missing cells read as absent),
//!   and fields that are not valid UTF-8 are decoded as Windows-1252 because
//!   the government exports are frequently saved from Excel
//! - **Strict on the whole file**: a file without a readable header row is an
//!   error, so callers can decide whether that is fatal

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::ByteRecord;
use tracing::debug;

use crate::error::AppError;

/// One record of a dataset. Cells are addressed by column index; the owning
/// [`Dataset`] maps header names to indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    values: Vec<String>,
}

impl RawRow {
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }

    /// Trimmed, non-empty cell at `idx`.
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.values.get(idx).map(|s| s.trim()).filter(|s| !s.is_empty())
    }
}

/// A fully loaded tabular dataset.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// Where the data came from (path or URL), for logs and errors.
    pub label: String,
    /// Header names in file order, BOM-stripped and trimmed.
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    /// Records the CSV reader could not parse at all.
    pub unreadable_rows: usize,
}

impl Dataset {
    /// Build a dataset from in-memory headers and rows.
    pub fn from_parts(label: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            label: label.into(),
            headers: headers.iter().map(|h| normalize_header_name(h)).collect(),
            rows: rows.into_iter().map(RawRow::new).collect(),
            unreadable_rows: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read a dataset from a CSV file on disk.
pub fn load_csv_file(path: &Path) -> Result<Dataset, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_csv(file, path.display().to_string())
}

/// Read a dataset from raw CSV bytes (e.g. a fetched response body).
pub fn parse_csv_bytes(bytes: &[u8], label: impl Into<String>) -> Result<Dataset, AppError> {
    read_csv(bytes, label.into())
}

/// Read a dataset from any CSV reader.
pub fn read_csv<R: Read>(reader: R, label: String) -> Result<Dataset, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .byte_headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers from '{label}': {e}")))?
        .iter()
        .map(|raw| normalize_header_name(&decode_field(raw)))
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(AppError::new(2, format!("CSV '{label}' has no header row.")));
    }

    let mut rows = Vec::new();
    let mut unreadable_rows = 0usize;
    let mut record = ByteRecord::new();

    loop {
        match reader.read_byte_record(&mut record) {
            Ok(true) => rows.push(RawRow::new(record.iter().map(decode_field).collect())),
            Ok(false) => break,
            Err(e) => {
                // An I/O failure means the rest of the stream is gone.
                if matches!(e.kind(), csv::ErrorKind::Io(_)) {
                    return Err(AppError::new(2, format!("Failed to read CSV '{label}': {e}")));
                }
                debug!(dataset = %label, error = %e, "skipping unparseable CSV record");
                unreadable_rows += 1;
            }
        }
    }

    Ok(Dataset {
        label,
        headers,
        rows,
        unreadable_rows,
    })
}

fn normalize_header_name(name: &str) -> String {
    // Excel exports put a BOM in front of the first header; without stripping
    // it the exact-match pass of the resolver misses `URN`.
    name.trim_start_matches('\u{feff}').trim().to_string()
}

/// UTF-8 if valid, otherwise Windows-1252.
fn decode_field(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(raw);
            decoded.into_owned()
        }
    }
}
