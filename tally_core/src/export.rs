//! CSV export of a habit's history.
//!
//! Dates are written as calendar days in the ledger's calendar so the file
//! reads the same way the streaks were computed.

use crate::{Calendar, Entry, Result};
use std::fs::File;
use std::path::Path;

const HEADERS: [&str; 6] = ["id", "date", "is_success", "craving_level", "note", "updated_at"];

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    date: String,
    is_success: bool,
    craving_level: Option<u8>,
    note: Option<String>,
    updated_at: String,
}

impl CsvRow {
    fn new(entry: &Entry, calendar: &Calendar) -> Self {
        CsvRow {
            id: entry.id.to_string(),
            date: calendar.day_of(entry.date).format("%Y-%m-%d").to_string(),
            is_success: entry.is_success,
            craving_level: entry.craving_level,
            note: entry.note.clone(),
            updated_at: entry.updated_at.to_rfc3339(),
        }
    }
}

/// Write `entries` to `path` as CSV with a header row, replacing any
/// existing file. Returns the number of rows written.
pub fn entries_to_csv(entries: &[Entry], calendar: &Calendar, path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(path)?;
    // Header written by hand so an empty history still gets one
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer.write_record(HEADERS)?;

    for entry in entries {
        writer.serialize(CsvRow::new(entry, calendar))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Exported {} entries to {:?}", entries.len(), path);
    Ok(entries.len())
}
