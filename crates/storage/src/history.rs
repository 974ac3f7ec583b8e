//! Analysis history files
//!
//! `CsvHistoryLog` appends submitted payloads to a comma-delimited log. The
//! header is taken from the keys of the first payload written to a new file;
//! later rows are written positionally in their own key order.
//!
//! The external history is a separate semicolon-delimited file produced by
//! another tool. It is only read.

use crate::{render_cell, HistoryLog, Result};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

const BOM: char = '\u{feff}';

/// Append-only CSV log of submitted analyses
pub struct CsvHistoryLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvHistoryLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryLog for CsvHistoryLog {
    fn append(&self, entry: &Map<String, Value>) -> Result<()> {
        let _guard = self.lock.lock();

        let is_new = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(file);

        if is_new {
            writer.write_record(entry.keys())?;
        }
        writer.write_record(entry.values().map(render_cell))?;
        writer.flush()?;

        debug!("Appended history entry to {}", self.path.display());
        Ok(())
    }
}

/// Rows of the external history, keyed by header.
///
/// A missing file reads as no rows. Cells missing from short rows are null;
/// cells beyond the header are dropped.
pub fn read_external_history(path: &Path) -> Result<Vec<Map<String, Value>>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let text = fs::read_to_string(path)?;
    let text = text.strip_prefix(BOM).unwrap_or(&text);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row = headers
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let cell = record
                    .get(i)
                    .map(|s| Value::String(s.to_string()))
                    .unwrap_or(Value::Null);
                (name.clone(), cell)
            })
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

/// Number of data rows in the external history: line count minus the header,
/// never negative. A missing file has none.
pub fn count_external_history_rows(path: &Path) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }
    let text = fs::read_to_string(path)?;
    Ok(text.lines().count().saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_header_written_once_from_first_payload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("historico_analises.csv");
        let log = CsvHistoryLog::new(&path);

        log.append(&object(json!({"ID_CLIENTE": "10", "DAYS_SINCE_LAST": 5, "ATIVO": true})))
            .unwrap();
        log.append(&object(json!({"ID_CLIENTE": "11", "DAYS_SINCE_LAST": "7,5"})))
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec![
            "ID_CLIENTE,DAYS_SINCE_LAST,ATIVO",
            "10,5,True",
            "11,\"7,5\"",
        ]);
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("historico_analises.csv");
        CsvHistoryLog::new(&path)
            .append(&object(json!({"ID_CLIENTE": "1"})))
            .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_read_external_history() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("historico.csv");
        fs::write(&path, "\u{feff}ID;DATA;NIVEL\n1;2025-10-01;ALTO\n2;2025-10-02\n").unwrap();

        let rows = read_external_history(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["ID"], json!("1"));
        assert_eq!(rows[0]["NIVEL"], json!("ALTO"));
        assert_eq!(rows[1]["NIVEL"], Value::Null);
        assert_eq!(count_external_history_rows(&path).unwrap(), 2);
    }

    #[test]
    fn test_missing_external_history() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("historico.csv");
        assert!(read_external_history(&path).unwrap().is_empty());
        assert_eq!(count_external_history_rows(&path).unwrap(), 0);

        fs::write(&path, "").unwrap();
        assert_eq!(count_external_history_rows(&path).unwrap(), 0);
    }
}
