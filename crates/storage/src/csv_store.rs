//! CSV-backed customer store
//!
//! Rows are read as text. Updates rewrite the whole file through a sibling
//! temporary file that is renamed over the original.

use crate::{CustomerRecord, CustomerStore, Result, StoreError, UpdateOutcome};
use churn_core::identifier::{detect_id_column, normalize_id};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Parsed store contents
#[derive(Debug, Clone)]
struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn read(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(String::from).collect();
            if row.iter().skip(headers.len()).any(|cell| !cell.trim().is_empty()) {
                let line = record.position().map_or(0, |pos| pos.line());
                return Err(StoreError::Validation(format!(
                    "line {line} has {} cells but the header has {}",
                    row.len(),
                    headers.len()
                )));
            }
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    fn write(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("csv.tmp");
        let result = self
            .write_rows(&tmp)
            .and_then(|()| fs::rename(&tmp, path).map_err(StoreError::from));
        if result.is_err() && tmp.exists() {
            if let Err(err) = fs::remove_file(&tmp) {
                warn!("Failed to remove {}: {}", tmp.display(), err);
            }
        }
        result
    }

    fn write_rows(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn id_index(&self) -> Result<usize> {
        let column = detect_id_column(self.headers.iter().map(String::as_str)).ok_or_else(|| {
            StoreError::Validation("no recognized customer id column".to_string())
        })?;
        self.column_index(&column)
            .ok_or_else(|| StoreError::Validation(format!("column {column} vanished")))
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn matching_rows(&self, id_idx: usize, id: &str) -> Vec<usize> {
        let target = normalize_id(id);
        if target.is_empty() {
            return Vec::new();
        }
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| normalize_id(&row[id_idx]) == target)
            .map(|(i, _)| i)
            .collect()
    }

    fn record(&self, id_idx: usize, row: usize) -> CustomerRecord {
        let cells = &self.rows[row];
        CustomerRecord {
            id: cells[id_idx].clone(),
            fields: self
                .headers
                .iter()
                .cloned()
                .zip(cells.iter().cloned())
                .collect(),
        }
    }
}

/// Customer store kept in a comma-delimited file
pub struct CsvCustomerStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvCustomerStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Table> {
        if !self.path.exists() {
            return Err(StoreError::Missing(self.path.clone()));
        }
        Table::read(&self.path)
    }

    /// Column names as stored, whitespace trimmed
    pub fn headers(&self) -> Result<Vec<String>> {
        Ok(self.load()?.headers)
    }

    /// Name of the detected identifier column
    pub fn id_column(&self) -> Result<String> {
        let table = self.load()?;
        let idx = table.id_index()?;
        Ok(table.headers[idx].clone())
    }

    /// First `limit` identifiers in normalized form
    pub fn sample_ids(&self, limit: usize) -> Result<Vec<String>> {
        let table = self.load()?;
        let idx = table.id_index()?;
        Ok(table
            .rows
            .iter()
            .take(limit)
            .map(|row| normalize_id(&row[idx]))
            .collect())
    }
}

impl CustomerStore for CsvCustomerStore {
    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn find(&self, id: &str) -> Result<Option<CustomerRecord>> {
        let table = self.load()?;
        let idx = table.id_index()?;
        Ok(table
            .matching_rows(idx, id)
            .first()
            .map(|&row| table.record(idx, row)))
    }

    fn update_fields(&self, id: &str, updates: &BTreeMap<String, String>) -> Result<UpdateOutcome> {
        let _guard = self.write_lock.lock();

        if !self.path.exists() {
            return Ok(UpdateOutcome::StoreMissing);
        }

        let mut table = Table::read(&self.path)?;
        let idx = table.id_index()?;
        let matches = table.matching_rows(idx, id);
        if matches.is_empty() {
            return Ok(UpdateOutcome::NotFound);
        }

        for (column, value) in updates {
            let col = match table.column_index(column) {
                Some(col) => col,
                None => {
                    debug!("Adding column {} to customer store", column);
                    table.headers.push(column.clone());
                    for row in &mut table.rows {
                        row.push(String::new());
                    }
                    table.headers.len() - 1
                }
            };
            for &row in &matches {
                table.rows[row][col] = value.clone();
            }
        }

        table.write(&self.path)?;
        Ok(UpdateOutcome::Updated(matches.len()))
    }
}
