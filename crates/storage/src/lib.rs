//! Customer store and history logs
//!
//! The service keeps its state in flat files: a CSV customer store that is
//! rewritten on update, an append-only CSV history of submitted analyses, and
//! a semicolon-delimited history produced by an external tool. Handlers only
//! see the [`CustomerStore`] and [`HistoryLog`] traits; the CSV and in-memory
//! backends live in their own modules.

use churn_core::features::parse_decimal;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub mod csv_store;
pub mod history;
pub mod memory;

pub use csv_store::CsvCustomerStore;
pub use history::{count_external_history_rows, read_external_history, CsvHistoryLog};
pub use memory::{MemoryCustomerStore, MemoryHistoryLog};

/// Storage errors
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Cliente não encontrado")]
    NotFound(String),
    #[error("Store file not found: {0}")]
    Missing(PathBuf),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// One customer row, all columns as text
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CustomerRecord {
    /// Identifier as stored (not normalized)
    pub id: String,
    pub fields: BTreeMap<String, String>,
}

impl CustomerRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Numeric value of a column; missing or unparseable cells read as 0.0
    pub fn value(&self, name: &str) -> f64 {
        self.fields
            .get(name)
            .map(|text| parse_decimal(text))
            .unwrap_or(0.0)
    }

    /// Values of `names`, in that order
    pub fn values(&self, names: &[String]) -> Map<String, Value> {
        names
            .iter()
            .map(|name| (name.clone(), Value::from(self.value(name))))
            .collect()
    }
}

/// Result of a feature write-back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Number of rows rewritten
    Updated(usize),
    /// No row carries the id
    NotFound,
    /// The store file does not exist
    StoreMissing,
}

/// Keyed access to customer rows
pub trait CustomerStore: Send + Sync {
    /// Whether the backing store exists
    fn exists(&self) -> bool;

    /// First row whose normalized id equals the normalized `id`
    fn find(&self, id: &str) -> Result<Option<CustomerRecord>>;

    /// Overwrite columns of the rows matching `id`
    fn update_fields(&self, id: &str, updates: &BTreeMap<String, String>) -> Result<UpdateOutcome>;

    /// Like `find`, but a missing row is `StoreError::NotFound`
    fn get(&self, id: &str) -> Result<CustomerRecord> {
        self.find(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

/// Append-only record of submitted payloads
pub trait HistoryLog: Send + Sync {
    fn append(&self, entry: &Map<String, Value>) -> Result<()>;
}

/// Text form of a JSON value as written to a CSV cell.
///
/// Strings are written verbatim, numbers in their JSON spelling, booleans as
/// `True`/`False`, null as an empty cell, containers as compact JSON.
pub fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
