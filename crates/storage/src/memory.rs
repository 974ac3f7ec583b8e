//! In-memory backends for tests and embedding

use crate::{CustomerRecord, CustomerStore, HistoryLog, Result, UpdateOutcome};
use churn_core::identifier::normalize_id;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Customer store held in memory
#[derive(Default)]
pub struct MemoryCustomerStore {
    records: RwLock<Vec<CustomerRecord>>,
}

impl MemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<CustomerRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub fn insert(&self, record: CustomerRecord) {
        self.records.write().push(record);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

fn matches(record: &CustomerRecord, target: &str) -> bool {
    !target.is_empty() && normalize_id(&record.id) == target
}

impl CustomerStore for MemoryCustomerStore {
    fn exists(&self) -> bool {
        true
    }

    fn find(&self, id: &str) -> Result<Option<CustomerRecord>> {
        let target = normalize_id(id);
        Ok(self
            .records
            .read()
            .iter()
            .find(|r| matches(r, &target))
            .cloned())
    }

    fn update_fields(&self, id: &str, updates: &BTreeMap<String, String>) -> Result<UpdateOutcome> {
        let target = normalize_id(id);
        let mut records = self.records.write();
        let mut updated = 0;
        for record in records.iter_mut().filter(|r| matches(r, &target)) {
            for (name, value) in updates {
                record.fields.insert(name.clone(), value.clone());
            }
            updated += 1;
        }
        Ok(if updated == 0 {
            UpdateOutcome::NotFound
        } else {
            UpdateOutcome::Updated(updated)
        })
    }
}

/// History log held in memory
#[derive(Default)]
pub struct MemoryHistoryLog {
    entries: RwLock<Vec<Map<String, Value>>>,
}

impl MemoryHistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Map<String, Value>> {
        self.entries.read().clone()
    }
}

impl HistoryLog for MemoryHistoryLog {
    fn append(&self, entry: &Map<String, Value>) -> Result<()> {
        self.entries.write().push(entry.clone());
        Ok(())
    }
}
