//! Storage abstraction for birthday records.
//!
//! The engine only ever reads a snapshot through [`RecordStore::all_records`];
//! writes come from the create/edit/delete flows.

use anyhow::Result;

use crate::record::BirthdayRecord;

pub trait RecordStore {
    /// Every stored record, in insertion order.
    fn all_records(&self) -> Result<Vec<BirthdayRecord>>;

    fn get(&self, id: &str) -> Result<Option<BirthdayRecord>> {
        Ok(self.all_records()?.into_iter().find(|r| r.id == id))
    }

    /// Replace the record with the same id, or append a new one.
    fn upsert(&mut self, record: BirthdayRecord) -> Result<()>;

    /// Returns true if a record was removed.
    fn remove(&mut self, id: &str) -> Result<bool>;
}

/// Replace-or-append on a plain vector; shared by the store implementations.
pub fn upsert_into(records: &mut Vec<BirthdayRecord>, record: BirthdayRecord) {
    match records.iter_mut().find(|r| r.id == record.id) {
        Some(existing) => *existing = record,
        None => records.push(record),
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    records: Vec<BirthdayRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<BirthdayRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordStore for MemoryStore {
    fn all_records(&self) -> Result<Vec<BirthdayRecord>> {
        Ok(self.records.clone())
    }

    fn upsert(&mut self, record: BirthdayRecord) -> Result<()> {
        upsert_into(&mut self.records, record);
        Ok(())
    }

    fn remove(&mut self, id: &str) -> Result<bool> {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        Ok(self.records.len() != before)
    }
}
