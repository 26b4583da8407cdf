//! File-backed record store: a pretty-printed JSON array of records.

use anyhow::{Context, Result};
use cakewait_core::store::upsert_into;
use cakewait_core::{BirthdayRecord, RecordStore};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::state::write_atomic;

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, records: &[BirthdayRecord]) -> Result<()> {
        let json = serde_json::to_string_pretty(records)?;
        write_atomic(&self.path, &json)?;
        debug!(path = %self.path.display(), count = records.len(), "saved birthdays");
        Ok(())
    }
}

impl RecordStore for JsonFileStore {
    /// A missing file is an empty collection. Anything that is not a JSON
    /// array of records fails the whole load.
    fn all_records(&self) -> Result<Vec<BirthdayRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let s = fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        if s.trim().is_empty() {
            return Ok(Vec::new());
        }
        let records: Vec<BirthdayRecord> = serde_json::from_str(&s)
            .with_context(|| format!("parse {} as a list of birthdays", self.path.display()))?;

        let mut seen = HashSet::new();
        if let Some(dup) = records.iter().find(|r| !seen.insert(r.id.as_str())) {
            anyhow::bail!("duplicate birthday id '{}' in {}", dup.id, self.path.display());
        }
        Ok(records)
    }

    fn upsert(&mut self, record: BirthdayRecord) -> Result<()> {
        let mut records = self.all_records()?;
        upsert_into(&mut records, record);
        self.save(&records)
    }

    fn remove(&mut self, id: &str) -> Result<bool> {
        let mut records = self.all_records()?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(false);
        }
        self.save(&records)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::open(dir.path().join("birthdays.json"));
        assert!(store.all_records().unwrap().is_empty());

        store.upsert(BirthdayRecord::new("a", "Alice", "1995-03-10")).unwrap();
        store.upsert(BirthdayRecord::new("b", "Bob", "1990-03-11")).unwrap();
        assert!(store.remove("a").unwrap());

        let reopened = JsonFileStore::open(store.path().to_path_buf());
        let all = reopened.all_records().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].birth_date, "1990-03-11");
    }

    #[test]
    fn wrong_shape_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("birthdays.json");
        fs::write(&path, r#"{"not": "a list"}"#).unwrap();
        assert!(JsonFileStore::open(&path).all_records().is_err());
    }

    #[test]
    fn loads_file_with_epoch_millis_created_at() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("birthdays.json");
        fs::write(
            &path,
            r#"[{"id":"1700000000000","name":"Alice","birthDate":"1995-03-10","notificationEnabled":true,"createdAt":1700000000000}]"#,
        )
        .unwrap();

        let mut store = JsonFileStore::open(&path);
        assert_eq!(store.all_records().unwrap()[0].name, "Alice");

        store.upsert(BirthdayRecord::new("b", "Bob", "1990-03-11")).unwrap();
        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[0]["createdAt"], 1_700_000_000_000i64);
        assert!(raw[1]["createdAt"].is_i64());
    }

    #[test]
    fn malformed_date_still_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("birthdays.json");
        let rec = BirthdayRecord::new("x", "X", "1990-02-30");
        fs::write(&path, serde_json::to_string(&vec![rec]).unwrap()).unwrap();
        let all = JsonFileStore::open(&path).all_records().unwrap();
        assert_eq!(all[0].birth_date, "1990-02-30");
    }
}
