//! Opt-in "already sent" ledger (`reminders.dedupe_ledger = true`).
//!
//! Tag replacement in each channel is the default duplicate suppression. The
//! ledger is stricter: one line per (day, tag, channel) in `sent_keys.txt`, so
//! a reminder is delivered at most once per day per channel even by channels
//! that cannot replace.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use tracing::debug;

use crate::state::write_atomic;

const SEP: char = '|';

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SentKey {
    day: NaiveDate,
    tag: String,
    channel: String,
}

impl SentKey {
    /// Day from the left, channel from the right; the tag keeps any `|` of its
    /// record id.
    fn parse(line: &str) -> Option<Self> {
        let (day, rest) = line.trim().split_once(SEP)?;
        let (tag, channel) = rest.rsplit_once(SEP)?;
        let day = NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()?;
        Some(Self {
            day,
            tag: tag.to_string(),
            channel: channel.to_string(),
        })
    }

    fn line(&self) -> String {
        format!("{}{SEP}{}{SEP}{}", self.day.format("%Y-%m-%d"), self.tag, self.channel)
    }

    fn record_id(&self) -> &str {
        self.tag
            .rsplit_once(':')
            .map(|(id, _)| id)
            .unwrap_or(&self.tag)
    }
}

#[derive(Debug)]
pub struct SentLedger {
    path: PathBuf,
    keys: HashSet<SentKey>,
}

impl SentLedger {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut keys = HashSet::new();
        if path.exists() {
            let f = fs::File::open(&path).with_context(|| format!("open {}", path.display()))?;
            for line in BufReader::new(f).lines() {
                let line = line?;
                if let Some(k) = SentKey::parse(&line) {
                    keys.insert(k);
                }
            }
        }
        Ok(Self { path, keys })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn contains(&self, day: NaiveDate, tag: &str, channel: &str) -> bool {
        self.keys.contains(&SentKey {
            day,
            tag: tag.to_string(),
            channel: channel.to_string(),
        })
    }

    pub fn record(&mut self, day: NaiveDate, tag: &str, channel: &str) -> Result<()> {
        let key = SentKey {
            day,
            tag: tag.to_string(),
            channel: channel.to_string(),
        };
        if self.keys.contains(&key) {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open {}", self.path.display()))?;
        writeln!(f, "{}", key.line())?;

        self.keys.insert(key);
        Ok(())
    }

    /// Drop every entry for a deleted record.
    pub fn forget(&mut self, record_id: &str) -> Result<usize> {
        self.retain(|k| k.record_id() != record_id)
    }

    /// Drop entries older than `day`; they can never match again.
    pub fn prune_before(&mut self, day: NaiveDate) -> Result<usize> {
        self.retain(|k| k.day >= day)
    }

    fn retain(&mut self, keep: impl Fn(&SentKey) -> bool) -> Result<usize> {
        let before = self.keys.len();
        self.keys.retain(|k| keep(k));
        let removed = before - self.keys.len();
        if removed == 0 {
            return Ok(0);
        }

        let mut lines: Vec<String> = self.keys.iter().map(SentKey::line).collect();
        lines.sort();
        let mut body = lines.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        write_atomic(&self.path, &body)?;
        debug!(removed, path = %self.path.display(), "ledger rewritten");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn records_persist_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sent_keys.txt");

        let mut ledger = SentLedger::load(&path).unwrap();
        ledger.record(day(10), "alice:today", "stdout").unwrap();
        ledger.record(day(10), "alice:today", "stdout").unwrap();

        let reloaded = SentLedger::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.contains(day(10), "alice:today", "stdout"));
        assert!(!reloaded.contains(day(10), "alice:today", "outbox"));
        assert!(!reloaded.contains(day(11), "alice:today", "stdout"));
    }

    #[test]
    fn ids_containing_the_separator_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sent_keys.txt");

        let mut ledger = SentLedger::load(&path).unwrap();
        ledger.record(day(10), "a|b:today", "stdout").unwrap();
        ledger.record(day(10), "c:today", "stdout").unwrap();

        let mut reloaded = SentLedger::load(&path).unwrap();
        assert!(reloaded.contains(day(10), "a|b:today", "stdout"));
        assert_eq!(reloaded.forget("a|b").unwrap(), 1);
        assert!(!reloaded.contains(day(10), "a|b:today", "stdout"));
        assert!(reloaded.contains(day(10), "c:today", "stdout"));
    }

    #[test]
    fn forget_and_prune_rewrite_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sent_keys.txt");

        let mut ledger = SentLedger::load(&path).unwrap();
        ledger.record(day(3), "bob:week", "stdout").unwrap();
        ledger.record(day(10), "alice:today", "stdout").unwrap();
        ledger.record(day(10), "bob:tomorrow", "outbox").unwrap();

        assert_eq!(ledger.forget("alice").unwrap(), 1);
        assert_eq!(ledger.prune_before(day(10)).unwrap(), 1);

        let reloaded = SentLedger::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.contains(day(10), "bob:tomorrow", "outbox"));
    }
}
