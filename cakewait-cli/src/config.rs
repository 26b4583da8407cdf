use anyhow::{bail, Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::state::{ensure_cakewait_home, write_atomic};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub reminders: RemindersSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemindersSection {
    /// Delivery channels to fan out to: "stdout", "outbox", "desktop".
    pub channels: Vec<String>,

    /// `watch` re-checks at this interval (clamped to 1..=1440).
    pub check_interval_minutes: u64,

    /// Local time of day before which `watch` holds reminders back ("HH:MM").
    pub notification_time: String,

    /// Opt-in per-day ledger that suppresses repeats on top of tag replacement.
    pub dedupe_ledger: bool,
}

impl Default for RemindersSection {
    fn default() -> Self {
        Self {
            channels: vec!["stdout".to_string(), "outbox".to_string()],
            check_interval_minutes: 60,
            notification_time: "09:00".to_string(),
            dedupe_ledger: false,
        }
    }
}

impl RemindersSection {
    pub fn interval_minutes(&self) -> u64 {
        self.check_interval_minutes.clamp(1, 24 * 60)
    }

    pub fn notification_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.notification_time.trim(), "%H:%M").with_context(|| {
            format!(
                "invalid reminders.notification_time '{}' (expected HH:MM)",
                self.notification_time
            )
        })
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.reminders.notification_time()?;
        if self.reminders.channels.is_empty() {
            bail!("reminders.channels is empty; configure at least one delivery channel");
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_cakewait_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    let cfg: Config = toml::from_str(&s).context("parse config.toml")?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    write_atomic(&p, &s)
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

pub fn show_config() -> Result<()> {
    let cfg = load_config()?;
    println!("Config file: {}\n", config_path()?.display());
    println!("[reminders]");
    println!("- channels: {}", cfg.reminders.channels.join(", "));
    println!("- check_interval_minutes: {}", cfg.reminders.interval_minutes());
    println!("- notification_time: {}", cfg.reminders.notification_time);
    println!("- dedupe_ledger: {}", cfg.reminders.dedupe_ledger);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let cfg: Config = toml::from_str("[reminders]\ndedupe_ledger = true\n").unwrap();
        assert!(cfg.reminders.dedupe_ledger);
        assert_eq!(cfg.reminders.channels, ["stdout", "outbox"]);
        assert_eq!(cfg.reminders.interval_minutes(), 60);
        cfg.validate().unwrap();
    }

    #[test]
    fn interval_is_clamped_to_a_day() {
        let mut r = RemindersSection::default();
        r.check_interval_minutes = 0;
        assert_eq!(r.interval_minutes(), 1);
        r.check_interval_minutes = 10_000;
        assert_eq!(r.interval_minutes(), 1440);
    }

    #[test]
    fn bad_notification_time_is_rejected() {
        let mut cfg = Config::default();
        cfg.reminders.notification_time = "9am".to_string();
        assert!(cfg.validate().is_err());
    }
}
