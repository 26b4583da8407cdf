use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// `$CAKEWAIT_HOME`, or `~/.cakewait`.
pub fn cakewait_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("CAKEWAIT_HOME") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = std::env::var("HOME").context("HOME is not set (or set CAKEWAIT_HOME)")?;
    Ok(PathBuf::from(home).join(".cakewait"))
}

pub fn ensure_cakewait_home() -> Result<PathBuf> {
    let dir = cakewait_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn birthdays_path() -> Result<PathBuf> {
    Ok(ensure_cakewait_home()?.join("birthdays.json"))
}

pub fn outbox_path() -> Result<PathBuf> {
    Ok(ensure_cakewait_home()?.join("outbox.json"))
}

pub fn sent_keys_path() -> Result<PathBuf> {
    Ok(ensure_cakewait_home()?.join("sent_keys.txt"))
}

/// Write via a sibling temp file + rename so readers never see a partial file.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}
