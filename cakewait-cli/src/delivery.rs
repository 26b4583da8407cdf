//! Delivery channels: how a matched reminder reaches the user.
//!
//! Channels are constructed explicitly from config and passed to whatever
//! runs the policy engine; nothing here is global. Each request carries a
//! stable tag (`<record id>:<bucket>`) and every channel treats a repeated tag
//! as "replace", not "add".

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use cakewait_core::{local_today, Bucket, NotificationMatch};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRequest {
    /// Stable tag; a channel replaces any alert already shown under it.
    pub id: String,
    pub title: String,
    pub body: String,
}

/// Map a match to its alert text. One template per bucket.
pub fn render(m: &NotificationMatch, name: &str) -> DeliveryRequest {
    let (title, body) = match m.bucket {
        Bucket::Today => (
            "🎂 Birthday Today!".to_string(),
            format!(
                "It's {}'s birthday! They turn {} today. Don't forget to wish them! 🎉",
                name, m.occurrence_age
            ),
        ),
        Bucket::Tomorrow => (
            "⏰ Birthday Tomorrow".to_string(),
            format!("{}'s birthday is tomorrow! Get ready! 🎈", name),
        ),
        Bucket::Week => (
            "📅 Birthday Next Week".to_string(),
            format!("{}'s birthday is in 7 days", name),
        ),
    };

    DeliveryRequest {
        id: m.tag(),
        title,
        body,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Authorization {
    Granted,
    Denied,
    Unavailable,
}

#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    fn name(&self) -> &str;

    /// Ask whether this channel may present alerts right now.
    async fn request_authorization(&self) -> Authorization;

    async fn deliver(&self, request: &DeliveryRequest) -> Result<()>;
}

/// Build channels by config name.
pub fn build_channels(names: &[String]) -> Result<Vec<Box<dyn DeliveryChannel>>> {
    let mut out: Vec<Box<dyn DeliveryChannel>> = Vec::new();
    for name in names {
        match name.trim() {
            "stdout" => out.push(Box::new(StdoutChannel::default())),
            "outbox" => out.push(Box::new(OutboxChannel::new(crate::state::outbox_path()?))),
            "desktop" => out.push(Box::new(DesktopChannel::detect())),
            other => bail!("unknown delivery channel '{other}' (expected stdout, outbox or desktop)"),
        }
    }
    Ok(out)
}

/// Prints alerts to the terminal.
///
/// A terminal cannot take back a line, so replacing a tag means not printing
/// it again: a tag already shown today with the same text is skipped.
#[derive(Default)]
pub struct StdoutChannel {
    shown: Mutex<HashMap<String, (NaiveDate, String)>>,
}

impl StdoutChannel {
    /// Remember `request` as shown on `day`; false if it already was.
    async fn first_showing(&self, request: &DeliveryRequest, day: NaiveDate) -> bool {
        let mut shown = self.shown.lock().await;
        let text = format!("{}\n{}", request.title, request.body);
        if shown.get(&request.id) == Some(&(day, text.clone())) {
            return false;
        }
        shown.insert(request.id.clone(), (day, text));
        true
    }
}

#[async_trait]
impl DeliveryChannel for StdoutChannel {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn request_authorization(&self) -> Authorization {
        Authorization::Granted
    }

    async fn deliver(&self, request: &DeliveryRequest) -> Result<()> {
        if !self.first_showing(request, local_today()).await {
            debug!(tag = %request.id, "already shown today");
            return Ok(());
        }
        println!("{}\n  {}", request.title, request.body);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub title: String,
    pub body: String,
    pub delivered_at: DateTime<Utc>,
}

/// JSON map of tag -> latest alert. Other tools (a phone bridge, a status bar
/// widget) read it; re-delivery under the same tag overwrites the entry.
pub struct OutboxChannel {
    path: PathBuf,
    lock: Mutex<()>,
}

impl OutboxChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub async fn read_entries(&self) -> Result<BTreeMap<String, OutboxEntry>> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(BTreeMap::new());
        }
        let s = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("read {}", self.path.display()))?;
        if s.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&s).with_context(|| format!("parse {}", self.path.display()))
    }
}

#[async_trait]
impl DeliveryChannel for OutboxChannel {
    fn name(&self) -> &str {
        "outbox"
    }

    async fn request_authorization(&self) -> Authorization {
        let Some(parent) = self.path.parent() else {
            return Authorization::Unavailable;
        };
        if fs::create_dir_all(parent).await.is_err() {
            return Authorization::Unavailable;
        }
        match fs::metadata(parent).await {
            Ok(meta) if meta.permissions().readonly() => Authorization::Denied,
            Ok(_) => Authorization::Granted,
            Err(_) => Authorization::Unavailable,
        }
    }

    async fn deliver(&self, request: &DeliveryRequest) -> Result<()> {
        let _guard = self.lock.lock().await;

        let mut entries = self.read_entries().await?;
        let replaced = entries
            .insert(
                request.id.clone(),
                OutboxEntry {
                    title: request.title.clone(),
                    body: request.body.clone(),
                    delivered_at: Utc::now(),
                },
            )
            .is_some();

        let json = serde_json::to_string_pretty(&entries)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("rename {} -> {}", tmp.display(), self.path.display()))?;
        debug!(tag = %request.id, replaced, "outbox updated");
        Ok(())
    }
}

/// Native desktop notifications: `notify-send` on Linux, `osascript` on macOS.
pub struct DesktopChannel {
    program: Option<PathBuf>,
}

impl DesktopChannel {
    pub fn detect() -> Self {
        let candidate = if cfg!(target_os = "macos") {
            "osascript"
        } else {
            "notify-send"
        };
        Self {
            program: which::which(candidate).ok(),
        }
    }
}

#[async_trait]
impl DeliveryChannel for DesktopChannel {
    fn name(&self) -> &str {
        "desktop"
    }

    async fn request_authorization(&self) -> Authorization {
        match self.program {
            Some(_) => Authorization::Granted,
            None => Authorization::Unavailable,
        }
    }

    async fn deliver(&self, request: &DeliveryRequest) -> Result<()> {
        let Some(program) = &self.program else {
            bail!("desktop notifications unavailable (notify-send/osascript not found)");
        };

        let mut cmd = tokio::process::Command::new(program);
        if cfg!(target_os = "macos") {
            let script = format!(
                r#"display notification "{}" with title "{}""#,
                escape_applescript(&request.body),
                escape_applescript(&request.title)
            );
            cmd.arg("-e").arg(script);
        } else {
            cmd.arg("--app-name=cakewait")
                .arg("--urgency=normal")
                // same tag replaces the notification on servers that honor it
                .arg(format!("--hint=string:x-canonical-private-synchronous:{}", request.id))
                .arg(&request.title)
                .arg(&request.body);
        }

        let output = cmd
            .output()
            .await
            .with_context(|| format!("running {}", program.display()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("desktop notification failed: {stderr}");
        }

        info!(tag = %request.id, "desktop notification shown");
        Ok(())
    }
}

fn escape_applescript(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(bucket: Bucket, age: i32) -> NotificationMatch {
        NotificationMatch {
            record_id: "r1".to_string(),
            bucket,
            occurrence_age: age,
        }
    }

    #[test]
    fn three_distinct_templates() {
        let today = render(&m(Bucket::Today, 29), "Alice");
        let tomorrow = render(&m(Bucket::Tomorrow, 34), "Bob");
        let week = render(&m(Bucket::Week, 24), "Cara");

        assert_eq!(today.id, "r1:today");
        assert_eq!(today.title, "🎂 Birthday Today!");
        assert!(today.body.contains("Alice"));
        assert!(today.body.contains("29"));
        assert_eq!(tomorrow.body, "Bob's birthday is tomorrow! Get ready! 🎈");
        assert_eq!(week.body, "Cara's birthday is in 7 days");
        assert_ne!(today.title, tomorrow.title);
        assert_ne!(tomorrow.title, week.title);
    }

    #[tokio::test]
    async fn outbox_replaces_by_tag() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = OutboxChannel::new(dir.path().join("outbox.json"));
        assert_eq!(outbox.request_authorization().await, Authorization::Granted);

        let req = render(&m(Bucket::Tomorrow, 34), "Bob");
        outbox.deliver(&req).await.unwrap();
        outbox.deliver(&req).await.unwrap();
        outbox
            .deliver(&render(&m(Bucket::Week, 34), "Bob"))
            .await
            .unwrap();

        let entries = outbox.read_entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries["r1:tomorrow"].title, "⏰ Birthday Tomorrow");
    }

    #[tokio::test]
    async fn stdout_shows_a_tag_once_per_day() {
        let stdout = StdoutChannel::default();
        let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let req = render(&m(Bucket::Today, 29), "Alice");

        assert!(stdout.first_showing(&req, day).await);
        assert!(!stdout.first_showing(&req, day).await);
        assert!(stdout.first_showing(&req, day.succ_opt().unwrap()).await);

        // edited record: same tag, new text
        let renamed = render(&m(Bucket::Today, 29), "Alicia");
        assert!(stdout.first_showing(&renamed, day).await);

        stdout.deliver(&req).await.unwrap();
        stdout.deliver(&req).await.unwrap();
        assert_eq!(stdout.shown.lock().await.len(), 1);
    }

    #[test]
    fn unknown_channel_is_rejected() {
        assert!(build_channels(&["pager".to_string()]).is_err());
    }

    #[tokio::test]
    async fn missing_desktop_tool_is_unavailable() {
        let ch = DesktopChannel { program: None };
        assert_eq!(ch.request_authorization().await, Authorization::Unavailable);
        assert!(ch.deliver(&render(&m(Bucket::Today, 1), "X")).await.is_err());
    }
}
