//! Triggers that invoke the policy engine.
//!
//! - `check`: one shot, meant for cron / systemd timers / login hooks. Loads
//!   its own snapshot from the store.
//! - `watch`: foreground loop. Runs immediately, then every
//!   `check_interval_minutes`, and again whenever Enter is pressed.

use anyhow::Result;
use cakewait_core::{local_today, RecordStore};
use chrono::{Local, NaiveDate};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::delivery::build_channels;
use crate::ledger::SentLedger;
use crate::notify::{authorized_channels, dispatch, DispatchReport};
use crate::state::{birthdays_path, sent_keys_path};
use crate::store::JsonFileStore;

#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Overrides the local date.
    pub today: Option<NaiveDate>,
    pub dry_run: bool,
    /// Overrides `reminders.channels`.
    pub channels: Option<Vec<String>>,
}

pub async fn run_check(cfg: &Config, opts: &CheckOptions) -> Result<DispatchReport> {
    let today = opts.today.unwrap_or_else(local_today);

    // A store that cannot be read means nothing was computed.
    let store = JsonFileStore::open(birthdays_path()?);
    let records = store.all_records()?;
    debug!(path = %store.path().display(), count = records.len(), %today, "loaded birthday snapshot");

    let names = opts
        .channels
        .clone()
        .unwrap_or_else(|| cfg.reminders.channels.clone());
    let channels = authorized_channels(build_channels(&names)?).await;
    if channels.is_empty() {
        warn!("no authorized delivery channels; matches will not be shown");
    }

    let mut ledger = if cfg.reminders.dedupe_ledger {
        let mut l = SentLedger::load(sent_keys_path()?)?;
        l.prune_before(today)?;
        debug!(entries = l.len(), "dedupe ledger loaded");
        Some(l)
    } else {
        None
    };

    Ok(dispatch(&records, today, &channels, ledger.as_mut(), opts.dry_run).await)
}

pub fn print_report(report: &DispatchReport) {
    println!(
        "Matched {} reminder(s): {} delivered, {} suppressed, {} failed.",
        report.matched,
        report.delivered,
        report.suppressed,
        report.failures.len()
    );
    for f in &report.failures {
        println!("- [{}] {}: {}", f.channel, f.tag, f.error);
    }
    if !report.skipped_records.is_empty() {
        println!(
            "Skipped {} record(s) with an invalid birth date: {}",
            report.skipped_records.len(),
            report.skipped_records.join(", ")
        );
    }
}

pub async fn watch(cfg: Config, opts: CheckOptions) -> Result<()> {
    let notify_at = cfg.reminders.notification_time()?;
    let every = Duration::from_secs(cfg.reminders.interval_minutes() * 60);

    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    info!(
        interval_minutes = cfg.reminders.interval_minutes(),
        notification_time = %notify_at,
        "watch started"
    );
    println!(
        "Watching for birthdays every {} min after {} (Enter = check now, Ctrl-C = stop)",
        cfg.reminders.interval_minutes(),
        notify_at.format("%H:%M")
    );

    loop {
        let forced = tokio::select! {
            _ = ticker.tick() => false,
            line = stdin.next_line(), if stdin_open => {
                match line {
                    Ok(Some(_)) => true,
                    _ => {
                        stdin_open = false;
                        continue;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("stopping watch");
                return Ok(());
            }
        };

        if !forced && opts.today.is_none() && Local::now().time() < notify_at {
            debug!(%notify_at, "before notification time; holding reminders");
            continue;
        }

        match run_check(&cfg, &opts).await {
            Ok(report) => print_report(&report),
            // keep watching; the next tick retries
            Err(e) => error!(error = %format!("{e:#}"), "reminder check failed"),
        }
    }
}
