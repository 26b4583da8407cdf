//! Run the policy engine once and fan the matches out to every channel.

use cakewait_core::{evaluate_with, BirthdayRecord, RecordError};
use chrono::NaiveDate;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::delivery::{render, Authorization, DeliveryChannel};
use crate::ledger::SentLedger;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryFailure {
    pub tag: String,
    pub channel: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub matched: usize,
    pub delivered: usize,
    /// Skipped because the ledger already had (day, tag, channel).
    pub suppressed: usize,
    /// Record ids skipped for a malformed birth date.
    pub skipped_records: Vec<String>,
    pub failures: Vec<DeliveryFailure>,
}

/// Keep only channels that grant authorization; report the rest.
pub async fn authorized_channels(
    channels: Vec<Box<dyn DeliveryChannel>>,
) -> Vec<Box<dyn DeliveryChannel>> {
    let mut out = Vec::with_capacity(channels.len());
    for ch in channels {
        match ch.request_authorization().await {
            Authorization::Granted => out.push(ch),
            other => warn!(channel = ch.name(), authorization = ?other, "channel not authorized; skipping"),
        }
    }
    out
}

/// Evaluate `records` for `today` and deliver each match on each channel.
///
/// A failed delivery is recorded in the report and does not stop the others.
pub async fn dispatch(
    records: &[BirthdayRecord],
    today: NaiveDate,
    channels: &[Box<dyn DeliveryChannel>],
    mut ledger: Option<&mut SentLedger>,
    dry_run: bool,
) -> DispatchReport {
    let (matches, skipped_records) = {
        let skipped = RefCell::new(Vec::new());
        let reporter = |id: &str, _: &RecordError| skipped.borrow_mut().push(id.to_string());
        let matches = evaluate_with(records, today, &reporter);
        (matches, skipped.into_inner())
    };

    let names: HashMap<&str, &str> = records
        .iter()
        .map(|r| (r.id.as_str(), r.name.as_str()))
        .collect();

    let mut report = DispatchReport {
        matched: matches.len(),
        skipped_records,
        ..DispatchReport::default()
    };

    for m in &matches {
        let name = names.get(m.record_id.as_str()).copied().unwrap_or("Someone");
        let request = render(m, name);

        for ch in channels {
            if let Some(l) = ledger.as_deref() {
                if l.contains(today, &request.id, ch.name()) {
                    report.suppressed += 1;
                    continue;
                }
            }

            if dry_run {
                println!("[DRY RUN] would send [{}] {} -> {}", ch.name(), request.title, name);
                continue;
            }

            match ch.deliver(&request).await {
                Ok(()) => {
                    report.delivered += 1;
                    if let Some(l) = ledger.as_deref_mut() {
                        if let Err(e) = l.record(today, &request.id, ch.name()) {
                            warn!(tag = %request.id, error = %e, "could not record sent reminder");
                        }
                    }
                }
                Err(e) => {
                    warn!(tag = %request.id, channel = ch.name(), error = %e, "delivery failed");
                    report.failures.push(DeliveryFailure {
                        tag: request.id.clone(),
                        channel: ch.name().to_string(),
                        error: format!("{e:#}"),
                    });
                }
            }
        }
    }

    info!(
        %today,
        matched = report.matched,
        delivered = report.delivered,
        suppressed = report.suppressed,
        failed = report.failures.len(),
        "reminder check complete"
    );
    report
}
