//! Notification policy: which records cross a reminder threshold today.
//!
//! Evaluation is stateless and deterministic. Nothing is remembered between
//! calls, so running it from a timer, a foreground event and a background job
//! on the same day yields the same matches each time. Suppressing repeats is
//! left to the delivery side via [`stable_tag`].

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ErrorReporter, RecordError};
use crate::record::BirthdayRecord;
use crate::recurrence::{age_at_next_occurrence, days_until_next_occurrence};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Today,
    Tomorrow,
    Week,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Today, Bucket::Tomorrow, Bucket::Week];

    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::Today => "today",
            Bucket::Tomorrow => "tomorrow",
            Bucket::Week => "week",
        }
    }

    /// Days before the occurrence at which this bucket fires.
    pub fn offset_days(self) -> i64 {
        match self {
            Bucket::Today => 0,
            Bucket::Tomorrow => 1,
            Bucket::Week => 7,
        }
    }

    pub fn for_days(days_until: i64) -> Option<Bucket> {
        Bucket::ALL
            .into_iter()
            .find(|b| b.offset_days() == days_until)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMatch {
    pub record_id: String,
    pub bucket: Bucket,
    /// Age turned on the matched occurrence.
    pub occurrence_age: i32,
}

impl NotificationMatch {
    pub fn tag(&self) -> String {
        stable_tag(&self.record_id, self.bucket)
    }
}

/// Delivery-side identifier: one per record per bucket, so re-sending the same
/// alert replaces the earlier one.
pub fn stable_tag(record_id: &str, bucket: Bucket) -> String {
    format!("{}:{}", record_id, bucket.as_str())
}

/// Classify one record. `Ok(None)` is the no-match state.
pub fn classify(
    record: &BirthdayRecord,
    today: NaiveDate,
) -> Result<Option<NotificationMatch>, RecordError> {
    let birth = record.birth_date()?;
    if !record.notification_enabled {
        return Ok(None);
    }

    let days = days_until_next_occurrence(birth, today);
    Ok(Bucket::for_days(days).map(|bucket| NotificationMatch {
        record_id: record.id.clone(),
        bucket,
        occurrence_age: age_at_next_occurrence(birth, today),
    }))
}

/// Matches for `records` in input order. Malformed records are logged and skipped.
pub fn evaluate(records: &[BirthdayRecord], today: NaiveDate) -> Vec<NotificationMatch> {
    evaluate_inner(records, today, None)
}

/// Like [`evaluate`], also handing every skipped record to `reporter`.
pub fn evaluate_with(
    records: &[BirthdayRecord],
    today: NaiveDate,
    reporter: &dyn ErrorReporter,
) -> Vec<NotificationMatch> {
    evaluate_inner(records, today, Some(reporter))
}

fn evaluate_inner(
    records: &[BirthdayRecord],
    today: NaiveDate,
    reporter: Option<&dyn ErrorReporter>,
) -> Vec<NotificationMatch> {
    let mut out = Vec::new();

    for record in records {
        match classify(record, today) {
            Ok(Some(m)) => {
                debug!(record_id = %m.record_id, bucket = %m.bucket, "reminder threshold crossed");
                out.push(m);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(record_id = %record.id, error = %e, "skipping record in evaluation");
                if let Some(r) = reporter {
                    r.report(&record.id, &e);
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    fn scenario() -> Vec<BirthdayRecord> {
        vec![
            BirthdayRecord::new("alice", "Alice", "1995-03-10"),
            BirthdayRecord::new("bob", "Bob", "1990-03-11"),
            BirthdayRecord::new("cara", "Cara", "2000-03-17"),
            BirthdayRecord::new("dana", "Dana", "1980-03-12").with_notifications(false),
        ]
    }

    #[test]
    fn scenario_buckets() {
        let out = evaluate(&scenario(), today());
        assert_eq!(
            out,
            vec![
                NotificationMatch {
                    record_id: "alice".into(),
                    bucket: Bucket::Today,
                    occurrence_age: 29,
                },
                NotificationMatch {
                    record_id: "bob".into(),
                    bucket: Bucket::Tomorrow,
                    occurrence_age: 34,
                },
                NotificationMatch {
                    record_id: "cara".into(),
                    bucket: Bucket::Week,
                    occurrence_age: 24,
                },
            ]
        );
    }

    #[test]
    fn disabled_never_matches() {
        let rec = BirthdayRecord::new("x", "X", "1980-03-10").with_notifications(false);
        for offset in [0, 1, 7] {
            let t = today() - chrono::Duration::days(offset);
            assert!(evaluate(std::slice::from_ref(&rec), t).is_empty());
        }
    }

    #[test]
    fn non_threshold_days_do_not_match() {
        let t = today();
        for days in [2i64, 3, 6, 8, 30, 364] {
            let birth = t + chrono::Duration::days(days);
            let rec = BirthdayRecord::new("r", "R", crate::record::format_birth_date(birth));
            assert!(classify(&rec, t).unwrap().is_none(), "days={days}");
        }
    }

    #[test]
    fn malformed_record_is_skipped_and_reported() {
        let mut records = scenario();
        records.insert(1, BirthdayRecord::new("oops", "Oops", "1990-02-30"));

        let reported = RefCell::new(Vec::new());
        let reporter = |id: &str, e: &RecordError| {
            reported.borrow_mut().push((id.to_string(), e.clone()));
        };
        let out = evaluate_with(&records, today(), &reporter);

        assert_eq!(out.len(), 3);
        let reported = reported.into_inner();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].0, "oops");
    }

    #[test]
    fn repeated_evaluation_is_identical() {
        let records = scenario();
        let a = serde_json::to_vec(&evaluate(&records, today())).unwrap();
        let b = serde_json::to_vec(&evaluate(&records, today())).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn tags_are_stable_per_bucket() {
        assert_eq!(stable_tag("alice", Bucket::Today), "alice:today");
        assert_ne!(
            stable_tag("alice", Bucket::Tomorrow),
            stable_tag("alice", Bucket::Week)
        );
        assert_eq!(Bucket::for_days(7), Some(Bucket::Week));
        assert_eq!(Bucket::for_days(2), None);
    }
}
