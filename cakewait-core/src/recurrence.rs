//! Recurrence calculator: days until the next annual occurrence, ages, and
//! upcoming-first ordering.
//!
//! Every function here is pure over `(birth, today)`. `today` is a calendar
//! date, so time-of-day and DST never leak into the day counts: an occurrence
//! that starts at today's local midnight is always 0 days away.
//!
//! Leap day rule: a Feb 29 birthday is celebrated on Feb 28 in common years.

use std::cmp::Ordering;

use chrono::{Datelike, Local, NaiveDate};
use tracing::warn;

use crate::error::{ErrorReporter, RecordError};
use crate::record::BirthdayRecord;

/// Today's date on the local calendar.
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// The celebration date for `birth` within `year`.
pub fn occurrence_in_year(birth: NaiveDate, year: i32) -> NaiveDate {
    match NaiveDate::from_ymd_opt(year, birth.month(), birth.day()) {
        Some(d) => d,
        // only Feb 29 in a common year lands here
        None => NaiveDate::from_ymd_opt(year, 2, 28).unwrap_or(birth),
    }
}

/// Next occurrence on or after `today`.
pub fn next_occurrence(birth: NaiveDate, today: NaiveDate) -> NaiveDate {
    let candidate = occurrence_in_year(birth, today.year());
    if candidate < today {
        occurrence_in_year(birth, today.year() + 1)
    } else {
        candidate
    }
}

/// Whole days until the next occurrence. 0 means today; never negative.
pub fn days_until_next_occurrence(birth: NaiveDate, today: NaiveDate) -> i64 {
    (next_occurrence(birth, today) - today).num_days()
}

/// Completed years as of `today`.
pub fn current_age(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

/// `current_age + 1`: the age reached at the next birthday that has not yet
/// happened.
pub fn age_on_next_occurrence(birth: NaiveDate, today: NaiveDate) -> i32 {
    current_age(birth, today) + 1
}

/// Age turned on the occurrence returned by [`next_occurrence`].
///
/// Differs from [`age_on_next_occurrence`] only when the occurrence is today,
/// where this is the age being celebrated today.
pub fn age_at_next_occurrence(birth: NaiveDate, today: NaiveDate) -> i32 {
    next_occurrence(birth, today).year() - birth.year()
}

pub fn is_occurrence_today(birth: NaiveDate, today: NaiveDate) -> bool {
    days_until_next_occurrence(birth, today) == 0
}

/// Display row for upcoming-first listings.
#[derive(Debug, Clone, PartialEq)]
pub struct Upcoming<'a> {
    pub record: &'a BirthdayRecord,
    pub next_date: NaiveDate,
    pub days_until: i64,
    /// `current_age + 1`.
    pub next_age: i32,
    /// Age turned on `next_date`.
    pub occurrence_age: i32,
    pub is_today: bool,
}

impl<'a> Upcoming<'a> {
    pub fn new(record: &'a BirthdayRecord, today: NaiveDate) -> Result<Self, RecordError> {
        let birth = record.birth_date()?;
        let days_until = days_until_next_occurrence(birth, today);
        Ok(Self {
            record,
            next_date: next_occurrence(birth, today),
            days_until,
            next_age: age_on_next_occurrence(birth, today),
            occurrence_age: age_at_next_occurrence(birth, today),
            is_today: days_until == 0,
        })
    }
}

/// Ascending days-until, then name, then id.
///
/// Records with a malformed birth date sort after every valid one.
pub fn compare_by_upcoming(a: &BirthdayRecord, b: &BirthdayRecord, today: NaiveDate) -> Ordering {
    let key = |r: &BirthdayRecord| {
        r.birth_date()
            .map(|d| days_until_next_occurrence(d, today))
            .ok()
    };
    upcoming_order((key(a), a), (key(b), b))
}

/// Shared by [`compare_by_upcoming`] and [`sort_by_upcoming`]; `None` is a
/// record whose days-until could not be computed.
fn upcoming_order(
    (days_a, ra): (Option<i64>, &BirthdayRecord),
    (days_b, rb): (Option<i64>, &BirthdayRecord),
) -> Ordering {
    match (days_a, days_b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| ra.name.cmp(&rb.name))
    .then_with(|| ra.id.cmp(&rb.id))
}

/// Upcoming-first rows for display. Malformed records are skipped and reported.
pub fn sort_by_upcoming<'a>(
    records: &'a [BirthdayRecord],
    today: NaiveDate,
    reporter: Option<&dyn ErrorReporter>,
) -> Vec<Upcoming<'a>> {
    let mut rows: Vec<Upcoming<'a>> = Vec::with_capacity(records.len());

    for record in records {
        match Upcoming::new(record, today) {
            Ok(row) => rows.push(row),
            Err(e) => {
                warn!(record_id = %record.id, error = %e, "skipping record in upcoming sort");
                if let Some(r) = reporter {
                    r.report(&record.id, &e);
                }
            }
        }
    }

    rows.sort_by(|a, b| {
        upcoming_order(
            (Some(a.days_until), a.record),
            (Some(b.days_until), b.record),
        )
    });
    rows
}
