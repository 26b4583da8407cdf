//! Month view: which birthdays fall on which day of a given month.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use chrono::{Datelike, NaiveDate, Weekday};
use tracing::warn;

use crate::record::BirthdayRecord;
use crate::recurrence::occurrence_in_year;

#[derive(Debug, Clone, PartialEq)]
pub struct MonthGrid<'a> {
    pub year: i32,
    pub month: u32,
    pub days_in_month: u32,
    pub first_weekday: Weekday,
    /// Day of month -> birthdays celebrated that day, ordered by name.
    pub by_day: BTreeMap<u32, Vec<&'a BirthdayRecord>>,
}

impl<'a> MonthGrid<'a> {
    pub fn build(records: &'a [BirthdayRecord], year: i32, month: u32) -> Result<Self> {
        let first = match NaiveDate::from_ymd_opt(year, month, 1) {
            Some(d) => d,
            None => bail!("invalid month: {year}-{month:02}"),
        };

        let mut by_day: BTreeMap<u32, Vec<&'a BirthdayRecord>> = BTreeMap::new();
        for (day, record) in birthdays_in_month(records, year, month) {
            by_day.entry(day).or_default().push(record);
        }

        Ok(Self {
            year,
            month,
            days_in_month: days_in_month(year, month),
            first_weekday: first.weekday(),
            by_day,
        })
    }

    pub fn total(&self) -> usize {
        self.by_day.values().map(Vec::len).sum()
    }

    /// Monday-first rows of 7 cells; `None` pads before day 1 and after the last day.
    pub fn weeks(&self) -> Vec<[Option<u32>; 7]> {
        let lead = self.first_weekday.num_days_from_monday() as usize;
        let mut cells: Vec<Option<u32>> = vec![None; lead];
        cells.extend((1..=self.days_in_month).map(Some));
        while cells.len() % 7 != 0 {
            cells.push(None);
        }

        cells
            .chunks(7)
            .map(|c| {
                let mut row = [None; 7];
                row.copy_from_slice(c);
                row
            })
            .collect()
    }
}

/// `(day, record)` pairs for birthdays celebrated in `year`/`month`, ordered by
/// day then name. Feb 29 birthdays land on Feb 28 in common years.
pub fn birthdays_in_month(
    records: &[BirthdayRecord],
    year: i32,
    month: u32,
) -> Vec<(u32, &BirthdayRecord)> {
    let mut out = Vec::new();

    for record in records {
        let birth = match record.birth_date() {
            Ok(d) => d,
            Err(e) => {
                warn!(record_id = %record.id, error = %e, "skipping record in month view");
                continue;
            }
        };
        if birth.month() != month {
            continue;
        }
        out.push((occurrence_in_year(birth, year).day(), record));
    }

    out.sort_by(|(da, a), (db, b)| da.cmp(db).then_with(|| a.name.cmp(&b.name)));
    out
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(ny, nm, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(31)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<BirthdayRecord> {
        vec![
            BirthdayRecord::new("1", "Zoe", "1990-02-14"),
            BirthdayRecord::new("2", "Leap", "2000-02-29"),
            BirthdayRecord::new("3", "Ann", "1985-02-14"),
            BirthdayRecord::new("4", "March", "1985-03-01"),
            BirthdayRecord::new("5", "Bad", "1985-02-31"),
        ]
    }

    #[test]
    fn month_filter_orders_by_day_then_name() {
        let recs = records();
        let got: Vec<(u32, &str)> = birthdays_in_month(&recs, 2024, 2)
            .into_iter()
            .map(|(d, r)| (d, r.name.as_str()))
            .collect();
        assert_eq!(got, [(14, "Ann"), (14, "Zoe"), (29, "Leap")]);
    }

    #[test]
    fn leap_birthday_moves_to_28_in_common_year() {
        let recs = records();
        let grid = MonthGrid::build(&recs, 2023, 2).unwrap();
        assert_eq!(grid.days_in_month, 28);
        assert_eq!(grid.by_day[&28][0].name, "Leap");
        assert_eq!(grid.total(), 3);
    }

    #[test]
    fn weeks_cover_every_day() {
        let recs = records();
        // 2024-02-01 is a Thursday
        let grid = MonthGrid::build(&recs, 2024, 2).unwrap();
        let weeks = grid.weeks();
        assert_eq!(weeks[0][..3], [None, None, None]);
        assert_eq!(weeks[0][3], Some(1));
        let days: Vec<u32> = weeks.iter().flatten().flatten().copied().collect();
        assert_eq!(days, (1..=29).collect::<Vec<_>>());
    }

    #[test]
    fn rejects_invalid_month() {
        assert!(MonthGrid::build(&[], 2024, 13).is_err());
    }
}
