//! Birthday record model + the create/edit form boundary.
//!
//! Records are stored exactly the way the app always kept them: camelCase keys
//! and a plain `YYYY-MM-DD` birth date that is read as a local calendar date.
//! Nothing here ever converts through a timezone.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RecordError;

/// Persisted `birthDate` format.
pub const BIRTH_DATE_FORMAT: &str = "%Y-%m-%d";

static BIRTH_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<year>\d{4})-(?P<month>\d{2})-(?P<day>\d{2})$")
        .expect("birth date pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BirthdayRecord {
    pub id: String,
    pub name: String,

    /// Zero-padded `YYYY-MM-DD`, local calendar.
    pub birth_date: String,

    #[serde(default = "default_notification_enabled")]
    pub notification_enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Photo reference kept from earlier saves; never edited here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Epoch milliseconds on disk.
    #[serde(with = "epoch_millis", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// `createdAt` is written as epoch milliseconds. Reads also accept an
/// RFC 3339 string.
mod epoch_millis {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Fractional(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(value.timestamp_millis())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let millis = match Raw::deserialize(d)? {
            Raw::Millis(ms) => ms,
            Raw::Fractional(ms) => ms as i64,
            Raw::Text(text) => {
                return DateTime::parse_from_rfc3339(&text)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(de::Error::custom);
            }
        };
        Utc.timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| de::Error::custom(format!("createdAt out of range: {millis}")))
    }
}

fn default_notification_enabled() -> bool {
    true
}

impl BirthdayRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        birth_date: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            birth_date: birth_date.into(),
            notification_enabled: true,
            relationship: None,
            emoji: None,
            notes: None,
            image: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_notifications(mut self, enabled: bool) -> Self {
        self.notification_enabled = enabled;
        self
    }

    pub fn with_relationship(mut self, relationship: impl Into<String>) -> Self {
        self.relationship = Some(relationship.into());
        self
    }

    pub fn with_emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = Some(emoji.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Parse the stored birth date.
    pub fn birth_date(&self) -> Result<NaiveDate, RecordError> {
        parse_birth_date(&self.birth_date)
    }
}

/// Strict `YYYY-MM-DD` parse into a local calendar date.
///
/// The components are taken verbatim, so `"1990-03-10"` is always March 10 1990
/// regardless of the machine's offset. Dates that do not exist on the calendar
/// (e.g. `"2001-02-29"`) are malformed.
pub fn parse_birth_date(value: &str) -> Result<NaiveDate, RecordError> {
    let malformed = || RecordError::MalformedDate {
        value: value.to_string(),
    };

    let caps = BIRTH_DATE_RE.captures(value.trim()).ok_or_else(malformed)?;
    let year: i32 = caps["year"].parse().map_err(|_| malformed())?;
    let month: u32 = caps["month"].parse().map_err(|_| malformed())?;
    let day: u32 = caps["day"].parse().map_err(|_| malformed())?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(malformed)
}

pub fn format_birth_date(date: NaiveDate) -> String {
    date.format(BIRTH_DATE_FORMAT).to_string()
}

/// Short display form, e.g. "Mar 10".
pub fn format_friendly(date: NaiveDate) -> String {
    date.format("%b %-d").to_string()
}

/// User-submitted form values for creating or editing a birthday.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordDraft {
    pub name: String,
    pub birth_date: String,
    pub notification_enabled: bool,
    pub relationship: Option<String>,
    pub emoji: Option<String>,
    pub notes: Option<String>,
}

impl RecordDraft {
    pub fn new(name: impl Into<String>, birth_date: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            birth_date: birth_date.into(),
            notification_enabled: true,
            ..Self::default()
        }
    }

    /// Pre-populate a draft from an existing record (edit form).
    pub fn from_record(record: &BirthdayRecord) -> Self {
        Self {
            name: record.name.clone(),
            birth_date: record.birth_date.clone(),
            notification_enabled: record.notification_enabled,
            relationship: record.relationship.clone(),
            emoji: record.emoji.clone(),
            notes: record.notes.clone(),
        }
    }

    /// Reject drafts that must never reach storage.
    pub fn validate(&self) -> Result<NaiveDate, RecordError> {
        if self.name.trim().is_empty() {
            return Err(RecordError::MissingName);
        }
        if self.birth_date.trim().is_empty() {
            return Err(RecordError::MissingDate);
        }
        parse_birth_date(&self.birth_date)
    }

    /// Build a brand-new record with a fresh id.
    pub fn into_record(self) -> Result<BirthdayRecord, RecordError> {
        let date = self.validate()?;
        Ok(BirthdayRecord {
            id: Uuid::new_v4().to_string(),
            name: self.name.trim().to_string(),
            birth_date: format_birth_date(date),
            notification_enabled: self.notification_enabled,
            relationship: non_empty(self.relationship),
            emoji: non_empty(self.emoji),
            notes: non_empty(self.notes),
            image: None,
            created_at: Utc::now(),
        })
    }

    /// Overwrite `record` in place. `id` and `created_at` never change.
    pub fn apply_to(self, record: &mut BirthdayRecord) -> Result<(), RecordError> {
        let date = self.validate()?;
        record.name = self.name.trim().to_string();
        record.birth_date = format_birth_date(date);
        record.notification_enabled = self.notification_enabled;
        record.relationship = non_empty(self.relationship);
        record.emoji = non_empty(self.emoji);
        record.notes = non_empty(self.notes);
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_local_components_verbatim() {
        let d = parse_birth_date("2000-02-29").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2000, 2, 29).unwrap());
        assert_eq!(format_birth_date(d), "2000-02-29");
    }

    #[test]
    fn rejects_non_calendar_and_unpadded_dates() {
        for bad in ["2001-02-29", "1990-13-01", "1990-3-10", "10/03/1990", "", "abcd-ef-gh"] {
            assert!(
                matches!(parse_birth_date(bad), Err(RecordError::MalformedDate { .. })),
                "expected malformed: {bad}"
            );
        }
    }

    #[test]
    fn draft_requires_name_and_date() {
        assert_eq!(
            RecordDraft::new("  ", "1990-01-01").validate(),
            Err(RecordError::MissingName)
        );
        assert_eq!(
            RecordDraft::new("Alice", "").validate(),
            Err(RecordError::MissingDate)
        );
    }

    #[test]
    fn edit_keeps_identity() {
        let mut rec = RecordDraft::new("Alice", "1995-03-10").into_record().unwrap();
        let id = rec.id.clone();
        let created = rec.created_at;

        let mut draft = RecordDraft::from_record(&rec);
        draft.name = "Alice B.".to_string();
        draft.notes = Some("   ".to_string());
        draft.apply_to(&mut rec).unwrap();

        assert_eq!(rec.id, id);
        assert_eq!(rec.created_at, created);
        assert_eq!(rec.name, "Alice B.");
        assert_eq!(rec.notes, None);
    }

    #[test]
    fn serializes_with_persisted_keys() {
        let rec = BirthdayRecord::new("b1", "Bob", "1990-03-11").with_emoji("🎂");
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["birthDate"], "1990-03-11");
        assert_eq!(json["notificationEnabled"], true);
        assert!(json.get("notes").is_none());
    }

    #[test]
    fn loads_records_saved_with_epoch_millis() {
        let json = r#"[{"id":"1700000000000","name":"Alice","birthDate":"1995-03-10","relationship":"Friend","image":"data:image/png;base64,AAAA","notificationEnabled":true,"createdAt":1700000000000}]"#;
        let records: Vec<BirthdayRecord> = serde_json::from_str(json).unwrap();

        let alice = &records[0];
        assert_eq!(alice.created_at.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(alice.relationship.as_deref(), Some("Friend"));
        assert_eq!(alice.birth_date().unwrap(), NaiveDate::from_ymd_opt(1995, 3, 10).unwrap());

        let back = serde_json::to_value(alice).unwrap();
        assert_eq!(back["createdAt"], 1_700_000_000_000i64);
        assert_eq!(back["image"], "data:image/png;base64,AAAA");
    }

    #[test]
    fn created_at_also_reads_rfc3339() {
        let json = r#"{"id":"b","name":"Bob","birthDate":"1990-03-11","createdAt":"2024-03-01T12:00:00Z"}"#;
        let bob: BirthdayRecord = serde_json::from_str(json).unwrap();
        assert_eq!(bob.created_at.timestamp(), 1_709_294_400);
        assert!(bob.notification_enabled);
    }

    #[test]
    fn friendly_format() {
        let d = NaiveDate::from_ymd_opt(1995, 3, 9).unwrap();
        assert_eq!(format_friendly(d), "Mar 9");
    }
}
