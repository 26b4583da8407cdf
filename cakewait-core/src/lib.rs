//! cakewait-core: birthday records, the recurrence calculator and the
//! reminder policy engine.

pub mod calendar;
pub mod error;
pub mod policy;
pub mod record;
pub mod recurrence;
pub mod store;

pub use calendar::{birthdays_in_month, days_in_month, MonthGrid};
pub use error::{ErrorReporter, RecordError};
pub use policy::{classify, evaluate, evaluate_with, stable_tag, Bucket, NotificationMatch};
pub use record::{
    format_birth_date, format_friendly, parse_birth_date, BirthdayRecord, RecordDraft,
};
pub use recurrence::{
    age_at_next_occurrence, age_on_next_occurrence, compare_by_upcoming, current_age,
    days_until_next_occurrence, is_occurrence_today, local_today, next_occurrence,
    sort_by_upcoming, Upcoming,
};
pub use store::{MemoryStore, RecordStore};
