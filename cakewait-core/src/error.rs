//! Typed errors for record validation and date parsing.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// Stored value is not `YYYY-MM-DD` or not a real calendar date.
    #[error("malformed birth date '{value}': expected a calendar date as YYYY-MM-DD")]
    MalformedDate { value: String },

    #[error("name is required")]
    MissingName,

    #[error("birth date is required")]
    MissingDate,

    #[error("no birthday with id '{0}'")]
    NotFound(String),
}

/// Receives per-record failures that were skipped during a batch operation.
pub trait ErrorReporter {
    fn report(&self, record_id: &str, error: &RecordError);
}

impl<F> ErrorReporter for F
where
    F: Fn(&str, &RecordError),
{
    fn report(&self, record_id: &str, error: &RecordError) {
        self(record_id, error)
    }
}
