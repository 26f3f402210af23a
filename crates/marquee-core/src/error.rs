//! # Error Types
//!
//! Domain-specific error types for marquee-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  marquee-core errors (this file)                                       │
//! │  └── RecurrenceError  - Recurrence rule parse failures                 │
//! │                                                                         │
//! │  marquee-sync errors (separate crate)                                  │
//! │  └── SyncError        - Fetch, credential and config failures          │
//! │                                                                         │
//! │  Flow: RecurrenceError → "schedule never occurs" → slide not scheduled │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A broken rule never stops playback. The publication filter folds a
//! `RecurrenceError` into "does not occur", so only the affected playlist or
//! slide drops out of rotation.

use thiserror::Error;

/// Result type alias for recurrence parsing.
pub type RecurrenceResult<T> = Result<T, RecurrenceError>;

/// Recurrence rule errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecurrenceError {
    /// The rule text has no `RRULE` line.
    #[error("Recurrence rule has no RRULE line")]
    MissingRule,

    /// The rule text has no `DTSTART` line.
    #[error("Recurrence rule has no DTSTART line")]
    MissingStart,

    /// A date or date-time value could not be parsed.
    #[error("Invalid recurrence date: {0}")]
    InvalidDate(String),

    /// A rule part has a value outside its domain.
    #[error("Invalid value for {name}: {value}")]
    InvalidPart { name: String, value: String },

    /// The `FREQ` part names a frequency this engine does not evaluate.
    #[error("Unsupported recurrence frequency: {0}")]
    UnsupportedFrequency(String),

    /// The rule uses a part this engine does not evaluate.
    #[error("Unsupported recurrence part: {0}")]
    UnsupportedPart(String),

    /// The rule text contains a line that is neither DTSTART, RRULE nor EXDATE.
    #[error("Unknown recurrence line: {0}")]
    UnknownLine(String),
}

impl RecurrenceError {
    pub(crate) fn part(name: &str, value: &str) -> Self {
        RecurrenceError::InvalidPart {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}
