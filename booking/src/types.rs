//! Domain types for table booking.
//!
//! Value objects shared by the availability store and the reservation
//! controller: time slots, guest counts, occasions, the reservation payload
//! and the in-progress draft with its validation bookkeeping.

use crate::error::{BookingError, SubmitError, ValidationError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Time slots
// ============================================================================

/// A bookable time for a date, e.g. `"17:00"`
///
/// Opaque: slots are compared as strings and never parsed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeSlot(String);

impl TimeSlot {
    /// Creates a new `TimeSlot`
    #[must_use]
    pub fn new(slot: impl Into<String>) -> Self {
        Self(slot.into())
    }

    /// The slot as it is displayed
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the slot carries no time at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TimeSlot {
    fn from(slot: &str) -> Self {
        Self::new(slot)
    }
}

/// Build a list of slots from string literals
#[must_use]
pub fn slots<'a>(times: impl IntoIterator<Item = &'a str>) -> Vec<TimeSlot> {
    times.into_iter().map(TimeSlot::from).collect()
}

// ============================================================================
// Occasion
// ============================================================================

/// What the table is booked for
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Occasion {
    /// Birthday celebration (form default)
    #[default]
    Birthday,
    /// Anniversary celebration
    Anniversary,
}

impl Occasion {
    /// All occasions in display order
    pub const ALL: [Self; 2] = [Self::Birthday, Self::Anniversary];

    /// Display label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Birthday => "Birthday",
            Self::Anniversary => "Anniversary",
        }
    }
}

impl fmt::Display for Occasion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Occasion {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|occasion| occasion.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| BookingError::UnknownOccasion(s.to_string()))
    }
}

// ============================================================================
// Guests
// ============================================================================

/// Number of guests as entered in the form
///
/// Kept numeric rather than integral: `2.5` parses and is within range.
/// Empty, unparseable or non-finite input reads as zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guests(f64);

impl Guests {
    /// Smallest accepted party size
    pub const MIN: f64 = 1.0;
    /// Largest accepted party size
    pub const MAX: f64 = 10.0;

    /// Creates a new `Guests` count
    #[must_use]
    pub const fn new(count: f64) -> Self {
        Self(count)
    }

    /// Parse raw form input
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self(0.0);
        }
        match trimmed.parse::<f64>() {
            Ok(count) if count.is_finite() => Self(count),
            _ => Self(0.0),
        }
    }

    /// The numeric count
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Whether the count lies in `[MIN, MAX]`
    #[must_use]
    pub fn in_range(self) -> bool {
        (Self::MIN..=Self::MAX).contains(&self.0)
    }
}

impl fmt::Display for Guests {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for Guests {
    fn from(count: u8) -> Self {
        Self(f64::from(count))
    }
}

// ============================================================================
// Reservation
// ============================================================================

/// A completed reservation, as handed to the submission collaborator
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    /// Day of the booking
    pub date: NaiveDate,
    /// Booked time slot
    pub time: TimeSlot,
    /// Party size
    pub guests: Guests,
    /// Occasion
    pub occasion: Occasion,
}

/// The user's in-progress reservation input
#[derive(Clone, Debug, PartialEq)]
pub struct ReservationDraft {
    /// Selected date, if any
    pub date: Option<NaiveDate>,
    /// Selected time, if any
    pub time: Option<TimeSlot>,
    /// Raw guest input as typed
    pub guests_input: String,
    /// Parsed guest count
    pub guests: Guests,
    /// Selected occasion
    pub occasion: Occasion,
}

impl ReservationDraft {
    /// Fresh draft: no date, the given time, one guest, birthday
    #[must_use]
    pub fn new(time: Option<TimeSlot>) -> Self {
        Self {
            date: None,
            time,
            guests_input: "1".to_string(),
            guests: Guests::new(1.0),
            occasion: Occasion::default(),
        }
    }

    /// The reservation payload, once date and time are both set
    #[must_use]
    pub fn to_reservation(&self) -> Option<Reservation> {
        Some(Reservation {
            date: self.date?,
            time: self.time.clone()?,
            guests: self.guests,
            occasion: self.occasion,
        })
    }
}

impl Default for ReservationDraft {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Inline error per form field
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldErrors {
    /// Date field error
    pub date: Option<ValidationError>,
    /// Time field error
    pub time: Option<ValidationError>,
    /// Guests field error
    pub guests: Option<ValidationError>,
    /// Retryable submission failure message
    pub submit: Option<String>,
}

impl FieldErrors {
    /// Whether no error is showing
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.date.is_none() && self.time.is_none() && self.guests.is_none() && self.submit.is_none()
    }
}

/// Fields the user has interacted with
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Touched {
    /// The date picker was used or left
    pub date: bool,
    /// The guest input was left
    pub guests: bool,
}

// ============================================================================
// Submission
// ============================================================================

/// Lifecycle of a submission
///
/// Only `Submitting` blocks a new submit or a reset. `Failed` and
/// `Cancelled` are the idle state after a rejected, errored or cancelled
/// attempt: they gate exactly like `Idle` and only add what happened.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SubmissionState {
    /// Nothing in flight
    #[default]
    Idle,
    /// Waiting on the submission collaborator
    Submitting {
        /// Attempt number this submission carries
        attempt: u64,
    },
    /// Last attempt was rejected or errored
    Failed {
        /// What went wrong
        reason: String,
    },
    /// Last attempt was cancelled by the user
    Cancelled,
}

impl SubmissionState {
    /// Whether a submission is in flight
    #[must_use]
    pub const fn is_submitting(&self) -> bool {
        matches!(self, Self::Submitting { .. })
    }
}

/// Result of one call to the submission collaborator
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The reservation was stored
    Accepted,
    /// The collaborator answered no
    Rejected,
    /// The collaborator errored
    Failed(String),
}

impl From<Result<bool, SubmitError>> for SubmissionOutcome {
    fn from(result: Result<bool, SubmitError>) -> Self {
        match result {
            Ok(true) => Self::Accepted,
            Ok(false) => Self::Rejected,
            Err(error) => Self::Failed(error.to_string()),
        }
    }
}
