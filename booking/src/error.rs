//! Error types for the booking subsystem.
//!
//! Validation errors are user-facing: their `Display` output is the inline
//! message shown next to the field. The remaining enums describe collaborator
//! and wiring failures, none of which is fatal to a session.

use little_lemon_runtime::StoreError;
use thiserror::Error;

/// Message shown when a submission is rejected or fails
pub const SUBMIT_FAILED_MESSAGE: &str = "Failed to submit reservation. Please try again.";

/// A field-level validation failure
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationError {
    /// No date selected
    #[error("Please select a date for your reservation.")]
    DateMissing,
    /// Date before today
    #[error("Please select a date that is today or in the future.")]
    DateInPast,
    /// Guest input empty, zero or unparseable
    #[error("Please enter the number of guests.")]
    GuestsMissing,
    /// Fewer than one guest
    #[error("At least 1 guest is required.")]
    TooFewGuests,
    /// More than ten guests
    #[error("Maximum 10 guests allowed.")]
    TooManyGuests,
    /// The date has no bookable times left
    #[error("No times available for this date. Please choose another date.")]
    NoTimesAvailable,
    /// No time selected
    #[error("Please select a time for your reservation.")]
    TimeMissing,
    /// The selected time was booked between selection and submit
    #[error("The selected time is no longer available. Please choose a different time.")]
    TimeUnavailable,
}

/// Failure of the time-source collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeSourceError {
    /// The source could not answer
    #[error("time source unavailable: {0}")]
    Unavailable(String),
    /// The source panicked while answering
    #[error("time source panicked: {0}")]
    Panicked(String),
}

/// Failure of the submission collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The reservation could not be delivered
    #[error("submission transport failed: {0}")]
    Transport(String),
    /// The collaborator gave up before answering
    #[error("submission timed out")]
    Timeout,
}

/// Invalid booking configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The fallback time list has no entries
    #[error("default time list must not be empty")]
    EmptyDefaultTimes,
    /// The fallback time list repeats a slot
    #[error("default time list contains {0} more than once")]
    DuplicateDefaultTime(String),
    /// The broadcast capacity is zero
    #[error("broadcast capacity must be at least 1")]
    ZeroBroadcastCapacity,
}

/// Errors surfaced by the booking session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// A store rejected or timed out an operation
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Configuration did not validate
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Occasion label not recognised
    #[error("unknown occasion: {0}")]
    UnknownOccasion(String),
}
