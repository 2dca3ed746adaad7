//! Business metrics for table booking.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `booking_availability_fetch_total{outcome}` - Time source answers (ok, fallback)
//! - `booking_slots_booked_total` - Slots removed after a confirmed reservation
//! - `booking_submissions_total{outcome}` - Submissions by outcome (accepted,
//!   rejected, failed, cancelled, discarded)
//! - `booking_validation_failures_total{error}` - Submits blocked by validation
//!
//! ## Histograms
//! - `booking_submission_duration_seconds` - Time spent in the submission collaborator

use crate::error::ValidationError;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Duration;

/// Register descriptions for all booking metrics
///
/// Call once at startup, before any metrics are recorded.
pub fn register_metrics() {
    describe_counter!(
        "booking_availability_fetch_total",
        "Time source lookups by outcome (ok, fallback)"
    );
    describe_counter!(
        "booking_slots_booked_total",
        "Time slots removed from availability after a confirmed reservation"
    );
    describe_counter!(
        "booking_submissions_total",
        "Reservation submissions by outcome"
    );
    describe_counter!(
        "booking_validation_failures_total",
        "Submit attempts blocked by a validation error"
    );
    describe_histogram!(
        "booking_submission_duration_seconds",
        "Time spent waiting on the submission collaborator"
    );

    tracing::info!("Booking metrics registered");
}

pub(crate) fn record_fetch(outcome: &'static str) {
    counter!("booking_availability_fetch_total", "outcome" => outcome).increment(1);
}

pub(crate) fn record_slot_booked() {
    counter!("booking_slots_booked_total").increment(1);
}

pub(crate) fn record_submission(outcome: &'static str) {
    counter!("booking_submissions_total", "outcome" => outcome).increment(1);
}

pub(crate) fn record_submission_duration(elapsed: Duration) {
    histogram!("booking_submission_duration_seconds").record(elapsed.as_secs_f64());
}

pub(crate) fn record_validation_failure(error: &ValidationError) {
    let label = match error {
        ValidationError::DateMissing => "date_missing",
        ValidationError::DateInPast => "date_in_past",
        ValidationError::GuestsMissing => "guests_missing",
        ValidationError::TooFewGuests => "too_few_guests",
        ValidationError::TooManyGuests => "too_many_guests",
        ValidationError::NoTimesAvailable => "no_times_available",
        ValidationError::TimeMissing => "time_missing",
        ValidationError::TimeUnavailable => "time_unavailable",
    };
    counter!("booking_validation_failures_total", "error" => label).increment(1);
}
