//! Field validators for the reservation form.
//!
//! Each validator answers for one field; [`is_form_valid`] combines them the
//! way the submit button's enabled state needs.

use crate::error::ValidationError;
use crate::types::{Guests, ReservationDraft, TimeSlot};
use chrono::NaiveDate;

/// The date must be set and not before `today`
///
/// # Errors
///
/// [`ValidationError::DateMissing`] or [`ValidationError::DateInPast`].
pub fn validate_date(date: Option<NaiveDate>, today: NaiveDate) -> Result<(), ValidationError> {
    match date {
        None => Err(ValidationError::DateMissing),
        Some(date) if date < today => Err(ValidationError::DateInPast),
        Some(_) => Ok(()),
    }
}

/// The guest count must be non-zero and within `[1, 10]`
///
/// # Errors
///
/// [`ValidationError::GuestsMissing`] for zero, otherwise
/// [`ValidationError::TooFewGuests`] or [`ValidationError::TooManyGuests`].
#[allow(clippy::float_cmp)] // zero is exactly what empty input parses to
pub fn validate_guests(guests: Guests) -> Result<(), ValidationError> {
    let count = guests.value();
    if count == 0.0 {
        Err(ValidationError::GuestsMissing)
    } else if count < Guests::MIN {
        Err(ValidationError::TooFewGuests)
    } else if count > Guests::MAX {
        Err(ValidationError::TooManyGuests)
    } else {
        Ok(())
    }
}

/// [`validate_guests`] on raw form input
///
/// # Errors
///
/// Same as [`validate_guests`].
pub fn validate_guests_input(input: &str) -> Result<(), ValidationError> {
    validate_guests(Guests::parse(input))
}

/// There must be times to pick from, and one of them picked
///
/// # Errors
///
/// [`ValidationError::NoTimesAvailable`] or [`ValidationError::TimeMissing`].
pub fn validate_time(time: Option<&TimeSlot>, candidates: &[TimeSlot]) -> Result<(), ValidationError> {
    if candidates.is_empty() {
        return Err(ValidationError::NoTimesAvailable);
    }
    match time {
        Some(time) if !time.is_empty() => Ok(()),
        _ => Err(ValidationError::TimeMissing),
    }
}

/// Whether the draft could be submitted right now
#[must_use]
pub fn is_form_valid(draft: &ReservationDraft, candidates: &[TimeSlot], today: NaiveDate) -> bool {
    validate_date(draft.date, today).is_ok()
        && validate_guests(draft.guests).is_ok()
        && validate_time(draft.time.as_ref(), candidates).is_ok()
        && draft.time.as_ref().is_some_and(|time| candidates.contains(time))
}
