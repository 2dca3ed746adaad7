//! Collaborators injected into the booking reducers.
//!
//! The time source and the submitter are supplied by the host application;
//! the dispatcher carries actions from the reservation controller to the
//! availability store in the order they were emitted.

use crate::availability::AvailabilityAction;
use crate::error::{SubmitError, TimeSourceError};
use crate::types::{Reservation, TimeSlot};
use chrono::NaiveDate;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use tokio::sync::mpsc;

/// Answers which times are bookable on a date
pub trait TimeSource: Send + Sync {
    /// Bookable times for `date`, in the source's own order
    ///
    /// # Errors
    ///
    /// Returns [`TimeSourceError`] when the source cannot answer.
    fn available_times(&self, date: NaiveDate) -> Result<Vec<TimeSlot>, TimeSourceError>;
}

/// Persists a reservation
pub trait Submitter: Send + Sync {
    /// Submit `reservation`; `Ok(false)` means the reservation was refused
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError`] when the submission could not be completed.
    fn submit(
        &self,
        reservation: Reservation,
    ) -> Pin<Box<dyn Future<Output = Result<bool, SubmitError>> + Send + '_>>;
}

/// Delivers actions to the availability store
pub trait AvailabilityDispatcher: Send + Sync {
    /// Hand `action` over without waiting for it to be reduced
    fn dispatch(&self, action: AvailabilityAction);
}

/// Dispatcher backed by an unbounded channel, drained in order by the session
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    sender: mpsc::UnboundedSender<AvailabilityAction>,
}

impl ChannelDispatcher {
    /// Creates a new `ChannelDispatcher`
    #[must_use]
    pub const fn new(sender: mpsc::UnboundedSender<AvailabilityAction>) -> Self {
        Self { sender }
    }
}

impl AvailabilityDispatcher for ChannelDispatcher {
    fn dispatch(&self, action: AvailabilityAction) {
        if let Err(error) = self.sender.send(action) {
            tracing::warn!(action = ?error.0, "Availability store is gone, dropping action");
        }
    }
}

/// Dispatcher for a controller running without an availability store
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedDispatcher;

impl AvailabilityDispatcher for DetachedDispatcher {
    fn dispatch(&self, action: AvailabilityAction) {
        tracing::debug!(?action, "No availability store attached, dropping action");
    }
}

/// Ask `source` for the times on `date`, turning a panic into an error
///
/// # Errors
///
/// Returns the source's own error, or [`TimeSourceError::Panicked`] if it
/// panicked.
pub fn fetch_times(source: &dyn TimeSource, date: NaiveDate) -> Result<Vec<TimeSlot>, TimeSourceError> {
    panic::catch_unwind(AssertUnwindSafe(|| source.available_times(date)))
        .unwrap_or_else(|payload| Err(TimeSourceError::Panicked(panic_message(payload.as_ref()))))
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
