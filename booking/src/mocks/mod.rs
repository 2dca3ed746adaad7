//! In-memory collaborators for tests and the demo binary.
//!
//! Time sources answer from fixed or scripted lists (or fail on purpose);
//! submitters record what they were given and answer immediately, with an
//! error, or only once released.

use crate::availability::AvailabilityAction;
use crate::environment::{AvailabilityDispatcher, Submitter, TimeSource};
use crate::error::{SubmitError, TimeSourceError};
use crate::types::{Reservation, TimeSlot};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;

type SubmitFuture<'a> = Pin<Box<dyn Future<Output = Result<bool, SubmitError>> + Send + 'a>>;

// ============================================================================
// Time sources
// ============================================================================

/// Answers every date with the same list, recording the dates asked for
#[derive(Debug, Default)]
pub struct StaticTimeSource {
    times: Vec<TimeSlot>,
    calls: Mutex<Vec<NaiveDate>>,
}

impl StaticTimeSource {
    /// Creates a new `StaticTimeSource`
    #[must_use]
    pub const fn new(times: Vec<TimeSlot>) -> Self {
        Self {
            times,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Dates asked for so far
    #[must_use]
    pub fn calls(&self) -> Vec<NaiveDate> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl TimeSource for StaticTimeSource {
    fn available_times(&self, date: NaiveDate) -> Result<Vec<TimeSlot>, TimeSourceError> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(date);
        Ok(self.times.clone())
    }
}

/// Answers per date; dates without a script fall back to `otherwise`, or fail
#[derive(Debug, Default, Clone)]
pub struct ScriptedTimeSource {
    by_date: HashMap<NaiveDate, Vec<TimeSlot>>,
    otherwise: Option<Vec<TimeSlot>>,
}

impl ScriptedTimeSource {
    /// Creates an empty script
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `date` with `times`
    #[must_use]
    pub fn with_date(mut self, date: NaiveDate, times: Vec<TimeSlot>) -> Self {
        self.by_date.insert(date, times);
        self
    }

    /// Answer unscripted dates with `times` instead of failing
    #[must_use]
    pub fn otherwise(mut self, times: Vec<TimeSlot>) -> Self {
        self.otherwise = Some(times);
        self
    }
}

impl TimeSource for ScriptedTimeSource {
    fn available_times(&self, date: NaiveDate) -> Result<Vec<TimeSlot>, TimeSourceError> {
        self.by_date
            .get(&date)
            .or(self.otherwise.as_ref())
            .cloned()
            .ok_or_else(|| TimeSourceError::Unavailable(format!("no times scripted for {date}")))
    }
}

/// Always fails
#[derive(Debug, Clone)]
pub struct FailingTimeSource {
    reason: String,
}

impl FailingTimeSource {
    /// Creates a source failing with `reason`
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl TimeSource for FailingTimeSource {
    fn available_times(&self, _date: NaiveDate) -> Result<Vec<TimeSlot>, TimeSourceError> {
        Err(TimeSourceError::Unavailable(self.reason.clone()))
    }
}

/// Panics when asked
#[derive(Debug, Clone, Copy, Default)]
pub struct PanickingTimeSource;

impl TimeSource for PanickingTimeSource {
    #[allow(clippy::panic)] // Exercises panic containment
    fn available_times(&self, date: NaiveDate) -> Result<Vec<TimeSlot>, TimeSourceError> {
        panic!("time source exploded for {date}")
    }
}

// ============================================================================
// Submitters
// ============================================================================

/// Answers immediately with a fixed verdict, recording every reservation
#[derive(Debug)]
pub struct RecordingSubmitter {
    accept: bool,
    calls: Mutex<Vec<Reservation>>,
}

impl RecordingSubmitter {
    /// A submitter that accepts everything
    #[must_use]
    pub const fn accepting() -> Self {
        Self {
            accept: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A submitter that refuses everything
    #[must_use]
    pub const fn rejecting() -> Self {
        Self {
            accept: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Reservations received so far
    #[must_use]
    pub fn calls(&self) -> Vec<Reservation> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Submitter for RecordingSubmitter {
    fn submit(&self, reservation: Reservation) -> SubmitFuture<'_> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(reservation);
        let accept = self.accept;
        Box::pin(async move { Ok(accept) })
    }
}

/// Always errors
#[derive(Debug, Clone)]
pub struct FailingSubmitter {
    error: SubmitError,
}

impl FailingSubmitter {
    /// Creates a submitter failing with `error`
    #[must_use]
    pub const fn new(error: SubmitError) -> Self {
        Self { error }
    }
}

impl Submitter for FailingSubmitter {
    fn submit(&self, _reservation: Reservation) -> SubmitFuture<'_> {
        let error = self.error.clone();
        Box::pin(async move { Err(error) })
    }
}

/// Panics while submitting
#[derive(Debug, Clone, Copy, Default)]
pub struct PanickingSubmitter;

impl Submitter for PanickingSubmitter {
    fn submit(&self, reservation: Reservation) -> SubmitFuture<'_> {
        Box::pin(explode(reservation))
    }
}

#[allow(clippy::panic, clippy::unused_async)] // Exercises panic containment
async fn explode(reservation: Reservation) -> Result<bool, SubmitError> {
    panic!("submitter exploded for {}", reservation.time)
}

/// Holds every submission until released
///
/// Lets tests cancel a submission while it is provably in flight.
#[derive(Debug)]
pub struct GatedSubmitter {
    verdict: watch::Sender<Option<bool>>,
    calls: watch::Sender<Vec<Reservation>>,
}

impl GatedSubmitter {
    /// Creates a closed gate
    #[must_use]
    pub fn new() -> Self {
        Self {
            verdict: watch::Sender::new(None),
            calls: watch::Sender::new(Vec::new()),
        }
    }

    /// Open the gate: pending and future submissions answer `accept`
    pub fn release(&self, accept: bool) {
        self.verdict.send_replace(Some(accept));
    }

    /// Reservations received so far
    #[must_use]
    pub fn calls(&self) -> Vec<Reservation> {
        self.calls.borrow().clone()
    }

    /// Wait until at least `count` submissions have arrived
    pub async fn wait_for_calls(&self, count: usize) {
        let mut calls = self.calls.subscribe();
        let _ = calls.wait_for(|received| received.len() >= count).await;
    }
}

impl Default for GatedSubmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Submitter for GatedSubmitter {
    fn submit(&self, reservation: Reservation) -> SubmitFuture<'_> {
        self.calls.send_modify(|calls| calls.push(reservation));
        let mut verdict = self.verdict.subscribe();
        Box::pin(async move {
            let accept = verdict.wait_for(Option::is_some).await.ok().and_then(|v| *v);
            accept.ok_or_else(|| SubmitError::Transport("gate dropped".to_string()))
        })
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Records dispatched availability actions
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    actions: Mutex<Vec<AvailabilityAction>>,
}

impl RecordingDispatcher {
    /// Creates a new `RecordingDispatcher`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Actions dispatched so far, in order
    #[must_use]
    pub fn actions(&self) -> Vec<AvailabilityAction> {
        self.actions.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl AvailabilityDispatcher for RecordingDispatcher {
    fn dispatch(&self, action: AvailabilityAction) {
        self.actions.lock().unwrap_or_else(PoisonError::into_inner).push(action);
    }
}
