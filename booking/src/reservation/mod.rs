//! Reservation form controller.
//!
//! Holds the user's draft, validates each field as it is edited or left,
//! and runs the submission as a cancellable effect. A confirmed booking is
//! removed from the local candidate list immediately and forwarded to the
//! availability store.
//!
//! # Submission lifecycle
//!
//! `Submit` validates date, then the race against concurrent bookings, then
//! time, then guests; the first failure stops it. A valid draft moves to
//! `Submitting` with a fresh attempt number and starts the submission effect.
//! `Cancel` cancels the effect; any answer arriving afterwards carries a stale
//! attempt number or is discarded by the runtime, and never changes state.

pub mod validation;

use crate::environment::{panic_message, AvailabilityDispatcher, Submitter};
use crate::error::{ValidationError, SUBMIT_FAILED_MESSAGE};
use crate::types::{
    FieldErrors, Guests, Occasion, Reservation, ReservationDraft, SubmissionOutcome,
    SubmissionState, TimeSlot, Touched,
};
use crate::availability::AvailabilityAction;
use chrono::NaiveDate;
use futures::FutureExt;
use little_lemon_core::effect::{Effect, EffectId};
use little_lemon_core::environment::Clock;
use little_lemon_core::{cancellable, reducer::Reducer, smallvec, SmallVec};
use little_lemon_runtime::Store;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use validation::{
    is_form_valid, validate_date, validate_guests, validate_guests_input, validate_time,
};

/// Identifier of the in-flight submission effect
pub const SUBMIT_EFFECT_ID: &str = "reservation-submit";

/// [`SUBMIT_EFFECT_ID`] as an [`EffectId`]
#[must_use]
pub fn submit_effect_id() -> EffectId {
    EffectId::new(SUBMIT_EFFECT_ID)
}

// ============================================================================
// State
// ============================================================================

/// Everything the reservation form shows
#[derive(Clone, Debug, PartialEq)]
pub struct ReservationState {
    /// What the user has entered
    pub draft: ReservationDraft,
    /// Times the user can pick from
    pub available_times: Vec<TimeSlot>,
    /// Date `available_times` belongs to
    pub times_date: Option<NaiveDate>,
    /// Times this controller booked on `times_date`; kept out of later lists
    pub booked_times: Vec<TimeSlot>,
    /// Inline errors
    pub errors: FieldErrors,
    /// Fields the user has interacted with
    pub touched: Touched,
    /// Where the current submission stands
    pub submission: SubmissionState,
    /// Reservation being submitted, while `Submitting`
    pub pending: Option<Reservation>,
    /// Attempt number the next submission will carry
    pub next_attempt: u64,
    /// Most recent accepted reservation
    pub last_confirmed: Option<Reservation>,
    /// Whether every field currently validates
    pub is_valid: bool,
    /// Whether the submit button is enabled
    pub can_submit: bool,
}

impl ReservationState {
    /// Fresh form over `available_times` for `times_date`, preselecting the
    /// first time
    #[must_use]
    pub fn new(times_date: Option<NaiveDate>, available_times: Vec<TimeSlot>) -> Self {
        Self {
            draft: ReservationDraft::new(available_times.first().cloned()),
            available_times,
            times_date,
            booked_times: Vec::new(),
            errors: FieldErrors::default(),
            touched: Touched::default(),
            submission: SubmissionState::Idle,
            pending: None,
            next_attempt: 1,
            last_confirmed: None,
            is_valid: false,
            can_submit: false,
        }
    }

    /// Whether a submission is in flight
    #[must_use]
    pub const fn is_submitting(&self) -> bool {
        self.submission.is_submitting()
    }

    fn refresh(&mut self, today: NaiveDate) {
        self.is_valid = is_form_valid(&self.draft, &self.available_times, today);
        self.can_submit = self.is_valid && !self.is_submitting();
    }

    fn reset_form(&mut self) {
        self.draft = ReservationDraft::new(self.available_times.first().cloned());
        self.errors = FieldErrors::default();
        self.touched = Touched::default();
    }
}

impl Default for ReservationState {
    fn default() -> Self {
        Self::new(None, Vec::new())
    }
}

// ============================================================================
// Actions
// ============================================================================

/// User input and collaborator answers handled by the controller
#[derive(Clone, Debug, PartialEq)]
pub enum ReservationAction {
    /// A date was picked
    SelectDate {
        /// Picked date
        date: NaiveDate,
    },
    /// The date field lost focus
    DateBlurred,
    /// A time was picked
    SelectTime {
        /// Picked time
        time: TimeSlot,
    },
    /// The guest field was edited
    GuestsChanged {
        /// Raw field content
        input: String,
    },
    /// The guest field lost focus
    GuestsBlurred,
    /// An occasion was picked
    SelectOccasion {
        /// Picked occasion
        occasion: Occasion,
    },
    /// The user pressed submit
    Submit,
    /// The user cancelled the in-flight submission
    Cancel,
    /// The user reset the form
    Reset,
    /// The availability store published a new list
    AvailableTimesChanged {
        /// Date of the list, if known
        date: Option<NaiveDate>,
        /// New candidate times
        times: Vec<TimeSlot>,
    },
    /// The submission effect finished
    SubmissionCompleted {
        /// Attempt the answer belongs to
        attempt: u64,
        /// What the collaborator said
        outcome: SubmissionOutcome,
    },
}

// ============================================================================
// Environment
// ============================================================================

/// Dependencies of the reservation reducer
#[derive(Clone)]
pub struct ReservationEnvironment {
    /// Source of "today" for date validation
    pub clock: Arc<dyn Clock>,
    /// Persists reservations; `None` accepts every submission
    pub submitter: Option<Arc<dyn Submitter>>,
    /// Forwards confirmed bookings and date changes to the availability store
    pub availability: Arc<dyn AvailabilityDispatcher>,
    /// Wait before the submitter is called
    pub submit_delay: Duration,
}

impl ReservationEnvironment {
    /// Creates a new `ReservationEnvironment`
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        submitter: Option<Arc<dyn Submitter>>,
        availability: Arc<dyn AvailabilityDispatcher>,
    ) -> Self {
        Self {
            clock,
            submitter,
            availability,
            submit_delay: Duration::ZERO,
        }
    }

    /// Set the pre-submit delay
    #[must_use]
    pub const fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    fn dispatch(&self, action: AvailabilityAction) -> Effect<ReservationAction> {
        let availability = Arc::clone(&self.availability);
        Effect::Run(Box::new(move || availability.dispatch(action)))
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the reservation controller
#[derive(Clone, Debug, Default)]
pub struct ReservationReducer;

impl ReservationReducer {
    /// Creates a new `ReservationReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validate for submit, stopping at the first failing field
    ///
    /// Each checked field gets its error set or cleared.
    fn validate_for_submit(
        state: &mut ReservationState,
        today: NaiveDate,
    ) -> Result<Reservation, ValidationError> {
        let draft = &state.draft;

        state.errors.date = validate_date(draft.date, today).err();
        if let Some(error) = state.errors.date {
            return Err(error);
        }

        if let Some(time) = draft.time.as_ref().filter(|t| !t.is_empty()) {
            if !state.available_times.contains(time) {
                state.errors.time = Some(ValidationError::TimeUnavailable);
                return Err(ValidationError::TimeUnavailable);
            }
        }

        state.errors.time = validate_time(draft.time.as_ref(), &state.available_times).err();
        if let Some(error) = state.errors.time {
            return Err(error);
        }

        state.errors.guests = validate_guests(draft.guests).err();
        if let Some(error) = state.errors.guests {
            return Err(error);
        }

        draft.to_reservation().ok_or(ValidationError::TimeMissing)
    }

    fn submit_effect(
        env: &ReservationEnvironment,
        reservation: Reservation,
        attempt: u64,
    ) -> Effect<ReservationAction> {
        let submitter = env.submitter.clone();
        let delay = env.submit_delay;

        cancellable! {
            id: submit_effect_id(),
            |token| async {
                if !delay.is_zero() {
                    tokio::select! {
                        () = token.cancelled() => return None,
                        () = tokio::time::sleep(delay) => {},
                    }
                }
                if token.is_cancelled() {
                    return None;
                }

                let started = Instant::now();
                let outcome = match submitter {
                    Some(submitter) => {
                        match AssertUnwindSafe(submitter.submit(reservation)).catch_unwind().await {
                            Ok(result) => SubmissionOutcome::from(result),
                            Err(payload) => SubmissionOutcome::Failed(format!(
                                "submitter panicked: {}",
                                panic_message(payload.as_ref())
                            )),
                        }
                    },
                    None => SubmissionOutcome::Accepted,
                };
                crate::metrics::record_submission_duration(started.elapsed());

                if token.is_cancelled() {
                    return None;
                }
                Some(ReservationAction::SubmissionCompleted { attempt, outcome })
            }
        }
    }

    fn complete(
        state: &mut ReservationState,
        outcome: SubmissionOutcome,
        env: &ReservationEnvironment,
    ) -> SmallVec<[Effect<ReservationAction>; 4]> {
        let reservation = state.pending.take();

        match (outcome, reservation) {
            (SubmissionOutcome::Accepted, Some(reservation)) => {
                crate::metrics::record_submission("accepted");
                tracing::info!(
                    date = %reservation.date,
                    time = %reservation.time,
                    guests = %reservation.guests,
                    "Reservation confirmed"
                );

                if state.times_date == Some(reservation.date) {
                    if let Some(index) =
                        state.available_times.iter().position(|t| *t == reservation.time)
                    {
                        state.available_times.remove(index);
                    }
                    state.booked_times.push(reservation.time.clone());
                }

                let booked = AvailabilityAction::TimeBooked {
                    date: reservation.date,
                    time: reservation.time.clone(),
                };
                state.last_confirmed = Some(reservation);
                state.submission = SubmissionState::Idle;
                state.reset_form();

                smallvec![env.dispatch(booked)]
            },
            (SubmissionOutcome::Accepted, None) => {
                tracing::warn!("Accepted submission had no pending reservation");
                state.submission = SubmissionState::Idle;
                SmallVec::new()
            },
            (SubmissionOutcome::Rejected, _) => {
                crate::metrics::record_submission("rejected");
                tracing::warn!("Reservation rejected");
                state.submission = SubmissionState::Failed {
                    reason: "rejected".to_string(),
                };
                state.errors.submit = Some(SUBMIT_FAILED_MESSAGE.to_string());
                SmallVec::new()
            },
            (SubmissionOutcome::Failed(reason), _) => {
                crate::metrics::record_submission("failed");
                tracing::error!(%reason, "Reservation submission failed");
                state.submission = SubmissionState::Failed { reason };
                state.errors.submit = Some(SUBMIT_FAILED_MESSAGE.to_string());
                SmallVec::new()
            },
        }
    }
}

impl Reducer for ReservationReducer {
    type State = ReservationState;
    type Action = ReservationAction;
    type Environment = ReservationEnvironment;

    #[allow(clippy::too_many_lines)] // one arm per form event
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let today = env.clock.today();

        let effects = match action {
            ReservationAction::SelectDate { date } => {
                state.draft.date = Some(date);
                state.touched.date = true;
                state.errors.date = validate_date(Some(date), today).err();
                state.times_date = Some(date);
                state.booked_times.clear();
                tracing::debug!(%date, "Date selected");
                smallvec![env.dispatch(AvailabilityAction::DateChanged { date })]
            },

            ReservationAction::DateBlurred => {
                state.touched.date = true;
                state.errors.date = validate_date(state.draft.date, today).err();
                SmallVec::new()
            },

            ReservationAction::SelectTime { time } => {
                if state.available_times.contains(&time) {
                    state.draft.time = Some(time);
                    state.errors.time = None;
                } else {
                    tracing::warn!(%time, "Ignoring time that is not offered");
                }
                SmallVec::new()
            },

            ReservationAction::GuestsChanged { input } => {
                state.draft.guests = Guests::parse(&input);
                state.draft.guests_input = input;
                state.errors.guests = validate_guests(state.draft.guests).err();
                SmallVec::new()
            },

            ReservationAction::GuestsBlurred => {
                state.touched.guests = true;
                state.errors.guests = validate_guests(state.draft.guests).err();
                SmallVec::new()
            },

            ReservationAction::SelectOccasion { occasion } => {
                state.draft.occasion = occasion;
                SmallVec::new()
            },

            ReservationAction::Submit => {
                if state.is_submitting() {
                    tracing::warn!("Submit ignored, a submission is already in flight");
                    return SmallVec::new();
                }

                state.submission = SubmissionState::Idle;
                state.touched = Touched { date: true, guests: true };
                state.errors.submit = None;

                match Self::validate_for_submit(state, today) {
                    Ok(reservation) => {
                        let attempt = state.next_attempt;
                        state.next_attempt += 1;
                        state.submission = SubmissionState::Submitting { attempt };
                        state.pending = Some(reservation.clone());
                        tracing::info!(attempt, date = %reservation.date, time = %reservation.time, "Submitting reservation");
                        smallvec![Self::submit_effect(env, reservation, attempt)]
                    },
                    Err(error) => {
                        crate::metrics::record_validation_failure(&error);
                        tracing::debug!(%error, "Submit blocked by validation");
                        SmallVec::new()
                    },
                }
            },

            ReservationAction::Cancel => {
                if let SubmissionState::Submitting { attempt } = state.submission {
                    state.submission = SubmissionState::Cancelled;
                    state.pending = None;
                    state.errors.submit = None;
                    crate::metrics::record_submission("cancelled");
                    tracing::info!(attempt, "Submission cancelled");
                    smallvec![Effect::Cancel(submit_effect_id())]
                } else {
                    tracing::debug!("Cancel ignored, nothing in flight");
                    SmallVec::new()
                }
            },

            ReservationAction::Reset => {
                if state.is_submitting() {
                    tracing::warn!("Reset ignored while submitting");
                    return SmallVec::new();
                }
                state.reset_form();
                state.submission = SubmissionState::Idle;
                SmallVec::new()
            },

            ReservationAction::AvailableTimesChanged { date, times } => {
                if date.is_some() && state.times_date.is_some() && date != state.times_date {
                    tracing::debug!(?date, current = ?state.times_date, "Ignoring list for another date");
                    return SmallVec::new();
                }
                state.available_times = times
                    .into_iter()
                    .filter(|time| !state.booked_times.contains(time))
                    .collect();
                if state.times_date.is_none() {
                    state.times_date = date;
                }

                let selection_offered = state
                    .draft
                    .time
                    .as_ref()
                    .is_some_and(|time| state.available_times.contains(time));
                if !selection_offered {
                    if let Some(first) = state.available_times.first() {
                        state.draft.time = Some(first.clone());
                    }
                }
                SmallVec::new()
            },

            ReservationAction::SubmissionCompleted { attempt, outcome } => {
                if state.submission != (SubmissionState::Submitting { attempt }) {
                    crate::metrics::record_submission("discarded");
                    tracing::debug!(attempt, "Discarding answer for a stale submission");
                    return SmallVec::new();
                }
                Self::complete(state, outcome, env)
            },
        };

        state.refresh(today);
        effects
    }
}

/// Store running the reservation controller
pub type ReservationStore =
    Store<ReservationState, ReservationAction, ReservationEnvironment, ReservationReducer>;
