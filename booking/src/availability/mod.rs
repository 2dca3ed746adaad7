//! Available times per date.
//!
//! The availability store holds the bookable times for the date the user is
//! looking at. A date change asks the time source for that date and puts the
//! answer in the date's fixed shuffled order; a confirmed booking removes the
//! slot. Whenever the time source fails, the configured default list is used.

pub mod reorder;

use crate::environment::{fetch_times, TimeSource};
use crate::types::TimeSlot;
use chrono::NaiveDate;
use little_lemon_core::environment::Clock;
use little_lemon_core::{effect::Effect, reducer::Reducer, SmallVec};
use little_lemon_runtime::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use reorder::{date_seed, reorder_by_date, reordered, XorShift32};

/// Times currently offered to the user
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityState {
    /// Date the list was computed for; `None` until first populated
    pub date: Option<NaiveDate>,
    /// Bookable times, in display order
    pub times: Vec<TimeSlot>,
}

impl AvailabilityState {
    /// Creates a new `AvailabilityState`
    #[must_use]
    pub const fn new(date: Option<NaiveDate>, times: Vec<TimeSlot>) -> Self {
        Self { date, times }
    }

    /// Whether `time` is currently offered
    #[must_use]
    pub fn offers(&self, time: &TimeSlot) -> bool {
        self.times.contains(time)
    }
}

/// Events the availability store reacts to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AvailabilityAction {
    /// The user picked a date; recompute its times
    DateChanged {
        /// The picked date
        date: NaiveDate,
    },
    /// A reservation for `time` was confirmed
    TimeBooked {
        /// Date of the reservation
        date: NaiveDate,
        /// Slot to remove; an empty slot is ignored
        time: TimeSlot,
    },
}

/// Dependencies of the availability reducer
#[derive(Clone)]
pub struct AvailabilityEnvironment {
    /// Where bookable times come from
    pub time_source: Arc<dyn TimeSource>,
    /// Source of "today"
    pub clock: Arc<dyn Clock>,
    /// Used as-is whenever the time source fails
    pub default_times: Arc<[TimeSlot]>,
}

impl AvailabilityEnvironment {
    /// Creates a new `AvailabilityEnvironment`
    #[must_use]
    pub fn new(
        time_source: Arc<dyn TimeSource>,
        clock: Arc<dyn Clock>,
        default_times: impl Into<Arc<[TimeSlot]>>,
    ) -> Self {
        Self {
            time_source,
            clock,
            default_times: default_times.into(),
        }
    }

    /// Times for `date`: the source's answer in the date's order, or the
    /// default list when the source fails
    #[must_use]
    pub fn times_for(&self, date: NaiveDate) -> Vec<TimeSlot> {
        match fetch_times(self.time_source.as_ref(), date) {
            Ok(times) => {
                tracing::debug!(%date, count = times.len(), "Fetched available times");
                crate::metrics::record_fetch("ok");
                reordered(times, date)
            },
            Err(error) => {
                tracing::error!(%date, %error, "Time source failed, using default times");
                crate::metrics::record_fetch("fallback");
                self.default_times.to_vec()
            },
        }
    }
}

/// Initial state: today's times
#[must_use]
pub fn initialize(env: &AvailabilityEnvironment) -> AvailabilityState {
    let today = env.clock.today();
    AvailabilityState::new(Some(today), env.times_for(today))
}

/// Reducer for the availability store
#[derive(Clone, Debug, Default)]
pub struct AvailabilityReducer;

impl AvailabilityReducer {
    /// Creates a new `AvailabilityReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Reducer for AvailabilityReducer {
    type State = AvailabilityState;
    type Action = AvailabilityAction;
    type Environment = AvailabilityEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            AvailabilityAction::DateChanged { date } => {
                state.times = env.times_for(date);
                state.date = Some(date);
            },
            AvailabilityAction::TimeBooked { date, time } => {
                if time.is_empty() {
                    tracing::debug!(%date, "Ignoring booking without a time");
                    return SmallVec::new();
                }
                if state.date.is_some_and(|current| current != date) {
                    tracing::debug!(%date, current = ?state.date, "Booking is for another date than the list");
                }
                match state.times.iter().position(|t| *t == time) {
                    Some(index) => {
                        state.times.remove(index);
                        crate::metrics::record_slot_booked();
                        tracing::info!(%date, %time, remaining = state.times.len(), "Time booked");
                    },
                    None => tracing::debug!(%date, %time, "Booked time was not offered"),
                }
            },
        }

        SmallVec::new()
    }
}

/// Store holding the available times
pub type AvailabilityStore =
    Store<AvailabilityState, AvailabilityAction, AvailabilityEnvironment, AvailabilityReducer>;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::config::DEFAULT_TIMES;
    use crate::mocks::{FailingTimeSource, PanickingTimeSource, ScriptedTimeSource, StaticTimeSource};
    use crate::types::slots;
    use little_lemon_testing::{assertions::assert_no_effects, test_clock, FixedClock, ReducerTest};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn six() -> Vec<TimeSlot> {
        slots(DEFAULT_TIMES)
    }

    fn env_with(source: impl TimeSource + 'static) -> AvailabilityEnvironment {
        AvailabilityEnvironment::new(Arc::new(source), Arc::new(test_clock()), six())
    }

    #[test]
    fn initialize_uses_today_in_shuffled_order() {
        let env = env_with(StaticTimeSource::new(six()));
        let state = initialize(&env);

        assert_eq!(state.date, Some(day(2025, 10, 20)));
        assert_eq!(state.times, slots(["19:00", "21:00", "18:00", "17:00", "22:00", "20:00"]));
    }

    #[test]
    fn initialize_falls_back_to_default_order() {
        let env = env_with(FailingTimeSource::new("offline"));
        assert_eq!(initialize(&env).times, six());
    }

    #[test]
    fn initialize_survives_panicking_source() {
        let env = AvailabilityEnvironment::new(
            Arc::new(PanickingTimeSource),
            Arc::new(FixedClock::on(day(2026, 10, 19))),
            six(),
        );
        let state = initialize(&env);
        assert_eq!(state.date, Some(day(2026, 10, 19)));
        assert_eq!(state.times, six());
    }

    #[test]
    fn date_changed_recomputes_for_that_date() {
        ReducerTest::new(AvailabilityReducer::new())
            .with_env(env_with(StaticTimeSource::new(six())))
            .given_state(AvailabilityState::new(Some(day(2025, 10, 20)), six()))
            .when_action(AvailabilityAction::DateChanged { date: day(2026, 10, 20) })
            .then_state(|state| {
                assert_eq!(state.date, Some(day(2026, 10, 20)));
                assert_eq!(
                    state.times,
                    slots(["18:00", "21:00", "19:00", "22:00", "20:00", "17:00"])
                );
            })
            .then_effects(assert_no_effects)
            .run();
    }

    #[test]
    fn date_changed_failure_resets_to_defaults_not_previous() {
        let source = ScriptedTimeSource::new()
            .with_date(day(2025, 10, 20), slots(["17:00", "18:00", "19:00"]));

        ReducerTest::new(AvailabilityReducer::new())
            .with_env(env_with(source))
            .given_state(AvailabilityState::new(Some(day(2025, 10, 20)), slots(["17:00", "19:00"])))
            .when_action(AvailabilityAction::DateChanged { date: day(2025, 10, 21) })
            .then_state(|state| {
                assert_eq!(state.date, Some(day(2025, 10, 21)));
                assert_eq!(state.times, six());
            })
            .run();
    }

    #[test]
    fn same_date_always_gives_same_list() {
        let env = env_with(StaticTimeSource::new(six()));
        let reducer = AvailabilityReducer::new();
        let mut first = AvailabilityState::default();
        let mut second = AvailabilityState::new(Some(day(2030, 1, 1)), Vec::new());

        let _ = reducer.reduce(&mut first, AvailabilityAction::DateChanged { date: day(2025, 10, 21) }, &env);
        let _ = reducer.reduce(&mut second, AvailabilityAction::DateChanged { date: day(2025, 10, 21) }, &env);

        assert_eq!(first, second);
        assert_eq!(first.times, slots(["17:00", "18:00", "21:00", "19:00", "22:00", "20:00"]));
    }

    #[test]
    fn time_booked_removes_only_that_slot() {
        ReducerTest::new(AvailabilityReducer::new())
            .with_env(env_with(StaticTimeSource::new(six())))
            .given_state(AvailabilityState::new(
                Some(day(2025, 10, 20)),
                slots(["17:00", "19:00", "18:00"]),
            ))
            .when_action(AvailabilityAction::TimeBooked {
                date: day(2025, 10, 20),
                time: TimeSlot::from("19:00"),
            })
            .then_state(|state| {
                assert_eq!(state.times, slots(["17:00", "18:00"]));
                assert!(!state.offers(&TimeSlot::from("19:00")));
            })
            .then_effects(assert_no_effects)
            .run();
    }

    #[test]
    fn time_booked_removes_first_duplicate_only() {
        ReducerTest::new(AvailabilityReducer::new())
            .with_env(env_with(StaticTimeSource::new(six())))
            .given_state(AvailabilityState::new(None, slots(["18:00", "17:00", "18:00"])))
            .when_action(AvailabilityAction::TimeBooked {
                date: day(2025, 10, 20),
                time: TimeSlot::from("18:00"),
            })
            .then_state(|state| assert_eq!(state.times, slots(["17:00", "18:00"])))
            .run();
    }

    #[test]
    fn time_booked_for_another_date_still_removes_the_slot() {
        ReducerTest::new(AvailabilityReducer::new())
            .with_env(env_with(StaticTimeSource::new(six())))
            .given_state(AvailabilityState::new(
                Some(day(2025, 10, 21)),
                slots(["18:00", "17:00"]),
            ))
            .when_action(AvailabilityAction::TimeBooked {
                date: day(2025, 10, 20),
                time: TimeSlot::from("18:00"),
            })
            .then_state(|state| {
                assert_eq!(state.date, Some(day(2025, 10, 21)));
                assert_eq!(state.times, slots(["17:00"]));
            })
            .run();
    }

    #[test]
    fn time_booked_without_match_or_time_is_a_no_op() {
        let initial = AvailabilityState::new(Some(day(2025, 10, 20)), slots(["17:00", "18:00"]));

        for time in ["20:00", "", "  "] {
            let expected = initial.clone();
            ReducerTest::new(AvailabilityReducer::new())
                .with_env(env_with(StaticTimeSource::new(six())))
                .given_state(initial.clone())
                .when_action(AvailabilityAction::TimeBooked {
                    date: day(2025, 10, 20),
                    time: TimeSlot::from(time),
                })
                .then_state(move |state| assert_eq!(*state, expected))
                .then_effects(assert_no_effects)
                .run();
        }
    }

    #[test]
    fn booked_slot_comes_back_only_through_a_new_fetch() {
        let env = env_with(StaticTimeSource::new(six()));
        let reducer = AvailabilityReducer::new();
        let mut state = initialize(&env);

        let _ = reducer.reduce(
            &mut state,
            AvailabilityAction::TimeBooked { date: day(2025, 10, 20), time: TimeSlot::from("19:00") },
            &env,
        );
        assert!(!state.offers(&TimeSlot::from("19:00")));

        let _ = reducer.reduce(&mut state, AvailabilityAction::DateChanged { date: day(2025, 10, 20) }, &env);
        assert!(state.offers(&TimeSlot::from("19:00")));
    }

    #[test]
    fn actions_deserialize_from_json() {
        let action: AvailabilityAction = serde_json::from_str(
            r#"{"TimeBooked":{"date":"2025-10-20","time":"18:00"}}"#,
        )
        .unwrap();
        assert_eq!(
            action,
            AvailabilityAction::TimeBooked { date: day(2025, 10, 20), time: TimeSlot::from("18:00") }
        );
    }
}
