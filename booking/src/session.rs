//! A booking session: the availability store and the reservation controller
//! running side by side.
//!
//! Two background tasks keep the stores in step. The forwarder drains the
//! controller's dispatch channel into the availability store, one action at a
//! time and in emission order. The sync task watches the availability state
//! and hands every new list to the controller.

use crate::availability::{
    initialize, AvailabilityAction, AvailabilityEnvironment, AvailabilityReducer, AvailabilityState,
    AvailabilityStore,
};
use crate::config::BookingConfig;
use crate::environment::{ChannelDispatcher, Submitter, TimeSource};
use crate::error::BookingError;
use crate::reservation::{
    ReservationAction, ReservationEnvironment, ReservationReducer, ReservationState, ReservationStore,
};
use little_lemon_core::environment::{Clock, SystemClock};
use little_lemon_runtime::{EffectHandle, Store, StoreConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Builder for [`BookingSession`]
pub struct BookingSessionBuilder {
    config: BookingConfig,
    clock: Arc<dyn Clock>,
    time_source: Arc<dyn TimeSource>,
    submitter: Option<Arc<dyn Submitter>>,
}

impl BookingSessionBuilder {
    /// Use `config` instead of [`BookingConfig::default`]
    #[must_use]
    pub fn with_config(mut self, config: BookingConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `clock` instead of the system clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Submit reservations through `submitter`; without one every
    /// submission is accepted
    #[must_use]
    pub fn with_submitter(mut self, submitter: Arc<dyn Submitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }

    /// Build both stores and start the background tasks
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Config`] if the configuration does not validate.
    pub fn start(self) -> Result<BookingSession, BookingError> {
        self.config.validate()?;

        let store_config = StoreConfig::default().with_broadcast_capacity(self.config.broadcast_capacity);

        let availability_env = AvailabilityEnvironment::new(
            self.time_source,
            Arc::clone(&self.clock),
            self.config.default_times.clone(),
        );
        let initial = initialize(&availability_env);
        tracing::info!(
            date = ?initial.date,
            times = initial.times.len(),
            "Starting booking session"
        );

        let availability = Store::with_config(
            initial.clone(),
            AvailabilityReducer::new(),
            availability_env,
            store_config.clone(),
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let reservation_env = ReservationEnvironment::new(
            self.clock,
            self.submitter,
            Arc::new(ChannelDispatcher::new(tx)),
        )
        .with_submit_delay(self.config.submit_delay());
        let reservation = Store::with_config(
            ReservationState::new(initial.date, initial.times),
            ReservationReducer::new(),
            reservation_env,
            store_config,
        );

        let tasks = vec![
            tokio::spawn(forward_actions(rx, availability.clone())),
            tokio::spawn(sync_times(availability.subscribe_state(), reservation.clone())),
        ];

        Ok(BookingSession {
            availability,
            reservation,
            tasks,
        })
    }
}

/// Apply dispatched actions to the availability store in order
async fn forward_actions(mut rx: mpsc::UnboundedReceiver<AvailabilityAction>, store: AvailabilityStore) {
    while let Some(action) = rx.recv().await {
        tracing::debug!(?action, "Forwarding to availability store");
        if let Err(error) = store.send(action).await {
            tracing::warn!(%error, "Availability store stopped accepting actions");
            break;
        }
    }
}

/// Hand every new availability list to the controller
///
/// `states` must come straight from `subscribe_state` so that any version
/// published before this task first runs is still unseen.
async fn sync_times(mut states: watch::Receiver<AvailabilityState>, store: ReservationStore) {
    while states.changed().await.is_ok() {
        let AvailabilityState { date, times } = states.borrow_and_update().clone();
        if let Err(error) = store
            .send(ReservationAction::AvailableTimesChanged { date, times })
            .await
        {
            tracing::warn!(%error, "Reservation store stopped accepting actions");
            break;
        }
    }
}

/// A running booking flow
pub struct BookingSession {
    availability: AvailabilityStore,
    reservation: ReservationStore,
    tasks: Vec<JoinHandle<()>>,
}

impl BookingSession {
    /// Start building a session over `time_source`
    #[must_use]
    pub fn builder(time_source: Arc<dyn TimeSource>) -> BookingSessionBuilder {
        BookingSessionBuilder {
            config: BookingConfig::default(),
            clock: Arc::new(SystemClock),
            time_source,
            submitter: None,
        }
    }

    /// Send a form event to the controller
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`] if the controller is shutting down.
    pub async fn send(&self, action: ReservationAction) -> Result<EffectHandle, BookingError> {
        Ok(self.reservation.send(action).await?)
    }

    /// Send an event straight to the availability store, e.g. a booking made
    /// elsewhere
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`] if the availability store is shutting
    /// down.
    pub async fn send_availability(&self, action: AvailabilityAction) -> Result<EffectHandle, BookingError> {
        Ok(self.availability.send(action).await?)
    }

    /// Read the controller state
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&ReservationState) -> T,
    {
        self.reservation.state(f).await
    }

    /// Read the availability state
    pub async fn availability<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&AvailabilityState) -> T,
    {
        self.availability.state(f).await
    }

    /// Watch controller state changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ReservationState> {
        self.reservation.subscribe_state()
    }

    /// Wait until the controller state satisfies `predicate`
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`] on timeout.
    pub async fn wait_until<F>(&self, predicate: F, timeout: Duration) -> Result<ReservationState, BookingError>
    where
        F: FnMut(&ReservationState) -> bool,
    {
        Ok(self.reservation.wait_for_state(predicate, timeout).await?)
    }

    /// Wait until the availability state satisfies `predicate`
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`] on timeout.
    pub async fn wait_for_availability<F>(
        &self,
        predicate: F,
        timeout: Duration,
    ) -> Result<AvailabilityState, BookingError>
    where
        F: FnMut(&AvailabilityState) -> bool,
    {
        Ok(self.availability.wait_for_state(predicate, timeout).await?)
    }

    /// Stop both stores, waiting up to `timeout` for each to drain
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`] if effects are still running at the
    /// deadline.
    pub async fn shutdown(self, timeout: Duration) -> Result<(), BookingError> {
        let controller = self.reservation.shutdown(timeout).await;
        let availability = self.availability.shutdown(timeout).await;
        for task in &self.tasks {
            task.abort();
        }
        tracing::info!("Booking session stopped");
        controller?;
        availability?;
        Ok(())
    }
}

impl Drop for BookingSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::mocks::{FailingTimeSource, ScriptedTimeSource, StaticTimeSource};
    use crate::types::{slots, TimeSlot};
    use chrono::NaiveDate;
    use little_lemon_testing::test_clock;

    fn session(source: impl TimeSource + 'static) -> BookingSession {
        BookingSession::builder(Arc::new(source))
            .with_clock(Arc::new(test_clock()))
            .start()
            .unwrap()
    }

    #[tokio::test]
    async fn starts_with_todays_times() {
        let session = session(StaticTimeSource::new(slots(["17:00", "18:00", "19:00"])));

        let times = session.state(|s| s.available_times.clone()).await;
        assert_eq!(times, slots(["17:00", "19:00", "18:00"]));
        assert_eq!(session.state(|s| s.draft.time.clone()).await, Some(TimeSlot::from("17:00")));
        assert_eq!(
            session.availability(|s| s.date).await,
            NaiveDate::from_ymd_opt(2025, 10, 20)
        );
    }

    #[tokio::test]
    async fn rejects_invalid_config() {
        let result = BookingSession::builder(Arc::new(FailingTimeSource::new("down")))
            .with_config(BookingConfig::default().with_default_times(Vec::new()))
            .start();
        assert!(matches!(result, Err(BookingError::Config(_))));
    }

    #[tokio::test]
    async fn date_selected_right_after_start_reaches_the_form() {
        let tomorrow = NaiveDate::from_ymd_opt(2025, 10, 21).unwrap();
        let session = session(
            ScriptedTimeSource::new()
                .with_date(tomorrow, slots(["17:00"]))
                .otherwise(slots(["20:00"])),
        );

        session.send(ReservationAction::SelectDate { date: tomorrow }).await.unwrap();

        let state = session
            .wait_until(|s| s.available_times == slots(["17:00"]), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(state.times_date, Some(tomorrow));
        assert_eq!(state.draft.time, Some(TimeSlot::from("17:00")));
        assert_eq!(session.availability(|s| s.date).await, Some(tomorrow));
    }

    #[tokio::test]
    async fn shutdown_stops_accepting_actions() {
        let session = session(StaticTimeSource::new(slots(["17:00"])));
        let probe = session.reservation.clone();

        session.shutdown(Duration::from_secs(1)).await.unwrap();
        assert!(probe.send(ReservationAction::Reset).await.is_err());
    }
}
