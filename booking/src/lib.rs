//! # Little Lemon Booking
//!
//! Table booking for the Little Lemon restaurant, built on the reducer and
//! store runtime.
//!
//! ## Architecture
//!
//! - **Availability store**: the bookable times for the date being viewed.
//!   Each date's list comes from a [`TimeSource`] and is shown in an order
//!   fixed for that date; failures fall back to the configured defaults.
//! - **Reservation controller**: the form. Validates each field, guards the
//!   selected time against concurrent bookings, and submits through a
//!   cancellable effect.
//! - **Session**: wires both stores together so confirmed bookings and date
//!   changes flow to availability, and new lists flow back to the form.
//!
//! ## Example
//!
//! ```ignore
//! use little_lemon_booking::{BookingSession, ReservationAction};
//!
//! let session = BookingSession::builder(time_source)
//!     .with_submitter(submitter)
//!     .start()?;
//!
//! session.send(ReservationAction::SelectDate { date }).await?;
//! session.send(ReservationAction::Submit).await?;
//! ```

pub mod availability;
pub mod config;
pub mod environment;
pub mod error;
pub mod metrics;
pub mod mocks;
pub mod reservation;
pub mod session;
pub mod types;

pub use availability::{
    AvailabilityAction, AvailabilityEnvironment, AvailabilityReducer, AvailabilityState,
    AvailabilityStore,
};
pub use config::BookingConfig;
pub use environment::{AvailabilityDispatcher, ChannelDispatcher, Submitter, TimeSource};
pub use error::{BookingError, SubmitError, TimeSourceError, ValidationError};
pub use reservation::{
    ReservationAction, ReservationEnvironment, ReservationReducer, ReservationState,
    ReservationStore,
};
pub use session::{BookingSession, BookingSessionBuilder};
pub use types::{
    Guests, Occasion, Reservation, ReservationDraft, SubmissionOutcome, SubmissionState, TimeSlot,
};
