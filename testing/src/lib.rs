//! # Little Lemon Testing
//!
//! Testing utilities and helpers for the Little Lemon booking architecture.
//!
//! This crate provides:
//! - A fixed [`Clock`] for deterministic date validation
//! - A Given-When-Then harness for reducers ([`ReducerTest`])
//! - Assertion helpers for effects
//!
//! ## Example
//!
//! ```ignore
//! use little_lemon_testing::{test_clock, ReducerTest};
//!
//! ReducerTest::new(ReservationReducer::new())
//!     .with_env(environment_with(test_clock()))
//!     .given_state(ReservationState::default())
//!     .when_action(ReservationAction::Submit)
//!     .then_state(|state| assert!(state.errors.date.is_some()))
//!     .run();
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use little_lemon_core::environment::Clock;


/// Mock implementations of core environment traits
pub mod mocks {
    use super::{Clock, DateTime, NaiveDate, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same instant. `today()` is the UTC calendar date
    /// of that instant, so date checks do not depend on the machine's
    /// local time zone.
    ///
    /// # Example
    ///
    /// ```
    /// use little_lemon_testing::mocks::FixedClock;
    /// use little_lemon_core::environment::Clock;
    /// use chrono::NaiveDate;
    ///
    /// let date = NaiveDate::from_ymd_opt(2025, 10, 20).unwrap();
    /// let clock = FixedClock::on(date);
    /// assert_eq!(clock.today(), date);
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone, Copy)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }

        /// Fixed clock at noon UTC on `date`
        #[must_use]
        pub fn on(date: NaiveDate) -> Self {
            let noon = date.and_hms_opt(12, 0, 0).unwrap_or_default();
            Self::new(noon.and_utc())
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }

        fn today(&self) -> NaiveDate {
            self.time.date_naive()
        }
    }

    /// Create a default fixed clock for tests (2025-10-20 12:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-10-20T12:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};
pub use reducer_test::{ReducerTest, assertions};
