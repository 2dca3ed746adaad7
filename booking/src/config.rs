//! Configuration management for the booking subsystem.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::ConfigError;
use crate::types::TimeSlot;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::time::Duration;

/// Times offered when the time source cannot answer
pub const DEFAULT_TIMES: [&str; 6] = ["17:00", "18:00", "19:00", "20:00", "21:00", "22:00"];

/// Booking configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingConfig {
    /// Fallback list used whenever the time source fails
    pub default_times: Vec<TimeSlot>,
    /// Artificial wait before the submission collaborator is called, in milliseconds
    pub submit_delay_ms: u64,
    /// Capacity of each store's action broadcast channel
    pub broadcast_capacity: usize,
}

impl BookingConfig {
    /// Load configuration from environment variables
    ///
    /// - `LITTLE_LEMON_DEFAULT_TIMES`: comma-separated fallback slots
    /// - `LITTLE_LEMON_SUBMIT_DELAY_MS`: pre-submit delay (default 0)
    /// - `LITTLE_LEMON_BROADCAST_CAPACITY`: broadcast capacity (default 16)
    ///
    /// Unparseable values fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            default_times: lookup("LITTLE_LEMON_DEFAULT_TIMES")
                .map(|s| parse_time_list(&s))
                .filter(|times| !times.is_empty())
                .unwrap_or(defaults.default_times),
            submit_delay_ms: lookup("LITTLE_LEMON_SUBMIT_DELAY_MS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.submit_delay_ms),
            broadcast_capacity: lookup("LITTLE_LEMON_BROADCAST_CAPACITY")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.broadcast_capacity),
        }
    }

    /// Set the artificial pre-submit delay
    #[must_use]
    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the fallback time list
    #[must_use]
    pub fn with_default_times(mut self, times: Vec<TimeSlot>) -> Self {
        self.default_times = times;
        self
    }

    /// The pre-submit delay as a `Duration`
    #[must_use]
    pub const fn submit_delay(&self) -> Duration {
        Duration::from_millis(self.submit_delay_ms)
    }

    /// Check the configuration for values the booking flow cannot work with
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the fallback list is empty or repeats a
    /// slot, or if the broadcast capacity is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_times.is_empty() {
            return Err(ConfigError::EmptyDefaultTimes);
        }

        let mut seen = HashSet::new();
        for time in &self.default_times {
            if !seen.insert(time) {
                return Err(ConfigError::DuplicateDefaultTime(time.to_string()));
            }
        }

        if self.broadcast_capacity == 0 {
            return Err(ConfigError::ZeroBroadcastCapacity);
        }

        Ok(())
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            default_times: DEFAULT_TIMES.iter().copied().map(TimeSlot::from).collect(),
            submit_delay_ms: 0,
            broadcast_capacity: 16,
        }
    }
}

/// Split a comma-separated list of slots, skipping blanks
fn parse_time_list(raw: &str) -> Vec<TimeSlot> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(TimeSlot::from)
        .collect()
}
