//! # Little Lemon Core
//!
//! Core traits and types for the Little Lemon booking architecture.
//!
//! The booking subsystem is built from reducers: pure functions that take the
//! current state, an action and the injected environment, mutate the state in
//! place and describe the side effects that should follow.
//!
//! ## Core Concepts
//!
//! - **State**: Domain state for a feature (available time slots, a reservation draft)
//! - **Action**: All possible inputs to a reducer (user commands and feedback)
//! - **Reducer**: `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions, executed by the runtime `Store`
//! - **Environment**: Injected collaborators (clock, time source, submitter)
//!
//! ## Example
//!
//! ```ignore
//! use little_lemon_core::*;
//!
//! impl Reducer for AvailabilityReducer {
//!     type State = AvailabilityState;
//!     type Action = AvailabilityAction;
//!     type Environment = AvailabilityEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut AvailabilityState,
//!         action: AvailabilityAction,
//!         env: &AvailabilityEnvironment,
//!     ) -> SmallVec<[Effect<AvailabilityAction>; 4]> {
//!         SmallVec::new()
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, NaiveDate, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

/// Declarative macros for building effects
pub mod effect_macros;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
/// They hold all business rules and are deterministic given their environment.
pub mod reducer {
    use super::SmallVec;
    use super::effect::Effect;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// Updates `state` in place and returns the effects the runtime
        /// should execute, in emission order.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values (not execution) and are composable and cancellable.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    pub use tokio_util::sync::CancellationToken;

    /// Boxed future produced by an effect
    pub type EffectFuture<Action> = Pin<Box<dyn Future<Output = Option<Action>> + Send>>;

    /// Constructor for the future of an [`Effect::Cancellable`]
    pub type CancellableFn<Action> =
        Box<dyn FnOnce(CancellationToken) -> EffectFuture<Action> + Send>;

    /// Identifier for a cancellable effect
    ///
    /// Reducers tag long-running effects with an id so that a later action can
    /// cancel them with [`Effect::Cancel`].
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    pub struct EffectId(String);

    impl EffectId {
        /// Create a new effect id
        #[must_use]
        pub fn new(id: impl Into<String>) -> Self {
            Self(id.into())
        }

        /// Get the id as a string slice
        #[must_use]
        pub fn as_str(&self) -> &str {
            &self.0
        }
    }

    impl std::fmt::Display for EffectId {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what should happen,
    /// returned from reducers and executed by the Store runtime.
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects in parallel
        Parallel(Vec<Effect<Action>>),

        /// Delayed action (for timeouts, retries)
        Delay {
            /// How long to wait
            duration: Duration,
            /// Action to dispatch after delay
            action: Box<Action>,
        },

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(EffectFuture<Action>),

        /// Synchronous fire-and-forget side effect
        ///
        /// Executed by the store immediately after the reducer returns, in the
        /// order effects were emitted. Used to hand actions to another store
        /// through an ordered channel.
        Run(Box<dyn FnOnce() + Send>),

        /// Async computation that can be cancelled later with [`Effect::Cancel`]
        ///
        /// The runtime hands a fresh [`CancellationToken`] to `run`; the future
        /// should check it after every suspension point. Cancellation is
        /// advisory: the future is not aborted, but any action it produces
        /// after cancellation is discarded by the runtime.
        Cancellable {
            /// Identifier used to cancel the effect
            id: EffectId,
            /// Builds the future from the token registered under `id`
            run: CancellableFn<Action>,
        },

        /// Cancel the in-flight effect registered under this id
        Cancel(EffectId),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
                Effect::Run(_) => write!(f, "Effect::Run(<fn>)"),
                Effect::Cancellable { id, .. } => f
                    .debug_struct("Effect::Cancellable")
                    .field("id", id)
                    .finish_non_exhaustive(),
                Effect::Cancel(id) => f.debug_tuple("Effect::Cancel").field(id).finish(),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Build a cancellable effect from a token-aware async closure
        #[must_use]
        pub fn cancellable<F, Fut>(id: EffectId, run: F) -> Effect<Action>
        where
            F: FnOnce(CancellationToken) -> Fut + Send + 'static,
            Fut: Future<Output = Option<Action>> + Send + 'static,
        {
            Effect::Cancellable {
                id,
                run: Box::new(move |token| Box::pin(run(token))),
            }
        }

        /// Whether this effect is a no-op
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Effect::None)
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Local, NaiveDate, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;

        /// Today's calendar date
        ///
        /// Defaults to the local calendar date of [`Clock::now`]. Date
        /// comparisons in the booking form are made at day granularity
        /// against this value.
        fn today(&self) -> NaiveDate {
            self.now().with_timezone(&Local).date_naive()
        }
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
