//! Declarative macros for ergonomic effect construction
//!
//! These macros reduce boilerplate when creating `Effect` variants from
//! reducers.

/// Create an `Effect::Future` from an async block
///
/// # Example
///
/// ```rust,ignore
/// use little_lemon_core::async_effect;
///
/// async_effect! {
///     let accepted = submitter.submit(reservation).await;
///     Some(ReservationAction::SubmissionCompleted { attempt, outcome: accepted.into() })
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}

/// Create an `Effect::Delay` for scheduling delayed actions
///
/// # Example
///
/// ```rust,ignore
/// use little_lemon_core::delay;
/// use std::time::Duration;
///
/// delay! {
///     duration: Duration::from_secs(2),
///     action: ReservationAction::Cancel
/// }
/// ```
#[macro_export]
macro_rules! delay {
    (
        duration: $duration:expr,
        action: $action:expr
    ) => {
        $crate::effect::Effect::Delay {
            duration: $duration,
            action: ::std::boxed::Box::new($action),
        }
    };
}

/// Create an `Effect::Cancellable` from a token-aware async block
///
/// The identifier after the `|` binds the cancellation token handed out by
/// the runtime.
///
/// # Example
///
/// ```rust,ignore
/// use little_lemon_core::cancellable;
///
/// cancellable! {
///     id: EffectId::new("reservation-submit"),
///     |token| async {
///         tokio::time::sleep(delay).await;
///         if token.is_cancelled() {
///             return None;
///         }
///         let accepted = submitter.submit(reservation).await;
///         Some(ReservationAction::SubmissionCompleted { attempt, outcome: accepted.into() })
///     }
/// }
/// ```
#[macro_export]
macro_rules! cancellable {
    (
        id: $id:expr,
        |$token:ident| async { $($body:tt)* }
    ) => {
        $crate::effect::Effect::cancellable($id, move |$token| async move { $($body)* })
    };
}

#[cfg(test)]
mod tests {
    use crate::effect::{CancellationToken, Effect, EffectId};
    use std::time::Duration;

    #[derive(Clone, Debug)]
    enum TestAction {
        AsyncResult { value: i32 },
        TimeoutExpired,
    }

    #[test]
    fn test_async_effect_macro() {
        let effect = async_effect! {
            Some(TestAction::AsyncResult { value: 42 })
        };

        assert!(matches!(effect, Effect::Future(_)));
    }

    #[test]
    fn test_delay_macro() {
        let effect = delay! {
            duration: Duration::from_secs(30),
            action: TestAction::TimeoutExpired
        };

        assert!(matches!(effect, Effect::Delay { .. }));
    }

    #[tokio::test]
    async fn test_cancellable_macro() {
        let effect = cancellable! {
            id: EffectId::new("submit"),
            |token| async {
                if token.is_cancelled() {
                    return None;
                }
                Some(TestAction::AsyncResult { value: 1 })
            }
        };

        let Effect::Cancellable { id, run } = effect else {
            unreachable!("cancellable! builds a cancellable effect");
        };
        assert_eq!(id.as_str(), "submit");

        let token = CancellationToken::new();
        token.cancel();
        assert!(run(token).await.is_none());
    }

    #[tokio::test]
    async fn test_async_effect_resolves() {
        let effect = async_effect! {
            Some(TestAction::AsyncResult { value: 7 })
        };

        let Effect::Future(fut) = effect else {
            unreachable!("async_effect! builds a future");
        };
        assert!(matches!(fut.await, Some(TestAction::AsyncResult { value: 7 })));
    }
}
