// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// The reason a [`Breaker`][crate::Breaker] refused to admit a call.
///
/// Returned by [`Breaker::try_acquire`][crate::Breaker::try_acquire]. The protected operation is
/// never invoked for a rejected call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum Rejected {
    /// The breaker is open and the cool-down has not elapsed yet.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// The breaker is half-open and all probe slots of the current generation are taken.
    #[error("too many requests while circuit breaker is half-open")]
    TooManyRequests,
}

impl Rejected {
    #[cfg(any(feature = "logs", test))]
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::CircuitOpen => "circuit_open",
            Self::TooManyRequests => "too_many_requests",
        }
    }
}

/// The error returned by [`Breaker::execute`][crate::Breaker::execute] and
/// [`Breaker::execute_async`][crate::Breaker::execute_async].
///
/// Rejections raised by the breaker are kept apart from the errors of the protected operation. The
/// latter are carried in [`BreakerError::Inner`] exactly as the operation returned them.
///
/// # Examples
///
/// ```
/// use tick::Clock;
/// use tripwire::{Breaker, BreakerError, BreakerOptions};
///
/// let breaker = Breaker::new(BreakerOptions::new("inventory", Clock::new_frozen()));
///
/// let result: Result<(), _> = breaker.execute(|| Err("connection reset"));
///
/// match result {
///     Err(BreakerError::Inner(error)) => assert_eq!(error, "connection reset"),
///     Err(other) => panic!("unexpected rejection: {other}"),
///     Ok(()) => unreachable!(),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BreakerError<E> {
    /// The breaker is open; the operation was not invoked.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// The breaker is half-open and out of probe slots; the operation was not invoked.
    #[error("too many requests while circuit breaker is half-open")]
    TooManyRequests,

    /// The operation was invoked and failed with this error.
    #[error(transparent)]
    Inner(E),
}

impl<E> BreakerError<E> {
    /// Returns `true` if the breaker refused the call without invoking the operation.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::CircuitOpen | Self::TooManyRequests)
    }

    /// Returns the error of the operation, if the operation was invoked.
    #[must_use]
    pub fn inner(&self) -> Option<&E> {
        match self {
            Self::Inner(error) => Some(error),
            Self::CircuitOpen | Self::TooManyRequests => None,
        }
    }

    /// Consumes the error and returns the error of the operation, if the operation was invoked.
    #[must_use]
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(error) => Some(error),
            Self::CircuitOpen | Self::TooManyRequests => None,
        }
    }
}

impl<E> From<Rejected> for BreakerError<E> {
    fn from(rejected: Rejected) -> Self {
        match rejected {
            Rejected::CircuitOpen => Self::CircuitOpen,
            Rejected::TooManyRequests => Self::TooManyRequests,
        }
    }
}
