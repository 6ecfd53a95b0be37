// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Arc;

use crate::callbacks::{IsSuccessful, TripPredicate};
use crate::constants::{DEFAULT_CONSECUTIVE_FAILURES, DEFAULT_MAX_PROBE_REQUESTS, DEFAULT_NAME, DEFAULT_OPEN_COOLDOWN};
use crate::engine::{Engine, EngineOptions};
use crate::{BreakerError, BreakerOptions, Counts, Rejected, State};

/// A circuit breaker guarding calls to a single dependency.
///
/// The breaker counts the outcomes of the calls it admits. Once the trip predicate decides that
/// the dependency is unhealthy, the breaker opens and rejects calls without invoking them. After
/// the cool-down it becomes half-open and lets a limited number of probe calls through: enough
/// consecutive successes close it again, a single failure opens it for another cool-down.
///
/// Cloning a breaker is cheap; clones share the same state.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use tick::ClockControl;
/// use tripwire::{Breaker, BreakerError, BreakerOptions, State};
///
/// let control = ClockControl::new();
/// let breaker = Breaker::new(
///     BreakerOptions::new("inventory", control.to_clock()).trip_when(|counts| counts.consecutive_failures >= 2),
/// );
///
/// for _ in 0..2 {
///     let _ = breaker.execute(|| Err::<(), _>("unavailable"));
/// }
/// assert_eq!(breaker.state(), State::Open);
///
/// // The operation is not invoked while the breaker is open.
/// let result = breaker.execute(|| -> Result<(), &str> { unreachable!() });
/// assert!(matches!(result, Err(BreakerError::CircuitOpen)));
///
/// control.advance(Duration::from_secs(60));
/// assert_eq!(breaker.state(), State::HalfOpen);
///
/// assert_eq!(breaker.execute(|| Ok::<_, &str>(42)).unwrap(), 42);
/// assert_eq!(breaker.state(), State::Closed);
/// ```
pub struct Breaker<E> {
    engine: Arc<Engine>,
    is_successful: IsSuccessful<E>,
}

impl<E> Breaker<E> {
    /// Creates a breaker from the given options.
    #[must_use]
    pub fn new(options: BreakerOptions<E>) -> Self {
        let name = if options.name.is_empty() {
            Cow::Borrowed(DEFAULT_NAME)
        } else {
            options.name.clone()
        };

        let telemetry = options.create_telemetry(name.clone());

        let engine_options = EngineOptions {
            max_probe_requests: if options.max_probe_requests == 0 {
                DEFAULT_MAX_PROBE_REQUESTS
            } else {
                options.max_probe_requests
            },
            rolling_window: options.rolling_window,
            open_cooldown: if options.open_cooldown.is_zero() {
                DEFAULT_OPEN_COOLDOWN
            } else {
                options.open_cooldown
            },
            trip_predicate: options
                .trip_predicate
                .unwrap_or_else(|| TripPredicate::new(|counts| counts.consecutive_failures > DEFAULT_CONSECUTIVE_FAILURES)),
        };

        Self {
            engine: Arc::new(Engine::new(name, options.clock, engine_options, options.on_state_change, telemetry)),
            is_successful: options.is_successful.unwrap_or_else(|| IsSuccessful::new(|_| false)),
        }
    }

    /// Returns the name of the breaker.
    #[must_use]
    pub fn name(&self) -> &str {
        self.engine.name()
    }

    /// Returns the current state, applying time-based transitions that became due.
    ///
    /// An open breaker whose cool-down elapsed reports [`State::HalfOpen`], and a closed breaker
    /// whose rolling window elapsed has its counts cleared.
    #[must_use]
    pub fn state(&self) -> State {
        self.engine.state()
    }

    /// Returns the counts of the current generation.
    ///
    /// Unlike [`state`][Self::state], this does not apply pending time-based transitions, so the
    /// counts of an elapsed rolling window stay visible until the breaker is used again.
    #[must_use]
    pub fn counts(&self) -> Counts {
        self.engine.counts()
    }

    /// Asks the breaker for permission to make a call.
    ///
    /// The returned [`Permit`] must be completed with the outcome of the call. A permit that is
    /// dropped without an outcome records a failure, which covers calls that panicked or futures
    /// that were dropped before completion.
    ///
    /// # Errors
    ///
    /// Returns [`Rejected::CircuitOpen`] while the breaker is open and
    /// [`Rejected::TooManyRequests`] while it is half-open and all probe slots are taken.
    pub fn try_acquire(&self) -> Result<Permit, Rejected> {
        let (generation, pending) = self.engine.before_call()?;

        let permit = Permit {
            engine: Arc::clone(&self.engine),
            generation,
            recorded: false,
        };

        // A panicking callback drops the permit, which records a failure.
        self.engine.notify(pending);

        Ok(permit)
    }

    /// Invokes the operation if the breaker admits it and records its outcome.
    ///
    /// `Ok` values are successes. An error is a failure unless the classifier configured with
    /// [`success_when`][BreakerOptions::success_when] accepts it. The result of the operation is
    /// returned unchanged. If the operation panics, a failure is recorded and the panic continues.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerError::CircuitOpen`] or [`BreakerError::TooManyRequests`] without invoking
    /// the operation when the breaker rejects the call, and [`BreakerError::Inner`] with the error
    /// returned by the operation otherwise.
    pub fn execute<T, F>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let permit = self.try_acquire()?;
        let result = operation();
        permit.record(self.is_success(&result));

        result.map_err(BreakerError::Inner)
    }

    /// Asynchronous version of [`execute`][Self::execute].
    ///
    /// Dropping the returned future after the call was admitted but before the operation completed
    /// records a failure.
    ///
    /// # Errors
    ///
    /// Same as [`execute`][Self::execute].
    pub async fn execute_async<T, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.try_acquire()?;
        let result = operation().await;
        permit.record(self.is_success(&result));

        result.map_err(BreakerError::Inner)
    }

    /// Invokes the operation if the breaker admits it, or the fallback if the breaker rejects it.
    ///
    /// The fallback receives the reason of the rejection and produces the value returned in place
    /// of the operation's. A rejected call records no outcome, so the fallback never affects the
    /// counts.
    ///
    /// ```
    /// use tick::Clock;
    /// use tripwire::{Breaker, BreakerOptions};
    ///
    /// let breaker = Breaker::new(
    ///     BreakerOptions::new("users", Clock::new_frozen()).trip_when(|counts| counts.consecutive_failures >= 1),
    /// );
    /// let _ = breaker.execute(|| Err::<String, _>("connection refused"));
    ///
    /// let user = breaker.execute_or_else(|| Ok("alice".to_string()), |_rejected| "guest".to_string());
    /// assert_eq!(user, Ok("guest".to_string()));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns the error of the operation unchanged when it was invoked and failed.
    pub fn execute_or_else<T, F, G>(&self, operation: F, fallback: G) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        G: FnOnce(Rejected) -> T,
    {
        match self.try_acquire() {
            Ok(permit) => {
                let result = operation();
                permit.record(self.is_success(&result));
                result
            }
            Err(rejected) => Ok(fallback(rejected)),
        }
    }

    /// Asynchronous version of [`execute_or_else`][Self::execute_or_else].
    ///
    /// Both the operation and the fallback produce futures. Dropping the returned future while the
    /// operation is in flight records a failure.
    ///
    /// # Errors
    ///
    /// Same as [`execute_or_else`][Self::execute_or_else].
    pub async fn execute_or_else_async<T, F, Fut, G, FallbackFut>(&self, operation: F, fallback: G) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        G: FnOnce(Rejected) -> FallbackFut,
        FallbackFut: Future<Output = T>,
    {
        match self.try_acquire() {
            Ok(permit) => {
                let result = operation().await;
                permit.record(self.is_success(&result));
                result
            }
            Err(rejected) => Ok(fallback(rejected).await),
        }
    }

    fn is_success<T>(&self, result: &Result<T, E>) -> bool {
        match result {
            Ok(_) => true,
            Err(error) => self.is_successful.call(error),
        }
    }
}

impl<E> Clone for Breaker<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            is_successful: self.is_successful.clone(),
        }
    }
}

impl<E> std::fmt::Debug for Breaker<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Breaker").field("name", &self.name()).finish_non_exhaustive()
    }
}

/// Permission to make a single call through a [`Breaker`].
///
/// Obtained from [`Breaker::try_acquire`]. Report the outcome with [`record`][Self::record]. If
/// the permit is dropped without a recorded outcome, a failure is recorded.
///
/// ```
/// use tick::Clock;
/// use tripwire::{Breaker, BreakerOptions};
///
/// let breaker: Breaker<()> = Breaker::new(BreakerOptions::new("search", Clock::new_frozen()));
///
/// let permit = breaker.try_acquire()?;
/// // ... make the call ...
/// permit.record_success();
///
/// assert_eq!(breaker.counts().total_successes, 1);
/// # Ok::<(), tripwire::Rejected>(())
/// ```
#[derive(Debug)]
#[must_use = "dropping a permit without recording an outcome records a failure"]
pub struct Permit {
    engine: Arc<Engine>,
    generation: u64,
    recorded: bool,
}

impl Permit {
    /// Returns the generation of the breaker in which the call was admitted.
    ///
    /// The outcome is ignored if the breaker moved on to another generation in the meantime.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Records the outcome of the call.
    pub fn record(mut self, success: bool) {
        self.recorded = true;
        self.engine.after_call(self.generation, success);
    }

    /// Records a successful outcome.
    pub fn record_success(self) {
        self.record(true);
    }

    /// Records a failed outcome.
    pub fn record_failure(self) {
        self.record(false);
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if !self.recorded {
            self.engine.after_call(self.generation, false);
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::Poll;
    use std::time::Duration;

    use tick::{Clock, ClockControl};

    use super::*;
    use crate::testing::MetricTester;

    fn create_breaker(clock: &ClockControl) -> Breaker<String> {
        Breaker::new(BreakerOptions::new("test_breaker", clock.to_clock()))
    }

    fn fail(breaker: &Breaker<String>, times: usize) {
        for _ in 0..times {
            let _ = breaker.execute(|| Err::<(), _>("boom".to_string()));
        }
    }

    #[test]
    fn new_applies_defaults() {
        let clock = ClockControl::new();
        let breaker: Breaker<String> = Breaker::new(
            BreakerOptions::new("", clock.to_clock())
                .max_probe_requests(0)
                .open_cooldown(Duration::ZERO),
        );

        assert_eq!(breaker.name(), "breaker");
        assert_eq!(breaker.state(), State::Closed);

        // Trips on the 6th consecutive failure.
        fail(&breaker, 5);
        assert_eq!(breaker.state(), State::Closed);
        fail(&breaker, 1);
        assert_eq!(breaker.state(), State::Open);

        // Zero cool-down falls back to 60 seconds.
        clock.advance(Duration::from_secs(59));
        assert_eq!(breaker.state(), State::Open);
        clock.advance(Duration::from_secs(1));
        assert_eq!(breaker.state(), State::HalfOpen);

        // Zero probes fall back to one.
        let permit = breaker.try_acquire().unwrap();
        assert_eq!(breaker.try_acquire().unwrap_err(), Rejected::TooManyRequests);
        permit.record_success();
        assert_eq!(breaker.state(), State::Closed);
    }

    #[test]
    fn execute_ok_returns_value() {
        let clock = ClockControl::new();
        let breaker = create_breaker(&clock);

        let value = breaker.execute(|| Ok::<_, String>(7)).unwrap();

        assert_eq!(value, 7);
        assert_eq!(breaker.counts().total_successes, 1);
        assert_eq!(breaker.counts().requests, 1);
    }

    #[test]
    fn execute_err_returns_error_unchanged() {
        let clock = ClockControl::new();
        let breaker = create_breaker(&clock);

        let error = breaker.execute(|| Err::<(), _>("timeout".to_string())).unwrap_err();

        assert_eq!(error.into_inner().as_deref(), Some("timeout"));
        assert_eq!(breaker.counts().total_failures, 1);
    }

    #[test]
    fn execute_rejected_does_not_invoke_operation() {
        let clock = ClockControl::new();
        let breaker = create_breaker(&clock);
        fail(&breaker, 6);
        let calls = AtomicUsize::new(0);

        let result = breaker.execute(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(())
        });

        assert!(matches!(result, Err(BreakerError::CircuitOpen)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn success_when_classifies_errors() {
        let clock = ClockControl::new();
        let breaker = Breaker::new(
            BreakerOptions::new("classified", clock.to_clock())
                .trip_when(|counts| counts.consecutive_failures >= 1)
                .success_when(|error: &String| error == "not_found"),
        );

        let result = breaker.execute(|| Err::<(), _>("not_found".to_string()));

        // The error is still returned to the caller, but does not count as a failure.
        assert_eq!(result.unwrap_err().inner().map(String::as_str), Some("not_found"));
        assert_eq!(breaker.counts().total_successes, 1);
        assert_eq!(breaker.state(), State::Closed);

        let _ = breaker.execute(|| Err::<(), _>("internal".to_string()));
        assert_eq!(breaker.state(), State::Open);
    }

    #[test]
    fn permit_drop_records_failure() {
        let clock = ClockControl::new();
        let breaker = create_breaker(&clock);

        let permit = breaker.try_acquire().unwrap();
        assert_eq!(permit.generation(), 0);
        drop(permit);

        assert_eq!(breaker.counts().total_failures, 1);
        assert_eq!(breaker.counts().consecutive_failures, 1);
    }

    #[test]
    fn permit_records_once() {
        let clock = ClockControl::new();
        let breaker = create_breaker(&clock);

        breaker.try_acquire().unwrap().record_success();
        breaker.try_acquire().unwrap().record_failure();

        let counts = breaker.counts();
        assert_eq!(counts.requests, 2);
        assert_eq!(counts.total_successes, 1);
        assert_eq!(counts.total_failures, 1);
    }

    #[test]
    fn execute_panic_records_failure() {
        let clock = ClockControl::new();
        let breaker = create_breaker(&clock);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            breaker.execute(|| -> Result<(), String> { panic!("operation panicked") })
        }));

        assert!(result.is_err());
        assert_eq!(breaker.counts().total_failures, 1);
    }

    #[test]
    fn panicking_callback_releases_half_open_slot() {
        let clock = ClockControl::new();
        let panic_once = Arc::new(std::sync::atomic::AtomicBool::new(true));
        let panic_once_clone = Arc::clone(&panic_once);
        let breaker: Breaker<String> = Breaker::new(
            BreakerOptions::new("panicking_callback", clock.to_clock())
                .trip_when(|counts| counts.consecutive_failures >= 1)
                .on_state_change(move |args| {
                    if args.to() == State::HalfOpen && panic_once_clone.swap(false, Ordering::SeqCst) {
                        panic!("callback panicked");
                    }
                }),
        );
        fail(&breaker, 1);
        clock.advance(Duration::from_secs(60));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| breaker.execute(|| Ok::<_, String>(()))));

        // The admitted call counted as a failure and reopened the breaker.
        assert!(result.is_err());
        assert_eq!(breaker.state(), State::Open);

        clock.advance(Duration::from_secs(60));
        assert_eq!(breaker.state(), State::HalfOpen);
        assert!(breaker.execute(|| Ok::<_, String>(())).is_ok());
        assert_eq!(breaker.state(), State::Closed);
    }

    #[test]
    fn execute_async_ok() {
        let clock = ClockControl::new();
        let breaker = create_breaker(&clock);

        let value = futures::executor::block_on(breaker.execute_async(|| async { Ok::<_, String>("done") })).unwrap();

        assert_eq!(value, "done");
        assert_eq!(breaker.counts().total_successes, 1);
    }

    #[test]
    fn execute_async_rejected() {
        let clock = ClockControl::new();
        let breaker = create_breaker(&clock);
        fail(&breaker, 6);

        let result = futures::executor::block_on(breaker.execute_async(|| async { Ok::<_, String>(()) }));

        assert!(matches!(result, Err(BreakerError::CircuitOpen)));
    }

    #[test]
    fn execute_async_dropped_records_failure() {
        let clock = ClockControl::new();
        let breaker = create_breaker(&clock);

        {
            let mut future = pin!(breaker.execute_async(|| std::future::pending::<Result<(), String>>()));

            // Poll once so that the call gets admitted.
            futures::executor::block_on(poll_fn(|cx| {
                assert!(future.as_mut().poll(cx).is_pending());
                Poll::Ready(())
            }));

            assert_eq!(breaker.counts().requests, 1);
        }

        assert_eq!(breaker.counts().total_failures, 1);
    }

    #[test]
    fn execute_or_else_admitted_skips_fallback() {
        let clock = ClockControl::new();
        let breaker = create_breaker(&clock);

        let value = breaker.execute_or_else(|| Ok::<_, String>("live"), |_| unreachable!());
        let error = breaker.execute_or_else(|| Err::<&str, _>("timeout".to_string()), |_| unreachable!());

        assert_eq!(value, Ok("live"));
        assert_eq!(error, Err("timeout".to_string()));
        assert_eq!(breaker.counts().total_successes, 1);
        assert_eq!(breaker.counts().total_failures, 1);
    }

    #[test]
    fn execute_or_else_rejected_uses_fallback() {
        let clock = ClockControl::new();
        let breaker = create_breaker(&clock);
        fail(&breaker, 6);
        let counts = breaker.counts();
        let calls = AtomicUsize::new(0);

        let value = breaker.execute_or_else(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>("live")
            },
            |rejected| {
                assert_eq!(rejected, Rejected::CircuitOpen);
                "cached"
            },
        );

        assert_eq!(value, Ok("cached"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(breaker.counts(), counts);
    }

    #[test]
    fn execute_or_else_too_many_requests_uses_fallback() {
        let clock = ClockControl::new();
        let breaker = create_breaker(&clock);
        fail(&breaker, 6);
        clock.advance(Duration::from_secs(60));
        let permit = breaker.try_acquire().unwrap();

        let value = breaker.execute_or_else(|| Ok::<_, String>(1), |rejected| {
            assert_eq!(rejected, Rejected::TooManyRequests);
            0
        });

        assert_eq!(value, Ok(0));
        assert_eq!(breaker.counts().requests, 1);
        permit.record_success();
        assert_eq!(breaker.state(), State::Closed);
    }

    #[test]
    fn execute_or_else_async_ok() {
        let clock = ClockControl::new();
        let breaker = create_breaker(&clock);

        let live = futures::executor::block_on(
            breaker.execute_or_else_async(|| async { Ok::<_, String>("live") }, |_| async { "cached" }),
        );
        fail(&breaker, 6);
        let cached = futures::executor::block_on(
            breaker.execute_or_else_async(|| async { Ok::<_, String>("live") }, |_| async { "cached" }),
        );

        assert_eq!(live, Ok("live"));
        assert_eq!(cached, Ok("cached"));
        assert_eq!(breaker.counts().total_successes, 0);
    }

    #[test]
    fn clones_share_state() {
        let clock = ClockControl::new();
        let breaker = create_breaker(&clock);
        let clone = breaker.clone();

        fail(&clone, 6);

        assert_eq!(breaker.state(), State::Open);
    }

    #[test]
    fn metrics_reported() {
        let tester = MetricTester::new();
        let clock = ClockControl::new();
        let breaker: Breaker<String> = Breaker::new(
            BreakerOptions::new("metered", clock.to_clock()).enable_metrics(tester.meter_provider()),
        );

        fail(&breaker, 6);
        let _ = breaker.execute(|| Ok::<_, String>(()));

        tester.assert_attributes_contain(&[
            opentelemetry::KeyValue::new(crate::telemetry::STRATEGY_NAME, "metered"),
            opentelemetry::KeyValue::new(crate::telemetry::EVENT_NAME, "circuit_opened"),
            opentelemetry::KeyValue::new(crate::telemetry::EVENT_NAME, "circuit_rejected"),
            opentelemetry::KeyValue::new(crate::telemetry::CIRCUIT_STATE, "open"),
        ]);
    }

    #[test]
    fn debug_ok() {
        let breaker: Breaker<String> = Breaker::new(BreakerOptions::new("debugged", Clock::new_frozen()));

        let debug = format!("{breaker:?}");

        assert!(debug.contains("Breaker"));
        assert!(debug.contains("debugged"));
    }

    #[test]
    fn static_assertions() {
        static_assertions::assert_impl_all!(Breaker<String>: Send, Sync, Clone, std::fmt::Debug);
        static_assertions::assert_impl_all!(Permit: Send, Sync, std::fmt::Debug);
    }
}
