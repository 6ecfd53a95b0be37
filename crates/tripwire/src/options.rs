// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::time::Duration;

use tick::Clock;

use crate::callbacks::{IsSuccessful, OnStateChange, TripPredicate};
use crate::constants::{
    DEFAULT_MAX_PROBE_REQUESTS, DEFAULT_OPEN_COOLDOWN, STANDARD_FAILURE_RATIO, STANDARD_MAX_PROBE_REQUESTS,
    STANDARD_MIN_REQUESTS, STANDARD_OPEN_COOLDOWN, STANDARD_ROLLING_WINDOW,
};
use crate::telemetry::TelemetryHelper;
use crate::{BreakerConfig, Counts, OnStateChangeArgs};

/// Configuration of a [`Breaker`][crate::Breaker].
///
/// Options are consumed by [`Breaker::new`][crate::Breaker::new] and cannot be changed afterwards.
/// Out-of-range values are replaced by defaults at construction:
///
/// | Option                 | Default                                      |
/// |------------------------|----------------------------------------------|
/// | `max_probe_requests`   | `1` (also used when set to `0`)              |
/// | `rolling_window`       | disabled (`Duration::ZERO`)                  |
/// | `open_cooldown`        | 60 seconds (also used when set to zero)      |
/// | `trip_when`            | more than 5 consecutive failures             |
/// | `success_when`         | every error is a failure                     |
/// | name                   | `breaker` when empty                         |
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use tick::Clock;
/// use tripwire::{Breaker, BreakerOptions};
///
/// let clock = Clock::new_frozen();
/// let options = BreakerOptions::<std::io::Error>::new("orders", &clock)
///     .max_probe_requests(2)
///     .open_cooldown(Duration::from_secs(10))
///     .trip_when(|counts| counts.consecutive_failures >= 3)
///     .success_when(|error| error.kind() == std::io::ErrorKind::NotFound);
///
/// let breaker = Breaker::new(options);
/// assert_eq!(breaker.name(), "orders");
/// ```
pub struct BreakerOptions<E> {
    pub(crate) name: Cow<'static, str>,
    pub(crate) clock: Clock,
    pub(crate) max_probe_requests: u32,
    pub(crate) rolling_window: Duration,
    pub(crate) open_cooldown: Duration,
    pub(crate) trip_predicate: Option<TripPredicate>,
    pub(crate) is_successful: Option<IsSuccessful<E>>,
    pub(crate) on_state_change: Option<OnStateChange>,
    #[cfg(any(feature = "metrics", test))]
    pub(crate) meter: Option<opentelemetry::metrics::Meter>,
    pub(crate) logs_enabled: bool,
}

impl<E> BreakerOptions<E> {
    /// Creates options with the given breaker name and clock, and default values for the rest.
    ///
    /// The clock drives every time-based transition. Use a controlled clock in tests to move time
    /// forward without sleeping.
    pub fn new(name: impl Into<Cow<'static, str>>, clock: impl AsRef<Clock>) -> Self {
        Self {
            name: name.into(),
            clock: clock.as_ref().clone(),
            max_probe_requests: DEFAULT_MAX_PROBE_REQUESTS,
            rolling_window: Duration::ZERO,
            open_cooldown: DEFAULT_OPEN_COOLDOWN,
            trip_predicate: None,
            is_successful: None,
            on_state_change: None,
            #[cfg(any(feature = "metrics", test))]
            meter: None,
            logs_enabled: false,
        }
    }

    /// Creates options tuned for calls to a remote service.
    ///
    /// The breaker admits 3 probes, clears its counts every 30 seconds while closed, stays open for
    /// 60 seconds, and trips once at least 3 requests were made in the current window and 60% or
    /// more of them failed. State changes are logged when the `logs` feature is enabled.
    pub fn standard(name: impl Into<Cow<'static, str>>, clock: impl AsRef<Clock>) -> Self {
        Self {
            logs_enabled: cfg!(any(feature = "logs", test)),
            ..Self::new(name, clock)
                .max_probe_requests(STANDARD_MAX_PROBE_REQUESTS)
                .rolling_window(STANDARD_ROLLING_WINDOW)
                .open_cooldown(STANDARD_OPEN_COOLDOWN)
                .trip_when(|counts| counts.requests >= STANDARD_MIN_REQUESTS && counts.failure_ratio() >= STANDARD_FAILURE_RATIO)
        }
    }

    /// Creates options from a plain [`BreakerConfig`].
    pub fn from_config(config: &BreakerConfig, clock: impl AsRef<Clock>) -> Self {
        Self::new(config.name.clone(), clock)
            .max_probe_requests(config.max_probe_requests)
            .rolling_window(config.rolling_window)
            .open_cooldown(config.open_cooldown)
    }

    /// Sets how many probe calls are admitted while half-open.
    ///
    /// The same number of consecutive successful probes closes the breaker again.
    #[must_use]
    pub fn max_probe_requests(mut self, max_probe_requests: u32) -> Self {
        self.max_probe_requests = max_probe_requests;
        self
    }

    /// Sets the period after which the counts of a closed breaker are cleared.
    ///
    /// `Duration::ZERO` keeps the counts for as long as the breaker stays closed.
    #[must_use]
    pub fn rolling_window(mut self, rolling_window: Duration) -> Self {
        self.rolling_window = rolling_window;
        self
    }

    /// Sets how long the breaker stays open before it lets probe calls through.
    #[must_use]
    pub fn open_cooldown(mut self, open_cooldown: Duration) -> Self {
        self.open_cooldown = open_cooldown;
        self
    }

    /// Sets the predicate that decides whether the breaker opens.
    ///
    /// The predicate is evaluated after every failure recorded while closed, against the counts
    /// that already include that failure. It runs while the breaker's internal lock is held and
    /// must not call back into the breaker.
    #[must_use]
    pub fn trip_when(mut self, predicate: impl Fn(&Counts) -> bool + Send + Sync + 'static) -> Self {
        self.trip_predicate = Some(TripPredicate::new(predicate));
        self
    }

    /// Sets the classifier that decides whether an error returned by the operation still counts as
    /// a success, for example a "not found" answer from a healthy dependency.
    ///
    /// `Ok` results are always successes.
    #[must_use]
    pub fn success_when(mut self, classifier: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.is_successful = Some(IsSuccessful::new(classifier));
        self
    }

    /// Sets a callback invoked on every state change.
    ///
    /// The callback runs after the internal lock is released, so it may call back into the
    /// breaker. Callbacks of transitions that happen in quick succession may run concurrently.
    /// If the callback panics while a call is being admitted, that call is recorded as a failure.
    #[must_use]
    pub fn on_state_change(mut self, callback: impl Fn(OnStateChangeArgs<'_>) + Send + Sync + 'static) -> Self {
        self.on_state_change = Some(OnStateChange::new(callback));
        self
    }

    /// Enables structured logging of state changes and rejections through `tracing`.
    #[must_use]
    #[cfg(any(feature = "logs", test))]
    pub fn enable_logs(mut self) -> Self {
        self.logs_enabled = true;
        self
    }

    /// Enables reporting of the `resilience.event` counter with the given meter provider.
    #[must_use]
    #[cfg(any(feature = "metrics", test))]
    pub fn enable_metrics(mut self, provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        self.meter = Some(crate::telemetry::metrics::create_meter(provider));
        self
    }

    pub(crate) fn create_telemetry(&self, breaker_name: Cow<'static, str>) -> TelemetryHelper {
        TelemetryHelper {
            #[cfg(any(feature = "metrics", test))]
            event_reporter: self.meter.as_ref().map(crate::telemetry::metrics::create_resilience_event_counter),
            logs_enabled: self.logs_enabled,
            ..TelemetryHelper::new(breaker_name)
        }
    }
}

impl<E> Clone for BreakerOptions<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            clock: self.clock.clone(),
            max_probe_requests: self.max_probe_requests,
            rolling_window: self.rolling_window,
            open_cooldown: self.open_cooldown,
            trip_predicate: self.trip_predicate.clone(),
            is_successful: self.is_successful.clone(),
            on_state_change: self.on_state_change.clone(),
            #[cfg(any(feature = "metrics", test))]
            meter: self.meter.clone(),
            logs_enabled: self.logs_enabled,
        }
    }
}

impl<E> std::fmt::Debug for BreakerOptions<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerOptions")
            .field("name", &self.name)
            .field("max_probe_requests", &self.max_probe_requests)
            .field("rolling_window", &self.rolling_window)
            .field("open_cooldown", &self.open_cooldown)
            .field("trip_predicate", &self.trip_predicate)
            .field("is_successful", &self.is_successful)
            .field("on_state_change", &self.on_state_change)
            .field("logs_enabled", &self.logs_enabled)
            .finish_non_exhaustive()
    }
}
