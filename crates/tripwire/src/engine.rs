// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tick::Clock;

use crate::callbacks::{OnStateChange, TripPredicate};
use crate::constants::ERR_POISONED_LOCK;
use crate::telemetry::TelemetryHelper;
use crate::{Counts, OnStateChangeArgs, Rejected, State};

/// Validated settings of the state machine.
#[derive(Debug)]
pub(crate) struct EngineOptions {
    pub(crate) max_probe_requests: u32,
    pub(crate) rolling_window: Duration,
    pub(crate) open_cooldown: Duration,
    pub(crate) trip_predicate: TripPredicate,
}

/// Something that happened to the circuit under the lock and is reported after the lock is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Transition { from: State, to: State, generation: u64 },
    WindowReset { generation: u64 },
}

/// A transition that happened while admitting a call and is yet to be reported.
#[derive(Debug)]
#[must_use]
pub(crate) struct PendingEvent(Option<Event>);

/// Owns the state of a breaker and serializes every access to it.
///
/// Telemetry and the state-change callback are only invoked once the lock is released.
#[derive(Debug)]
pub(crate) struct Engine {
    name: Cow<'static, str>,
    clock: Clock,
    options: EngineOptions,
    circuit: Mutex<Circuit>,
    on_state_change: Option<OnStateChange>,
    telemetry: TelemetryHelper,
}

impl Engine {
    pub(crate) fn new(
        name: Cow<'static, str>,
        clock: Clock,
        options: EngineOptions,
        on_state_change: Option<OnStateChange>,
        telemetry: TelemetryHelper,
    ) -> Self {
        let circuit = Circuit::new(clock.instant(), &options);

        Self {
            name,
            clock,
            options,
            circuit: Mutex::new(circuit),
            on_state_change,
            telemetry,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn state(&self) -> State {
        let now = self.clock.instant();

        // NOTE: Remember to execute all expensive operations (like time checks) outside the lock.
        let (state, event) = {
            let mut circuit = self.circuit.lock().expect(ERR_POISONED_LOCK);
            let event = circuit.resolve(now, &self.options);
            (circuit.state, event)
        };

        self.dispatch(event);
        state
    }

    /// Returns the counts of the current generation without applying pending transitions.
    pub(crate) fn counts(&self) -> Counts {
        self.circuit.lock().expect(ERR_POISONED_LOCK).counts
    }

    /// Admits a call and returns the generation it belongs to.
    ///
    /// A transition caused by an admitted call is not reported yet. The caller reports it with
    /// [`notify`][Self::notify] once it holds something that records the outcome of the call.
    pub(crate) fn before_call(&self) -> Result<(u64, PendingEvent), Rejected> {
        let now = self.clock.instant();

        let (admission, state, event) = {
            let mut circuit = self.circuit.lock().expect(ERR_POISONED_LOCK);
            let (admission, event) = circuit.before_call(now, &self.options);
            (admission, circuit.state, event)
        };

        match admission {
            Ok(generation) => Ok((generation, PendingEvent(event))),
            Err(rejected) => {
                self.dispatch(event);
                self.telemetry.report_rejection(state, rejected);
                Err(rejected)
            }
        }
    }

    /// Reports an event returned by [`before_call`][Self::before_call].
    pub(crate) fn notify(&self, pending: PendingEvent) {
        self.dispatch(pending.0);
    }

    /// Records the outcome of a call admitted in the given generation.
    pub(crate) fn after_call(&self, generation: u64, success: bool) {
        let now = self.clock.instant();

        let event = self
            .circuit
            .lock()
            .expect(ERR_POISONED_LOCK)
            .after_call(generation, success, now, &self.options);

        self.dispatch(event);
    }

    fn dispatch(&self, event: Option<Event>) {
        match event {
            Some(Event::Transition { from, to, generation }) => {
                self.telemetry.report_transition(from, to, generation);

                if let Some(on_state_change) = &self.on_state_change {
                    on_state_change.call(OnStateChangeArgs {
                        name: &self.name,
                        from,
                        to,
                        generation,
                    });
                }
            }
            Some(Event::WindowReset { generation }) => self.telemetry.report_window_reset(generation),
            None => {}
        }
    }
}

#[derive(Debug)]
struct Circuit {
    state: State,
    generation: u64,
    counts: Counts,
    // Closed: end of the rolling window. Open: end of the cool-down. None when nothing is scheduled.
    expiry: Option<Instant>,
}

impl Circuit {
    fn new(now: Instant, options: &EngineOptions) -> Self {
        let mut circuit = Self {
            state: State::Closed,
            generation: 0,
            counts: Counts::default(),
            expiry: None,
        };

        circuit.expiry = circuit.next_expiry(now, options);
        circuit
    }

    /// Applies the time-based transitions that became due.
    fn resolve(&mut self, now: Instant, options: &EngineOptions) -> Option<Event> {
        if !self.expiry.is_some_and(|expiry| now >= expiry) {
            return None;
        }

        match self.state {
            State::Closed => {
                self.start_generation(now, options);
                Some(Event::WindowReset {
                    generation: self.generation,
                })
            }
            State::Open => self.set_state(State::HalfOpen, now, options),
            State::HalfOpen => None,
        }
    }

    fn before_call(&mut self, now: Instant, options: &EngineOptions) -> (Result<u64, Rejected>, Option<Event>) {
        let event = self.resolve(now, options);

        let admission = match self.state {
            State::Open => Err(Rejected::CircuitOpen),
            State::HalfOpen if self.counts.requests >= options.max_probe_requests => Err(Rejected::TooManyRequests),
            State::Closed | State::HalfOpen => {
                self.counts.on_request();
                Ok(self.generation)
            }
        };

        (admission, event)
    }

    fn after_call(&mut self, generation: u64, success: bool, now: Instant, options: &EngineOptions) -> Option<Event> {
        let event = self.resolve(now, options);

        // Every event starts a new generation, so the outcome is stale whenever one was produced.
        if generation != self.generation {
            return event;
        }

        if success {
            self.on_success(now, options)
        } else {
            self.on_failure(now, options)
        }
    }

    fn on_success(&mut self, now: Instant, options: &EngineOptions) -> Option<Event> {
        match self.state {
            State::Closed => {
                self.counts.on_success();
                None
            }
            State::HalfOpen => {
                self.counts.on_success();

                if self.counts.consecutive_successes >= options.max_probe_requests {
                    self.set_state(State::Closed, now, options)
                } else {
                    None
                }
            }
            State::Open => None,
        }
    }

    fn on_failure(&mut self, now: Instant, options: &EngineOptions) -> Option<Event> {
        match self.state {
            State::Closed => {
                self.counts.on_failure();

                if options.trip_predicate.call(&self.counts) {
                    self.set_state(State::Open, now, options)
                } else {
                    None
                }
            }
            State::HalfOpen => {
                self.counts.on_failure();
                self.set_state(State::Open, now, options)
            }
            State::Open => None,
        }
    }

    fn set_state(&mut self, to: State, now: Instant, options: &EngineOptions) -> Option<Event> {
        if self.state == to {
            return None;
        }

        let from = self.state;
        self.state = to;
        self.start_generation(now, options);

        Some(Event::Transition {
            from,
            to,
            generation: self.generation,
        })
    }

    fn start_generation(&mut self, now: Instant, options: &EngineOptions) {
        self.generation = self.generation.wrapping_add(1);
        self.counts = Counts::default();
        self.expiry = self.next_expiry(now, options);
    }

    fn next_expiry(&self, now: Instant, options: &EngineOptions) -> Option<Instant> {
        match self.state {
            State::Closed if options.rolling_window.is_zero() => None,
            State::Closed => now.checked_add(options.rolling_window),
            // A cool-down too large to represent keeps the circuit open.
            State::Open => now.checked_add(options.open_cooldown),
            State::HalfOpen => None,
        }
    }
}
