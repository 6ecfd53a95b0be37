// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured logs and metrics emitted by breakers.
//!
//! Attribute keys follow the [OpenTelemetry naming guidelines](https://opentelemetry.io/docs/specs/semconv/general/naming/#general-naming-considerations)
//! and match the keys used by the other resilience middleware of the workspace.

use std::borrow::Cow;

use crate::{Rejected, State};

/// Key used to annotate the name of the breaker that emitted an event.
pub const STRATEGY_NAME: &str = "resilience.strategy.name";

/// Key used to annotate the specific resilience event being emitted.
pub const EVENT_NAME: &str = "resilience.event.name";

/// Key used to annotate the state of the breaker when the event was emitted.
pub const CIRCUIT_STATE: &str = "resilience.circuit_breaker.state";

#[cfg(any(feature = "metrics", test))]
pub(crate) const CIRCUIT_OPENED_EVENT_NAME: &str = "circuit_opened";
#[cfg(any(feature = "metrics", test))]
pub(crate) const CIRCUIT_CLOSED_EVENT_NAME: &str = "circuit_closed";
#[cfg(any(feature = "metrics", test))]
pub(crate) const CIRCUIT_HALF_OPENED_EVENT_NAME: &str = "circuit_half_opened";
#[cfg(any(feature = "metrics", test))]
pub(crate) const CIRCUIT_REJECTED_EVENT_NAME: &str = "circuit_rejected";

#[cfg(any(feature = "metrics", test))]
pub(crate) const fn transition_event_name(to: State) -> &'static str {
    match to {
        State::Open => CIRCUIT_OPENED_EVENT_NAME,
        State::Closed => CIRCUIT_CLOSED_EVENT_NAME,
        State::HalfOpen => CIRCUIT_HALF_OPENED_EVENT_NAME,
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetryHelper {
    #[cfg(any(feature = "metrics", feature = "logs", test))]
    pub(crate) breaker_name: Cow<'static, str>,
    #[cfg(any(feature = "metrics", test))]
    pub(crate) event_reporter: Option<opentelemetry::metrics::Counter<u64>>,
    pub(crate) logs_enabled: bool,
}

impl TelemetryHelper {
    #[cfg_attr(
        not(any(feature = "metrics", feature = "logs", test)),
        expect(unused_variables, reason = "unused when logs nor metrics are used")
    )]
    pub(crate) fn new(breaker_name: Cow<'static, str>) -> Self {
        Self {
            #[cfg(any(feature = "metrics", feature = "logs", test))]
            breaker_name,
            #[cfg(any(feature = "metrics", test))]
            event_reporter: None,
            logs_enabled: false,
        }
    }

    pub(crate) fn report_transition(&self, from: State, to: State, generation: u64) {
        #[cfg(any(feature = "metrics", test))]
        if let Some(reporter) = &self.event_reporter {
            reporter.add(
                1,
                &[
                    opentelemetry::KeyValue::new(STRATEGY_NAME, self.breaker_name.clone()),
                    opentelemetry::KeyValue::new(EVENT_NAME, transition_event_name(to)),
                    opentelemetry::KeyValue::new(CIRCUIT_STATE, to.as_str()),
                ],
            );
        }

        if self.logs_enabled {
            // The level of an event is part of its static metadata.
            #[cfg(any(feature = "logs", test))]
            if to == State::Open {
                tracing::event!(
                    name: "tripwire.breaker.state_changed",
                    tracing::Level::WARN,
                    breaker.name = %self.breaker_name,
                    breaker.state.from = from.as_str(),
                    breaker.state.to = to.as_str(),
                    breaker.generation = generation,
                );
            } else {
                tracing::event!(
                    name: "tripwire.breaker.state_changed",
                    tracing::Level::INFO,
                    breaker.name = %self.breaker_name,
                    breaker.state.from = from.as_str(),
                    breaker.state.to = to.as_str(),
                    breaker.generation = generation,
                );
            }
        }

        _ = (from, to, generation);
    }

    pub(crate) fn report_window_reset(&self, generation: u64) {
        if self.logs_enabled {
            #[cfg(any(feature = "logs", test))]
            tracing::event!(
                name: "tripwire.breaker.window_reset",
                tracing::Level::DEBUG,
                breaker.name = %self.breaker_name,
                breaker.state = State::Closed.as_str(),
                breaker.generation = generation,
            );
        }

        _ = generation;
    }

    pub(crate) fn report_rejection(&self, state: State, rejected: Rejected) {
        #[cfg(any(feature = "metrics", test))]
        if let Some(reporter) = &self.event_reporter {
            reporter.add(
                1,
                &[
                    opentelemetry::KeyValue::new(STRATEGY_NAME, self.breaker_name.clone()),
                    opentelemetry::KeyValue::new(EVENT_NAME, CIRCUIT_REJECTED_EVENT_NAME),
                    opentelemetry::KeyValue::new(CIRCUIT_STATE, state.as_str()),
                ],
            );
        }

        if self.logs_enabled {
            #[cfg(any(feature = "logs", test))]
            tracing::event!(
                name: "tripwire.breaker.rejected",
                tracing::Level::WARN,
                breaker.name = %self.breaker_name,
                breaker.state = state.as_str(),
                breaker.rejection = rejected.as_str(),
            );
        }

        _ = (state, rejected);
    }
}

#[cfg(any(feature = "metrics", test))]
pub(crate) mod metrics {
    use opentelemetry::InstrumentationScope;
    use opentelemetry::metrics::{Counter, Meter, MeterProvider};

    const METER_NAME: &str = "tripwire";
    const VERSION: &str = "v0.1.0";
    const SCHEMA_URL: &str = "https://opentelemetry.io/schemas/1.47.0";

    pub(crate) fn create_meter(meter_provider: &dyn MeterProvider) -> Meter {
        meter_provider.meter_with_scope(
            InstrumentationScope::builder(METER_NAME)
                .with_version(VERSION)
                .with_schema_url(SCHEMA_URL)
                .build(),
        )
    }

    pub(crate) fn create_resilience_event_counter(meter: &Meter) -> Counter<u64> {
        meter
            .u64_counter("resilience.event")
            .with_description("Emitted upon the occurrence of a resilience event.")
            .with_unit("u64")
            .build()
    }
}
