// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::State;

/// Arguments for the [`on_state_change`][crate::BreakerOptions::on_state_change] callback function.
///
/// Describes a single transition of a breaker. The callback is invoked after the breaker released
/// its internal lock, so the breaker may have moved on by the time the callback observes these
/// values.
#[derive(Debug)]
#[non_exhaustive]
pub struct OnStateChangeArgs<'a> {
    pub(crate) name: &'a str,
    pub(crate) from: State,
    pub(crate) to: State,
    pub(crate) generation: u64,
}

impl OnStateChangeArgs<'_> {
    /// Returns the name of the breaker that changed state.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name
    }

    /// Returns the state the breaker left.
    #[must_use]
    pub fn from(&self) -> State {
        self.from
    }

    /// Returns the state the breaker entered.
    #[must_use]
    pub fn to(&self) -> State {
        self.to
    }

    /// Returns the generation that started with this transition.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
