// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Outcome statistics of the current generation of a [`Breaker`][crate::Breaker].
///
/// The counts are reset to zero whenever a new generation begins, that is on every state
/// transition and whenever the rolling window of the closed state elapses.
///
/// `consecutive_successes` and `consecutive_failures` are never both non-zero: recording one kind
/// of outcome clears the streak of the other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Counts {
    /// Calls admitted in this generation, including those whose outcome is still pending.
    pub requests: u32,

    /// Successful outcomes recorded in this generation.
    pub total_successes: u32,

    /// Failed outcomes recorded in this generation.
    pub total_failures: u32,

    /// Successful outcomes recorded since the last failure.
    pub consecutive_successes: u32,

    /// Failed outcomes recorded since the last success.
    pub consecutive_failures: u32,
}

impl Counts {
    /// Returns the share of admitted requests that failed, in the `0.0..=1.0` range.
    ///
    /// Returns `0.0` when no request was admitted yet.
    #[must_use]
    pub fn failure_ratio(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }

        f64::from(self.total_failures) / f64::from(self.requests)
    }

    pub(crate) fn on_request(&mut self) {
        self.requests = self.requests.saturating_add(1);
    }

    pub(crate) fn on_success(&mut self) {
        self.total_successes = self.total_successes.saturating_add(1);
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
    }

    pub(crate) fn on_failure(&mut self) {
        self.total_failures = self.total_failures.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
    }
}
