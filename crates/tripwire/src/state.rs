// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Display, Formatter};

/// The state of a [`Breaker`][crate::Breaker].
///
/// ```text
/// ┌────────┐   trip predicate satisfied   ┌──────────┐
/// │ Closed │ ────────────────────────────▶│   Open   │
/// └────────┘                              └──────────┘
///      ▲                                    │      ▲
///      │ enough probes        cool-down     │      │ any probe
///      │ succeeded            elapsed       ▼      │ failed
///      │                    ┌────────────────┐     │
///      └────────────────────│   Half-Open    │─────┘
///                           └────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Calls pass through and their outcomes are counted.
    Closed,

    /// Calls are rejected without reaching the protected operation.
    Open,

    /// A bounded number of probe calls are let through to test whether the dependency recovered.
    HalfOpen,
}

impl State {
    /// Returns the `snake_case` name of the state, as used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
