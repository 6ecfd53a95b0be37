// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Name used when the breaker is created with an empty name.
pub(crate) const DEFAULT_NAME: &str = "breaker";

/// Default number of probe requests admitted per half-open generation. This is also the number of
/// consecutive successful probes required to close the circuit again.
pub(crate) const DEFAULT_MAX_PROBE_REQUESTS: u32 = 1;

/// Default duration the circuit stays open before it starts probing the dependency.
pub(crate) const DEFAULT_OPEN_COOLDOWN: Duration = Duration::from_secs(60);

/// The default trip predicate opens the circuit once the consecutive failures exceed this value.
pub(crate) const DEFAULT_CONSECUTIVE_FAILURES: u32 = 5;

pub(crate) const STANDARD_MAX_PROBE_REQUESTS: u32 = 3;
pub(crate) const STANDARD_ROLLING_WINDOW: Duration = Duration::from_secs(30);
pub(crate) const STANDARD_OPEN_COOLDOWN: Duration = Duration::from_secs(60);
pub(crate) const STANDARD_MIN_REQUESTS: u32 = 3;
pub(crate) const STANDARD_FAILURE_RATIO: f64 = 0.6;

pub(crate) const ERR_POISONED_LOCK: &str =
    "poisoned lock - cannot continue execution because the circuit state can no longer be trusted";
