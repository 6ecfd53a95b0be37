// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::constants::{DEFAULT_MAX_PROBE_REQUESTS, DEFAULT_NAME, DEFAULT_OPEN_COOLDOWN};

/// The plain, data-only part of the breaker configuration.
///
/// With the `serde` feature enabled, the config can be loaded from any serde format. Missing
/// fields take their default values. Closures such as the trip predicate cannot be expressed as
/// data and are configured on the [`BreakerOptions`][crate::BreakerOptions] created by
/// [`from_config`][crate::BreakerOptions::from_config].
///
/// ```
/// # #[cfg(feature = "serde")]
/// # fn main() {
/// use std::time::Duration;
///
/// use tripwire::BreakerConfig;
///
/// let config: BreakerConfig =
///     serde_json::from_str(r#"{ "name": "auth", "open_cooldown": { "secs": 30, "nanos": 0 } }"#).unwrap();
///
/// assert_eq!(config.name, "auth");
/// assert_eq!(config.open_cooldown, Duration::from_secs(30));
/// assert_eq!(config.max_probe_requests, 1);
/// # }
/// # #[cfg(not(feature = "serde"))]
/// # fn main() {}
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(any(feature = "serde", test), derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(any(feature = "serde", test), serde(default))]
#[non_exhaustive]
pub struct BreakerConfig {
    /// Name of the breaker, reported in logs, metrics and state-change notifications.
    pub name: String,

    /// Number of probe calls admitted per half-open generation.
    pub max_probe_requests: u32,

    /// Period after which the counts of a closed breaker are cleared. Zero disables the reset.
    pub rolling_window: Duration,

    /// How long the breaker stays open before probing the dependency.
    pub open_cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            max_probe_requests: DEFAULT_MAX_PROBE_REQUESTS,
            rolling_window: Duration::ZERO,
            open_cooldown: DEFAULT_OPEN_COOLDOWN,
        }
    }
}
