// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(
    not(all(feature = "logs", feature = "metrics")),
    expect(
        rustdoc::broken_intra_doc_links,
        reason = "telemetry methods are only linkable when their features are enabled"
    )
)]

//! A circuit breaker that shields callers from a failing or slow dependency.
//!
//! A [`Breaker`] tracks the outcomes of the calls made through it. Once a failure threshold is
//! crossed, it stops calling the dependency for a cool-down period and fails fast instead. It then
//! lets a few probe calls through to find out whether the dependency recovered.
//!
//! ```text
//! Closed ── trip predicate ──▶ Open ── cool-down ──▶ HalfOpen ── enough successes ──▶ Closed
//!                               ▲                        │
//!                               └──── any failure ───────┘
//! ```
//!
//! The breaker is a single-process, in-memory primitive. It has no background tasks: time-based
//! transitions are applied lazily whenever the breaker is used or queried, based on the
//! [`Clock`][tick::Clock] it was created with.
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//!
//! use tick::Clock;
//! use tripwire::{Breaker, BreakerError, BreakerOptions};
//!
//! # fn fetch_profile() -> Result<String, std::io::Error> { Ok("profile".to_string()) }
//! let clock = Clock::new_frozen();
//! let breaker = Breaker::new(
//!     BreakerOptions::new("profile_service", &clock)
//!         .open_cooldown(Duration::from_secs(30))
//!         .trip_when(|counts| counts.consecutive_failures >= 3),
//! );
//!
//! match breaker.execute(fetch_profile) {
//!     Ok(profile) => println!("{profile}"),
//!     Err(BreakerError::Inner(error)) => println!("call failed: {error}"),
//!     Err(rejected) => println!("call not attempted: {rejected}"),
//! }
//! ```
//!
//! # Generations
//!
//! Every state change, and every reset of the counts of a closed breaker, starts a new
//! generation. Each admitted call remembers the generation it was admitted in, and its outcome is
//! discarded if the breaker moved on in the meantime. A slow call started before the breaker
//! opened can therefore never close it again.
//!
//! # Fallbacks
//!
//! [`Breaker::execute_or_else`] and [`Breaker::execute_or_else_async`] return a fallback value,
//! such as a cached or default response, instead of an error when the breaker rejects a call.
//!
//! # Manual Outcome Recording
//!
//! When the protected call does not fit into a closure, use [`Breaker::try_acquire`] and complete
//! the returned [`Permit`] with the outcome. A permit dropped without an outcome counts as a
//! failure.
//!
//! # Features
//!
//! - `logs`: Enables [`BreakerOptions::enable_logs`] to emit structured `tracing` events for state
//!   changes and rejections.
//! - `metrics`: Enables [`BreakerOptions::enable_metrics`] to report the `resilience.event`
//!   OpenTelemetry counter.
//! - `serde`: Implements `Serialize` and `Deserialize` for [`BreakerConfig`].

mod args;
mod breaker;
mod callbacks;
mod config;
mod constants;
mod counts;
mod define_fn_wrapper;
mod engine;
mod error;
mod options;
mod registry;
mod state;
pub mod telemetry;

pub use args::OnStateChangeArgs;
pub use breaker::{Breaker, Permit};
pub use config::BreakerConfig;
pub use counts::Counts;
pub use error::{BreakerError, Rejected};
pub use options::BreakerOptions;
pub use registry::BreakerRegistry;
pub use state::State;

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod testing;
