// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::sync::Mutex;

use tick::Clock;

use crate::callbacks::OptionsFactory;
use crate::constants::ERR_POISONED_LOCK;
use crate::{Breaker, BreakerOptions};

/// A collection of breakers keyed by name.
///
/// Each dependency usually gets its own breaker so that one failing dependency does not reject
/// calls to the healthy ones. The registry creates the breaker for a name the first time it is
/// requested, using the options returned by its factory, and hands out clones of it afterwards.
///
/// ```
/// use tick::Clock;
/// use tripwire::BreakerRegistry;
///
/// let registry = BreakerRegistry::<std::io::Error>::standard(Clock::new_frozen());
///
/// let users = registry.get("users");
/// let orders = registry.get("orders");
///
/// assert_eq!(users.name(), "users");
/// assert_eq!(registry.names(), ["orders", "users"]);
///
/// // The same name always maps to the same breaker.
/// let _ = registry.get("users").execute(|| Err::<(), _>(std::io::Error::other("down")));
/// assert_eq!(users.counts().total_failures, 1);
/// # drop(orders);
/// ```
pub struct BreakerRegistry<E> {
    breakers: Mutex<HashMap<String, Breaker<E>>>,
    factory: OptionsFactory<E>,
}

impl<E> BreakerRegistry<E> {
    /// Creates an empty registry that configures new breakers with the given factory.
    ///
    /// The factory receives the name of the requested breaker. It runs outside of the registry's
    /// lock and may run more than once for the same name when several threads request a missing
    /// breaker at the same time; only one of the resulting breakers is kept.
    pub fn new(factory: impl Fn(&str) -> BreakerOptions<E> + Send + Sync + 'static) -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
            factory: OptionsFactory::new(factory),
        }
    }

    /// Creates an empty registry whose breakers use [`BreakerOptions::standard`].
    pub fn standard(clock: impl AsRef<Clock>) -> Self {
        let clock = clock.as_ref().clone();
        Self::new(move |name| BreakerOptions::standard(name.to_string(), &clock))
    }

    /// Returns the breaker with the given name, creating it on first use.
    #[must_use]
    pub fn get(&self, name: &str) -> Breaker<E> {
        if let Some(breaker) = self.breakers.lock().expect(ERR_POISONED_LOCK).get(name) {
            return breaker.clone();
        }

        let breaker = Breaker::new(self.factory.call(name));

        self.breakers
            .lock()
            .expect(ERR_POISONED_LOCK)
            .entry(name.to_string())
            .or_insert(breaker)
            .clone()
    }

    /// Returns the names of all breakers created so far, in ascending order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.lock().expect(ERR_POISONED_LOCK).keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of breakers created so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.breakers.lock().expect(ERR_POISONED_LOCK).len()
    }

    /// Returns `true` if no breaker was created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E> std::fmt::Debug for BreakerRegistry<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerRegistry").field("names", &self.names()).finish_non_exhaustive()
    }
}
