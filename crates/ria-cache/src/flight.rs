//! Per-key single-flight coordination
//!
//! Callers working on the same key line up behind one async mutex; callers on
//! different keys never wait on each other. The first caller through does the
//! work, the rest re-check whatever the first one produced.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Group of in-flight keys
#[derive(Debug)]
pub struct FlightGroup<K>
where
    K: Eq + Hash,
{
    flights: DashMap<K, Arc<Mutex<()>>>,
}

impl<K> FlightGroup<K>
where
    K: Eq + Hash + Clone,
{
    /// Create empty group
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            flights: DashMap::new(),
        }
    }

    /// Wait for exclusive access to `key`
    ///
    /// The returned [`Flight`] holds the key until dropped.
    pub async fn enter(&self, key: K) -> Flight<'_, K> {
        let lock = self.flights.entry(key.clone()).or_default().clone();
        let permit = lock.lock_owned().await;
        Flight {
            group: self,
            key,
            _permit: permit,
        }
    }

    /// Number of keys that currently have a holder or waiters
    #[inline]
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }
}

impl<K> Default for FlightGroup<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive hold on one key of a [`FlightGroup`]
#[derive(Debug)]
pub struct Flight<'a, K>
where
    K: Eq + Hash,
{
    group: &'a FlightGroup<K>,
    key: K,
    _permit: OwnedMutexGuard<()>,
}

impl<K> Flight<'_, K>
where
    K: Eq + Hash,
{
    /// Key held by this flight
    #[inline]
    #[must_use]
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K> Drop for Flight<'_, K>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        // Map entry + our permit = 2; anything above that is a waiter.
        self.group
            .flights
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) <= 2);
    }
}
