//! Single-flight coordination
//!
//! The first caller for a key performs the work; callers arriving with the
//! same key while it is in flight wait for that result instead of repeating
//! the work. The result (success or failure) is delivered to every waiter
//! exactly once. If the leader is cancelled before finishing, one waiter
//! takes over as the new leader.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;

pub struct SingleFlight<K, V> {
    // Never held across an await point.
    inflight: Mutex<HashMap<K, broadcast::Sender<V>>>,
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Removes the in-flight entry if the leader is dropped before publishing
struct LeaderGuard<'a, K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    flight: &'a SingleFlight<K, V>,
    key: Option<K>,
}

impl<K, V> Drop for LeaderGuard<'_, K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            // Dropping the sender closes the channel; waiters wake and retry.
            self.flight.lock().remove(&key);
        }
    }
}

enum Role<V> {
    Leader,
    Waiter(broadcast::Receiver<V>),
}

impl<K, V> SingleFlight<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, broadcast::Sender<V>>> {
        self.inflight.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn join(&self, key: &K) -> Role<V> {
        let mut inflight = self.lock();
        match inflight.get(key) {
            Some(sender) => Role::Waiter(sender.subscribe()),
            None => {
                let (sender, _) = broadcast::channel(1);
                inflight.insert(key.clone(), sender);
                Role::Leader
            }
        }
    }

    /// Run `work` for `key`, or join an identical in-flight call
    pub async fn run<F, Fut>(&self, key: K, work: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        loop {
            match self.join(&key) {
                Role::Waiter(mut receiver) => match receiver.recv().await {
                    Ok(value) => return value,
                    // Leader cancelled without a result; contend again.
                    Err(_) => continue,
                },
                Role::Leader => break,
            }
        }

        let mut guard = LeaderGuard {
            flight: self,
            key: Some(key.clone()),
        };
        let value = work().await;

        guard.key = None;
        if let Some(sender) = self.lock().remove(&key) {
            // No receivers just means nobody joined this flight.
            let _ = sender.send(value.clone());
        }
        value
    }

    /// Number of keys currently in flight
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }
}
