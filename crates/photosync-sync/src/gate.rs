//! Single-flight coalescing gate
//!
//! At most one operation runs per key. The first caller (the *leader*)
//! registers a result slot and runs the operation; callers arriving while
//! it runs (the *followers*) subscribe to the slot and receive a clone of
//! the leader's result, success or error.
//!
//! ```text
//! caller A ──► run("Trip") ──► slot inserted ──► operation ──► publish ──► slot removed
//! caller B ──► run("Trip") ──► slot found ─────────────────────► clone of A's result
//! caller C ──► run("Trip") ──────────────────────────────────────────────────────────► runs again
//! ```
//!
//! The slot is removed once the result is published, so a caller arriving
//! afterwards starts a fresh operation. Callers are expected to check for a
//! finished result (e.g. a Ready album) before entering the gate, and again
//! inside the operation.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::debug;

use crate::SyncError;

type Slot<V> = Option<Result<V, SyncError>>;

/// Whether a caller ran the operation or joined one already in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Follower,
}

/// Per-key coalescing of concurrent async operations
pub struct SingleFlight<K, V> {
    inflight: DashMap<K, watch::Receiver<Slot<V>>>,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            inflight: DashMap::new(),
        }
    }

    /// Number of keys with an operation in flight
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.inflight.contains_key(key)
    }

    /// Runs `operation` for `key` unless one is already in flight, in which
    /// case its result is awaited instead
    ///
    /// If the leader is dropped before publishing, followers receive
    /// [`SyncError::Cancelled`].
    pub async fn run<F, Fut>(&self, key: K, operation: F) -> (Role, Result<V, SyncError>)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, SyncError>>,
    {
        // The map entry must be released before any await.
        let joined = match self.inflight.entry(key.clone()) {
            Entry::Occupied(entry) => Err(entry.get().clone()),
            Entry::Vacant(entry) => {
                let (tx, rx) = watch::channel(None);
                entry.insert(rx);
                Ok(tx)
            }
        };

        let tx = match joined {
            Ok(tx) => tx,
            Err(mut rx) => {
                debug!(key = ?key, "Joining in-flight operation");
                let result = match rx.wait_for(Option::is_some).await {
                    Ok(slot) => (*slot).clone().unwrap_or(Err(SyncError::Cancelled)),
                    Err(_) => Err(SyncError::Cancelled),
                };
                return (Role::Follower, result);
            }
        };

        let guard = SlotGuard {
            inflight: &self.inflight,
            key,
        };
        let result = operation().await;
        // Publish before removing the slot so no follower misses the result.
        let _ = tx.send(Some(result.clone()));
        drop(guard);
        (Role::Leader, result)
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Removes the slot when the leader finishes or is dropped mid-flight
struct SlotGuard<'a, K: Eq + Hash, V> {
    inflight: &'a DashMap<K, watch::Receiver<Slot<V>>>,
    key: K,
}

impl<K: Eq + Hash, V> Drop for SlotGuard<'_, K, V> {
    fn drop(&mut self) {
        self.inflight.remove(&self.key);
    }
}
