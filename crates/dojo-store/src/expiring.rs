//! Keyed values that can revert (disappear) after a delay.
//!
//! Each key carries a generation number. Writing a key bumps its generation
//! and aborts that key's pending revert task; a revert task only removes the
//! entry if the generation it was scheduled for is still current. A stale
//! timer from an earlier write can therefore never clear a newer value.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::warn;

struct Slot<V> {
    value: V,
    generation: u64,
    revert: Option<JoinHandle<()>>,
}

struct Inner<K, V> {
    slots: HashMap<K, Slot<V>>,
    next_generation: u64,
}

impl<K: Eq + Hash, V> Inner<K, V> {
    fn insert(&mut self, key: K, value: V) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        let slot = Slot {
            value,
            generation,
            revert: None,
        };
        if let Some(old) = self.slots.insert(key, slot) {
            cancel(old);
        }
        generation
    }
}

fn cancel<V>(slot: Slot<V>) {
    if let Some(handle) = slot.revert {
        handle.abort();
    }
}

/// Shared map of short-lived values. Clones share the same entries.
pub struct ExpiringMap<K, V> {
    inner: Arc<Mutex<Inner<K, V>>>,
}

impl<K, V> Clone for ExpiringMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Default for ExpiringMap<K, V> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                slots: HashMap::new(),
                next_generation: 0,
            })),
        }
    }
}

impl<K, V> ExpiringMap<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a value with no expiry, cancelling any pending revert.
    pub fn set(&self, key: K, value: V) {
        self.lock().insert(key, value);
    }

    /// Store a value and remove it after `ttl`.
    ///
    /// Needs a tokio runtime for the timer; without one the value is kept
    /// until overwritten or removed.
    pub fn set_for(&self, key: K, value: V, ttl: Duration) {
        let mut inner = self.lock();
        let generation = inner.insert(key.clone(), value);

        let Ok(runtime) = Handle::try_current() else {
            warn!("no tokio runtime; expiring value kept until replaced");
            return;
        };
        let weak = Arc::downgrade(&self.inner);
        let task_key = key.clone();
        let handle = runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let mut inner = shared.lock().unwrap_or_else(PoisonError::into_inner);
            let current = inner
                .slots
                .get(&task_key)
                .is_some_and(|slot| slot.generation == generation);
            if current {
                inner.slots.remove(&task_key);
            }
        });
        if let Some(slot) = inner.slots.get_mut(&key) {
            slot.revert = Some(handle);
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().slots.get(key).map(|slot| slot.value.clone())
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.lock().slots.contains_key(key)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.lock().slots.remove(key).map(|slot| {
            let value = slot.value.clone();
            cancel(slot);
            value
        })
    }

    pub fn clear(&self) {
        let drained: Vec<Slot<V>> = self.lock().slots.drain().map(|(_, slot)| slot).collect();
        drained.into_iter().for_each(cancel);
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<(K, V)> {
        self.lock()
            .slots
            .iter()
            .map(|(k, slot)| (k.clone(), slot.value.clone()))
            .collect()
    }
}
