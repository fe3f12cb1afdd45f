//! Collapse concurrent identical work into one shared future.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};

/// Per-key map of in-flight futures. The first caller for a key runs the
/// work; callers arriving before it finishes await the same result.
pub struct SingleFlight<K, V>
where
    V: Clone,
{
    pending: Mutex<HashMap<K, Shared<BoxFuture<'static, V>>>>,
}

impl<K, V> SingleFlight<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Run `work` for `key`, or join the run already in flight.
    pub async fn run<F>(&self, key: K, work: F) -> V
    where
        F: FnOnce() -> BoxFuture<'static, V>,
    {
        let shared = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            match pending.get(&key) {
                Some(existing) => existing.clone(),
                None => {
                    let fut = work().shared();
                    pending.insert(key.clone(), fut.clone());
                    fut
                }
            }
        };

        let _entry = Entry {
            pending: &self.pending,
            key,
            shared: shared.clone(),
        };
        shared.await
    }

    /// Number of keys currently in flight.
    pub fn in_flight(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Removes its key from the map when the caller finishes or is dropped,
/// unless a newer run has replaced it.
struct Entry<'a, K, V>
where
    K: Hash + Eq,
{
    pending: &'a Mutex<HashMap<K, Shared<BoxFuture<'static, V>>>>,
    key: K,
    shared: Shared<BoxFuture<'static, V>>,
}

impl<K, V> Drop for Entry<'_, K, V>
where
    K: Hash + Eq,
{
    fn drop(&mut self) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if pending
            .get(&self.key)
            .is_some_and(|current| Shared::ptr_eq(current, &self.shared))
        {
            pending.remove(&self.key);
        }
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
