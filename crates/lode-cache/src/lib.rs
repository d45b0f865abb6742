//! Keyed memoization tables for Lode.
//!
//! Remote lookups (ref resolution, star counts, package builds) are expensive
//! and are requested from many places while a page is being assembled. This
//! crate provides [`Memo`], a process-lifetime table that maps a key to a
//! single shared computation:
//!
//! - the first request for a key starts the computation
//! - concurrent requests for the same key join it instead of starting another
//! - settled successes are kept for the lifetime of the table
//! - settled failures are reported to every current waiter and then cleared,
//!   so the next request retries
//!
//! A slot is only ever absent, in flight, or settled. Dropping a waiter does
//! not cancel the computation for the others: whoever still awaits the shared
//! future keeps driving it.
//!
//! # Example
//!
//! ```
//! use lode_cache::Memo;
//!
//! let memo: Memo<String, u64, String> = Memo::new("stars");
//! let stars = futures::executor::block_on(
//!     memo.get_or_try_init("thefrontside/effection".to_owned(), || async { Ok(42) }),
//! );
//! assert_eq!(stars, Ok(42));
//! ```

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Mutex;

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

type Slot<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

/// Keyed memoization table with join-on-in-flight semantics.
///
/// Values and errors must be `Clone` because every waiter receives its own
/// copy of the settled result. Wrap large values in `Arc`.
pub struct Memo<K, V, E> {
    name: &'static str,
    slots: Mutex<HashMap<K, Slot<V, E>>>,
}

impl<K, V, E> Memo<K, V, E>
where
    K: Eq + Hash + Clone + Debug + Send,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create an empty table.
    ///
    /// `name` only appears in log output.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the value for `key`, computing it with `init` if no computation
    /// for the key is settled or in flight.
    ///
    /// `init` is only called when a new computation is started. The lock is
    /// released before the computation is awaited.
    ///
    /// # Errors
    ///
    /// Returns the error produced by the shared computation. The failed slot
    /// is cleared afterwards so a later call starts a fresh computation.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub async fn get_or_try_init<F, Fut>(&self, key: K, init: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let slot = {
            let mut slots = self.slots.lock().unwrap();
            if let Some(slot) = slots.get(&key) {
                debug!(memo = self.name, ?key, "Joining existing computation");
                slot.clone()
            } else {
                debug!(memo = self.name, ?key, "Starting computation");
                let slot = init().boxed().shared();
                slots.insert(key.clone(), slot.clone());
                slot
            }
        };

        let result = slot.clone().await;

        if result.is_err() {
            let mut slots = self.slots.lock().unwrap();
            // Only clear our own slot; a retry may already have replaced it.
            if slots.get(&key).is_some_and(|current| current.ptr_eq(&slot)) {
                debug!(memo = self.name, ?key, "Clearing failed computation");
                slots.remove(&key);
            }
        }

        result
    }

    /// Peek at a settled result without awaiting.
    ///
    /// Returns `None` when the key is absent or still in flight.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<Result<V, E>> {
        self.slots.lock().unwrap().get(key)?.peek().cloned()
    }

    /// Whether a computation for `key` is in flight or settled.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.slots.lock().unwrap().contains_key(key)
    }

    /// Number of occupied slots.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    /// Whether the table has no occupied slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V, E> Debug for Memo<K, V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo").field("name", &self.name).finish_non_exhaustive()
    }
}
