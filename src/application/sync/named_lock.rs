//! Named mutual-exclusion domains
//!
//! Callers pick a key; every closure run under the same key is strictly
//! serialized. Locks are created lazily on first use and kept for the
//! lifetime of the table. Nothing orders work across different keys.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Lock domain guarding user records in the state registry
pub(crate) const USER_DOMAIN: &str = "user";
/// Lock domain guarding room records in the state registry
pub(crate) const ROOM_DOMAIN: &str = "room";

#[derive(Default)]
pub struct NamedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl NamedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock named `name`.
    ///
    /// A panic inside `f` propagates to the caller; the lock stays usable
    /// for everyone else.
    pub fn with_lock<R>(&self, name: &str, f: impl FnOnce() -> R) -> R {
        let lock = self.lock_for(name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Number of lock domains created so far
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_for(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(name.to_string()).or_default())
    }
}

impl std::fmt::Debug for NamedLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedLocks").field("domains", &self.len()).finish()
    }
}
