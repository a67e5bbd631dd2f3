//! Per-user lock map.
//!
//! RocksDB batches give atomicity but not isolation, so the engine holds
//! a user's lock for the duration of each read-modify-commit cycle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tally_core::UserId;

pub(crate) struct UserLocks {
    inner: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Handle for a user's lock. The caller locks it with [`acquire`] for
    /// the duration of the operation.
    pub(crate) fn handle(&self, user_id: UserId) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(map.entry(user_id).or_default())
    }

    /// Handles for two users' locks, ordered by id so concurrent pair
    /// operations cannot deadlock.
    pub(crate) fn pair(&self, a: UserId, b: UserId) -> (Arc<Mutex<()>>, Arc<Mutex<()>>) {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        (self.handle(first), self.handle(second))
    }
}

/// Lock a handle, recovering from poisoning: the ledger state lives in
/// the store, not behind this mutex, so a panicked holder leaves nothing
/// to clean up.
pub(crate) fn acquire(handle: &Arc<Mutex<()>>) -> MutexGuard<'_, ()> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_user_gets_same_lock() {
        let locks = UserLocks::new();
        let user = UserId::generate();
        let a = locks.handle(user);
        let b = locks.handle(user);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn pair_order_is_independent_of_argument_order() {
        let locks = UserLocks::new();
        let a = UserId::generate();
        let b = UserId::generate();
        let (first_ab, second_ab) = locks.pair(a, b);
        let (first_ba, second_ba) = locks.pair(b, a);
        assert!(Arc::ptr_eq(&first_ab, &first_ba));
        assert!(Arc::ptr_eq(&second_ab, &second_ba));
    }
}
