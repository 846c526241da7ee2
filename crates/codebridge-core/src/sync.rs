//! Per-key async locking.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

/// Per-key async mutex.
///
/// Different keys lock independently; operations on the same key serialize.
/// The registry uses this to hold exactly one in-flight session creation
/// per user.
#[derive(Clone, Default)]
pub(crate) struct KeyedLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Get or create the lock for `key`.
    pub(crate) fn get(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_returns_same_lock() {
        let locks = KeyedLocks::new();
        let a = locks.get("user_1");
        let b = locks.get("user_1");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_keys_return_different_locks() {
        let locks = KeyedLocks::new();
        let a = locks.get("user_1");
        let b = locks.get("user_2");
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn same_key_serializes_different_keys_do_not() {
        let locks = KeyedLocks::new();

        let first = locks.get("user_1");
        let _guard = first.try_lock().unwrap();

        assert!(locks.get("user_1").try_lock().is_err());
        assert!(locks.get("user_2").try_lock().is_ok());
    }
}
