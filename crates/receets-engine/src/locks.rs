//! # Per-Sale Locks
//!
//! In-process mutual exclusion keyed by sale id. A guard is held across the
//! whole read-mutate-write of a sale, gateway call included.
//!
//! ```text
//! request A: lock(s-1) ──► read v3 ──► gateway ──► save v3→v4 ──► unlock
//! request B: lock(s-1) ··························waits·········──► read v4 ...
//! ```
//!
//! Entries are weak, so ids with no outstanding guard cost nothing after
//! the next insertion sweeps them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Held while a sale (or a pair of sales) is being mutated.
#[must_use = "the sale is unlocked as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SaleGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

#[derive(Debug, Clone, Default)]
pub struct SaleLocks {
    inner: Arc<Mutex<HashMap<String, Weak<AsyncMutex<()>>>>>,
}

impl SaleLocks {
    pub fn new() -> Self {
        SaleLocks::default()
    }

    fn entry(&self, sale_id: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = map.get(sale_id).and_then(Weak::upgrade) {
            return existing;
        }
        map.retain(|_, weak| weak.strong_count() > 0);
        let lock = Arc::new(AsyncMutex::new(()));
        map.insert(sale_id.to_string(), Arc::downgrade(&lock));
        lock
    }

    /// Waits until no other request in this process holds `sale_id`.
    pub async fn lock(&self, sale_id: &str) -> SaleGuard {
        let guard = self.entry(sale_id).lock_owned().await;
        SaleGuard {
            _guards: vec![guard],
        }
    }

    /// Locks two sales, always in ascending id order so two requests
    /// locking the same pair cannot deadlock.
    pub async fn lock_pair(&self, first: &str, second: &str) -> SaleGuard {
        if first == second {
            return self.lock(first).await;
        }
        let (low, high) = if first < second {
            (first, second)
        } else {
            (second, first)
        };
        let low_guard = self.entry(low).lock_owned().await;
        let high_guard = self.entry(high).lock_owned().await;
        SaleGuard {
            _guards: vec![low_guard, high_guard],
        }
    }

    /// Number of ids with a live lock entry.
    pub fn len(&self) -> usize {
        let map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.values().filter(|weak| weak.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
