//! Read-mostly in-memory caches refreshed by one background task each.
//!
//! Consistency model: a symbol's record is always replaced whole under the
//! write lock, so readers never see a torn record. There is no cross-symbol
//! snapshot isolation: two lookups for different symbols may observe
//! different refreshes, and the two caches are independent of each other.

pub mod market_stats;
pub mod reference;

pub use market_stats::{MarketStatsCache, ReconnectPolicy};
pub use reference::ReferenceDataCache;

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::task::JoinHandle;

/// Background refresh task owned by a cache handle. Aborted when the last
/// handle clone is dropped.
#[derive(Debug)]
pub(crate) struct RefreshTask(JoinHandle<()>);

impl RefreshTask {
    pub(crate) fn new(handle: JoinHandle<()>) -> Self {
        Self(handle)
    }

    pub(crate) fn abort(&self) {
        self.0.abort();
    }
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

// A panic while holding the lock leaves whole records behind (inserts are
// single-key), so a poisoned map is still safe to read.
pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
