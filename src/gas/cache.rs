//! Time-bounded storage for the latest gas snapshot.

use super::GasSnapshot;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;

/// Cache backend for gas snapshots.
///
/// Only the in-memory variant exists today; callers hold an
/// `Arc<dyn GasStorage>` so another backend can be swapped in.
pub trait GasStorage: Send + Sync {
    /// Latest snapshot, or `None` once its TTL has run out.
    fn get(&self) -> Option<GasSnapshot>;

    /// Latest snapshot regardless of expiry. All-zero if nothing was stored.
    fn get_stale(&self) -> GasSnapshot;

    /// Replace the stored snapshot; it expires `ttl` from now.
    fn set(&self, value: GasSnapshot, ttl: Duration);
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    value: GasSnapshot,
    expires_at: Instant,
}

/// In-memory [`GasStorage`] guarded by a reader/writer lock.
#[derive(Debug)]
pub struct MemoryStorage {
    entry: RwLock<CacheEntry>,
}

impl MemoryStorage {
    /// Starts out holding the zero snapshot, already expired.
    pub fn new() -> Self {
        Self {
            entry: RwLock::new(CacheEntry {
                value: GasSnapshot::default(),
                expires_at: Instant::now(),
            }),
        }
    }

    fn read(&self) -> CacheEntry {
        // The entry is a plain Copy value, so a poisoned lock still holds a whole one.
        *self.entry.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl GasStorage for MemoryStorage {
    fn get(&self) -> Option<GasSnapshot> {
        let entry = self.read();
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.value)
    }

    fn get_stale(&self) -> GasSnapshot {
        self.read().value
    }

    fn set(&self, value: GasSnapshot, ttl: Duration) {
        let mut entry = self.entry.write().unwrap_or_else(PoisonError::into_inner);
        *entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
    }
}
