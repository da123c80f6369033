use super::{Storage, StorageResult};
use crate::clock::Clock;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    /// Unix seconds; `None` never expires
    expires_at: Option<i64>,
}

impl Entry {
    fn is_live(&self, now: i64) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Process-local store, expiry evaluated against the [`Clock`]
///
/// Reads drop the expired key they hit. Writes sweep the whole map once the earliest
/// known expiry has passed, so keys that are never read again do not accumulate.
pub struct InMemoryStorage {
    entries: DashMap<String, Entry>,
    /// Earliest `expires_at` written since the last sweep
    next_expiry: AtomicI64,
    clock: Arc<dyn Clock>,
}

impl InMemoryStorage {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            next_expiry: AtomicI64::new(i64::MAX),
            clock,
        }
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        let mut earliest = i64::MAX;
        self.next_expiry.store(i64::MAX, Ordering::Relaxed);
        self.entries.retain(|_, entry| {
            let live = entry.is_live(now);
            if let (true, Some(at)) = (live, entry.expires_at) {
                earliest = earliest.min(at);
            }
            live
        });
        self.next_expiry.fetch_min(earliest, Ordering::Relaxed);

        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(
                removed = removed,
                remaining = self.entries.len(),
                "Cleaned up expired storage entries"
            );
        }
        removed
    }

    fn sweep_if_due(&self) {
        if self.clock.now() >= self.next_expiry.load(Ordering::Relaxed) {
            self.cleanup_expired();
        }
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries.iter().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining lifetime of `key` in seconds; `None` for absent or permanent keys
    pub fn ttl(&self, key: &str) -> Option<u64> {
        let now = self.clock.now();
        let entry = self.entries.get(key)?;
        if !entry.is_live(now) {
            return None;
        }
        entry.expires_at.map(|at| (at - now) as u64)
    }
}

impl Storage for InMemoryStorage {
    fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        let now = self.clock.now();
        let found = match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if found {
            self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        }
        Ok(None)
    }

    fn put(&self, key: &str, value: &Value, ttl_seconds: u64) -> StorageResult<()> {
        self.sweep_if_due();
        if ttl_seconds == 0 {
            self.entries.remove(key);
            return Ok(());
        }
        let ttl = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
        let expires_at = self.clock.now().saturating_add(ttl);
        self.next_expiry.fetch_min(expires_at, Ordering::Relaxed);
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.clone(),
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }

    fn put_forever(&self, key: &str, value: &Value) -> StorageResult<()> {
        self.sweep_if_due();
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.clone(),
                expires_at: None,
            },
        );
        Ok(())
    }

    fn forget(&self, key: &str) -> StorageResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn flush(&self) -> StorageResult<()> {
        self.entries.clear();
        self.next_expiry.store(i64::MAX, Ordering::Relaxed);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStorage")
            .field("entries", &self.entries.len())
            .finish()
    }
}
