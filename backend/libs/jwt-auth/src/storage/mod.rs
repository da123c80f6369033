//! Blacklist storage backends
//!
//! The blacklist decides what is stored and for how long; a [`Storage`] only has to keep a
//! value under a key with an optional time-to-live.

mod memory;
mod redis;

pub use self::memory::InMemoryStorage;
pub use self::redis::{RedisStorage, DEFAULT_KEY_PREFIX};

use crate::error::StorageError;
use serde_json::Value;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Key/value store with per-key expiry
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<Value>>;

    /// Store `value` for `ttl_seconds`; a ttl of 0 leaves nothing behind
    fn put(&self, key: &str, value: &Value, ttl_seconds: u64) -> StorageResult<()>;

    fn put_forever(&self, key: &str, value: &Value) -> StorageResult<()>;

    fn forget(&self, key: &str) -> StorageResult<()>;

    /// Remove every key owned by this store
    fn flush(&self) -> StorageResult<()>;
}
