use super::{Storage, StorageResult};
use redis::{Client, Commands, Connection, RedisError, RedisResult};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

pub const DEFAULT_KEY_PREFIX: &str = "jwt:blacklist:";

/// Redis-backed store
///
/// **Key format**: `{prefix}{key}`, values are JSON strings.
/// One connection is opened lazily and shared by clones; it is replaced when it drops.
/// Redis's own key expiry enforces the TTL.
#[derive(Clone)]
pub struct RedisStorage {
    client: Client,
    connection: Arc<Mutex<Option<Connection>>>,
    prefix: String,
}

impl RedisStorage {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            connection: Arc::new(Mutex::new(None)),
            prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    pub fn open(redis_url: &str) -> StorageResult<Self> {
        Ok(Self::new(Client::open(redis_url)?))
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Run `op` on the shared connection, reconnecting and retrying once if it was lost
    fn with_connection<T>(
        &self,
        mut op: impl FnMut(&mut Connection) -> RedisResult<T>,
    ) -> StorageResult<T> {
        let mut slot = self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match self.attempt(&mut slot, &mut op) {
            Err(e) if is_connection_lost(&e) => {
                warn!(error = %e, "Redis connection lost, reconnecting");
                Ok(self.attempt(&mut slot, &mut op)?)
            }
            result => Ok(result?),
        }
    }

    fn attempt<T>(
        &self,
        slot: &mut Option<Connection>,
        op: &mut impl FnMut(&mut Connection) -> RedisResult<T>,
    ) -> RedisResult<T> {
        let mut conn = match slot.take() {
            Some(conn) => conn,
            None => self.client.get_connection()?,
        };
        let result = op(&mut conn);
        // A dropped connection is discarded; the next call dials a fresh one
        if !matches!(&result, Err(e) if is_connection_lost(e)) {
            *slot = Some(conn);
        }
        result
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

fn is_connection_lost(err: &RedisError) -> bool {
    err.is_io_error() || err.is_connection_dropped() || err.is_timeout()
}

impl std::fmt::Debug for RedisStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStorage")
            .field("client", &self.client)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl Storage for RedisStorage {
    fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        let key = self.key(key);
        let raw: Option<String> = self.with_connection(|conn| conn.get(&key))?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &Value, ttl_seconds: u64) -> StorageResult<()> {
        // SET EX rejects a zero expiry
        if ttl_seconds == 0 {
            return self.forget(key);
        }
        let key = self.key(key);
        let raw = serde_json::to_string(value)?;
        self.with_connection(|conn| {
            redis::cmd("SET")
                .arg(&key)
                .arg(&raw)
                .arg("EX")
                .arg(ttl_seconds)
                .query(conn)
        })
    }

    fn put_forever(&self, key: &str, value: &Value) -> StorageResult<()> {
        let key = self.key(key);
        let raw = serde_json::to_string(value)?;
        self.with_connection(|conn| conn.set(&key, &raw))
    }

    fn forget(&self, key: &str) -> StorageResult<()> {
        let key = self.key(key);
        self.with_connection(|conn| conn.del(&key))
    }

    fn flush(&self) -> StorageResult<()> {
        let pattern = format!("{}*", self.prefix);
        let removed = self.with_connection(|conn| {
            let keys: Vec<String> = conn.scan_match::<_, String>(&pattern)?.collect();
            if !keys.is_empty() {
                conn.del::<_, ()>(&keys)?;
            }
            Ok(keys.len())
        })?;

        if removed > 0 {
            info!(count = removed, prefix = %self.prefix, "Flushed blacklist keys");
        }
        Ok(())
    }
}
