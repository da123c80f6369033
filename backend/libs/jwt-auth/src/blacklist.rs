//! Token revocation ledger
//!
//! A revoked token is recorded under its `jti` (or a SHA-256 fingerprint of its claims when it
//! has none) until it could no longer be refreshed anyway:
//!
//! ```text
//! ttl         = max(0, refresh_ttl * 60 - (now - iat)) + grace_period
//! valid_until = now + grace_period
//! ```
//!
//! The record only starts to count once `valid_until` is reached, so requests racing a refresh
//! can still use the old token for `grace_period` seconds.

use crate::claims::{EXPIRATION, ISSUED_AT};
use crate::clock::Clock;
use crate::config::JwtConfig;
use crate::error::{Result, StorageError};
use crate::payload::Payload;
use crate::storage::Storage;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;

/// Stored value for a revoked token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistRecord {
    /// Unix seconds from which the token counts as revoked; `None` means revoked forever
    pub valid_until: Option<i64>,
}

impl BlacklistRecord {
    pub fn is_active(&self, now: i64) -> bool {
        self.valid_until.map_or(true, |until| now >= until)
    }
}

pub struct Blacklist {
    storage: Arc<dyn Storage>,
    /// Seconds
    grace_period: u64,
    /// Minutes
    refresh_ttl: u64,
    clock: Arc<dyn Clock>,
}

impl Blacklist {
    pub fn new(config: &JwtConfig, storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            grace_period: config.blacklist_grace_period,
            refresh_ttl: config.refresh_ttl,
            clock,
        }
    }

    pub fn grace_period(&self) -> u64 {
        self.grace_period
    }

    pub fn refresh_ttl(&self) -> u64 {
        self.refresh_ttl
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Revoke until the refresh window closes; a token lacking `exp` or `iat` is revoked forever
    ///
    /// An identity that is already recorded keeps its original record.
    pub fn add(&self, payload: &Payload) -> Result<bool> {
        let Some(ttl) = self.ttl_for(payload) else {
            return self.add_forever(payload);
        };

        let key = self.key(payload);
        if self.storage.get(&key)?.is_some() {
            return Ok(true);
        }

        let record = BlacklistRecord {
            valid_until: Some(self.clock.now().saturating_add(saturating_secs(self.grace_period))),
        };
        self.storage.put(&key, &to_value(record)?, ttl)?;

        info!(key = %key, ttl = ttl, "Token added to blacklist");
        Ok(true)
    }

    pub fn add_forever(&self, payload: &Payload) -> Result<bool> {
        let key = self.key(payload);
        let record = BlacklistRecord { valid_until: None };
        self.storage.put_forever(&key, &to_value(record)?)?;

        info!(key = %key, "Token added to blacklist permanently");
        Ok(true)
    }

    /// True once a stored record's grace period has elapsed, or when it is permanent
    pub fn has(&self, payload: &Payload) -> Result<bool> {
        let Some(stored) = self.storage.get(&self.key(payload))? else {
            return Ok(false);
        };
        let record: BlacklistRecord =
            serde_json::from_value(stored).map_err(StorageError::from)?;
        Ok(record.is_active(self.clock.now()))
    }

    pub fn remove(&self, payload: &Payload) -> Result<bool> {
        let key = self.key(payload);
        self.storage.forget(&key)?;

        info!(key = %key, "Token removed from blacklist");
        Ok(true)
    }

    pub fn clear(&self) -> Result<bool> {
        self.storage.flush()?;

        info!("Cleared all blacklisted tokens");
        Ok(true)
    }

    /// Storage key: `jti`, else the SHA-256 hex digest of the claim map serialized with sorted keys
    pub fn key(&self, payload: &Payload) -> String {
        if let Some(jti) = payload.jwt_id() {
            return jti.to_string();
        }
        // ClaimMap keeps keys sorted, so the serialization is canonical
        let canonical = payload.to_string();
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }

    /// Seconds the record must outlive; `None` when the token lacks `exp` or `iat`
    pub fn ttl_for(&self, payload: &Payload) -> Option<u64> {
        payload.claim(EXPIRATION)?;
        let iat = payload.claim(ISSUED_AT)?.timestamp()?;

        let elapsed = self.clock.now().saturating_sub(iat);
        let window = saturating_secs(self.refresh_ttl).saturating_mul(60);
        let remaining = window.saturating_sub(elapsed).max(0) as u64;
        Some(remaining.saturating_add(self.grace_period))
    }
}

fn saturating_secs(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_value(record: BlacklistRecord) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(record).map_err(StorageError::from)?)
}

impl std::fmt::Debug for Blacklist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blacklist")
            .field("grace_period", &self.grace_period)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::Claim;
    use crate::clock::FixedClock;
    use crate::error::JwtError;
    use crate::storage::{InMemoryStorage, StorageResult};
    use crate::validator::{PayloadValidator, ValidationFlow};
    use serde_json::{json, Value};

    const T: i64 = 1_700_000_000;

    struct Fixture {
        clock: Arc<FixedClock>,
        storage: Arc<InMemoryStorage>,
        blacklist: Blacklist,
    }

    fn fixture(config: JwtConfig) -> Fixture {
        let clock = Arc::new(FixedClock::new(T));
        let storage = Arc::new(InMemoryStorage::new(clock.clone()));
        let blacklist = Blacklist::new(&config, storage.clone(), clock.clone());
        Fixture {
            clock,
            storage,
            blacklist,
        }
    }

    fn payload(pairs: &[(&str, Value)]) -> Payload {
        let config = JwtConfig {
            required_claims: vec!["sub".to_string()],
            ..Default::default()
        };
        let validator = PayloadValidator::new(&config, Arc::new(FixedClock::new(T)));
        let claims = pairs
            .iter()
            .map(|(name, value)| Claim::decoded(*name, value.clone()).unwrap())
            .collect();
        Payload::new(claims, &validator, ValidationFlow::Create).unwrap()
    }

    fn issued_at_t() -> Payload {
        payload(&[
            ("sub", json!(1)),
            ("iat", json!(T)),
            ("exp", json!(T + 3600)),
            ("jti", json!("foo")),
        ])
    }

    #[test]
    fn test_add_records_until_refresh_window_closes() {
        let f = fixture(JwtConfig::default());
        f.clock.set(T + 10);

        assert!(f.blacklist.add(&issued_at_t()).unwrap());
        assert_eq!(f.storage.ttl("foo"), Some(20_150 * 60));
        assert!(f.blacklist.has(&issued_at_t()).unwrap());
    }

    #[test]
    fn test_grace_period_delays_revocation() {
        let f = fixture(JwtConfig {
            blacklist_grace_period: 30,
            ..Default::default()
        });
        f.blacklist.add(&issued_at_t()).unwrap();

        assert_eq!(f.storage.ttl("foo"), Some(20_160 * 60 + 30));
        assert!(!f.blacklist.has(&issued_at_t()).unwrap());

        f.clock.advance(29);
        assert!(!f.blacklist.has(&issued_at_t()).unwrap());

        f.clock.advance(1);
        assert!(f.blacklist.has(&issued_at_t()).unwrap());
    }

    #[test]
    fn test_readd_keeps_original_record() {
        let f = fixture(JwtConfig {
            blacklist_grace_period: 30,
            ..Default::default()
        });
        f.blacklist.add(&issued_at_t()).unwrap();
        f.clock.advance(20);
        f.blacklist.add(&issued_at_t()).unwrap();

        // Original valid_until (T + 30) still applies
        f.clock.set(T + 30);
        assert!(f.blacklist.has(&issued_at_t()).unwrap());
    }

    #[test]
    fn test_ttl_floors_at_grace_period() {
        let f = fixture(JwtConfig {
            refresh_ttl: 1,
            blacklist_grace_period: 5,
            ..Default::default()
        });
        f.clock.set(T + 3600);
        assert_eq!(f.blacklist.ttl_for(&issued_at_t()), Some(5));
    }

    #[test]
    fn test_huge_windows_saturate() {
        let f = fixture(JwtConfig {
            refresh_ttl: u64::MAX,
            blacklist_grace_period: u64::MAX,
            ..Default::default()
        });
        assert_eq!(f.blacklist.ttl_for(&issued_at_t()), Some(u64::MAX));
    }

    #[test]
    fn test_missing_exp_or_iat_is_revoked_forever() {
        let f = fixture(JwtConfig::default());
        let no_exp = payload(&[("sub", json!(1)), ("iat", json!(T)), ("jti", json!("a"))]);
        let no_iat = payload(&[("sub", json!(1)), ("exp", json!(T + 60)), ("jti", json!("b"))]);

        assert_eq!(f.blacklist.ttl_for(&no_exp), None);
        f.blacklist.add(&no_exp).unwrap();
        f.blacklist.add(&no_iat).unwrap();

        f.clock.advance(100 * 365 * 86_400);
        assert!(f.blacklist.has(&no_exp).unwrap());
        assert!(f.blacklist.has(&no_iat).unwrap());
        assert_eq!(f.storage.ttl("a"), None);
    }

    #[test]
    fn test_add_forever_is_immediate() {
        let f = fixture(JwtConfig {
            blacklist_grace_period: 300,
            ..Default::default()
        });
        f.blacklist.add_forever(&issued_at_t()).unwrap();
        assert!(f.blacklist.has(&issued_at_t()).unwrap());
    }

    #[test]
    fn test_has_is_stable_without_writes() {
        let f = fixture(JwtConfig::default());
        let first = f.blacklist.has(&issued_at_t()).unwrap();
        let second = f.blacklist.has(&issued_at_t()).unwrap();
        assert_eq!(first, second);

        f.blacklist.add(&issued_at_t()).unwrap();
        let first = f.blacklist.has(&issued_at_t()).unwrap();
        let second = f.blacklist.has(&issued_at_t()).unwrap();
        assert!(first && second);
    }

    #[test]
    fn test_key_without_jti_is_claim_fingerprint() {
        let f = fixture(JwtConfig::default());
        let a = payload(&[("sub", json!(1)), ("iat", json!(T)), ("exp", json!(T + 60))]);
        let b = payload(&[("exp", json!(T + 60)), ("sub", json!(1)), ("iat", json!(T))]);
        let c = payload(&[("sub", json!(2)), ("iat", json!(T)), ("exp", json!(T + 60))]);

        let key = f.blacklist.key(&a);
        assert_eq!(key.len(), 64);
        assert_eq!(key, f.blacklist.key(&b));
        assert_ne!(key, f.blacklist.key(&c));
        assert_eq!(f.blacklist.key(&issued_at_t()), "foo");
    }

    #[test]
    fn test_remove_and_clear() {
        let f = fixture(JwtConfig::default());
        let other = payload(&[
            ("sub", json!(2)),
            ("iat", json!(T)),
            ("exp", json!(T + 60)),
            ("jti", json!("bar")),
        ]);
        f.blacklist.add(&issued_at_t()).unwrap();
        f.blacklist.add(&other).unwrap();

        f.blacklist.remove(&issued_at_t()).unwrap();
        assert!(!f.blacklist.has(&issued_at_t()).unwrap());
        assert!(f.blacklist.has(&other).unwrap());

        f.blacklist.clear().unwrap();
        assert!(!f.blacklist.has(&other).unwrap());
    }

    struct FailingStorage;

    impl Storage for FailingStorage {
        fn get(&self, _: &str) -> StorageResult<Option<Value>> {
            Err(StorageError::Backend("connection refused".to_string()))
        }
        fn put(&self, _: &str, _: &Value, _: u64) -> StorageResult<()> {
            Err(StorageError::Backend("connection refused".to_string()))
        }
        fn put_forever(&self, _: &str, _: &Value) -> StorageResult<()> {
            Err(StorageError::Backend("connection refused".to_string()))
        }
        fn forget(&self, _: &str) -> StorageResult<()> {
            Err(StorageError::Backend("connection refused".to_string()))
        }
        fn flush(&self) -> StorageResult<()> {
            Err(StorageError::Backend("connection refused".to_string()))
        }
    }

    #[test]
    fn test_storage_failure_is_generic_error() {
        let clock = Arc::new(FixedClock::new(T));
        let blacklist = Blacklist::new(&JwtConfig::default(), Arc::new(FailingStorage), clock);

        assert!(matches!(
            blacklist.has(&issued_at_t()),
            Err(JwtError::Generic { .. })
        ));
        assert!(matches!(
            blacklist.add(&issued_at_t()),
            Err(JwtError::Generic { .. })
        ));
        assert!(matches!(
            blacklist.add_forever(&issued_at_t()),
            Err(JwtError::Generic { .. })
        ));
    }

    #[test]
    fn test_corrupt_record_is_generic_error() {
        let f = fixture(JwtConfig::default());
        f.storage.put_forever("foo", &json!("forever")).unwrap();
        let err = f.blacklist.has(&issued_at_t()).unwrap_err();
        assert!(matches!(err, JwtError::Generic { .. }));
    }
}
