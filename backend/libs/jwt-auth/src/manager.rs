//! Token lifecycle orchestration
//!
//! ```text
//! encode:     Payload -> Driver::encode -> Token
//! decode:     Token -> Driver::decode -> PayloadFactory (decode) -> Blacklist::has
//! refresh:    decode (refresh flow) -> Blacklist::add -> carried claims -> PayloadFactory -> encode
//! invalidate: decode (refresh flow, no blacklist check) -> Blacklist::add
//! ```

use crate::blacklist::Blacklist;
use crate::claims::{ClaimMap, ISSUED_AT, SUBJECT, SUBJECT_HASH};
use crate::clock::Clock;
use crate::config::{ConfigError, JwtConfig};
use crate::driver::Driver;
use crate::error::{JwtError, Result};
use crate::factory::PayloadFactory;
use crate::payload::Payload;
use crate::storage::Storage;
use crate::token::Token;
use crate::validator::ValidationFlow;
use std::sync::Arc;
use tracing::{debug, warn};

/// Options for [`Manager::refresh`]
#[derive(Debug, Clone, Default)]
pub struct RefreshOptions {
    /// Revoke the old token permanently instead of for its refresh window
    pub force_forever: bool,
    /// Start a fresh refresh window by not carrying `iat` over
    pub reset_claims: bool,
    /// Extra claims for the new token; carried claims take precedence
    pub custom_claims: ClaimMap,
}

pub struct Manager {
    driver: Arc<dyn Driver>,
    blacklist: Arc<Blacklist>,
    payload_factory: PayloadFactory,
    blacklist_enabled: bool,
    persistent_claims: Vec<String>,
}

impl Manager {
    pub fn new(
        driver: Arc<dyn Driver>,
        blacklist: Arc<Blacklist>,
        payload_factory: PayloadFactory,
    ) -> Self {
        Self {
            driver,
            blacklist,
            payload_factory,
            blacklist_enabled: true,
            persistent_claims: Vec::new(),
        }
    }

    /// Wire a manager from `config`, rejecting configurations that cannot issue tokens
    pub fn from_config(
        config: &JwtConfig,
        driver: Arc<dyn Driver>,
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let blacklist = Arc::new(Blacklist::new(config, storage, clock.clone()));
        let payload_factory = PayloadFactory::from_config(config, clock);

        Ok(Self::new(driver, blacklist, payload_factory)
            .with_blacklist_enabled(config.blacklist_enabled)
            .with_persistent_claims(config.persistent_claims.clone()))
    }

    pub fn with_blacklist_enabled(mut self, enabled: bool) -> Self {
        self.blacklist_enabled = enabled;
        self
    }

    pub fn with_persistent_claims(mut self, claims: Vec<String>) -> Self {
        self.persistent_claims = claims;
        self
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn blacklist(&self) -> &Arc<Blacklist> {
        &self.blacklist
    }

    pub fn payload_factory(&self) -> &PayloadFactory {
        &self.payload_factory
    }

    pub fn blacklist_enabled(&self) -> bool {
        self.blacklist_enabled
    }

    pub fn persistent_claims(&self) -> &[String] {
        &self.persistent_claims
    }

    pub fn encode(&self, payload: &Payload) -> Result<Token> {
        let encoded = self.driver.encode(&payload.to_array())?;
        debug!(jti = ?payload.jwt_id(), "Token encoded");
        Token::new(encoded)
    }

    /// Verify the signature, validate the claims, then consult the blacklist
    pub fn decode(&self, token: &Token, check_blacklist: bool) -> Result<Payload> {
        self.decode_as(token, ValidationFlow::Decode, check_blacklist)
    }

    /// New token for the same subject; the old one is revoked before the new one is minted
    pub fn refresh(&self, token: &Token, options: &RefreshOptions) -> Result<Token> {
        let payload = self.decode_as(token, ValidationFlow::Refresh, true)?;

        if self.blacklist_enabled {
            self.revoke(&payload, options.force_forever)?;
        }

        let claims = self.refresh_claims(&payload, options);
        let refreshed = self.payload_factory.make(&claims)?;
        debug!(
            old_jti = ?payload.jwt_id(),
            new_jti = ?refreshed.jwt_id(),
            reset_claims = options.reset_claims,
            "Token refreshed"
        );
        self.encode(&refreshed)
    }

    /// Revoke `token`; expired tokens still inside their refresh window can be revoked too
    pub fn invalidate(&self, token: &Token, force_forever: bool) -> Result<bool> {
        if !self.blacklist_enabled {
            return Err(JwtError::generic(
                "You must have the blacklist enabled to invalidate a token.",
            ));
        }

        let payload = self.decode_as(token, ValidationFlow::Refresh, false)?;
        self.revoke(&payload, force_forever)
    }

    fn decode_as(
        &self,
        token: &Token,
        flow: ValidationFlow,
        check_blacklist: bool,
    ) -> Result<Payload> {
        let claims = self.driver.decode(token.as_str())?;
        let payload = self.payload_factory.decoded(&claims, flow)?;

        if check_blacklist && self.blacklist_enabled && self.blacklist.has(&payload)? {
            warn!(jti = ?payload.jwt_id(), "Blacklisted token presented");
            return Err(JwtError::TokenBlacklisted(
                "The token has been blacklisted".to_string(),
            ));
        }

        debug!(jti = ?payload.jwt_id(), flow = ?flow, "Token decoded");
        Ok(payload)
    }

    fn revoke(&self, payload: &Payload, force_forever: bool) -> Result<bool> {
        if force_forever {
            self.blacklist.add_forever(payload)
        } else {
            self.blacklist.add(payload)
        }
    }

    /// Caller claims overridden by `sub`, `iat` (unless reset), `prv` and persistent claims
    fn refresh_claims(&self, payload: &Payload, options: &RefreshOptions) -> ClaimMap {
        let mut claims = options.custom_claims.clone();

        let mut carried = vec![SUBJECT];
        if !options.reset_claims {
            carried.push(ISSUED_AT);
        }
        carried.push(SUBJECT_HASH);
        carried.extend(self.persistent_claims.iter().map(String::as_str));

        for name in carried {
            if let Some(value) = payload.get(name) {
                claims.insert(name.to_string(), value.clone());
            }
        }
        claims
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("blacklist", &self.blacklist)
            .field("payload_factory", &self.payload_factory)
            .field("blacklist_enabled", &self.blacklist_enabled)
            .field("persistent_claims", &self.persistent_claims)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::driver::JsonWebTokenDriver;
    use crate::storage::InMemoryStorage;
    use serde_json::{json, Value};

    const T: i64 = 1_700_000_000;

    struct Fixture {
        clock: Arc<FixedClock>,
        storage: Arc<InMemoryStorage>,
        manager: Manager,
    }

    fn fixture(config: JwtConfig) -> Fixture {
        let clock = Arc::new(FixedClock::new(T));
        let storage = Arc::new(InMemoryStorage::new(clock.clone()));
        let driver = Arc::new(JsonWebTokenDriver::hs256(b"manager-test-secret"));
        let manager =
            Manager::from_config(&config, driver, storage.clone(), clock.clone()).unwrap();
        Fixture {
            clock,
            storage,
            manager,
        }
    }

    fn claims(pairs: &[(&str, Value)]) -> ClaimMap {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    fn issue(f: &Fixture, pairs: &[(&str, Value)]) -> (Payload, Token) {
        let payload = f.manager.payload_factory().make(&claims(pairs)).unwrap();
        let token = f.manager.encode(&payload).unwrap();
        (payload, token)
    }

    #[test]
    fn test_from_config_rejects_unusable_config() {
        let clock = Arc::new(FixedClock::new(T));
        let storage = Arc::new(InMemoryStorage::new(clock.clone()));
        let driver = Arc::new(JsonWebTokenDriver::hs256(b"manager-test-secret"));

        for config in [
            JwtConfig {
                refresh_ttl: 0,
                ..Default::default()
            },
            JwtConfig {
                ttl: None,
                ..Default::default()
            },
            JwtConfig {
                required_claims: vec!["sub".to_string(), "iss".to_string()],
                ..Default::default()
            },
        ] {
            let result =
                Manager::from_config(&config, driver.clone(), storage.clone(), clock.clone());
            assert!(
                matches!(result, Err(ConfigError::Invalid(_))),
                "{config:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let f = fixture(JwtConfig::default());
        let (payload, token) = issue(&f, &[("sub", json!(1)), ("role", json!("admin"))]);

        let decoded = f.manager.decode(&token, true).unwrap();
        assert_eq!(decoded, payload);
        assert_eq!(decoded.to_array(), payload.to_array());
    }

    #[test]
    fn test_decode_rejects_expired() {
        let f = fixture(JwtConfig::default());
        let (_, token) = issue(&f, &[("sub", json!(1))]);

        f.clock.advance(3601);
        let err = f.manager.decode(&token, true).unwrap_err();
        assert!(err.is_expired());
    }

    #[test]
    fn test_refresh_carries_subject_and_issued_at() {
        let f = fixture(JwtConfig::default());
        let (old, token) = issue(&f, &[("sub", json!(1)), ("role", json!("admin"))]);

        f.clock.set(T + 10);
        let refreshed = f.manager.refresh(&token, &RefreshOptions::default()).unwrap();
        let new = f.manager.decode(&refreshed, true).unwrap();

        assert_eq!(new.subject(), Some(&json!(1)));
        assert_eq!(new.issued_at(), Some(T));
        assert_eq!(new.expiration(), Some(T + 10 + 3600));
        assert_ne!(new.jwt_id(), old.jwt_id());
        // Not persistent, so not carried
        assert!(!new.has("role"));

        let old_key = old.jwt_id().unwrap();
        assert_eq!(f.storage.ttl(old_key), Some(20_150 * 60));
        assert!(matches!(
            f.manager.decode(&token, true),
            Err(JwtError::TokenBlacklisted(_))
        ));
    }

    #[test]
    fn test_refresh_with_reset_claims_restarts_window() {
        let f = fixture(JwtConfig::default());
        let (_, token) = issue(&f, &[("sub", json!(1))]);

        f.clock.set(T + 60);
        let options = RefreshOptions {
            reset_claims: true,
            ..Default::default()
        };
        let refreshed = f.manager.refresh(&token, &options).unwrap();
        let new = f.manager.decode(&refreshed, true).unwrap();
        assert_eq!(new.issued_at(), Some(T + 60));
    }

    #[test]
    fn test_refresh_carries_persistent_and_custom_claims() {
        let f = fixture(JwtConfig {
            persistent_claims: vec!["tenant".to_string()],
            ..Default::default()
        });
        let (_, token) = issue(
            &f,
            &[("sub", json!(1)), ("tenant", json!("acme")), ("prv", json!("abc"))],
        );

        let options = RefreshOptions {
            custom_claims: claims(&[("sub", json!(99)), ("scope", json!("read"))]),
            ..Default::default()
        };
        let refreshed = f.manager.refresh(&token, &options).unwrap();
        let new = f.manager.decode(&refreshed, true).unwrap();

        assert_eq!(new.subject(), Some(&json!(1)));
        assert_eq!(new.get("tenant"), Some(&json!("acme")));
        assert_eq!(new.get("prv"), Some(&json!("abc")));
        assert_eq!(new.get("scope"), Some(&json!("read")));
    }

    #[test]
    fn test_refresh_outside_window_does_not_revoke() {
        let f = fixture(JwtConfig::default());
        let (_, token) = issue(&f, &[("sub", json!(1))]);

        f.clock.set(T + 20_160 * 60 + 1);
        let err = f.manager.refresh(&token, &RefreshOptions::default()).unwrap_err();

        assert!(err.is_expired());
        assert!(f.storage.is_empty());
    }

    #[test]
    fn test_refresh_with_force_forever() {
        let f = fixture(JwtConfig::default());
        let (old, token) = issue(&f, &[("sub", json!(1))]);

        let options = RefreshOptions {
            force_forever: true,
            ..Default::default()
        };
        f.manager.refresh(&token, &options).unwrap();
        assert_eq!(f.storage.ttl(old.jwt_id().unwrap()), None);
        assert!(f.manager.blacklist().has(&old).unwrap());
    }

    #[test]
    fn test_refresh_blacklisted_token_fails() {
        let f = fixture(JwtConfig::default());
        let (_, token) = issue(&f, &[("sub", json!(1))]);

        f.manager.refresh(&token, &RefreshOptions::default()).unwrap();
        assert!(matches!(
            f.manager.refresh(&token, &RefreshOptions::default()),
            Err(JwtError::TokenBlacklisted(_))
        ));
    }

    #[test]
    fn test_invalidate_then_decode() {
        let f = fixture(JwtConfig::default());
        let (_, token) = issue(&f, &[("sub", json!(1))]);

        assert!(f.manager.invalidate(&token, false).unwrap());

        let err = f.manager.decode(&token, true).unwrap_err();
        assert_eq!(err.to_string(), "The token has been blacklisted");
        assert!(f.manager.decode(&token, false).is_ok());
    }

    #[test]
    fn test_invalidate_expired_token_within_refresh_window() {
        let f = fixture(JwtConfig::default());
        let (payload, token) = issue(&f, &[("sub", json!(1))]);

        f.clock.advance(7200);
        assert!(f.manager.invalidate(&token, false).unwrap());
        assert!(f.manager.blacklist().has(&payload).unwrap());
    }

    #[test]
    fn test_blacklist_disabled() {
        let f = fixture(JwtConfig {
            blacklist_enabled: false,
            ..Default::default()
        });
        let (_, token) = issue(&f, &[("sub", json!(1))]);

        let err = f.manager.invalidate(&token, false).unwrap_err();
        assert!(matches!(err, JwtError::Generic { .. }));
        assert_eq!(
            err.to_string(),
            "You must have the blacklist enabled to invalidate a token."
        );

        // Refresh neither revokes nor consults the blacklist
        f.manager.refresh(&token, &RefreshOptions::default()).unwrap();
        assert!(f.storage.is_empty());
        assert!(f.manager.decode(&token, true).is_ok());
    }

    #[test]
    fn test_signature_checked_before_blacklist() {
        let f = fixture(JwtConfig::default());
        let (_, token) = issue(&f, &[("sub", json!(1))]);
        f.manager.invalidate(&token, true).unwrap();

        let other = JsonWebTokenDriver::hs256(b"someone-else");
        let forged = Token::new(other.encode(&claims(&[("sub", json!(1))])).unwrap()).unwrap();
        let err = f.manager.decode(&forged, true).unwrap_err();
        assert_eq!(err.to_string(), "Token Signature could not be verified.");
    }
}
