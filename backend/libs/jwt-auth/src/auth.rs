//! High-level facade for issuing and checking tokens on behalf of a [`Subject`]

use crate::blacklist::Blacklist;
use crate::claims::{ClaimMap, SUBJECT, SUBJECT_HASH};
use crate::clock::Clock;
use crate::config::{ConfigError, JwtConfig};
use crate::driver::Driver;
use crate::error::Result;
use crate::factory::PayloadFactory;
use crate::manager::{Manager, RefreshOptions};
use crate::payload::Payload;
use crate::storage::Storage;
use crate::token::Token;
use serde_json::Value;
use sha1::{Digest, Sha1};
use std::sync::Arc;

/// Principal a token is issued for
pub trait Subject {
    /// Value for the `sub` claim
    fn identifier(&self) -> Value;

    fn custom_claims(&self) -> ClaimMap {
        ClaimMap::new()
    }

    /// Name fingerprinted into `prv` when subjects are locked
    fn subject_type() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }
}

/// SHA-1 hex digest of a subject type name
pub fn hash_subject_type(subject_type: &str) -> String {
    hex::encode(Sha1::digest(subject_type.as_bytes()))
}

#[derive(Debug, Clone)]
pub struct JwtAuth {
    manager: Arc<Manager>,
    lock_subject: bool,
    custom_claims: ClaimMap,
}

impl JwtAuth {
    pub fn new(manager: Arc<Manager>) -> Self {
        Self {
            manager,
            lock_subject: true,
            custom_claims: ClaimMap::new(),
        }
    }

    pub fn from_config(
        config: &JwtConfig,
        driver: Arc<dyn Driver>,
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
    ) -> std::result::Result<Self, ConfigError> {
        let manager = Manager::from_config(config, driver, storage, clock)?;
        Ok(Self::new(Arc::new(manager)).lock_subject(config.lock_subject))
    }

    /// Copy of this facade with subject locking switched on or off
    pub fn lock_subject(&self, lock: bool) -> Self {
        Self {
            lock_subject: lock,
            ..self.clone()
        }
    }

    /// Copy of this facade that adds `claims` to every token it issues or refreshes
    pub fn with_custom_claims(&self, claims: ClaimMap) -> Self {
        Self {
            custom_claims: claims,
            ..self.clone()
        }
    }

    pub fn custom_claims(&self) -> &ClaimMap {
        &self.custom_claims
    }

    pub fn is_subject_locked(&self) -> bool {
        self.lock_subject
    }

    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    pub fn blacklist(&self) -> &Arc<Blacklist> {
        self.manager.blacklist()
    }

    pub fn factory(&self) -> &PayloadFactory {
        self.manager.payload_factory()
    }

    pub fn from_subject<S: Subject>(&self, subject: &S) -> Result<Token> {
        let payload = self.make_payload(subject)?;
        self.manager.encode(&payload)
    }

    /// `sub` and `prv`, then the subject's own claims, then this facade's claims; later wins
    pub fn make_payload<S: Subject>(&self, subject: &S) -> Result<Payload> {
        let mut claims = ClaimMap::new();
        claims.insert(SUBJECT.to_string(), subject.identifier());
        if self.lock_subject {
            claims.insert(
                SUBJECT_HASH.to_string(),
                Value::String(hash_subject_type(S::subject_type())),
            );
        }
        claims.extend(subject.custom_claims());
        claims.extend(self.custom_claims.clone());

        self.factory().make(&claims)
    }

    pub fn payload(&self, token: &Token) -> Result<Payload> {
        self.manager.decode(token, true)
    }

    pub fn check_or_fail(&self, token: &Token) -> Result<Payload> {
        self.payload(token)
    }

    /// Non-fatal form of [`check_or_fail`](Self::check_or_fail)
    pub fn check(&self, token: &Token) -> bool {
        self.check_or_fail(token).is_ok()
    }

    pub fn claim(&self, token: &Token, name: &str) -> Result<Option<Value>> {
        Ok(self.payload(token)?.get(name).cloned())
    }

    /// Facade custom claims fill in whatever `options` does not set itself
    pub fn refresh(&self, token: &Token, options: &RefreshOptions) -> Result<Token> {
        let mut options = options.clone();
        for (name, value) in &self.custom_claims {
            options
                .custom_claims
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        self.manager.refresh(token, &options)
    }

    pub fn invalidate(&self, token: &Token, force_forever: bool) -> Result<bool> {
        self.manager.invalidate(token, force_forever)
    }

    /// True when the token carries no `prv` or was issued for subject type `S`
    pub fn check_subject_model<S: Subject>(&self, token: &Token) -> Result<bool> {
        let payload = self.payload(token)?;
        Ok(match payload.get(SUBJECT_HASH) {
            None => true,
            Some(hash) => hash.as_str() == Some(hash_subject_type(S::subject_type()).as_str()),
        })
    }
}
