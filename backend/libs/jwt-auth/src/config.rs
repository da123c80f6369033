//! Configuration management
//!
//! All options can be supplied through `JWT_`-prefixed environment variables
//! (e.g. `JWT_TTL=15`, `JWT_REQUIRED_CLAIMS=iat,exp,sub,jti`).

use crate::claims::{EXPIRATION, ISSUED_AT, ISSUER, JWT_ID, NOT_BEFORE, SUBJECT};
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_TTL_MINUTES: u64 = 60;
const DEFAULT_REFRESH_TTL_MINUTES: u64 = 20_160; // 2 weeks

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read JWT configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid JWT configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Minutes a freshly issued token is valid; `None` issues tokens without `exp`
    pub ttl: Option<u64>,
    /// Minutes after first issuance during which a token may be refreshed
    pub refresh_ttl: u64,
    /// Seconds of clock-skew tolerance
    pub leeway: u64,
    pub blacklist_enabled: bool,
    /// Seconds a revoked token stays usable, to cover requests racing a refresh
    pub blacklist_grace_period: u64,
    pub required_claims: Vec<String>,
    /// Custom claims carried into the refreshed token besides `sub` and `iat`
    pub persistent_claims: Vec<String>,
    /// Embed a subject-type fingerprint (`prv`) so tokens cannot cross subject types
    pub lock_subject: bool,
    /// Value for the generated `iss` claim
    pub issuer: Option<String>,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            ttl: Some(DEFAULT_TTL_MINUTES),
            refresh_ttl: DEFAULT_REFRESH_TTL_MINUTES,
            leeway: 0,
            blacklist_enabled: true,
            blacklist_grace_period: 0,
            required_claims: [ISSUED_AT, EXPIRATION, NOT_BEFORE, SUBJECT, JWT_ID]
                .into_iter()
                .map(String::from)
                .collect(),
            persistent_claims: Vec::new(),
            lock_subject: true,
            issuer: None,
        }
    }
}

impl JwtConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Self = envy::prefixed("JWT_").from_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl.is_none() && self.requires(EXPIRATION) {
            return Err(ConfigError::Invalid(
                "ttl is unset but the exp claim is required".to_string(),
            ));
        }
        if self.requires(ISSUER) && self.issuer.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::Invalid(
                "issuer is unset but the iss claim is required".to_string(),
            ));
        }
        if self.ttl == Some(0) {
            return Err(ConfigError::Invalid("ttl must be greater than zero".to_string()));
        }
        if self.refresh_ttl == 0 {
            return Err(ConfigError::Invalid(
                "refresh_ttl must be greater than zero".to_string(),
            ));
        }
        if let Some(name) = self.required_claims.iter().find(|c| c.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "required claim name cannot be empty: {name:?}"
            )));
        }
        Ok(())
    }

    pub fn requires(&self, claim: &str) -> bool {
        self.required_claims.iter().any(|c| c == claim)
    }
}
