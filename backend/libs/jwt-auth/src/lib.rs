//! JWT issuance, validation, refresh and revocation
//!
//! **Features**:
//! - Self-validating claims (`sub`, `iss`, `iat`, `nbf`, `exp`, `jti` plus custom claims)
//! - Payload validation in create, decode and refresh flows with clock-skew leeway
//! - Refresh window bounded by the original `iat`
//! - Token blacklist with grace period, backed by memory or Redis
//! - Subject locking (`prv`) so tokens cannot cross subject types
//!
//! Signing is delegated to a [`Driver`]; [`JsonWebTokenDriver`] covers HMAC and RS256.
//!
//! ```no_run
//! use jwt_auth::{InMemoryStorage, JsonWebTokenDriver, JwtAuth, JwtConfig, Subject, SystemClock};
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//!
//! struct User(u64);
//!
//! impl Subject for User {
//!     fn identifier(&self) -> Value {
//!         json!(self.0)
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = JwtConfig::from_env()?;
//! let clock = Arc::new(SystemClock);
//! let auth = JwtAuth::from_config(
//!     &config,
//!     Arc::new(JsonWebTokenDriver::hs256(b"change-me")),
//!     Arc::new(InMemoryStorage::new(clock.clone())),
//!     clock,
//! )?;
//!
//! let token = auth.from_subject(&User(1))?;
//! assert!(auth.check(&token));
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod blacklist;
pub mod claims;
pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod factory;
pub mod manager;
pub mod payload;
pub mod storage;
pub mod token;
pub mod validator;

#[cfg(test)]
mod test_utils;

pub use auth::{hash_subject_type, JwtAuth, Subject};
pub use blacklist::{Blacklist, BlacklistRecord};
pub use claims::{Claim, ClaimCollection, ClaimFactory, ClaimKind, ClaimMap, SUBJECT_HASH};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, JwtConfig};
pub use driver::{Driver, JsonWebTokenDriver};
pub use error::{JwtError, Result, StorageError};
pub use factory::PayloadFactory;
pub use manager::{Manager, RefreshOptions};
pub use payload::Payload;
pub use storage::{InMemoryStorage, RedisStorage, Storage};
pub use token::Token;
pub use validator::{PayloadValidator, ValidationFlow};
