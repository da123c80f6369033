//! Signing/verification drivers
//!
//! The core never signs or verifies by itself. A [`Driver`] turns a claim map into a signed
//! token string and back, and must reject tokens whose signature does not verify. Time claims
//! are left to the payload validator.

mod jwt;

pub use self::jwt::JsonWebTokenDriver;

use crate::claims::ClaimMap;
use crate::error::Result;

pub trait Driver: Send + Sync {
    /// Sign `claims`; failures are `JwtError::Generic` with the cause attached
    fn encode(&self, claims: &ClaimMap) -> Result<String>;

    /// Verify `token` and return its claims; failures are `JwtError::TokenInvalid`
    fn decode(&self, token: &str) -> Result<ClaimMap>;
}
