//! Payload validation
//!
//! [`PayloadValidator::check`] runs in one of three flows:
//!
//! ```text
//! Create   required claims present
//! Decode   required claims present + every claim's payload rules
//! Refresh  Decode, minus the `exp` failure, plus `iat` + refresh_ttl must not have passed
//! ```

use crate::claims::{ClaimCollection, ClaimKind, TimeCheck, REGISTERED_CLAIMS};
use crate::clock::Clock;
use crate::config::JwtConfig;
use crate::error::{JwtError, Result};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationFlow {
    Create,
    Decode,
    Refresh,
}

#[derive(Clone)]
pub struct PayloadValidator {
    /// Registered claims first (in check order), then configured extras
    required_claims: Vec<String>,
    /// Minutes
    refresh_ttl: u64,
    leeway: u64,
    clock: Arc<dyn Clock>,
}

impl PayloadValidator {
    pub fn new(config: &JwtConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            required_claims: check_order(&config.required_claims),
            refresh_ttl: config.refresh_ttl,
            leeway: config.leeway,
            clock,
        }
    }

    pub fn required_claims(&self) -> &[String] {
        &self.required_claims
    }

    pub fn refresh_ttl(&self) -> u64 {
        self.refresh_ttl
    }

    pub fn leeway(&self) -> u64 {
        self.leeway
    }

    pub fn check(&self, claims: ClaimCollection, flow: ValidationFlow) -> Result<ClaimCollection> {
        self.validate_structure(&claims)?;

        let time = TimeCheck::new(self.clock.now(), self.leeway);
        match flow {
            ValidationFlow::Create => {}
            ValidationFlow::Decode => {
                for claim in &claims {
                    claim.validate_payload(&time)?;
                }
            }
            ValidationFlow::Refresh => {
                for claim in &claims {
                    if claim.kind() != ClaimKind::Expiration {
                        claim.validate_payload(&time)?;
                    }
                    claim.validate_refresh(&time, self.refresh_ttl)?;
                }
            }
        }

        Ok(claims)
    }

    /// Boolean form of [`check`](Self::check) for non-fatal checks
    pub fn is_valid(&self, claims: &ClaimCollection, flow: ValidationFlow) -> bool {
        self.check(claims.clone(), flow).is_ok()
    }

    fn validate_structure(&self, claims: &ClaimCollection) -> Result<()> {
        match self.required_claims.iter().find(|name| !claims.has(name)) {
            Some(missing) => Err(JwtError::token_invalid(format!(
                "JWT payload does not contain the required claim [{missing}]"
            ))),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for PayloadValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadValidator")
            .field("required_claims", &self.required_claims)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("leeway", &self.leeway)
            .finish()
    }
}

/// Registered names keep a fixed order so the reported missing claim is deterministic
fn check_order(configured: &[String]) -> Vec<String> {
    let registered = REGISTERED_CLAIMS
        .iter()
        .filter(|name| configured.iter().any(|c| c == *name))
        .map(|name| name.to_string());
    let mut extras: Vec<String> = Vec::new();
    for name in configured {
        if !REGISTERED_CLAIMS.contains(&name.as_str()) && !extras.contains(name) {
            extras.push(name.clone());
        }
    }
    registered.chain(extras).collect()
}
