use super::{Claim, TimeCheck, EXPIRATION, ISSUED_AT, ISSUER, JWT_ID, NOT_BEFORE};
use crate::clock::Clock;
use crate::config::JwtConfig;
use crate::error::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Builds claims by name and generates default values for the registered time/id claims
#[derive(Clone)]
pub struct ClaimFactory {
    /// Minutes; `None` means tokens are issued without `exp`
    ttl: Option<u64>,
    leeway: u64,
    issuer: Option<String>,
    clock: Arc<dyn Clock>,
}

impl ClaimFactory {
    pub fn new(config: &JwtConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl: config.ttl,
            leeway: config.leeway,
            issuer: config.issuer.clone(),
            clock,
        }
    }

    pub fn ttl(&self) -> Option<u64> {
        self.ttl
    }

    pub fn leeway(&self) -> u64 {
        self.leeway
    }

    pub fn time_check(&self) -> TimeCheck {
        TimeCheck::new(self.clock.now(), self.leeway)
    }

    /// Claim for a caller-supplied value, validated for creation
    pub fn get(&self, name: &str, value: Value) -> Result<Claim> {
        Claim::new(name, value, &self.time_check())
    }

    /// Generated claim for `name`, if the factory knows how to produce one
    pub fn make(&self, name: &str) -> Option<Claim> {
        let now = self.clock.now();
        let value = match name {
            ISSUED_AT | NOT_BEFORE => json!(now),
            EXPIRATION => {
                let minutes = i64::try_from(self.ttl?).unwrap_or(i64::MAX);
                json!(now.saturating_add(minutes.saturating_mul(60)))
            }
            JWT_ID => json!(Uuid::new_v4().simple().to_string()),
            ISSUER => json!(self.issuer.as_ref()?),
            _ => return None,
        };
        Some(Claim::generated(name, value))
    }
}

impl std::fmt::Debug for ClaimFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimFactory")
            .field("ttl", &self.ttl)
            .field("leeway", &self.leeway)
            .field("issuer", &self.issuer)
            .finish()
    }
}
