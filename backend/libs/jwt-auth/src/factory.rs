use crate::claims::{
    Claim, ClaimCollection, ClaimFactory, ClaimMap, EXPIRATION, ISSUED_AT, ISSUER, JWT_ID,
    NOT_BEFORE, SUBJECT,
};
use crate::clock::Clock;
use crate::config::JwtConfig;
use crate::error::Result;
use crate::payload::Payload;
use crate::validator::{PayloadValidator, ValidationFlow};
use std::sync::Arc;
use tracing::debug;

/// Claims filled in by the factory when the caller does not supply them, in payload order
const DEFAULT_CLAIMS: [&str; 5] = [ISSUER, ISSUED_AT, EXPIRATION, NOT_BEFORE, JWT_ID];

/// Turns claim maps into validated [`Payload`]s
#[derive(Debug, Clone)]
pub struct PayloadFactory {
    claim_factory: ClaimFactory,
    validator: PayloadValidator,
}

impl PayloadFactory {
    pub fn new(claim_factory: ClaimFactory, validator: PayloadValidator) -> Self {
        Self {
            claim_factory,
            validator,
        }
    }

    pub fn from_config(config: &JwtConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            ClaimFactory::new(config, clock.clone()),
            PayloadValidator::new(config, clock),
        )
    }

    pub fn claim_factory(&self) -> &ClaimFactory {
        &self.claim_factory
    }

    pub fn validator(&self) -> &PayloadValidator {
        &self.validator
    }

    /// Payload for a new token
    ///
    /// `sub` comes first, then the default claims (caller value or generated), then the
    /// remaining caller claims in map order. Caller values go through creation validation.
    pub fn make(&self, custom_claims: &ClaimMap) -> Result<Payload> {
        let mut claims = Vec::with_capacity(custom_claims.len() + DEFAULT_CLAIMS.len());

        if let Some(value) = custom_claims.get(SUBJECT) {
            claims.push(self.claim_factory.get(SUBJECT, value.clone())?);
        }

        for name in DEFAULT_CLAIMS {
            match custom_claims.get(name) {
                Some(value) => claims.push(self.claim_factory.get(name, value.clone())?),
                None => claims.extend(self.claim_factory.make(name)),
            }
        }

        for (name, value) in custom_claims {
            if name != SUBJECT && !DEFAULT_CLAIMS.contains(&name.as_str()) {
                claims.push(self.claim_factory.get(name, value.clone())?);
            }
        }

        debug!(claims = claims.len(), "Building payload");
        Payload::new(ClaimCollection::make(claims), &self.validator, ValidationFlow::Create)
    }

    /// Payload for claims read back from a verified token
    pub fn decoded(&self, claims: &ClaimMap, flow: ValidationFlow) -> Result<Payload> {
        let claims = claims
            .iter()
            .map(|(name, value)| Claim::decoded(name.as_str(), value.clone()))
            .collect::<Result<ClaimCollection>>()?;
        Payload::new(claims, &self.validator, flow)
    }
}
