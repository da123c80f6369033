use crate::claims::{
    Claim, ClaimCollection, ClaimMap, EXPIRATION, ISSUED_AT, ISSUER, JWT_ID, NOT_BEFORE, SUBJECT,
};
use crate::error::Result;
use crate::validator::{PayloadValidator, ValidationFlow};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Validated, read-only set of claims
///
/// The only way to obtain a `Payload` is through [`Payload::new`], which runs the
/// [`PayloadValidator`] in the requested flow. There are no setters.
#[derive(Debug, Clone)]
pub struct Payload {
    claims: ClaimCollection,
}

impl Payload {
    pub fn new(
        claims: ClaimCollection,
        validator: &PayloadValidator,
        flow: ValidationFlow,
    ) -> Result<Self> {
        let claims = validator.check(claims, flow)?;
        Ok(Self { claims })
    }

    pub fn claims(&self) -> &ClaimCollection {
        &self.claims
    }

    pub fn claim(&self, name: &str) -> Option<&Claim> {
        self.claims.get_by_name(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claim(name).map(Claim::value)
    }

    pub fn has(&self, name: &str) -> bool {
        self.claims.has(name)
    }

    pub fn count(&self) -> usize {
        self.claims.len()
    }

    pub fn to_array(&self) -> ClaimMap {
        self.claims.to_payload_array()
    }

    pub fn subject(&self) -> Option<&Value> {
        self.get(SUBJECT)
    }

    pub fn issuer(&self) -> Option<&str> {
        self.get(ISSUER).and_then(Value::as_str)
    }

    pub fn issued_at(&self) -> Option<i64> {
        self.claim(ISSUED_AT).and_then(Claim::timestamp)
    }

    pub fn not_before(&self) -> Option<i64> {
        self.claim(NOT_BEFORE).and_then(Claim::timestamp)
    }

    pub fn expiration(&self) -> Option<i64> {
        self.claim(EXPIRATION).and_then(Claim::timestamp)
    }

    pub fn jwt_id(&self) -> Option<&str> {
        self.get(JWT_ID).and_then(Value::as_str)
    }

    /// Every given claim is present with an equal value; `1`, `1.0` and `"1"` are equal
    pub fn matches(&self, values: &ClaimMap) -> bool {
        values.iter().all(|(name, expected)| {
            self.get(name)
                .is_some_and(|actual| loosely_equal(actual, expected))
        })
    }

    /// Every given claim is present with an identical JSON value
    pub fn matches_strict(&self, values: &ClaimMap) -> bool {
        values
            .iter()
            .all(|(name, expected)| self.get(name) == Some(expected))
    }
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        self.to_array() == other.to_array()
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_array().serialize(serializer)
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(&self.to_array()).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}
