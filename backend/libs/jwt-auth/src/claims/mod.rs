//! Claim model
//!
//! A [`Claim`] is a single named value inside a token. Registered claims (`sub`, `iss`, `iat`,
//! `nbf`, `exp`, `jti`) carry their own validation rules, looked up through [`ClaimKind`];
//! every other name is a [`ClaimKind::Custom`] claim with no built-in semantics.
//!
//! Each claim exposes three hooks:
//! - [`Claim::validate_create`]: run when the value is first assigned
//! - [`Claim::validate_payload`]: run when the claim arrives in a decoded token
//! - [`Claim::validate_refresh`]: run for time claims while refreshing

mod collection;
mod factory;

pub use collection::ClaimCollection;
pub use factory::ClaimFactory;

use crate::error::{JwtError, Result};
use serde_json::Value;

/// Name → value map exchanged with the driver
pub type ClaimMap = serde_json::Map<String, Value>;

pub const SUBJECT: &str = "sub";
pub const ISSUER: &str = "iss";
pub const ISSUED_AT: &str = "iat";
pub const NOT_BEFORE: &str = "nbf";
pub const EXPIRATION: &str = "exp";
pub const JWT_ID: &str = "jti";

/// Custom claim holding the subject-type fingerprint of locked subjects
pub const SUBJECT_HASH: &str = "prv";

/// Registered claim names in the order required claims are checked
pub const REGISTERED_CLAIMS: [&str; 6] =
    [SUBJECT, ISSUED_AT, EXPIRATION, NOT_BEFORE, ISSUER, JWT_ID];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClaimKind {
    Subject,
    Issuer,
    IssuedAt,
    NotBefore,
    Expiration,
    JwtId,
    Custom,
}

impl ClaimKind {
    pub fn for_name(name: &str) -> Self {
        match name {
            SUBJECT => Self::Subject,
            ISSUER => Self::Issuer,
            ISSUED_AT => Self::IssuedAt,
            NOT_BEFORE => Self::NotBefore,
            EXPIRATION => Self::Expiration,
            JWT_ID => Self::JwtId,
            _ => Self::Custom,
        }
    }

    pub fn registered_name(self) -> Option<&'static str> {
        match self {
            Self::Subject => Some(SUBJECT),
            Self::Issuer => Some(ISSUER),
            Self::IssuedAt => Some(ISSUED_AT),
            Self::NotBefore => Some(NOT_BEFORE),
            Self::Expiration => Some(EXPIRATION),
            Self::JwtId => Some(JWT_ID),
            Self::Custom => None,
        }
    }

    pub fn is_timestamp(self) -> bool {
        matches!(self, Self::IssuedAt | Self::NotBefore | Self::Expiration)
    }

    fn rules(self) -> &'static ClaimRules {
        match self {
            Self::Subject => &SUBJECT_RULES,
            Self::Issuer => &ISSUER_RULES,
            Self::IssuedAt => &ISSUED_AT_RULES,
            Self::NotBefore => &NOT_BEFORE_RULES,
            Self::Expiration => &EXPIRATION_RULES,
            Self::JwtId => &JWT_ID_RULES,
            Self::Custom => &CUSTOM_RULES,
        }
    }
}

/// Current time plus clock-skew tolerance for one validation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeCheck {
    pub now: i64,
    pub leeway: u64,
}

impl TimeCheck {
    pub fn new(now: i64, leeway: u64) -> Self {
        Self { now, leeway }
    }

    /// `timestamp` lies ahead of now, even after subtracting the leeway
    pub fn is_future(&self, timestamp: i64) -> bool {
        timestamp.saturating_sub(self.leeway_secs()) > self.now
    }

    /// `timestamp` lies behind now, even after adding the leeway
    pub fn is_past(&self, timestamp: i64) -> bool {
        timestamp.saturating_add(self.leeway_secs()) < self.now
    }

    fn leeway_secs(&self) -> i64 {
        i64::try_from(self.leeway).unwrap_or(i64::MAX)
    }
}

// ============================================================================
// Dispatch Table
// ============================================================================

struct ClaimRules {
    /// Shape check, shared by creation and decoding
    shape: fn(&Value) -> bool,
    create: fn(&Claim, &TimeCheck) -> Result<()>,
    payload: fn(&Claim, &TimeCheck) -> Result<()>,
    refresh: fn(&Claim, &TimeCheck, u64) -> Result<()>,
}

static SUBJECT_RULES: ClaimRules = ClaimRules {
    shape: is_identifier,
    create: accept,
    payload: accept,
    refresh: accept_refresh,
};

static ISSUER_RULES: ClaimRules = ClaimRules {
    shape: Value::is_string,
    create: accept,
    payload: accept,
    refresh: accept_refresh,
};

static ISSUED_AT_RULES: ClaimRules = ClaimRules {
    shape: is_timestamp,
    create: issued_at_create,
    payload: issued_at_payload,
    refresh: issued_at_refresh,
};

static NOT_BEFORE_RULES: ClaimRules = ClaimRules {
    shape: is_timestamp,
    create: not_before_create,
    payload: not_before_payload,
    refresh: accept_refresh,
};

static EXPIRATION_RULES: ClaimRules = ClaimRules {
    shape: is_timestamp,
    create: accept,
    payload: expiration_payload,
    refresh: accept_refresh,
};

static JWT_ID_RULES: ClaimRules = ClaimRules {
    shape: is_non_empty_string,
    create: accept,
    payload: accept,
    refresh: accept_refresh,
};

static CUSTOM_RULES: ClaimRules = ClaimRules {
    shape: any_value,
    create: accept,
    payload: accept,
    refresh: accept_refresh,
};

fn accept(_: &Claim, _: &TimeCheck) -> Result<()> {
    Ok(())
}

fn accept_refresh(_: &Claim, _: &TimeCheck, _: u64) -> Result<()> {
    Ok(())
}

fn issued_at_create(claim: &Claim, time: &TimeCheck) -> Result<()> {
    if time.is_future(claim.timestamp_or_zero()) {
        return Err(JwtError::invalid_claim(claim.name()));
    }
    Ok(())
}

fn issued_at_payload(claim: &Claim, time: &TimeCheck) -> Result<()> {
    if time.is_future(claim.timestamp_or_zero()) {
        return Err(JwtError::token_invalid(
            "Issued At (iat) timestamp cannot be in the future",
        ));
    }
    Ok(())
}

fn issued_at_refresh(claim: &Claim, time: &TimeCheck, refresh_ttl: u64) -> Result<()> {
    let refreshable_until = claim
        .timestamp_or_zero()
        .saturating_add(i64::try_from(refresh_ttl).unwrap_or(i64::MAX).saturating_mul(60));
    if time.is_past(refreshable_until) {
        return Err(JwtError::TokenExpired(
            "Token has expired and can no longer be refreshed".to_string(),
        ));
    }
    Ok(())
}

fn not_before_create(claim: &Claim, time: &TimeCheck) -> Result<()> {
    if time.is_future(claim.timestamp_or_zero()) {
        return Err(JwtError::invalid_claim(claim.name()));
    }
    Ok(())
}

fn not_before_payload(claim: &Claim, time: &TimeCheck) -> Result<()> {
    if time.is_future(claim.timestamp_or_zero()) {
        return Err(JwtError::token_invalid(
            "Not Before (nbf) timestamp cannot be in the future",
        ));
    }
    Ok(())
}

fn expiration_payload(claim: &Claim, time: &TimeCheck) -> Result<()> {
    if time.is_past(claim.timestamp_or_zero()) {
        return Err(JwtError::TokenExpired("Token has expired".to_string()));
    }
    Ok(())
}

fn any_value(_: &Value) -> bool {
    true
}

fn is_identifier(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.is_empty(),
        Value::Number(_) => true,
        _ => false,
    }
}

fn is_non_empty_string(value: &Value) -> bool {
    value.as_str().is_some_and(|s| !s.is_empty())
}

fn is_timestamp(value: &Value) -> bool {
    as_timestamp(value).is_some()
}

/// Whole-second unix timestamp; floats are accepted when they carry no fraction
fn as_timestamp(value: &Value) -> Option<i64> {
    let Value::Number(number) = value else {
        return None;
    };
    if let Some(ts) = number.as_i64() {
        return Some(ts);
    }
    number
        .as_f64()
        .filter(|f| f.fract() == 0.0 && f.is_finite() && f.abs() < i64::MAX as f64)
        .map(|f| f as i64)
}

// ============================================================================
// Claim
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    kind: ClaimKind,
    name: String,
    value: Value,
}

impl Claim {
    /// Build a claim and run its creation-time validation
    pub fn new(name: impl Into<String>, value: Value, time: &TimeCheck) -> Result<Self> {
        let claim = Self::checked(name.into(), value)?;
        claim.validate_create(time)?;
        Ok(claim)
    }

    /// Build a claim from a decoded token; only the value's shape is checked
    pub fn decoded(name: impl Into<String>, value: Value) -> Result<Self> {
        Self::checked(name.into(), value).map_err(|err| {
            JwtError::token_invalid_with("Token contains a malformed claim", err)
        })
    }

    /// Custom claims carry no rules and cannot fail
    pub fn custom(name: impl Into<String>, value: Value) -> Self {
        Self {
            kind: ClaimKind::Custom,
            name: name.into(),
            value,
        }
    }

    /// Values produced by [`ClaimFactory::make`] are well-formed by construction
    pub(crate) fn generated(name: &str, value: Value) -> Self {
        Self {
            kind: ClaimKind::for_name(name),
            name: name.to_string(),
            value,
        }
    }

    fn checked(name: String, value: Value) -> Result<Self> {
        let kind = ClaimKind::for_name(&name);
        if !(kind.rules().shape)(&value) {
            return Err(JwtError::invalid_claim(name));
        }
        Ok(Self { kind, name, value })
    }

    pub fn kind(&self) -> ClaimKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Timestamp value for `iat`, `nbf` and `exp`
    pub fn timestamp(&self) -> Option<i64> {
        if self.kind.is_timestamp() {
            as_timestamp(&self.value)
        } else {
            None
        }
    }

    // Shape is enforced at construction, so time claims always hold a timestamp
    fn timestamp_or_zero(&self) -> i64 {
        self.timestamp().unwrap_or_default()
    }

    pub fn validate_create(&self, time: &TimeCheck) -> Result<()> {
        (self.kind.rules().create)(self, time)
    }

    pub fn validate_payload(&self, time: &TimeCheck) -> Result<()> {
        (self.kind.rules().payload)(self, time)
    }

    /// `refresh_ttl` is in minutes
    pub fn validate_refresh(&self, time: &TimeCheck, refresh_ttl: u64) -> Result<()> {
        (self.kind.rules().refresh)(self, time, refresh_ttl)
    }
}
