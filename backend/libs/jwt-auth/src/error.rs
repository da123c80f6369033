//! Error types for token issuance, validation and revocation
//!
//! Every failure the core raises is a [`JwtError`]. Callers branch on the variant to tell
//! "retry with refresh" ([`JwtError::TokenExpired`]) apart from "reject outright"
//! ([`JwtError::TokenInvalid`], [`JwtError::TokenBlacklisted`]).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, JwtError>;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum JwtError {
    /// A claim value failed type/format validation when it was assigned
    #[error("Invalid value provided for claim [{claim}]")]
    InvalidClaim { claim: String },

    /// Signature, structure or a decoded claim is not acceptable
    #[error("{message}")]
    TokenInvalid {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// `exp` has passed, or the refresh window has closed
    #[error("{0}")]
    TokenExpired(String),

    /// The token is well-formed but has been revoked
    #[error("{0}")]
    TokenBlacklisted(String),

    /// Configuration misuse or a wrapped driver/storage fault
    #[error("{message}")]
    Generic {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl JwtError {
    pub fn invalid_claim(claim: impl Into<String>) -> Self {
        Self::InvalidClaim {
            claim: claim.into(),
        }
    }

    pub fn token_invalid(message: impl Into<String>) -> Self {
        Self::TokenInvalid {
            message: message.into(),
            source: None,
        }
    }

    pub fn token_invalid_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::TokenInvalid {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
            source: None,
        }
    }

    pub fn generic_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Generic {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// True when the caller may still recover by refreshing the token
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::TokenExpired(_))
    }
}

/// Blacklist storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<StorageError> for JwtError {
    fn from(err: StorageError) -> Self {
        JwtError::generic_with("Token blacklist storage failure", err)
    }
}
