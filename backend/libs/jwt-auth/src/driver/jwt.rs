use super::Driver;
use crate::claims::ClaimMap;
use crate::error::{JwtError, Result};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

/// Driver built on the `jsonwebtoken` crate
///
/// Only the signature and the algorithm are verified here. `exp`, `nbf` and friends are checked
/// by the payload validator so leeway and refresh rules apply uniformly.
#[derive(Clone)]
pub struct JsonWebTokenDriver {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JsonWebTokenDriver {
    /// HMAC driver (HS256, HS384 or HS512)
    pub fn with_secret(algorithm: Algorithm, secret: &[u8]) -> Result<Self> {
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(JwtError::generic(format!(
                "Algorithm {algorithm:?} requires a key pair, not a secret"
            )));
        }
        Ok(Self::from_keys(
            algorithm,
            EncodingKey::from_secret(secret),
            DecodingKey::from_secret(secret),
        ))
    }

    pub fn hs256(secret: &[u8]) -> Self {
        Self::from_keys(
            Algorithm::HS256,
            EncodingKey::from_secret(secret),
            DecodingKey::from_secret(secret),
        )
    }

    /// RS256 driver from PEM-formatted RSA keys
    pub fn rs256(private_key_pem: &str, public_key_pem: &str) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| JwtError::generic_with("Failed to parse RSA private key", e))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| JwtError::generic_with("Failed to parse RSA public key", e))?;
        Ok(Self::from_keys(Algorithm::RS256, encoding_key, decoding_key))
    }

    pub fn from_keys(
        algorithm: Algorithm,
        encoding_key: EncodingKey,
        decoding_key: DecodingKey,
    ) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Self {
            algorithm,
            encoding_key,
            decoding_key,
            validation,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

impl Driver for JsonWebTokenDriver {
    fn encode(&self, claims: &ClaimMap) -> Result<String> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| JwtError::generic_with(format!("Could not create token: {e}"), e))
    }

    fn decode(&self, token: &str) -> Result<ClaimMap> {
        match decode::<ClaimMap>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Ok(data.claims),
            Err(e) if matches!(e.kind(), ErrorKind::InvalidSignature) => Err(
                JwtError::token_invalid_with("Token Signature could not be verified.", e),
            ),
            Err(e) => Err(JwtError::token_invalid_with(
                format!("Could not decode token: {e}"),
                e,
            )),
        }
    }
}

impl std::fmt::Debug for JsonWebTokenDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonWebTokenDriver")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}
