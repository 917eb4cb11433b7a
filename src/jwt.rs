//! Compact signed token encoding and verification.
//!
//! Tokens are HS512 JWS strings carrying a fixed claim set. Parsing verifies
//! the MAC, the header algorithm and the token kind, but never the expiry:
//! callers decide what an expired token means.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// The only algorithm tokens are signed and accepted with.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS512;

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived token presented on every request.
    Access,
    /// Long-lived token used only to mint new access tokens.
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// Claims carried by every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id). Always present on access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Token kind
    #[serde(rename = "typ")]
    pub kind: TokenKind,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Errors that can occur during token encoding and decoding.
#[derive(Debug, Error)]
pub enum JwtError {
    /// The secret could not be used to produce a signature.
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    /// The token could not be decoded, names a foreign algorithm, or has the wrong kind.
    #[error("malformed token: {0}")]
    Malformed(String),
    /// The MAC does not verify against the secret.
    #[error("token signature is invalid")]
    SignatureInvalid,
    /// The clock is unavailable or an expiry does not fit in a timestamp.
    #[error("system time error")]
    Time,
}

/// Current Unix time in seconds.
pub fn now_secs() -> Result<u64, JwtError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| JwtError::Time)?
        .as_secs())
}

/// One HMAC secret, ready for signing and verifying.
#[derive(Clone)]
pub struct TokenSecret {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenSecret {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Sign a token of the given kind expiring at `expires_at` (Unix seconds).
    pub fn sign(
        &self,
        subject: Option<&str>,
        kind: TokenKind,
        expires_at: u64,
    ) -> Result<String, JwtError> {
        let claims = Claims {
            sub: subject.map(str::to_string),
            kind,
            iat: now_secs()?,
            exp: expires_at,
        };

        jsonwebtoken::encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key)
            .map_err(JwtError::Signing)
    }

    /// Verify a token's signature and decode its claims without looking at `exp`.
    pub fn parse(&self, token: &str, kind: TokenKind) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => JwtError::SignatureInvalid,
                _ => JwtError::Malformed(e.to_string()),
            })?;

        if data.claims.kind != kind {
            return Err(JwtError::Malformed(format!(
                "expected {} token, got {}",
                kind.as_str(),
                data.claims.kind.as_str()
            )));
        }

        Ok(data.claims)
    }
}
