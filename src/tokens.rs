//! Access/refresh token lifecycle.
//!
//! Uses a dual-token system:
//! - Access tokens: short-lived (60 min by default), carry the user id
//! - Refresh tokens: long-lived (7 days by default), used only to mint new access tokens
//!
//! Token state is never stored. Each check recomputes `Valid`, `Expired` or
//! `Invalid` from the signature and the current wall-clock time.

use std::time::Duration;

use tracing::debug;

use crate::auth::{AuthError, AuthResult};
use crate::jwt::{Claims, JwtError, TokenKind, TokenSecret, now_secs};

/// Access token lifetime used when none is configured.
pub const DEFAULT_ACCESS_TTL_MINUTES: u64 = 60;

/// Refresh token lifetime used when none is configured (7 days).
pub const DEFAULT_REFRESH_TTL_MINUTES: u64 = 7 * 24 * 60;

/// Longest lifetime accepted for either token kind (365 days).
pub const MAX_TTL_MINUTES: u64 = 365 * 24 * 60;

/// Convert a lifetime in minutes, saturating instead of overflowing.
pub fn ttl_from_minutes(minutes: u64) -> Duration {
    Duration::from_secs(minutes.saturating_mul(60))
}

/// Secrets and lifetimes for both token kinds.
#[derive(Clone)]
pub struct TokenConfig {
    pub access_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenConfig {
    /// Create a configuration with the default lifetimes.
    pub fn new(access_secret: impl Into<Vec<u8>>, refresh_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_ttl: ttl_from_minutes(DEFAULT_ACCESS_TTL_MINUTES),
            refresh_ttl: ttl_from_minutes(DEFAULT_REFRESH_TTL_MINUTES),
        }
    }
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The compact token string
    pub token: String,
    /// Claims embedded in the token
    pub claims: Claims,
    /// Token duration in seconds
    pub duration: u64,
}

/// Tokens handed to a client after authenticating with credentials.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Outcome of checking a token whose signature verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    Valid(Claims),
    Expired(Claims),
}

impl TokenStatus {
    pub fn into_claims(self) -> Claims {
        match self {
            TokenStatus::Valid(claims) | TokenStatus::Expired(claims) => claims,
        }
    }
}

/// Issues, checks and renews session tokens.
pub struct TokenLifecycle {
    access: TokenSecret,
    refresh: TokenSecret,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
}

impl TokenLifecycle {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            access: TokenSecret::new(&config.access_secret),
            refresh: TokenSecret::new(&config.refresh_secret),
            access_ttl_secs: config.access_ttl.as_secs(),
            refresh_ttl_secs: config.refresh_ttl.as_secs(),
        }
    }

    /// The secret used for tokens of the given kind.
    pub fn secret(&self, kind: TokenKind) -> &TokenSecret {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Lifetime of tokens of the given kind, in seconds.
    pub fn ttl_secs(&self, kind: TokenKind) -> u64 {
        match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        }
    }

    fn issue(&self, user_id: &str, kind: TokenKind) -> AuthResult<IssuedToken> {
        let duration = self.ttl_secs(kind);
        let expires_at = now_secs()?
            .checked_add(duration)
            .ok_or(JwtError::Time)?;
        let token = self.secret(kind).sign(Some(user_id), kind, expires_at)?;
        let claims = self.secret(kind).parse(&token, kind)?;

        Ok(IssuedToken {
            token,
            claims,
            duration,
        })
    }

    /// Sign a new access token and refresh token for a user.
    pub fn issue_pair(&self, user_id: &str) -> AuthResult<TokenPair> {
        Ok(TokenPair {
            access: self.issue(user_id, TokenKind::Access)?,
            refresh: self.issue(user_id, TokenKind::Refresh)?,
        })
    }

    /// Verify a token and classify it against the current time.
    /// An `Err` means the token is invalid; it is never merely stale.
    pub fn check(&self, token: &str, kind: TokenKind) -> AuthResult<TokenStatus> {
        let claims = self.secret(kind).parse(token, kind)?;
        if now_secs()? >= claims.exp {
            Ok(TokenStatus::Expired(claims))
        } else {
            Ok(TokenStatus::Valid(claims))
        }
    }

    /// Succeeds only for a signature-valid, unexpired access token with a subject.
    /// Expired and invalid tokens both fail with `InvalidAccessToken`.
    pub fn validate_access(&self, token: &str) -> AuthResult<Claims> {
        match self.check(token, TokenKind::Access) {
            Ok(TokenStatus::Valid(claims)) if claims.sub.is_some() => Ok(claims),
            Ok(_) | Err(AuthError::Token(_)) => Err(AuthError::InvalidAccessToken),
            Err(e) => Err(e),
        }
    }

    /// `true` only when the signature verifies and the token has expired.
    pub fn is_expired(&self, token: &str, kind: TokenKind) -> AuthResult<bool> {
        Ok(matches!(self.check(token, kind)?, TokenStatus::Expired(_)))
    }

    /// Mint a new access token for the subject of `access_token`.
    ///
    /// The access token may be expired but must carry a valid signature. The
    /// refresh token must be valid and unexpired; if it names a subject, it
    /// must be the same one.
    pub fn refresh(&self, access_token: &str, refresh_token: &str) -> AuthResult<IssuedToken> {
        let refresh_claims = match self.check(refresh_token, TokenKind::Refresh) {
            Ok(TokenStatus::Valid(claims)) => claims,
            Ok(TokenStatus::Expired(_)) => return Err(AuthError::ExpiredJwtToken),
            Err(AuthError::Token(e)) => {
                debug!(error = %e, "Rejected refresh token");
                return Err(AuthError::InvalidJwtToken);
            }
            Err(e) => return Err(e),
        };

        let subject = match self.check(access_token, TokenKind::Access) {
            Ok(status) => status
                .into_claims()
                .sub
                .ok_or(AuthError::InvalidAccessToken)?,
            Err(AuthError::Token(e)) => {
                debug!(error = %e, "Rejected access token during refresh");
                return Err(AuthError::InvalidAccessToken);
            }
            Err(e) => return Err(e),
        };

        if let Some(refresh_subject) = refresh_claims.sub.as_deref() {
            if refresh_subject != subject {
                debug!(user_id = %subject, "Refresh token belongs to another user");
                return Err(AuthError::InvalidJwtToken);
            }
        }

        self.issue(&subject, TokenKind::Access)
    }
}
