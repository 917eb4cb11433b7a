//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::jwt::JwtError;

/// Every failure the session core can report.
///
/// Codec failures are carried unchanged in `Token`; translation into an HTTP
/// status happens only in `IntoResponse`.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Token(#[from] JwtError),

    #[error("invalid access token")]
    InvalidAccessToken,

    #[error("invalid refresh token")]
    InvalidJwtToken,

    #[error("refresh token has expired")]
    ExpiredJwtToken,

    #[error("access token cookie not found")]
    EmptyAccessToken,

    #[error("refresh token cookie not found")]
    EmptyRefreshToken,

    #[error("cookie header is not valid")]
    InvalidCookieValue,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid password")]
    InvalidPassword,

    #[error("user not found")]
    UserNotFound,

    #[error("email already exists")]
    EmailTaken,

    #[error("username already exists")]
    UsernameTaken,

    #[error("password hashing failed")]
    HashingFailed,
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Stable machine-readable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Token(JwtError::Signing(_)) => "jwt_signing_error",
            AuthError::Token(JwtError::Malformed(_)) => "failed_to_parse_jwt_token",
            AuthError::Token(JwtError::SignatureInvalid) => "invalid_jwt_signature",
            AuthError::Token(JwtError::Time) => "system_time_error",
            AuthError::InvalidAccessToken => "invalid_access_token",
            AuthError::InvalidJwtToken => "invalid_jwt_token",
            AuthError::ExpiredJwtToken => "expired_jwt_token",
            AuthError::EmptyAccessToken => "access_token_not_found",
            AuthError::EmptyRefreshToken => "refresh_token_not_found",
            AuthError::InvalidCookieValue => "invalid_cookie_value",
            AuthError::Database(_) => "database_error",
            AuthError::InvalidPassword => "invalid_password",
            AuthError::UserNotFound => "user_not_found",
            AuthError::EmailTaken => "email_taken",
            AuthError::UsernameTaken => "username_taken",
            AuthError::HashingFailed => "password_hash_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Token(JwtError::Signing(_) | JwtError::Time)
            | AuthError::Database(_)
            | AuthError::HashingFailed => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::EmailTaken | AuthError::UsernameTaken => StatusCode::CONFLICT,
            AuthError::Token(_)
            | AuthError::InvalidAccessToken
            | AuthError::InvalidJwtToken
            | AuthError::ExpiredJwtToken
            | AuthError::EmptyAccessToken
            | AuthError::EmptyRefreshToken
            | AuthError::InvalidCookieValue
            | AuthError::InvalidPassword
            | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
        }
    }

    /// Whether this error means the client's credentials are unusable.
    pub fn is_unauthorized(&self) -> bool {
        self.status_code() == StatusCode::UNAUTHORIZED
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Internal authentication error");
        }

        (status, Json(ErrorResponse { error: self.code() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_failures_are_unauthorized() {
        assert!(AuthError::Token(JwtError::SignatureInvalid).is_unauthorized());
        assert!(AuthError::Token(JwtError::Malformed("bad".into())).is_unauthorized());
        assert!(AuthError::ExpiredJwtToken.is_unauthorized());
        assert!(AuthError::EmptyRefreshToken.is_unauthorized());
    }

    #[test]
    fn test_internal_failures() {
        assert_eq!(
            AuthError::Token(JwtError::Time).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AuthError::Database(sqlx::Error::PoolClosed).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(AuthError::Database(sqlx::Error::PoolClosed).code(), "database_error");
    }

    #[test]
    fn test_refresh_failures_have_distinct_codes() {
        assert_ne!(
            AuthError::ExpiredJwtToken.code(),
            AuthError::InvalidJwtToken.code()
        );
    }
}
