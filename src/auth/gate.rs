//! Session gate: decides whether a request may proceed.
//!
//! A valid access token passes straight through. An access token whose
//! signature verifies but which has expired is renewed from the refresh
//! cookie, and the new access token is returned to the client in a
//! `Set-Cookie` header. Anything else is rejected.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, info, warn};

use crate::jwt::TokenKind;
use crate::tokens::IssuedToken;

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, get_token};
use super::errors::{AuthError, AuthResult};
use super::state::HasAuthBackend;
use super::types::AuthenticatedUser;

/// Result of a successful gate decision.
#[derive(Debug, Clone)]
pub struct Authorization {
    pub user: AuthenticatedUser,
    /// Present when the access token was renewed for this request
    pub renewed_access: Option<IssuedToken>,
}

/// Decide whether the cookies in `headers` authorize a request.
pub async fn authorize<S>(headers: &axum::http::HeaderMap, state: &S) -> AuthResult<Authorization>
where
    S: HasAuthBackend + Sync,
{
    let access_token = get_token(headers, ACCESS_COOKIE_NAME)?;

    match state.tokens().validate_access(access_token) {
        Ok(claims) => {
            let user_id = claims.sub.ok_or(AuthError::InvalidAccessToken)?;
            return Ok(Authorization {
                user: AuthenticatedUser {
                    user_id,
                    expires_at: claims.exp,
                },
                renewed_access: None,
            });
        }
        Err(AuthError::InvalidAccessToken) => {}
        Err(e) => return Err(e),
    }

    // Only a genuine token that has simply run out may be renewed.
    if !state.tokens().is_expired(access_token, TokenKind::Access)? {
        return Err(AuthError::InvalidAccessToken);
    }

    let refresh_token = get_token(headers, REFRESH_COOKIE_NAME)?;
    let renewed = state.tokens().refresh(access_token, refresh_token)?;
    let user_id = renewed
        .claims
        .sub
        .clone()
        .ok_or(AuthError::InvalidAccessToken)?;

    state
        .db()
        .refresh_tokens()
        .upsert(&user_id, refresh_token)
        .await?;

    info!(user_id = %user_id, "Renewed expired access token");

    Ok(Authorization {
        user: AuthenticatedUser {
            user_id,
            expires_at: renewed.claims.exp,
        },
        renewed_access: Some(renewed),
    })
}

fn is_cookie(value: &HeaderValue, name: &str) -> bool {
    value
        .as_bytes()
        .strip_prefix(name.as_bytes())
        .is_some_and(|rest| rest.starts_with(b"="))
}

fn append_cookie(response: &mut Response, cookie: String) {
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => warn!("Failed to build Set-Cookie header: {}", e),
    }
}

/// Middleware that runs the gate in front of protected routes.
///
/// On success the `AuthenticatedUser` is stored in the request extensions for
/// the `Auth` extractor. On a 401 rejection both session cookies are cleared.
pub async fn require_auth<S>(State(state): State<S>, mut request: Request, next: Next) -> Response
where
    S: HasAuthBackend + Clone + Send + Sync + 'static,
{
    match authorize(request.headers(), &state).await {
        Ok(Authorization {
            user,
            renewed_access,
        }) => {
            request.extensions_mut().insert(user);
            let mut response = next.run(request).await;

            // A cookie written by the handler itself (logout) takes precedence.
            let handler_set_access = response
                .headers()
                .get_all(header::SET_COOKIE)
                .iter()
                .any(|value| is_cookie(value, ACCESS_COOKIE_NAME));

            if let Some(issued) = renewed_access.filter(|_| !handler_set_access) {
                // Keep the cookie as long as the refresh token so an expired
                // access token can still be presented for renewal.
                let max_age = state.tokens().ttl_secs(TokenKind::Refresh);
                let cookie = state
                    .cookies()
                    .set_token(ACCESS_COOKIE_NAME, &issued.token, max_age);
                append_cookie(&mut response, cookie);
            }

            response
        }
        Err(e) => {
            debug!(error = %e, "Request rejected by session gate");
            let clear = e.is_unauthorized();
            let mut response = e.into_response();
            if clear {
                let cookies = state.cookies();
                append_cookie(&mut response, cookies.clear_token(ACCESS_COOKIE_NAME));
                append_cookie(&mut response, cookies.clear_token(REFRESH_COOKIE_NAME));
            }
            response
        }
    }
}

/// Extractor for handlers behind `require_auth`.
pub struct Auth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(Auth)
            .ok_or(AuthError::EmptyAccessToken)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::HeaderMap;

    use super::*;
    use crate::auth::CookieSettings;
    use crate::db::Database;
    use crate::jwt::{JwtError, now_secs};
    use crate::tokens::{TokenConfig, TokenLifecycle};

    #[derive(Clone)]
    struct TestState {
        db: Database,
        tokens: Arc<TokenLifecycle>,
        cookies: Arc<CookieSettings>,
    }

    crate::impl_has_auth_backend!(TestState);

    async fn state() -> TestState {
        TestState {
            db: Database::open(":memory:").await.unwrap(),
            tokens: Arc::new(TokenLifecycle::new(&TokenConfig::new(
                "access-secret-for-gate-tests-0123456789",
                "refresh-secret-for-gate-tests-0123456789",
            ))),
            cookies: Arc::new(CookieSettings::default()),
        }
    }

    fn cookies(access: Option<&str>, refresh: Option<&str>) -> HeaderMap {
        let mut parts = Vec::new();
        if let Some(access) = access {
            parts.push(format!("{}={}", ACCESS_COOKIE_NAME, access));
        }
        if let Some(refresh) = refresh {
            parts.push(format!("{}={}", REFRESH_COOKIE_NAME, refresh));
        }
        let mut headers = HeaderMap::new();
        if !parts.is_empty() {
            headers.insert(
                header::COOKIE,
                HeaderValue::from_str(&parts.join("; ")).unwrap(),
            );
        }
        headers
    }

    fn expired(state: &TestState, kind: TokenKind, user_id: &str) -> String {
        state
            .tokens
            .secret(kind)
            .sign(Some(user_id), kind, now_secs().unwrap() - 1)
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_access_token_passes() {
        let state = state().await;
        let pair = state.tokens.issue_pair("user-1").unwrap();

        let auth = authorize(&cookies(Some(&pair.access.token), None), &state)
            .await
            .unwrap();

        assert_eq!(auth.user.user_id, "user-1");
        assert_eq!(auth.user.expires_at, pair.access.claims.exp);
        assert!(auth.renewed_access.is_none());
        assert!(state.db.refresh_tokens().get("user-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_access_cookie() {
        let state = state().await;

        let result = authorize(&cookies(None, Some("whatever")), &state).await;
        assert!(matches!(result, Err(AuthError::EmptyAccessToken)));
    }

    #[tokio::test]
    async fn test_expired_access_token_is_renewed() {
        let state = state().await;
        let access = expired(&state, TokenKind::Access, "user-1");
        let refresh = state.tokens.issue_pair("user-1").unwrap().refresh.token;

        let auth = authorize(&cookies(Some(&access), Some(&refresh)), &state)
            .await
            .unwrap();

        assert_eq!(auth.user.user_id, "user-1");
        let renewed = auth.renewed_access.unwrap();
        assert_ne!(renewed.token, access);
        assert_eq!(renewed.claims.sub.as_deref(), Some("user-1"));
        assert!(state.tokens.validate_access(&renewed.token).is_ok());

        let record = state.db.refresh_tokens().get("user-1").await.unwrap().unwrap();
        assert_eq!(record.refresh_token, refresh);
    }

    #[tokio::test]
    async fn test_expired_access_without_refresh_cookie() {
        let state = state().await;
        let access = expired(&state, TokenKind::Access, "user-1");

        let result = authorize(&cookies(Some(&access), None), &state).await;
        assert!(matches!(result, Err(AuthError::EmptyRefreshToken)));
    }

    #[tokio::test]
    async fn test_expired_refresh_token_is_rejected() {
        let state = state().await;
        let access = expired(&state, TokenKind::Access, "user-1");
        let refresh = expired(&state, TokenKind::Refresh, "user-1");

        let result = authorize(&cookies(Some(&access), Some(&refresh)), &state).await;
        assert!(matches!(result, Err(AuthError::ExpiredJwtToken)));
        assert!(state.db.refresh_tokens().get("user-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_forged_access_token_never_refreshes() {
        let state = state().await;
        let forged = TokenLifecycle::new(&TokenConfig::new(
            "some-other-access-secret-0123456789abcdef",
            "some-other-refresh-secret-0123456789abcdef",
        ));
        let access = forged
            .secret(TokenKind::Access)
            .sign(Some("user-1"), TokenKind::Access, now_secs().unwrap() - 1)
            .unwrap();
        let refresh = state.tokens.issue_pair("user-1").unwrap().refresh.token;

        let result = authorize(&cookies(Some(&access), Some(&refresh)), &state).await;
        assert!(matches!(
            result,
            Err(AuthError::Token(JwtError::SignatureInvalid))
        ));
        assert!(state.db.refresh_tokens().get("user-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_garbage_access_token() {
        let state = state().await;

        let result = authorize(&cookies(Some("not-a-jwt"), Some("also-not")), &state).await;
        assert!(matches!(result, Err(AuthError::Token(JwtError::Malformed(_)))));
    }

    #[tokio::test]
    async fn test_refresh_for_another_user_is_rejected() {
        let state = state().await;
        let access = expired(&state, TokenKind::Access, "user-1");
        let refresh = state.tokens.issue_pair("user-2").unwrap().refresh.token;

        let result = authorize(&cookies(Some(&access), Some(&refresh)), &state).await;
        assert!(matches!(result, Err(AuthError::InvalidJwtToken)));
    }

    #[tokio::test]
    async fn test_renewal_fails_when_store_is_down() {
        let state = state().await;
        let access = expired(&state, TokenKind::Access, "user-1");
        let refresh = state.tokens.issue_pair("user-1").unwrap().refresh.token;
        state.db.pool().close().await;

        let result = authorize(&cookies(Some(&access), Some(&refresh)), &state).await;
        assert!(matches!(result, Err(AuthError::Database(_))));
    }
}
