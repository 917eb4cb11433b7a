//! Credential endpoints: signup, login and logout.
//!
//! Signup and login both end the same way: a fresh token pair is issued, the
//! refresh token is recorded for the user, and both tokens are handed to the
//! client as HttpOnly cookies.

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    middleware,
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{ApiError, ResultExt};
use crate::auth::{
    ACCESS_COOKIE_NAME, Auth, AuthError, CookieSettings, REFRESH_COOKIE_NAME, require_auth,
};
use crate::db::{Database, NewUser, User};
use crate::impl_has_auth_backend;
use crate::jwt::TokenKind;
use crate::password::{CredentialVerifier, dummy_hash, hash_password};
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_signup};
use crate::tokens::TokenLifecycle;

const MAX_USERNAME_LEN: usize = 32;
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Clone)]
pub struct SessionsState {
    pub db: Database,
    pub tokens: Arc<TokenLifecycle>,
    pub cookies: Arc<CookieSettings>,
    pub verifier: Arc<dyn CredentialVerifier>,
}

impl_has_auth_backend!(SessionsState);

pub fn router(state: SessionsState, rate_limit: Option<Arc<RateLimitConfig>>) -> Router {
    let mut login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone());
    let mut signup_router = Router::new()
        .route("/signup", post(signup))
        .with_state(state.clone());

    if let Some(config) = rate_limit {
        login_router =
            login_router.layer(middleware::from_fn_with_state(config.clone(), rate_limit_login));
        signup_router =
            signup_router.layer(middleware::from_fn_with_state(config, rate_limit_signup));
    }

    let logout_router = Router::new()
        .route("/logout", get(logout))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth::<SessionsState>,
        ))
        .with_state(state);

    Router::new()
        .merge(login_router)
        .merge(signup_router)
        .merge(logout_router)
}

#[derive(Deserialize)]
struct SignupRequest {
    name: String,
    username: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

/// Issue a token pair for `user`, record the refresh token and build the
/// cookies that carry both.
async fn start_session(
    state: &SessionsState,
    user: &User,
) -> Result<AppendHeaders<[(axum::http::HeaderName, String); 2]>, ApiError> {
    let pair = state.tokens.issue_pair(&user.id)?;

    state
        .db
        .refresh_tokens()
        .upsert(&user.id, &pair.refresh.token)
        .await
        .map_err(AuthError::from)?;

    // Both cookies live as long as the refresh token so an expired access
    // token can still be presented for renewal.
    let max_age = state.tokens.ttl_secs(TokenKind::Refresh);
    let access_cookie = state
        .cookies
        .set_token(ACCESS_COOKIE_NAME, &pair.access.token, max_age);
    let refresh_cookie = state
        .cookies
        .set_token(REFRESH_COOKIE_NAME, &pair.refresh.token, max_age);

    Ok(AppendHeaders([
        (SET_COOKIE, access_cookie),
        (SET_COOKIE, refresh_cookie),
    ]))
}

fn validate_signup(payload: &SignupRequest) -> Result<(), ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::bad_request("Name cannot be empty"));
    }

    let username = payload.username.trim();
    if username.is_empty() {
        return Err(ApiError::bad_request("Username cannot be empty"));
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(ApiError::bad_request(
            "Username cannot be longer than 32 characters",
        ));
    }
    // Only allow alphanumeric and underscores
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ApiError::bad_request(
            "Username can only contain letters, numbers, and underscores",
        ));
    }

    let email = payload.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::bad_request("Email address is not valid"));
    }

    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(
            "Password must be at least 8 characters",
        ));
    }

    Ok(())
}

async fn signup(
    State(state): State<SessionsState>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_signup(&payload)?;

    let name = payload.name.trim();
    let username = payload.username.trim();
    let email = payload.email.trim();

    if state
        .db
        .users()
        .is_email_taken(email)
        .await
        .db_err("Failed to check email availability")?
    {
        return Err(AuthError::EmailTaken.into());
    }

    if state
        .db
        .users()
        .is_username_taken(username)
        .await
        .db_err("Failed to check username availability")?
    {
        return Err(AuthError::UsernameTaken.into());
    }

    let password_hash = hash_password(&payload.password)?;

    let user = state
        .db
        .users()
        .create(&NewUser {
            name,
            username,
            email,
            password_hash: &password_hash,
        })
        .await
        .map_err(|e| match e.as_database_error() {
            // Lost a race with a concurrent signup
            Some(db_err) if db_err.is_unique_violation() => {
                if db_err.message().contains("email") {
                    ApiError::from(AuthError::EmailTaken)
                } else {
                    ApiError::from(AuthError::UsernameTaken)
                }
            }
            _ => ApiError::db_error("Failed to create user", e),
        })?;

    let cookies = start_session(&state, &user).await?;
    info!(user_id = %user.id, "User signed up");

    Ok((StatusCode::CREATED, cookies, Json(user)))
}

async fn login(
    State(state): State<SessionsState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_email(payload.email.trim())
        .await
        .db_err("Failed to get user")?;

    // Unknown email and wrong password are reported identically.
    let Some(user) = user else {
        // Take as long as a wrong password would.
        state.verifier.verify(dummy_hash(), &payload.password);
        debug!("Login attempt for unknown email");
        return Err(AuthError::InvalidPassword.into());
    };

    if !state
        .verifier
        .verify(&user.password_hash, &payload.password)
    {
        debug!(user_id = %user.id, "Login attempt with wrong password");
        return Err(AuthError::InvalidPassword.into());
    }

    let cookies = start_session(&state, &user).await?;
    info!(user_id = %user.id, "User logged in");

    Ok((StatusCode::OK, cookies, Json(user)))
}

/// Logout - clear both cookies.
///
/// The stored refresh token is left in place and stays valid until it expires.
async fn logout(
    State(state): State<SessionsState>,
    Auth(user): Auth,
) -> impl IntoResponse {
    info!(user_id = %user.user_id, "User logged out");

    (
        StatusCode::OK,
        AppendHeaders([
            (SET_COOKIE, state.cookies.clear_token(ACCESS_COOKIE_NAME)),
            (SET_COOKIE, state.cookies.clear_token(REFRESH_COOKIE_NAME)),
        ]),
        Json(serde_json::json!({ "success": true })),
    )
}
