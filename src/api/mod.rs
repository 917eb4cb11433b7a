mod error;
mod sessions;
mod users;

use axum::Router;
use std::sync::Arc;

use crate::auth::CookieSettings;
use crate::db::Database;
use crate::password::CredentialVerifier;
use crate::rate_limit::RateLimitConfig;
use crate::tokens::TokenLifecycle;

pub use error::{ApiError, ResultExt};
pub use sessions::SessionsState;
pub use users::UsersState;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    tokens: Arc<TokenLifecycle>,
    cookies: Arc<CookieSettings>,
    verifier: Arc<dyn CredentialVerifier>,
    rate_limit: Option<Arc<RateLimitConfig>>,
) -> Router {
    let sessions_state = SessionsState {
        db: db.clone(),
        tokens: tokens.clone(),
        cookies: cookies.clone(),
        verifier,
    };

    let users_state = UsersState {
        db,
        tokens,
        cookies,
    };

    Router::new()
        .merge(sessions::router(sessions_state, rate_limit))
        .merge(users::router(users_state))
}
