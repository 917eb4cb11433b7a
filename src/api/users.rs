use axum::{Json, Router, extract::State, middleware, response::IntoResponse, routing::get};
use serde::Serialize;
use std::sync::Arc;

use super::error::{ApiError, ResultExt};
use crate::auth::{Auth, AuthError, CookieSettings, require_auth};
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::tokens::TokenLifecycle;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub tokens: Arc<TokenLifecycle>,
    pub cookies: Arc<CookieSettings>,
}

impl_has_auth_backend!(UsersState);

/// Routes that require a session. Every route goes through the session gate.
pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/home", get(home))
        .route("/me", get(me))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth::<UsersState>,
        ))
        .with_state(state)
}

#[derive(Serialize)]
struct HomeResponse {
    message: &'static str,
    user_id: String,
}

async fn home(Auth(user): Auth) -> impl IntoResponse {
    Json(HomeResponse {
        message: "Welcome!",
        user_id: user.user_id,
    })
}

async fn me(
    State(state): State<UsersState>,
    Auth(user): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_id(&user.user_id)
        .await
        .db_err("Failed to get user")?
        .ok_or(AuthError::UserNotFound)?;

    Ok(Json(user))
}
