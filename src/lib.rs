pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod password;
pub mod rate_limit;
pub mod tokens;

use api::create_api_router;
use auth::CookieSettings;
use axum::Router;
use db::Database;
use password::Argon2Verifier;
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokens::{TokenConfig, TokenLifecycle};
use tokio::net::TcpListener;

/// Path prefix for every API route.
pub const API_PREFIX: &str = "/apis/v1";

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Secrets and lifetimes for access and refresh tokens
    pub tokens: TokenConfig,
    /// Domain attribute for session cookies
    pub cookie_domain: Option<String>,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Whether login and signup are rate limited per client IP
    pub rate_limit: bool,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let tokens = Arc::new(TokenLifecycle::new(&config.tokens));
    let cookies = Arc::new(CookieSettings {
        domain: config.cookie_domain.clone(),
        secure: config.secure_cookies,
    });
    let rate_limit = config
        .rate_limit
        .then(|| Arc::new(RateLimitConfig::new()));

    // Build the login timing hash now rather than on the first failed login.
    password::dummy_hash();

    let api_router = create_api_router(
        config.db.clone(),
        tokens,
        cookies,
        Arc::new(Argon2Verifier),
        rate_limit,
    );

    Router::new().nest(API_PREFIX, api_router)
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
