//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::Database;
use crate::tokens::{
    DEFAULT_ACCESS_TTL_MINUTES, DEFAULT_REFRESH_TTL_MINUTES, MAX_TTL_MINUTES, TokenConfig,
    ttl_from_minutes,
};
use clap::Parser;
use tracing::{error, info, warn};

const MIN_SECRET_LENGTH: usize = 32;

/// Environment variable holding the access token secret.
pub const ACCESS_SECRET_ENV: &str = "ACCESS_TOKEN_SECRET";

/// Environment variable holding the refresh token secret.
pub const REFRESH_SECRET_ENV: &str = "REFRESH_TOKEN_SECRET";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "sessiongate",
    about = "User accounts with cookie-based JWT sessions"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7291")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "sessions.db")]
    pub database: String,

    /// Path to file containing the access token secret. Prefer using ACCESS_TOKEN_SECRET env var instead
    #[arg(long)]
    pub access_token_secret_file: Option<String>,

    /// Path to file containing the refresh token secret. Prefer using REFRESH_TOKEN_SECRET env var instead
    #[arg(long)]
    pub refresh_token_secret_file: Option<String>,

    /// Access token lifetime in minutes (at most 365 days)
    #[arg(long, env = "ACCESS_TOKEN_TTL_MINUTES", default_value_t = DEFAULT_ACCESS_TTL_MINUTES,
        value_parser = clap::value_parser!(u64).range(1..=MAX_TTL_MINUTES))]
    pub access_token_ttl_minutes: u64,

    /// Refresh token lifetime in minutes (at most 365 days)
    #[arg(long, env = "REFRESH_TOKEN_TTL_MINUTES", default_value_t = DEFAULT_REFRESH_TTL_MINUTES,
        value_parser = clap::value_parser!(u64).range(1..=MAX_TTL_MINUTES))]
    pub refresh_token_ttl_minutes: u64,

    /// Domain attribute for session cookies (host-only when omitted)
    #[arg(long, env = "COOKIE_DOMAIN")]
    pub cookie_domain: Option<String>,

    /// Set the Secure flag on session cookies (use when served over HTTPS)
    #[arg(long)]
    pub cookie_secure: bool,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load a signing secret from an environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_secret(env_var: &str, secret_file: Option<&str>) -> Option<Vec<u8>> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            variable = %env_var,
            "Token secret is required. Set the environment variable (recommended) or use the secret file option"
        );
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            variable = %env_var,
            "Token secret is shorter than {} characters. Use a longer secret",
            MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret.into_bytes())
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    db: Database,
    access_secret: Vec<u8>,
    refresh_secret: Vec<u8>,
) -> ServerConfig {
    if access_secret == refresh_secret {
        warn!("Access and refresh tokens share a secret; use distinct secrets");
    }
    if args.refresh_token_ttl_minutes <= args.access_token_ttl_minutes {
        warn!("Refresh token lifetime is not longer than the access token lifetime");
    }

    ServerConfig {
        db,
        tokens: TokenConfig {
            access_secret,
            refresh_secret,
            access_ttl: ttl_from_minutes(args.access_token_ttl_minutes),
            refresh_ttl: ttl_from_minutes(args.refresh_token_ttl_minutes),
        },
        cookie_domain: args.cookie_domain.clone(),
        secure_cookies: args.cookie_secure,
        rate_limit: true,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
