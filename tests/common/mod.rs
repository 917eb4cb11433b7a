#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use sessiongate::{
    ServerConfig, create_app,
    db::Database,
    jwt::{TokenKind, now_secs},
    tokens::{TokenConfig, TokenLifecycle},
};
use std::time::Duration;
use tower::ServiceExt;

pub const ACCESS_SECRET: &[u8] = b"test-access-secret-0123456789abcdefghij";
pub const REFRESH_SECRET: &[u8] = b"test-refresh-secret-0123456789abcdefghi";

pub const PASSWORD: &str = "correct-horse-battery";

pub struct TestContext {
    pub app: Router,
    pub db: Database,
    /// Lifecycle sharing the app's secrets, for forging tokens in tests
    pub tokens: TokenLifecycle,
}

/// Cookies handed out by a signup or login.
pub struct Session {
    pub user_id: String,
    pub access: String,
    pub refresh: String,
}

pub async fn setup() -> TestContext {
    setup_with_options(false, test_token_config()).await
}

pub async fn setup_with_rate_limit() -> TestContext {
    setup_with_options(true, test_token_config()).await
}

/// Setup with custom token lifetimes; secrets stay the test defaults.
pub async fn setup_with_ttls(access_ttl: Duration, refresh_ttl: Duration) -> TestContext {
    let mut tokens = test_token_config();
    tokens.access_ttl = access_ttl;
    tokens.refresh_ttl = refresh_ttl;
    setup_with_options(false, tokens).await
}

fn test_token_config() -> TokenConfig {
    TokenConfig::new(ACCESS_SECRET, REFRESH_SECRET)
}

async fn setup_with_options(rate_limit: bool, tokens: TokenConfig) -> TestContext {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        tokens: tokens.clone(),
        cookie_domain: None,
        secure_cookies: false,
        rate_limit,
    };

    TestContext {
        app: create_app(&config),
        db,
        tokens: TokenLifecycle::new(&tokens),
    }
}

impl TestContext {
    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response<Body> {
        self.app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.app
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    /// Sign up a user and return the session cookies.
    pub async fn signup(&self, username: &str, email: &str) -> Session {
        let response = self
            .post_json(
                "/apis/v1/signup",
                serde_json::json!({
                    "name": "Test User",
                    "username": username,
                    "email": email,
                    "password": PASSWORD,
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let cookies = set_cookies(&response);
        let json = body_json(response).await;

        Session {
            user_id: json["id"].as_str().unwrap().to_string(),
            access: cookie_value(&cookies, "access_token").unwrap(),
            refresh: cookie_value(&cookies, "refresh_token").unwrap(),
        }
    }

    /// Log in with the shared test password and return the session cookies.
    pub async fn login(&self, email: &str) -> Session {
        let response = self
            .post_json(
                "/apis/v1/login",
                serde_json::json!({ "email": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let cookies = set_cookies(&response);
        let json = body_json(response).await;

        Session {
            user_id: json["id"].as_str().unwrap().to_string(),
            access: cookie_value(&cookies, "access_token").unwrap(),
            refresh: cookie_value(&cookies, "refresh_token").unwrap(),
        }
    }

    /// Sign a token that expired one second ago.
    pub fn expired_token(&self, kind: TokenKind, user_id: &str) -> String {
        self.tokens
            .secret(kind)
            .sign(Some(user_id), kind, now_secs().unwrap() - 1)
            .unwrap()
    }
}

/// Build a Cookie header value.
pub fn cookie_header(access: Option<&str>, refresh: Option<&str>) -> String {
    let mut parts = Vec::new();
    if let Some(access) = access {
        parts.push(format!("access_token={}", access));
    }
    if let Some(refresh) = refresh {
        parts.push(format!("refresh_token={}", refresh));
    }
    parts.join("; ")
}

/// All Set-Cookie header values of a response.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// The value of cookie `name` in a list of Set-Cookie headers.
pub fn cookie_value(set_cookies: &[String], name: &str) -> Option<String> {
    set_cookies.iter().find_map(|cookie| {
        let (pair, _) = cookie.split_once(';').unwrap_or((cookie, ""));
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// The full Set-Cookie header for cookie `name`.
pub fn cookie_line<'a>(set_cookies: &'a [String], name: &str) -> Option<&'a str> {
    set_cookies
        .iter()
        .find(|cookie| cookie.starts_with(&format!("{}=", name)))
        .map(String::as_str)
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
