//! Cookie transport for session tokens.

use axum::http::{HeaderMap, header};

use super::errors::{AuthError, AuthResult};

/// Cookie name for the access token.
pub const ACCESS_COOKIE_NAME: &str = "access_token";

/// Cookie name for the refresh token.
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Attributes shared by every session cookie.
#[derive(Debug, Clone, Default)]
pub struct CookieSettings {
    /// `Domain` attribute; host-only cookies when `None`
    pub domain: Option<String>,
    /// Whether to set the `Secure` flag (should be true in production with HTTPS)
    pub secure: bool,
}

impl CookieSettings {
    fn attributes(&self, max_age: u64) -> String {
        let mut attrs = format!("HttpOnly; SameSite=Strict; Path=/; Max-Age={}", max_age);
        if let Some(domain) = &self.domain {
            attrs.push_str("; Domain=");
            attrs.push_str(domain);
        }
        if self.secure {
            attrs.push_str("; Secure");
        }
        attrs
    }

    /// `Set-Cookie` value storing `value` under `name` for `max_age` seconds.
    pub fn set_token(&self, name: &str, value: &str, max_age: u64) -> String {
        format!("{}={}; {}", name, value, self.attributes(max_age))
    }

    /// `Set-Cookie` value removing the cookie `name`.
    pub fn clear_token(&self, name: &str) -> String {
        format!("{}=; {}", name, self.attributes(0))
    }
}

/// Raw value of cookie `name` across all Cookie headers.
///
/// Other cookies are never decoded, so a foreign cookie with non-ASCII bytes
/// does not hide ours.
fn find_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a [u8]> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .flat_map(|value| value.as_bytes().split(|&b| b == b';'))
        .find_map(|part| {
            let eq = part.iter().position(|&b| b == b'=')?;
            let (key, value) = (&part[..eq], &part[eq + 1..]);
            (key.trim_ascii() == name.as_bytes()).then(|| value.trim_ascii())
        })
}

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    std::str::from_utf8(find_cookie(headers, name)?).ok()
}

/// Read a session token cookie, failing when it is absent or empty.
pub fn get_token<'a>(headers: &'a HeaderMap, name: &str) -> AuthResult<&'a str> {
    match find_cookie(headers, name) {
        Some(token) if !token.is_empty() => {
            std::str::from_utf8(token).map_err(|_| AuthError::InvalidCookieValue)
        }
        _ if name == ACCESS_COOKIE_NAME => Err(AuthError::EmptyAccessToken),
        _ => Err(AuthError::EmptyRefreshToken),
    }
}
