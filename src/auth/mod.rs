//! Cookie-based session authentication.
//!
//! Dual-token system: short-lived access tokens and long-lived refresh
//! tokens, both stateless JWTs carried in HttpOnly cookies. The gate
//! middleware renews an expired access token when the refresh token is
//! still good and hands the new one back in a `Set-Cookie` header.

mod cookie;
mod errors;
mod gate;
mod state;
mod types;

pub use cookie::{
    ACCESS_COOKIE_NAME, CookieSettings, REFRESH_COOKIE_NAME, get_cookie, get_token,
};
pub use errors::{AuthError, AuthResult};
pub use gate::{Auth, Authorization, authorize, require_auth};
pub use state::HasAuthBackend;
pub use types::AuthenticatedUser;
