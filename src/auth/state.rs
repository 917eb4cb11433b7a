//! Authentication state trait and macro.

use crate::db::Database;
use crate::tokens::TokenLifecycle;

use super::cookie::CookieSettings;

/// Trait for state types that provide what the session gate needs.
pub trait HasAuthBackend {
    fn tokens(&self) -> &TokenLifecycle;
    fn db(&self) -> &Database;
    fn cookies(&self) -> &CookieSettings;
}

/// Macro to implement `HasAuthBackend` for state structs with the standard fields.
///
/// The struct must have these fields:
/// - `tokens: Arc<TokenLifecycle>`
/// - `db: Database`
/// - `cookies: Arc<CookieSettings>`
///
/// # Example
/// ```ignore
/// use crate::impl_has_auth_backend;
///
/// #[derive(Clone)]
/// pub struct MyState {
///     pub db: Database,
///     pub tokens: Arc<TokenLifecycle>,
///     pub cookies: Arc<CookieSettings>,
/// }
///
/// impl_has_auth_backend!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn tokens(&self) -> &$crate::tokens::TokenLifecycle {
                &self.tokens
            }
            fn db(&self) -> &$crate::db::Database {
                &self.db
            }
            fn cookies(&self) -> &$crate::auth::CookieSettings {
                &self.cookies
            }
        }
    };
}
