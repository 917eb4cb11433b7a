//! Authentication user types.

/// The user a request was authorized for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Subject of the access token
    pub user_id: String,
    /// Expiry of the access token the request is running under (unix seconds)
    pub expires_at: u64,
}
