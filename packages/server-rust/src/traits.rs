use async_trait::async_trait;

use crate::security::WebUser;

/// Pluggable credential backend for the login endpoint.
/// Implementations: in-memory table (tests, demo server), directory or database lookups.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Resolve a user from a username/password pair.
    ///
    /// `Ok(None)` means the credentials are wrong; `Err` means the backend
    /// itself failed.
    async fn find_user(&self, username: &str, password: &str) -> anyhow::Result<Option<WebUser>>;

    /// Hook run after a successful lookup and before the session is opened.
    /// Returning `false` aborts the login with a server error.
    async fn post_login(&self, _user: &WebUser) -> anyhow::Result<bool> {
        Ok(true)
    }
}
