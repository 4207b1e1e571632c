//! Static credential table.

use std::collections::HashMap;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::user::WebUser;
use crate::traits::CredentialVerifier;

#[derive(Debug, Clone)]
struct StoredUser {
    digest: [u8; 32],
    roles: Vec<String>,
}

/// Username/password pairs held in memory as SHA-256 digests.
///
/// Digests are compared in constant time so a wrong password takes the same
/// time regardless of how many leading bytes match.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentials {
    users: HashMap<String, StoredUser>,
}

impl InMemoryCredentials {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a user.
    pub fn add_user<R, S>(&mut self, username: impl Into<String>, password: &str, roles: R)
    where
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users.insert(
            username.into(),
            StoredUser {
                digest: digest(password),
                roles: roles.into_iter().map(Into::into).collect(),
            },
        );
    }

    /// Builder form of [`InMemoryCredentials::add_user`].
    #[must_use]
    pub fn with_user<R, S>(mut self, username: impl Into<String>, password: &str, roles: R) -> Self
    where
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_user(username, password, roles);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

fn digest(password: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(password.as_bytes()));
    out
}

#[async_trait]
impl CredentialVerifier for InMemoryCredentials {
    async fn find_user(&self, username: &str, password: &str) -> anyhow::Result<Option<WebUser>> {
        let Some(stored) = self.users.get(username) else {
            return Ok(None);
        };
        if !bool::from(stored.digest.ct_eq(&digest(password))) {
            return Ok(None);
        }
        Ok(Some(WebUser {
            username: username.to_string(),
            roles: stored.roles.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> InMemoryCredentials {
        InMemoryCredentials::new()
            .with_user("teo", "secret", ["admin", "user"])
            .with_user("ana", "hunter2", Vec::<String>::new())
    }

    #[tokio::test]
    async fn correct_password_resolves_user() {
        let user = table().find_user("teo", "secret").await.unwrap().unwrap();
        assert_eq!(user.username, "teo");
        assert!(user.has_role("admin"));
    }

    #[tokio::test]
    async fn wrong_password_or_unknown_user_is_none() {
        let creds = table();
        assert!(creds.find_user("teo", "Secret").await.unwrap().is_none());
        assert!(creds.find_user("bob", "secret").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn add_user_replaces_existing_entry() {
        let mut creds = table();
        creds.add_user("ana", "new-pass", ["user"]);
        assert_eq!(creds.len(), 2);
        assert!(creds.find_user("ana", "hunter2").await.unwrap().is_none());
        assert!(creds.find_user("ana", "new-pass").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn post_login_defaults_to_accept() {
        let creds = table();
        let user = WebUser::new("teo");
        assert!(creds.post_login(&user).await.unwrap());
    }
}
