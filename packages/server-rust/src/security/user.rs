//! The identity attached to an authenticated session.

use serde::{Deserialize, Serialize};

/// A logged-in user and the roles granted to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebUser {
    pub username: String,
    pub roles: Vec<String>,
}

impl WebUser {
    /// A user with no roles.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            roles: Vec::new(),
        }
    }

    /// Grants `role`. Granting a role twice has no effect.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        let role = role.into();
        if !self.has_role(&role) {
            self.roles.push(role);
        }
        self
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_deduplicated() {
        let user = WebUser::new("teo").with_role("admin").with_role("admin");
        assert_eq!(user.roles, vec!["admin".to_string()]);
        assert!(user.has_role("admin"));
        assert!(!user.has_role("auditor"));
    }

    #[test]
    fn serializes_as_plain_object() {
        let json = serde_json::to_value(WebUser::new("teo").with_role("user")).unwrap();
        assert_eq!(json, serde_json::json!({"username": "teo", "roles": ["user"]}));
    }
}
