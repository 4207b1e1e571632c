//! In-memory session table keyed by an opaque cookie token.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use super::user::WebUser;

#[derive(Debug)]
struct SessionEntry {
    user: WebUser,
    last_access: Instant,
}

/// Live sessions with an idle timeout.
///
/// A session expires once it has not been validated for longer than the idle
/// timeout. Expired entries are dropped lazily on lookup and in bulk by
/// [`SessionStore::purge_expired`].
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, SessionEntry>,
    idle_timeout: Duration,
}

impl SessionStore {
    #[must_use]
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout,
        }
    }

    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Opens a session for `user` and returns its token.
    pub fn create(&self, user: WebUser) -> String {
        let token = Uuid::new_v4().simple().to_string();
        debug!(username = %user.username, "session opened");
        self.sessions.insert(
            token.clone(),
            SessionEntry {
                user,
                last_access: Instant::now(),
            },
        );
        token
    }

    /// Returns the session user and refreshes the idle clock, or `None` if
    /// the token is unknown or expired.
    pub fn validate(&self, token: &str) -> Option<WebUser> {
        let now = Instant::now();
        {
            let mut entry = self.sessions.get_mut(token)?;
            if now.duration_since(entry.last_access) <= self.idle_timeout {
                entry.last_access = now;
                return Some(entry.user.clone());
            }
        }
        self.sessions.remove(token);
        debug!("session expired");
        None
    }

    /// Ends a session. Returns whether it existed.
    pub fn invalidate(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Drops all expired sessions, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, entry| now.duration_since(entry.last_access) <= self.idle_timeout);
        before.saturating_sub(self.sessions.len())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
