//! Network configuration for the dispatch server.

use std::path::PathBuf;
use std::time::Duration;

use opcall_core::protocol::{
    DEFAULT_AUTHENTICATED_PATH, DEFAULT_LOGIN_PATH, DEFAULT_LOGOUT_PATH, DEFAULT_PUBLIC_PATH,
};

/// Default name of the session cookie.
pub const DEFAULT_SESSION_COOKIE: &str = "opcall_session";

/// Top-level network configuration for the server.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Bind address for the server.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,
    /// Maximum time to wait for a request to complete.
    pub request_timeout: Duration,
    /// Endpoint dispatching calls without a session.
    pub public_path: String,
    /// Endpoint dispatching calls that need a session.
    pub authenticated_path: String,
    /// Credential exchange endpoint.
    pub login_path: String,
    /// Session teardown endpoint.
    pub logout_path: String,
    /// Cookie carrying the session token.
    pub session_cookie_name: String,
    /// Sessions unused for longer than this are dropped.
    pub session_idle_timeout: Duration,
    /// How often idle sessions are purged.
    pub session_sweep_interval: Duration,
    /// Largest accepted request body, multipart uploads included.
    pub max_upload_bytes: usize,
    /// How long shutdown waits for in-flight calls.
    pub drain_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            tls: None,
            cors_origins: vec!["*".to_string()],
            request_timeout: Duration::from_secs(30),
            public_path: DEFAULT_PUBLIC_PATH.to_string(),
            authenticated_path: DEFAULT_AUTHENTICATED_PATH.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            logout_path: DEFAULT_LOGOUT_PATH.to_string(),
            session_cookie_name: DEFAULT_SESSION_COOKIE.to_string(),
            session_idle_timeout: Duration::from_secs(30 * 60),
            session_sweep_interval: Duration::from_secs(60),
            max_upload_bytes: 16 * 1024 * 1024,
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// TLS certificate configuration.
///
/// No `Default` impl because certificate paths have no sensible defaults.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// PEM certificate chain.
    pub cert_path: PathBuf,
    /// PEM private key.
    pub key_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_config_defaults() {
        let config = NetworkConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 0);
        assert!(config.tls.is_none());
        assert_eq!(config.cors_origins, vec!["*"]);
        assert_eq!(config.public_path, "/pws");
        assert_eq!(config.authenticated_path, "/aws");
        assert_eq!(config.login_path, "/login");
        assert_eq!(config.logout_path, "/logout");
        assert_eq!(config.session_cookie_name, "opcall_session");
        assert_eq!(config.session_idle_timeout, Duration::from_secs(1800));
        assert_eq!(config.max_upload_bytes, 16 * 1024 * 1024);
    }

    #[test]
    fn paths_can_be_overridden() {
        let config = NetworkConfig {
            public_path: "/api/public".into(),
            ..NetworkConfig::default()
        };
        assert_eq!(config.public_path, "/api/public");
        assert_eq!(config.authenticated_path, "/aws");
    }
}
