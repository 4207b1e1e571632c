//! Client configuration.

use std::time::Duration;

use opcall_core::protocol::{DEFAULT_AUTHENTICATED_PATH, DEFAULT_LOGIN_PATH, DEFAULT_PUBLIC_PATH};
use reqwest::Url;

use crate::error::ClientError;

/// Where the server lives and how to talk to it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Scheme, host and optional port, e.g. `https://api.example.com`.
    pub host: String,
    /// Path of the session-less dispatch endpoint.
    pub public_path: String,
    /// Path of the session-bound dispatch endpoint, also used for uploads.
    pub authenticated_path: String,
    /// Path of the credential exchange endpoint.
    pub login_path: String,
    /// Accept self-signed or otherwise unverifiable server certificates.
    pub allow_untrusted_https: bool,
    /// Per-request timeout enforced by the transport.
    pub request_timeout: Option<Duration>,
}

impl ClientConfig {
    /// Default paths against `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Resolves `path` against the configured host.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if the result is not a valid URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        let raw = format!("{}{path}", self.host.trim_end_matches('/'));
        Url::parse(&raw).map_err(|e| ClientError::InvalidUrl(format!("{raw}: {e}")))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:8080".to_string(),
            public_path: DEFAULT_PUBLIC_PATH.to_string(),
            authenticated_path: DEFAULT_AUTHENTICATED_PATH.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            allow_untrusted_https: false,
            request_timeout: Some(Duration::from_secs(60)),
        }
    }
}
