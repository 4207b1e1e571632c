//! Transparent re-authentication for session-bound calls.
//!
//! When an authenticated call comes back with 401, the engine asks its
//! [`AuthenticationParamsProvider`] for credentials, logs in again, and
//! replays the call exactly once.

use async_trait::async_trait;
use opcall_core::protocol::{PASSWORD_PARAM, USERNAME_PARAM};
use opcall_core::Params;
use tracing::{error, info};

use crate::engine::{Call, CallEngine, InFlightGuard};
use crate::error::ClientError;

/// Supplies the login parameters used to renew an expired session.
#[async_trait]
pub trait AuthenticationParamsProvider: Send + Sync {
    /// Parameters posted to the login endpoint.
    ///
    /// # Errors
    ///
    /// Any error aborts re-authentication with
    /// [`ClientError::ReAuthentication`].
    async fn authentication_params(&self) -> anyhow::Result<Params>;
}

/// Fixed username and password sent as `tfUsername` and `tfPassword`.
#[derive(Clone)]
pub struct StaticCredentials {
    username: String,
    password: String,
}

impl StaticCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl AuthenticationParamsProvider for StaticCredentials {
    async fn authentication_params(&self) -> anyhow::Result<Params> {
        Ok(Params::new()
            .with(USERNAME_PARAM, self.username.as_str())
            .with(PASSWORD_PARAM, self.password.as_str()))
    }
}

impl CallEngine {
    /// Runs `call`, and on 401 re-authenticates and runs it once more.
    pub(crate) async fn execute_with_reauth(
        &self,
        guard: &InFlightGuard<'_>,
        call: &Call<'_>,
    ) -> Result<String, ClientError> {
        match self.execute_call(guard, call).await {
            Err(ClientError::AuthorizationRequired) => {
                info!("session rejected, re-authenticating");
                self.reauthenticate(guard).await?;
                self.execute_call(guard, call).await
            }
            other => other,
        }
    }

    async fn reauthenticate(&self, guard: &InFlightGuard<'_>) -> Result<(), ClientError> {
        let Some(provider) = self.auth_provider.as_ref() else {
            return Err(ClientError::ReAuthentication {
                reason: "no authentication provider configured".to_string(),
            });
        };

        let params = provider.authentication_params().await.map_err(|e| {
            error!(error = %e, "authentication provider failed");
            ClientError::ReAuthentication {
                reason: format!("authentication provider failed: {e}"),
            }
        })?;

        match self.login(guard, &params).await {
            Ok(true) => {
                info!("re-authenticated");
                Ok(())
            }
            Ok(false) => Err(ClientError::ReAuthentication {
                reason: "login was not accepted".to_string(),
            }),
            Err(ClientError::RequestCancelled) => Err(ClientError::RequestCancelled),
            Err(e) => {
                error!(error = %e, "re-authentication failed");
                Err(ClientError::ReAuthentication {
                    reason: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::header::COOKIE;

    use super::*;
    use crate::config::ClientConfig;
    use crate::test_support::{Reply, ScriptedTransport};

    struct FailingProvider;

    #[async_trait]
    impl AuthenticationParamsProvider for FailingProvider {
        async fn authentication_params(&self) -> anyhow::Result<Params> {
            anyhow::bail!("keychain locked")
        }
    }

    fn engine(
        transport: &Arc<ScriptedTransport>,
        provider: Option<Arc<dyn AuthenticationParamsProvider>>,
    ) -> Arc<CallEngine> {
        let engine =
            CallEngine::with_transport(ClientConfig::new("http://server.test"), transport.clone());
        Arc::new(match provider {
            Some(p) => engine.with_auth_provider(p),
            None => engine,
        })
    }

    fn creds() -> Option<Arc<dyn AuthenticationParamsProvider>> {
        Some(Arc::new(StaticCredentials::new("teo", "secret")))
    }

    #[tokio::test]
    async fn expired_session_is_renewed_and_call_replayed() {
        let transport = ScriptedTransport::new([
            Reply::status(401, ""),
            Reply::status(200, "").with_header("set-cookie", "opcall_session=fresh; Path=/"),
            Reply::ok("[\"ana\"]"),
        ]);
        let engine = engine(&transport, creds());

        let body = engine
            .call_authenticated("users", "op-list-users", &Params::new())
            .await
            .unwrap();
        assert_eq!(body, "[\"ana\"]");

        let sent = transport.requests();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].url, "http://server.test/aws");
        assert_eq!(sent[1].url, "http://server.test/login");
        assert_eq!(
            sent[1].body_text(),
            "tfUsername=teo&tfPassword=secret&only-send-http-response=true"
        );
        assert_eq!(sent[2].body_text(), sent[0].body_text());
        assert_eq!(sent[2].header(COOKIE).as_deref(), Some("opcall_session=fresh"));
    }

    #[tokio::test]
    async fn second_rejection_is_not_retried() {
        let transport = ScriptedTransport::new([
            Reply::status(401, ""),
            Reply::status(200, ""),
            Reply::status(401, ""),
        ]);
        let engine = engine(&transport, creds());
        assert!(matches!(
            engine.call_authenticated("m", "op", &Params::new()).await,
            Err(ClientError::AuthorizationRequired)
        ));
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn missing_provider_fails_reauthentication() {
        let transport = ScriptedTransport::new([Reply::status(401, "")]);
        let engine = engine(&transport, None);
        assert!(matches!(
            engine.call_authenticated("m", "op", &Params::new()).await,
            Err(ClientError::ReAuthentication { .. })
        ));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn provider_error_fails_reauthentication() {
        let transport = ScriptedTransport::new([Reply::status(401, "")]);
        let engine = engine(&transport, Some(Arc::new(FailingProvider)));
        match engine.call_authenticated("m", "op", &Params::new()).await {
            Err(ClientError::ReAuthentication { reason }) => {
                assert!(reason.contains("keychain locked"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejected_login_fails_reauthentication() {
        for login_status in [401, 500] {
            let transport = ScriptedTransport::new([
                Reply::status(401, ""),
                Reply::status(login_status, ""),
            ]);
            let engine = engine(&transport, creds());
            assert!(matches!(
                engine.call_authenticated("m", "op", &Params::new()).await,
                Err(ClientError::ReAuthentication { .. })
            ));
            assert_eq!(transport.requests().len(), 2);
        }
    }

    #[tokio::test]
    async fn public_calls_never_reauthenticate() {
        let transport = ScriptedTransport::new([Reply::status(401, "")]);
        let engine = engine(&transport, creds());
        assert!(matches!(
            engine.call_public("m", "op", &Params::new()).await,
            Err(ClientError::AuthorizationRequired)
        ));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn cancel_during_login_is_a_cancellation() {
        let transport = ScriptedTransport::new([Reply::status(401, ""), Reply::Hang]);
        let engine = engine(&transport, creds());
        let running = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.call_authenticated("m", "op", &Params::new()).await })
        };
        transport.wait_for_requests(2).await;
        engine.cancel_current_request().unwrap();
        assert!(matches!(
            running.await.unwrap(),
            Err(ClientError::RequestCancelled)
        ));
        assert!(!engine.is_busy());
    }

    #[test]
    fn debug_redacts_password() {
        let text = format!("{:?}", StaticCredentials::new("teo", "hunter2"));
        assert!(text.contains("teo"));
        assert!(!text.contains("hunter2"));
    }
}
