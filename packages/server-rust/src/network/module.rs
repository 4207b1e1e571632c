//! Server lifecycle with deferred startup.
//!
//! `new()` wires shared state, `start()` binds the listener, and `serve()`
//! accepts connections until the shutdown future resolves. Between `start()`
//! and `serve()` the caller can read the bound port and share the
//! dispatcher or session table with other components.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::{NetworkConfig, TlsConfig};
use super::handlers::{
    authenticated_dispatch_handler, health_handler, liveness_handler, login_handler,
    logout_handler, public_dispatch_handler, readiness_handler, AppState,
};
use super::middleware::build_http_layers;
use super::shutdown::ShutdownController;
use crate::security::SessionStore;
use crate::service::{BackgroundWorker, ServiceDispatcher, SessionSweeper};
use crate::traits::CredentialVerifier;

/// Owns the listener and the state shared by every handler.
pub struct NetworkModule {
    state: AppState,
    listener: Option<TcpListener>,
}

impl NetworkModule {
    /// Creates the module without binding any port.
    #[must_use]
    pub fn new(
        config: NetworkConfig,
        dispatcher: Arc<ServiceDispatcher>,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new(config.session_idle_timeout));
        Self {
            state: AppState {
                dispatcher,
                sessions,
                verifier,
                shutdown: Arc::new(ShutdownController::new()),
                config: Arc::new(config),
                start_time: Instant::now(),
            },
            listener: None,
        }
    }

    #[must_use]
    pub fn dispatcher(&self) -> Arc<ServiceDispatcher> {
        Arc::clone(&self.state.dispatcher)
    }

    #[must_use]
    pub fn sessions(&self) -> Arc<SessionStore> {
        Arc::clone(&self.state.sessions)
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.state.shutdown)
    }

    /// Router with every route and the middleware stack.
    ///
    /// - `POST {public_path}`, `POST {authenticated_path}`: dispatch
    /// - `POST {login_path}`, `POST {logout_path}`: sessions
    /// - `GET /health`, `/health/live`, `/health/ready`: probes
    #[must_use]
    pub fn build_router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Binds the listener and returns the bound port, which differs from
    /// the configured one when the configured port is 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.state.config.host, self.state.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        info!(host = %self.state.config.host, port, "listener bound");
        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves until `shutdown` resolves, then drains in-flight calls.
    ///
    /// The session sweeper runs for the lifetime of the server.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called, if TLS material cannot
    /// be loaded, or if the server hits a fatal I/O error.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let Some(listener) = self.listener else {
            anyhow::bail!("start() must be called before serve()");
        };
        let state = self.state;
        let router = build_router(state.clone());

        let mut sweeper = BackgroundWorker::start(
            SessionSweeper::new(Arc::clone(&state.sessions)),
            state.config.session_sweep_interval,
        );

        state.shutdown.set_ready();
        let served = match &state.config.tls {
            Some(tls) => serve_tls(listener, router, tls, shutdown).await,
            None => serve_plain(listener, router, shutdown).await,
        };

        drain(&state).await;
        sweeper.stop().await;
        served
    }
}

fn build_router(state: AppState) -> Router {
    let config = Arc::clone(&state.config);
    Router::new()
        .route(&config.public_path, post(public_dispatch_handler))
        .route(&config.authenticated_path, post(authenticated_dispatch_handler))
        .route(&config.login_path, post(login_handler))
        .route(&config.logout_path, post(logout_handler))
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(build_http_layers(&config))
        .with_state(state)
}

async fn serve_plain(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    info!("serving plain HTTP");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Reuses the bound listener for `axum-server` with rustls.
async fn serve_tls(
    listener: TcpListener,
    router: Router,
    tls: &TlsConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    use axum_server::tls_rustls::RustlsConfig;

    let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load TLS certificates: {e}"))?;

    let addr = listener.local_addr()?;
    let std_listener = listener.into_std()?;
    let handle = axum_server::Handle::new();
    let trigger = handle.clone();
    tokio::spawn(async move {
        shutdown.await;
        trigger.graceful_shutdown(None);
    });

    info!(%addr, "serving HTTPS");
    axum_server::from_tcp_rustls(std_listener, rustls)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;
    Ok(())
}

async fn drain(state: &AppState) {
    state.shutdown.trigger_shutdown();
    if state.shutdown.wait_for_drain(state.config.drain_timeout).await {
        info!("all in-flight calls drained");
    } else {
        warn!(
            in_flight = state.shutdown.in_flight_count(),
            "drain timeout expired"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
