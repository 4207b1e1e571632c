//! Axum handlers and the state they share.

pub mod dispatch;
pub mod health;
pub mod login;

pub use dispatch::{authenticated_dispatch_handler, dispatch_response, public_dispatch_handler};
pub use health::{health_handler, liveness_handler, readiness_handler};
pub use login::{login_handler, logout_handler};

use std::sync::Arc;
use std::time::Instant;

use super::{NetworkConfig, ShutdownController};
use crate::security::SessionStore;
use crate::service::ServiceDispatcher;
use crate::traits::CredentialVerifier;

/// Shared state handed to every handler through `State`.
///
/// Every field is behind an `Arc`, so cloning per request is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Module table the dispatch endpoints route into.
    pub dispatcher: Arc<ServiceDispatcher>,
    /// Live sessions keyed by cookie token.
    pub sessions: Arc<SessionStore>,
    /// Backend consulted by the login endpoint.
    pub verifier: Arc<dyn CredentialVerifier>,
    /// Health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    pub config: Arc<NetworkConfig>,
    /// Process start, for uptime reporting.
    pub start_time: Instant,
}
