//! `opcall` Server — module/operation dispatch table behind an axum HTTP
//! surface with cookie sessions.

pub mod network;
pub mod security;
pub mod service;
pub mod traits;

pub use network::{NetworkConfig, NetworkModule};
pub use security::{InMemoryCredentials, SessionStore, WebUser};
pub use service::{
    FnOperation, OperationRequest, ServiceDispatcher, ServiceModule, ServiceOperation,
};
pub use traits::CredentialVerifier;
