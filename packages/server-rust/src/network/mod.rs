//! HTTP surface: configuration, middleware, handlers, sessions on the wire,
//! and shutdown control.

pub mod auth;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod module;
pub mod shutdown;

pub use auth::SessionUser;
pub use config::*;
pub use handlers::AppState;
pub use module::NetworkModule;
pub use shutdown::*;
