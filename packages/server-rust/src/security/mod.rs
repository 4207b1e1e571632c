//! Session users, the session table and credential checking.

pub mod credentials;
pub mod session;
pub mod user;

pub use credentials::InMemoryCredentials;
pub use session::SessionStore;
pub use user::WebUser;
