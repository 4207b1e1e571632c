//! Operation registry and dispatch.
//!
//! Operations ([`ServiceOperation`]) are grouped into named modules
//! ([`ServiceModule`]); the [`ServiceDispatcher`] routes a `(module, op)`
//! pair to the right module. The [`worker`] submodule hosts the background
//! worker that keeps the session table tidy.

pub mod dispatcher;
pub mod module;
pub mod operation;
pub mod worker;

pub use dispatcher::ServiceDispatcher;
pub use module::ServiceModule;
pub use operation::{FnOperation, OperationRequest, RegistryError, ServiceOperation, UploadedFile};
pub use worker::{BackgroundRunnable, BackgroundWorker, SessionSweeper};

/// Empty or whitespace-only names are treated as absent.
pub(crate) fn is_blank(name: &str) -> bool {
    name.trim().is_empty()
}
