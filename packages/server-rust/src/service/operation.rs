//! Operation handlers and the request they receive.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use opcall_core::{validate_params, OperationValue, ParamDescriptor, Params, ValidationResult};

use crate::security::WebUser;

/// A file received through a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// File name announced by the client, if any.
    pub file_name: Option<String>,
    /// Content type announced by the client, if any.
    pub content_type: Option<String>,
    /// Raw file contents.
    pub data: Bytes,
}

/// Everything an operation gets to look at when it runs.
#[derive(Debug, Clone, Default)]
pub struct OperationRequest {
    /// Request parameters in wire order, without `module` and `op`.
    pub params: Params,
    /// Uploaded file for multipart calls.
    pub upload: Option<UploadedFile>,
    /// The session user for authenticated calls.
    pub user: Option<WebUser>,
}

impl OperationRequest {
    /// A request carrying only parameters.
    #[must_use]
    pub fn new(params: Params) -> Self {
        Self {
            params,
            upload: None,
            user: None,
        }
    }

    /// Attaches an uploaded file.
    #[must_use]
    pub fn with_upload(mut self, upload: UploadedFile) -> Self {
        self.upload = Some(upload);
        self
    }

    /// Attaches the session user.
    #[must_use]
    pub fn with_user(mut self, user: WebUser) -> Self {
        self.user = Some(user);
        self
    }
}

impl From<Params> for OperationRequest {
    fn from(params: Params) -> Self {
        Self::new(params)
    }
}

/// A named, invokable unit of server logic.
///
/// Returning `None` from [`ServiceOperation::execute`] means the operation
/// rejected the request (for example a mandatory parameter is missing); the
/// module reports that as `INVALID`.
#[async_trait]
pub trait ServiceOperation: Send + Sync {
    /// Name of the operation, unique within its module.
    fn name(&self) -> &str;

    /// Parameters this operation declares.
    fn parameters(&self) -> &[ParamDescriptor] {
        &[]
    }

    /// Role the session user must hold to run this operation.
    fn required_role(&self) -> Option<&str> {
        None
    }

    /// Runs the operation.
    async fn execute(&self, request: &OperationRequest) -> Option<OperationValue>;
}

type Handler = dyn Fn(&OperationRequest) -> Option<OperationValue> + Send + Sync;

/// Operation built from a closure plus declared parameters.
///
/// Declared descriptors are validated before the closure runs; a violation
/// yields `None` without invoking it.
pub struct FnOperation {
    name: String,
    parameters: Vec<ParamDescriptor>,
    required_role: Option<String>,
    handler: Box<Handler>,
}

impl FnOperation {
    /// Creates an operation named `name` that runs `handler`.
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&OperationRequest) -> Option<OperationValue> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            required_role: None,
            handler: Box::new(handler),
        }
    }

    /// Declares one parameter.
    #[must_use]
    pub fn with_parameter(mut self, descriptor: ParamDescriptor) -> Self {
        self.parameters.push(descriptor);
        self
    }

    /// Declares several parameters.
    #[must_use]
    pub fn with_parameters(
        mut self,
        descriptors: impl IntoIterator<Item = ParamDescriptor>,
    ) -> Self {
        self.parameters.extend(descriptors);
        self
    }

    /// Restricts the operation to session users holding `role`.
    #[must_use]
    pub fn requires_role(mut self, role: impl Into<String>) -> Self {
        self.required_role = Some(role.into());
        self
    }
}

impl fmt::Debug for FnOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnOperation")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("required_role", &self.required_role)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ServiceOperation for FnOperation {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> &[ParamDescriptor] {
        &self.parameters
    }

    fn required_role(&self) -> Option<&str> {
        self.required_role.as_deref()
    }

    async fn execute(&self, request: &OperationRequest) -> Option<OperationValue> {
        if let ValidationResult::Invalid { errors } =
            validate_params(&self.parameters, &request.params)
        {
            tracing::debug!(operation = %self.name, ?errors, "request rejected by parameter check");
            return None;
        }
        (self.handler)(request)
    }
}

/// Errors raised while building module and operation registries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("a module named '{name}' is already registered")]
    DuplicateModule { name: String },
    #[error("operation '{name}' is already registered in module '{module}'")]
    DuplicateOperation { module: String, name: String },
    #[error("{kind} name cannot be blank")]
    BlankName { kind: &'static str },
}
