//! A named group of operations.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use opcall_core::ExecutionResult;
use tracing::debug;

use super::operation::{OperationRequest, RegistryError, ServiceOperation};
use super::is_blank;

/// Operations registered under one module name.
///
/// Modules are assembled up front and handed to the dispatcher, which
/// publishes them as immutable snapshots. Operation names are unique within a
/// module and never blank.
pub struct ServiceModule {
    name: String,
    operations: HashMap<String, Arc<dyn ServiceOperation>>,
}

impl ServiceModule {
    /// Creates an empty module.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operations: HashMap::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers `operation` under its own name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::BlankName`] if the operation name is blank and
    /// [`RegistryError::DuplicateOperation`] if the name is already taken.
    pub fn add_operation<O>(&mut self, operation: O) -> Result<(), RegistryError>
    where
        O: ServiceOperation + 'static,
    {
        self.add_shared_operation(Arc::new(operation))
    }

    /// Registers an operation that is already shared.
    ///
    /// # Errors
    ///
    /// Same as [`ServiceModule::add_operation`].
    pub fn add_shared_operation(
        &mut self,
        operation: Arc<dyn ServiceOperation>,
    ) -> Result<(), RegistryError> {
        let name = operation.name().to_string();
        if is_blank(&name) {
            return Err(RegistryError::BlankName { kind: "operation" });
        }
        if self.operations.contains_key(&name) {
            return Err(RegistryError::DuplicateOperation {
                module: self.name.clone(),
                name,
            });
        }
        debug!(module = %self.name, operation = %name, "operation registered");
        self.operations.insert(name, operation);
        Ok(())
    }

    /// Builder form of [`ServiceModule::add_operation`].
    ///
    /// # Errors
    ///
    /// Same as [`ServiceModule::add_operation`].
    pub fn with_operation<O>(mut self, operation: O) -> Result<Self, RegistryError>
    where
        O: ServiceOperation + 'static,
    {
        self.add_operation(operation)?;
        Ok(self)
    }

    /// Removes an operation, returning it if it was registered.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::BlankName`] if `name` is blank.
    pub fn remove_operation(
        &mut self,
        name: &str,
    ) -> Result<Option<Arc<dyn ServiceOperation>>, RegistryError> {
        if is_blank(name) {
            return Err(RegistryError::BlankName { kind: "operation" });
        }
        Ok(self.operations.remove(name))
    }

    #[must_use]
    pub fn operation(&self, name: &str) -> Option<Arc<dyn ServiceOperation>> {
        self.operations.get(name).cloned()
    }

    /// Registered operation names, sorted.
    #[must_use]
    pub fn operation_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Looks up `op_name` and runs it.
    ///
    /// Blank names give `OPERATION_NAME_BLANK`, unknown names give
    /// `OPERATION_NOT_FOUND`, and an operation that yields nothing gives
    /// `INVALID`.
    pub async fn execute_operation(
        &self,
        op_name: &str,
        request: &OperationRequest,
    ) -> ExecutionResult {
        if is_blank(op_name) {
            return ExecutionResult::operation_name_blank();
        }
        let Some(operation) = self.operations.get(op_name) else {
            debug!(module = %self.name, operation = op_name, "operation not found");
            return ExecutionResult::operation_not_found();
        };
        match operation.execute(request).await {
            Some(value) => ExecutionResult::valid(value),
            None => ExecutionResult::invalid(),
        }
    }
}

impl fmt::Debug for ServiceModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceModule")
            .field("name", &self.name)
            .field("operations", &self.operation_names())
            .finish()
    }
}
