//! Module-name routing for incoming operation calls.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use opcall_core::{DispatchResult, Params};
use parking_lot::Mutex;
use tracing::{debug, info, info_span, Instrument};

use super::is_blank;
use super::module::ServiceModule;
use super::operation::{OperationRequest, RegistryError, ServiceOperation};

type ModuleTable = HashMap<String, Arc<ServiceModule>>;

// ---------------------------------------------------------------------------
// ServiceDispatcher
// ---------------------------------------------------------------------------

/// Routes `(module, op)` calls to registered [`ServiceModule`]s.
///
/// Readers load an immutable snapshot of the module table, so dispatch never
/// blocks on registration. Writers serialize on a mutex, copy the current
/// table, apply their change and publish the new snapshot.
pub struct ServiceDispatcher {
    name: String,
    modules: ArcSwap<ModuleTable>,
    write_lock: Mutex<()>,
}

impl ServiceDispatcher {
    /// Creates a dispatcher with no modules. `name` prefixes log lines and
    /// error messages.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modules: ArcSwap::from_pointee(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publishes `module` under its own name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::BlankName`] for a blank module name and
    /// [`RegistryError::DuplicateModule`] if the name is already registered.
    pub fn add_module(&self, module: ServiceModule) -> Result<(), RegistryError> {
        if is_blank(module.name()) {
            return Err(RegistryError::BlankName { kind: "module" });
        }
        let _guard = self.write_lock.lock();
        let current = self.modules.load();
        if current.contains_key(module.name()) {
            return Err(RegistryError::DuplicateModule {
                name: module.name().to_string(),
            });
        }
        let mut next = ModuleTable::clone(&current);
        info!(
            dispatcher = %self.name,
            module = %module.name(),
            operations = module.len(),
            "module registered"
        );
        next.insert(module.name().to_string(), Arc::new(module));
        self.modules.store(Arc::new(next));
        Ok(())
    }

    /// Unpublishes a module, returning it if it was registered.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::BlankName`] if `name` is blank.
    pub fn remove_module(&self, name: &str) -> Result<Option<Arc<ServiceModule>>, RegistryError> {
        if is_blank(name) {
            return Err(RegistryError::BlankName { kind: "module" });
        }
        let _guard = self.write_lock.lock();
        let current = self.modules.load();
        if !current.contains_key(name) {
            return Ok(None);
        }
        let mut next = ModuleTable::clone(&current);
        let removed = next.remove(name);
        self.modules.store(Arc::new(next));
        info!(dispatcher = %self.name, module = name, "module removed");
        Ok(removed)
    }

    /// Every registered module, in no particular order.
    #[must_use]
    pub fn modules(&self) -> Vec<Arc<ServiceModule>> {
        self.modules.load().values().cloned().collect()
    }

    /// Registered module names, sorted.
    #[must_use]
    pub fn module_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.load().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn find_module(&self, name: &str) -> Option<Arc<ServiceModule>> {
        self.modules.load().get(name).cloned()
    }

    /// Resolves an operation without running it.
    #[must_use]
    pub fn find_operation(&self, module: &str, op: &str) -> Option<Arc<dyn ServiceOperation>> {
        self.find_module(module)?.operation(op)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.load().is_empty()
    }

    /// Routes a parameter-only call.
    pub async fn dispatch(&self, module: &str, op: &str, params: Params) -> DispatchResult {
        self.dispatch_request(module, op, OperationRequest::new(params))
            .await
    }

    /// Routes a call to `module` and runs `op` there.
    ///
    /// Routing failures are reported in the dispatch status; anything that
    /// happens inside the module is carried by the nested execution result.
    pub async fn dispatch_request(
        &self,
        module: &str,
        op: &str,
        request: OperationRequest,
    ) -> DispatchResult {
        let span = info_span!("dispatch", dispatcher = %self.name, module, op);
        async {
            if is_blank(module) {
                debug!("module name is blank");
                return DispatchResult::module_name_blank();
            }
            let Some(target) = self.find_module(module) else {
                debug!("module not found");
                return DispatchResult::module_not_found();
            };
            let result = target.execute_operation(op, &request).await;
            debug!(status = result.status().as_str(), "operation finished");
            DispatchResult::success(result)
        }
        .instrument(span)
        .await
    }
}

impl std::fmt::Debug for ServiceDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDispatcher")
            .field("name", &self.name)
            .field("modules", &self.module_names())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use opcall_core::{
        DispatchStatus, ExecutionResult, ExecutionStatus, OperationValue, ParamDescriptor,
    };

    use super::*;
    use crate::service::FnOperation;

    fn users_module() -> ServiceModule {
        ServiceModule::new("users")
            .with_operation(
                FnOperation::new("op-add-user", |req| {
                    let username = req.params.get("username")?;
                    Some(OperationValue::raw(format!("{{\"added\":\"{username}\"}}")))
                })
                .with_parameters([
                    ParamDescriptor::mandatory("username"),
                    ParamDescriptor::mandatory("password"),
                ]),
            )
            .unwrap()
    }

    fn dispatcher() -> ServiceDispatcher {
        let dispatcher = ServiceDispatcher::new("test");
        dispatcher.add_module(users_module()).unwrap();
        dispatcher
    }

    fn nested(result: &DispatchResult) -> ExecutionStatus {
        result.result().map(ExecutionResult::status).unwrap()
    }

    #[test]
    fn add_and_remove_modules() {
        let dispatcher = ServiceDispatcher::new("test");
        assert!(dispatcher.is_empty());
        dispatcher.add_module(users_module()).unwrap();
        dispatcher.add_module(ServiceModule::new("files")).unwrap();
        assert_eq!(dispatcher.module_names(), vec!["files", "users"]);
        assert_eq!(dispatcher.modules().len(), 2);

        let removed = dispatcher.remove_module("users").unwrap().unwrap();
        assert_eq!(removed.name(), "users");
        assert_eq!(dispatcher.len(), 1);
        assert!(dispatcher.find_module("users").is_none());
    }

    #[test]
    fn duplicate_module_is_rejected() {
        let dispatcher = dispatcher();
        let err = dispatcher.add_module(ServiceModule::new("users")).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateModule { name: "users".into() });
        assert_eq!(dispatcher.len(), 1);
    }

    #[test]
    fn blank_names_are_rejected() {
        let dispatcher = dispatcher();
        assert!(matches!(
            dispatcher.add_module(ServiceModule::new(" ")),
            Err(RegistryError::BlankName { kind: "module" })
        ));
        assert!(matches!(
            dispatcher.remove_module(""),
            Err(RegistryError::BlankName { .. })
        ));
    }

    #[test]
    fn removing_unknown_module_is_not_an_error() {
        let dispatcher = dispatcher();
        assert!(dispatcher.remove_module("nope").unwrap().is_none());
        assert_eq!(dispatcher.len(), 1);
    }

    #[test]
    fn find_operation_resolves_through_module() {
        let dispatcher = dispatcher();
        assert!(dispatcher.find_operation("users", "op-add-user").is_some());
        assert!(dispatcher.find_operation("users", "op-nope").is_none());
        assert!(dispatcher.find_operation("nope", "op-add-user").is_none());
    }

    #[tokio::test]
    async fn blank_module_name() {
        let result = dispatcher().dispatch("", "op-add-user", Params::new()).await;
        assert_eq!(result.status(), DispatchStatus::ModuleNameBlank);
        assert!(result.result().is_none());
    }

    #[tokio::test]
    async fn unknown_module() {
        let result = dispatcher().dispatch("unknown", "op", Params::new()).await;
        assert_eq!(result.status(), DispatchStatus::ModuleNotFound);
        assert!(result.result().is_none());
    }

    #[tokio::test]
    async fn missing_parameters_dispatch_but_are_invalid() {
        let result = dispatcher().dispatch("users", "op-add-user", Params::new()).await;
        assert_eq!(result.status(), DispatchStatus::DispatchSuccess);
        assert_eq!(nested(&result), ExecutionStatus::Invalid);
    }

    #[tokio::test]
    async fn unknown_operation_is_nested() {
        let result = dispatcher().dispatch("users", "op-nope", Params::new()).await;
        assert_eq!(result.status(), DispatchStatus::DispatchSuccess);
        assert_eq!(nested(&result), ExecutionStatus::OperationNotFound);
    }

    #[tokio::test]
    async fn blank_operation_is_nested() {
        let result = dispatcher().dispatch("users", "  ", Params::new()).await;
        assert_eq!(nested(&result), ExecutionStatus::OperationNameBlank);
    }

    #[tokio::test]
    async fn valid_call_carries_value() {
        let params = Params::new().with("username", "teo").with("password", "pwd");
        let result = dispatcher().dispatch("users", "op-add-user", params).await;
        let execution = result.into_result().unwrap();
        assert_eq!(execution.status(), ExecutionStatus::Valid);
        assert_eq!(execution.value().unwrap().body(), "{\"added\":\"teo\"}");
    }

    #[tokio::test]
    async fn snapshot_survives_concurrent_removal() {
        let dispatcher = Arc::new(dispatcher());
        let held = dispatcher.find_module("users").unwrap();
        dispatcher.remove_module("users").unwrap();
        let result = held
            .execute_operation("op-add-user", &OperationRequest::default())
            .await;
        assert_eq!(result.status(), ExecutionStatus::Invalid);
    }
}
