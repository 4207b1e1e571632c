//! Execution and dispatch outcomes.
//!
//! Both result types are one-shot values built per call. Constructors enforce
//! that a payload is only carried by the success status.

use serde::Serialize;

/// Opaque body produced by a successful operation.
///
/// Bodies are UTF-8 text (typically JSON). The helpers build the envelope
/// shapes clients expect: `{"success":true,"object":..}`,
/// `{"success":true,"list":[..]}` and the error envelope
/// `{"success":false,"errorMessage":".."}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationValue {
    body: String,
}

impl OperationValue {
    /// Wraps an already-encoded body.
    pub fn raw(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    /// Encodes a single object inside a success envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if `object` cannot be serialized to JSON.
    pub fn object<T: Serialize>(object: &T) -> serde_json::Result<Self> {
        let body = serde_json::to_string(&serde_json::json!({
            "success": true,
            "object": serde_json::to_value(object)?,
        }))?;
        Ok(Self { body })
    }

    /// Encodes a list inside a success envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if any element cannot be serialized to JSON.
    pub fn list<T: Serialize>(items: &[T]) -> serde_json::Result<Self> {
        let body = serde_json::to_string(&serde_json::json!({
            "success": true,
            "list": serde_json::to_value(items)?,
        }))?;
        Ok(Self { body })
    }

    /// Builds the error envelope with the given message.
    #[must_use]
    pub fn error(message: &str) -> Self {
        let body = serde_json::json!({
            "success": false,
            "errorMessage": message,
        })
        .to_string();
        Self { body }
    }

    /// The encoded body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Consumes the value, returning the encoded body.
    #[must_use]
    pub fn into_body(self) -> String {
        self.body
    }

    /// Whether the body is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ExecutionResult
// ---------------------------------------------------------------------------

/// Outcome of executing one operation inside a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionStatus {
    /// The operation ran and produced a value.
    Valid,
    /// The operation name was empty or whitespace.
    OperationNameBlank,
    /// No operation with that name is registered in the module.
    OperationNotFound,
    /// The operation ran but rejected the request (e.g. missing parameter).
    Invalid,
}

impl ExecutionStatus {
    /// Stable lowercase label used in logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::OperationNameBlank => "operation_name_blank",
            Self::OperationNotFound => "operation_not_found",
            Self::Invalid => "invalid",
        }
    }
}

/// Result of [`ExecutionStatus`] plus the value when valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    status: ExecutionStatus,
    value: Option<OperationValue>,
}

impl ExecutionResult {
    /// A successful execution carrying `value`.
    #[must_use]
    pub fn valid(value: OperationValue) -> Self {
        Self {
            status: ExecutionStatus::Valid,
            value: Some(value),
        }
    }

    /// The operation name was blank.
    #[must_use]
    pub fn operation_name_blank() -> Self {
        Self::without_value(ExecutionStatus::OperationNameBlank)
    }

    /// The operation was not found.
    #[must_use]
    pub fn operation_not_found() -> Self {
        Self::without_value(ExecutionStatus::OperationNotFound)
    }

    /// The operation rejected the request.
    #[must_use]
    pub fn invalid() -> Self {
        Self::without_value(ExecutionStatus::Invalid)
    }

    fn without_value(status: ExecutionStatus) -> Self {
        Self {
            status,
            value: None,
        }
    }

    /// The execution status.
    #[must_use]
    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    /// The produced value; `Some` only when the status is `Valid`.
    #[must_use]
    pub fn value(&self) -> Option<&OperationValue> {
        self.value.as_ref()
    }

    /// Consumes the result, returning the value if any.
    #[must_use]
    pub fn into_value(self) -> Option<OperationValue> {
        self.value
    }
}

// ---------------------------------------------------------------------------
// DispatchResult
// ---------------------------------------------------------------------------

/// Outcome of routing a request to a module.
///
/// `DispatchSuccess` only means routing succeeded; operation-level failures
/// are carried in the nested [`ExecutionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchStatus {
    /// The module was found and the operation lookup ran.
    DispatchSuccess,
    /// No module with that name is registered.
    ModuleNotFound,
    /// The module name was empty or whitespace.
    ModuleNameBlank,
    /// Reserved for transports that resolve operations before dispatch.
    OperationNotFound,
}

impl DispatchStatus {
    /// Stable lowercase label used in logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DispatchSuccess => "dispatch_success",
            Self::ModuleNotFound => "module_not_found",
            Self::ModuleNameBlank => "module_name_blank",
            Self::OperationNotFound => "operation_not_found",
        }
    }
}

/// Routing status plus the nested execution result on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    status: DispatchStatus,
    result: Option<ExecutionResult>,
}

impl DispatchResult {
    /// Routing succeeded; wraps the module's execution result.
    #[must_use]
    pub fn success(result: ExecutionResult) -> Self {
        Self {
            status: DispatchStatus::DispatchSuccess,
            result: Some(result),
        }
    }

    /// The module name was blank.
    #[must_use]
    pub fn module_name_blank() -> Self {
        Self::failed(DispatchStatus::ModuleNameBlank)
    }

    /// The module was not found.
    #[must_use]
    pub fn module_not_found() -> Self {
        Self::failed(DispatchStatus::ModuleNotFound)
    }

    /// The operation could not be resolved before dispatch.
    #[must_use]
    pub fn operation_not_found() -> Self {
        Self::failed(DispatchStatus::OperationNotFound)
    }

    fn failed(status: DispatchStatus) -> Self {
        Self {
            status,
            result: None,
        }
    }

    /// The routing status.
    #[must_use]
    pub fn status(&self) -> DispatchStatus {
        self.status
    }

    /// The nested execution result; `Some` only on `DispatchSuccess`.
    #[must_use]
    pub fn result(&self) -> Option<&ExecutionResult> {
        self.result.as_ref()
    }

    /// Consumes the dispatch result, returning the nested execution result.
    #[must_use]
    pub fn into_result(self) -> Option<ExecutionResult> {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct User {
        username: String,
    }

    #[test]
    fn value_only_on_valid() {
        let ok = ExecutionResult::valid(OperationValue::raw("{}"));
        assert_eq!(ok.status(), ExecutionStatus::Valid);
        assert!(ok.value().is_some());

        for rejected in [
            ExecutionResult::invalid(),
            ExecutionResult::operation_not_found(),
            ExecutionResult::operation_name_blank(),
        ] {
            assert!(rejected.value().is_none());
        }
    }

    #[test]
    fn nested_result_only_on_success() {
        let dispatched = DispatchResult::success(ExecutionResult::operation_not_found());
        assert_eq!(dispatched.status(), DispatchStatus::DispatchSuccess);
        assert_eq!(
            dispatched.result().map(ExecutionResult::status),
            Some(ExecutionStatus::OperationNotFound)
        );

        assert!(DispatchResult::module_not_found().result().is_none());
        assert!(DispatchResult::module_name_blank().result().is_none());
    }

    #[test]
    fn object_envelope() {
        let value = OperationValue::object(&User {
            username: "teo".into(),
        })
        .unwrap();
        let json: serde_json::Value = serde_json::from_str(value.body()).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["object"]["username"], "teo");
    }

    #[test]
    fn list_envelope() {
        let value = OperationValue::list(&["a", "b"]).unwrap();
        let json: serde_json::Value = serde_json::from_str(value.body()).unwrap();
        assert_eq!(json["list"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn error_envelope_escapes_message() {
        let value = OperationValue::error("bad \"input\"");
        let json: serde_json::Value = serde_json::from_str(value.body()).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["errorMessage"], "bad \"input\"");
    }
}
