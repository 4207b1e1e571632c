//! The public and authenticated dispatch endpoints.
//!
//! Both accept a form-encoded or multipart POST. `module` and `op` are taken
//! from the query string first and the body second; every other field
//! becomes an operation parameter in wire order.

use axum::extract::{FromRequest, Multipart, Query, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Form;
use opcall_core::protocol::{JSON_CONTENT_TYPE, MODULE_PARAM, OPERATION_PARAM, UPLOAD_FIELD};
use opcall_core::{DispatchResult, DispatchStatus, ExecutionStatus, OperationValue, Params};
use tracing::{debug, warn};

use super::AppState;
use crate::network::auth::SessionUser;
use crate::security::WebUser;
use crate::service::{OperationRequest, UploadedFile};

type Fields = Vec<(String, String)>;

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `POST {public_path}`: dispatch without a session.
pub async fn public_dispatch_handler(State(state): State<AppState>, request: Request) -> Response {
    let _in_flight = state.shutdown.in_flight_guard();
    match IncomingCall::extract(request, &state).await {
        Ok(call) => run_call(&state, call, None).await,
        Err(rejection) => rejection,
    }
}

/// `POST {authenticated_path}`: dispatch on behalf of the session user.
pub async fn authenticated_dispatch_handler(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
    request: Request,
) -> Response {
    let _in_flight = state.shutdown.in_flight_guard();
    match IncomingCall::extract(request, &state).await {
        Ok(call) => run_call(&state, call, Some(user)).await,
        Err(rejection) => rejection,
    }
}

// ---------------------------------------------------------------------------
// Request decoding
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct IncomingCall {
    module: String,
    operation: String,
    params: Params,
    upload: Option<UploadedFile>,
}

impl IncomingCall {
    async fn extract(request: Request, state: &AppState) -> Result<Self, Response> {
        let Query(query) = Query::<Fields>::try_from_uri(request.uri())
            .map_err(IntoResponse::into_response)?;

        let is_multipart = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        let (body, upload) = if is_multipart {
            let multipart = Multipart::from_request(request, state)
                .await
                .map_err(IntoResponse::into_response)?;
            read_multipart(multipart).await?
        } else {
            let Form(fields) = Form::<Fields>::from_request(request, state)
                .await
                .map_err(IntoResponse::into_response)?;
            (fields, None)
        };

        Ok(Self::from_fields(query, body, upload))
    }

    fn from_fields(query: Fields, body: Fields, upload: Option<UploadedFile>) -> Self {
        let all: Params = query.into_iter().chain(body).collect();
        let module = all.get(MODULE_PARAM).unwrap_or_default().to_string();
        let operation = all.get(OPERATION_PARAM).unwrap_or_default().to_string();
        let params = all.without(MODULE_PARAM).without(OPERATION_PARAM);
        Self {
            module,
            operation,
            params,
            upload,
        }
    }
}

async fn read_multipart(
    mut multipart: Multipart,
) -> Result<(Fields, Option<UploadedFile>), Response> {
    let mut fields = Fields::new();
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(IntoResponse::into_response)?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == UPLOAD_FIELD {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await.map_err(IntoResponse::into_response)?;
            debug!(file_name = ?file_name, size = data.len(), "upload received");
            upload = Some(UploadedFile {
                file_name,
                content_type,
                data,
            });
        } else {
            let value = field.text().await.map_err(IntoResponse::into_response)?;
            fields.push((name, value));
        }
    }
    Ok((fields, upload))
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

async fn run_call(state: &AppState, call: IncomingCall, user: Option<WebUser>) -> Response {
    if let Some(operation) = state.dispatcher.find_operation(&call.module, &call.operation) {
        if let Some(role) = operation.required_role() {
            if !user.as_ref().is_some_and(|u| u.has_role(role)) {
                warn!(
                    module = %call.module,
                    op = %call.operation,
                    role,
                    user = user.as_ref().map(|u| u.username.as_str()),
                    "caller lacks required role"
                );
                return (
                    StatusCode::FORBIDDEN,
                    format!("operation '{}' requires role '{role}'", call.operation),
                )
                    .into_response();
            }
        }
    }

    let request = OperationRequest {
        params: call.params,
        upload: call.upload,
        user,
    };
    let result = state
        .dispatcher
        .dispatch_request(&call.module, &call.operation, request)
        .await;

    let outcome = result
        .result()
        .map_or(result.status().as_str(), |r| r.status().as_str());
    metrics::counter!("opcall_dispatch_total", "outcome" => outcome).increment(1);

    dispatch_response(state.dispatcher.name(), &call.module, &call.operation, result)
}

/// Maps a dispatch result to the HTTP response sent to the caller.
#[must_use]
pub fn dispatch_response(
    dispatcher: &str,
    module: &str,
    op: &str,
    result: DispatchResult,
) -> Response {
    match result.status() {
        DispatchStatus::ModuleNameBlank => precondition_failed(format!(
            "[{dispatcher}]: please specify the '{MODULE_PARAM}' request parameter"
        )),
        DispatchStatus::ModuleNotFound => {
            precondition_failed(format!("[{dispatcher}]: module '{module}' not found"))
        }
        DispatchStatus::OperationNotFound => not_implemented(dispatcher, module, op),
        DispatchStatus::DispatchSuccess => {
            let Some(execution) = result.into_result() else {
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            };
            match execution.status() {
                ExecutionStatus::OperationNameBlank => precondition_failed(format!(
                    "[{module}]: please specify the '{OPERATION_PARAM}' request parameter"
                )),
                ExecutionStatus::OperationNotFound => not_implemented(dispatcher, module, op),
                ExecutionStatus::Invalid => precondition_failed(format!(
                    "[{module}]: invalid parameters for operation '{op}'"
                )),
                ExecutionStatus::Valid => {
                    let value = execution
                        .into_value()
                        .filter(|v| !v.is_empty())
                        .unwrap_or_else(|| {
                            OperationValue::error(&format!("operation '{op}' produced no result"))
                        });
                    (
                        StatusCode::OK,
                        [(CONTENT_TYPE, JSON_CONTENT_TYPE)],
                        value.into_body(),
                    )
                        .into_response()
                }
            }
        }
    }
}

fn precondition_failed(message: String) -> Response {
    debug!(%message, "rejecting call");
    (StatusCode::PRECONDITION_FAILED, message).into_response()
}

fn not_implemented(dispatcher: &str, module: &str, op: &str) -> Response {
    (
        StatusCode::NOT_IMPLEMENTED,
        format!("[{dispatcher}]: operation '{op}' is not implemented by module '{module}'"),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use opcall_core::ExecutionResult;

    use super::*;

    fn status_of(result: DispatchResult) -> StatusCode {
        dispatch_response("test", "users", "op-add-user", result).status()
    }

    #[test]
    fn routing_failures_are_precondition_failed() {
        assert_eq!(
            status_of(DispatchResult::module_name_blank()),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            status_of(DispatchResult::module_not_found()),
            StatusCode::PRECONDITION_FAILED
        );
    }

    #[test]
    fn execution_failures_map_per_status() {
        assert_eq!(
            status_of(DispatchResult::success(ExecutionResult::operation_name_blank())),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            status_of(DispatchResult::success(ExecutionResult::invalid())),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            status_of(DispatchResult::success(ExecutionResult::operation_not_found())),
            StatusCode::NOT_IMPLEMENTED
        );
        assert_eq!(
            status_of(DispatchResult::operation_not_found()),
            StatusCode::NOT_IMPLEMENTED
        );
    }

    #[test]
    fn valid_result_is_json() {
        let response = dispatch_response(
            "test",
            "users",
            "op-add-user",
            DispatchResult::success(ExecutionResult::valid(OperationValue::raw("{}"))),
        );
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            JSON_CONTENT_TYPE
        );
    }

    #[tokio::test]
    async fn empty_value_becomes_error_envelope() {
        let response = dispatch_response(
            "test",
            "users",
            "op-add-user",
            DispatchResult::success(ExecutionResult::valid(OperationValue::raw(""))),
        );
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert!(json["errorMessage"].as_str().unwrap().contains("op-add-user"));
    }

    #[test]
    fn query_takes_precedence_over_body() {
        let call = IncomingCall::from_fields(
            vec![("module".into(), "users".into())],
            vec![
                ("module".into(), "files".into()),
                ("op".into(), "op-add-user".into()),
                ("username".into(), "teo".into()),
            ],
            None,
        );
        assert_eq!(call.module, "users");
        assert_eq!(call.operation, "op-add-user");
        assert_eq!(call.params.len(), 1);
        assert_eq!(call.params.get("username"), Some("teo"));
    }

    #[test]
    fn missing_names_are_blank() {
        let call = IncomingCall::from_fields(Vec::new(), Vec::new(), None);
        assert!(call.module.is_empty());
        assert!(call.operation.is_empty());
    }
}
