//! The HTTP call engine.
//!
//! One [`CallEngine`] performs at most one exchange at a time. Each public
//! call claims the engine through an [`InFlightGuard`]; a second call made
//! while the first is outstanding fails with
//! [`ClientError::ConcurrentRequest`]. The claim is released when the guard
//! drops, on every exit path.

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, COOKIE};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use opcall_core::protocol::{
    FORM_CONTENT_TYPE, MODULE_PARAM, ONLY_SEND_HTTP_RESPONSE_PARAM, OPERATION_PARAM, UPLOAD_FIELD,
};
use opcall_core::{Params, StatusClass};
use parking_lot::Mutex;
use reqwest::Url;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::cookie::{CookieStore, SessionCookie};
use crate::error::ClientError;
use crate::multipart::MultipartForm;
use crate::progress::{ProgressSink, ProgressStream};
use crate::reauth::AuthenticationParamsProvider;
use crate::transport::{
    ByteStream, HttpTransport, ReqwestTransport, TransportBody, TransportRequest, TransportResponse,
};

// ---------------------------------------------------------------------------
// Request state
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum RequestState {
    Idle,
    InFlight { id: u64, token: CancellationToken },
    Cancelling { id: u64 },
}

/// Claim on the engine for the duration of one coordinated call.
///
/// Re-authentication and the retry run under the same guard, so cancelling
/// stops the whole sequence.
pub(crate) struct InFlightGuard<'a> {
    engine: &'a CallEngine,
    id: u64,
    token: CancellationToken,
}

impl InFlightGuard<'_> {
    pub(crate) fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.engine.state.lock();
        let ours = match *state {
            RequestState::InFlight { id, .. } | RequestState::Cancelling { id } => id == self.id,
            RequestState::Idle => false,
        };
        if ours {
            *state = RequestState::Idle;
        }
    }
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

/// A call that can be replayed after re-authentication.
pub(crate) enum Call<'a> {
    Form {
        url: Url,
        body: String,
    },
    Multipart {
        url: Url,
        params: &'a Params,
        file: &'a Path,
        progress: Option<Arc<dyn ProgressSink>>,
    },
}

fn encode_form<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    pairs
        .into_iter()
        .map(|(name, value)| {
            format!(
                "{}={}",
                urlencoding::encode(name),
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Form body with `module` and `op` ahead of the caller's params.
fn operation_form(module: &str, op: &str, params: &Params) -> String {
    let head = [(MODULE_PARAM, module), (OPERATION_PARAM, op)];
    let tail = params.iter().map(|p| (p.name.as_str(), p.value.as_str()));
    encode_form(head.into_iter().chain(tail))
}

fn reason_for(response: &TransportResponse) -> String {
    let text = String::from_utf8_lossy(&response.body).trim().to_string();
    if !text.is_empty() {
        return text;
    }
    StatusCode::from_u16(response.status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("unknown status")
        .to_string()
}

/// Applies the status table and returns the body of a successful response.
fn success_body(response: TransportResponse) -> Result<Bytes, ClientError> {
    match StatusClass::of(response.status) {
        StatusClass::Success if response.body.is_empty() => Err(ClientError::UnexpectedStatus {
            status: response.status,
            reason: "empty response body".to_string(),
        }),
        StatusClass::Success => Ok(response.body),
        StatusClass::AuthorizationRequired => Err(ClientError::AuthorizationRequired),
        StatusClass::Forbidden => Err(ClientError::Forbidden {
            reason: reason_for(&response),
        }),
        StatusClass::InvalidParams => Err(ClientError::InvalidParams {
            reason: reason_for(&response),
        }),
        StatusClass::Unexpected => Err(ClientError::UnexpectedStatus {
            status: response.status,
            reason: reason_for(&response),
        }),
    }
}

// ---------------------------------------------------------------------------
// CallEngine
// ---------------------------------------------------------------------------

/// Client for `module.operation` endpoints with cookie sessions.
pub struct CallEngine {
    config: ClientConfig,
    transport: Arc<dyn HttpTransport>,
    cookies: Mutex<CookieStore>,
    state: Mutex<RequestState>,
    next_id: AtomicU64,
    pub(crate) auth_provider: Option<Arc<dyn AuthenticationParamsProvider>>,
}

impl CallEngine {
    /// Engine backed by [`ReqwestTransport`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Engine backed by a caller-supplied transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config,
            transport,
            cookies: Mutex::new(CookieStore::new()),
            state: Mutex::new(RequestState::Idle),
            next_id: AtomicU64::new(1),
            auth_provider: None,
        }
    }

    /// Sets the source of credentials used when a session has expired.
    #[must_use]
    pub fn with_auth_provider(mut self, provider: Arc<dyn AuthenticationParamsProvider>) -> Self {
        self.auth_provider = Some(provider);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The most recently stored session cookie.
    #[must_use]
    pub fn cookie(&self) -> Option<SessionCookie> {
        self.cookies.lock().latest().cloned()
    }

    /// Forgets every stored cookie.
    pub fn clear_cookies(&self) {
        self.cookies.lock().clear();
    }

    /// Whether a call is outstanding.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        !matches!(*self.state.lock(), RequestState::Idle)
    }

    // -- public calls -------------------------------------------------------

    /// Calls `module.op` on the public endpoint.
    ///
    /// # Errors
    ///
    /// Returns the classified status error, [`ClientError::ConcurrentRequest`]
    /// if another call is outstanding, [`ClientError::RequestCancelled`] if
    /// cancelled, or a transport error.
    pub async fn call_public(
        &self,
        module: &str,
        op: &str,
        params: &Params,
    ) -> Result<String, ClientError> {
        let guard = self.begin_request()?;
        let call = Call::Form {
            url: self.config.endpoint(&self.config.public_path)?,
            body: operation_form(module, op, params),
        };
        self.execute_call(&guard, &call).await
    }

    /// Calls `module.op` on the authenticated endpoint, logging in again and
    /// retrying once if the session has expired.
    ///
    /// # Errors
    ///
    /// As [`CallEngine::call_public`], plus [`ClientError::ReAuthentication`]
    /// when the session could not be renewed.
    pub async fn call_authenticated(
        &self,
        module: &str,
        op: &str,
        params: &Params,
    ) -> Result<String, ClientError> {
        let guard = self.begin_request()?;
        let call = Call::Form {
            url: self.config.endpoint(&self.config.authenticated_path)?,
            body: operation_form(module, op, params),
        };
        self.execute_with_reauth(&guard, &call).await
    }

    /// Uploads `file` to `module.op` on the authenticated endpoint as a
    /// multipart body. `params` travel as text parts and the file under the
    /// `data` field. `progress` receives the cumulative bytes sent.
    ///
    /// # Errors
    ///
    /// As [`CallEngine::call_authenticated`], plus [`ClientError::Io`] if the
    /// file cannot be read.
    pub async fn upload_multipart(
        &self,
        module: &str,
        op: &str,
        params: &Params,
        file: &Path,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> Result<String, ClientError> {
        let guard = self.begin_request()?;
        let mut url = self.config.endpoint(&self.config.authenticated_path)?;
        url.query_pairs_mut()
            .append_pair(MODULE_PARAM, module)
            .append_pair(OPERATION_PARAM, op);
        let call = Call::Multipart {
            url,
            params,
            file,
            progress,
        };
        self.execute_with_reauth(&guard, &call).await
    }

    /// Fetches `path` from the host as raw bytes.
    ///
    /// # Errors
    ///
    /// As [`CallEngine::call_public`].
    pub async fn get(&self, path: &str) -> Result<Bytes, ClientError> {
        let guard = self.begin_request()?;
        let request = TransportRequest {
            method: Method::GET,
            url: self.config.endpoint(path)?,
            headers: HeaderMap::new(),
            body: TransportBody::Empty,
        };
        let response = self.send(&guard, request).await?;
        success_body(response)
    }

    /// Runs the credential exchange with `params`.
    ///
    /// Returns `Ok(true)` on 200 and `Ok(false)` on any status other than
    /// 401.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidLoginCredentials`] on 401, plus the
    /// engine-level errors of [`CallEngine::call_public`].
    pub async fn authenticate(&self, params: &Params) -> Result<bool, ClientError> {
        let guard = self.begin_request()?;
        self.login(&guard, params).await
    }

    /// Cancels the outstanding call, which then fails with
    /// [`ClientError::RequestCancelled`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NoActiveRequest`] if nothing is in flight.
    pub fn cancel_current_request(&self) -> Result<(), ClientError> {
        let mut state = self.state.lock();
        match &*state {
            RequestState::Idle => Err(ClientError::NoActiveRequest),
            RequestState::Cancelling { .. } => Ok(()),
            RequestState::InFlight { id, token } => {
                debug!(request = id, "cancelling request");
                token.cancel();
                *state = RequestState::Cancelling { id: *id };
                Ok(())
            }
        }
    }

    // -- internals ----------------------------------------------------------

    fn begin_request(&self) -> Result<InFlightGuard<'_>, ClientError> {
        let mut state = self.state.lock();
        if !matches!(*state, RequestState::Idle) {
            return Err(ClientError::ConcurrentRequest);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        *state = RequestState::InFlight {
            id,
            token: token.clone(),
        };
        Ok(InFlightGuard {
            engine: self,
            id,
            token,
        })
    }

    /// Sends one request with the stored cookies and records any cookies
    /// the response sets.
    async fn send(
        &self,
        guard: &InFlightGuard<'_>,
        mut request: TransportRequest,
    ) -> Result<TransportResponse, ClientError> {
        let cookie = self.cookies.lock().header_value();
        if let Some(cookie) = cookie {
            match HeaderValue::from_str(&cookie) {
                Ok(value) => {
                    request.headers.insert(COOKIE, value);
                }
                Err(_) => warn!("stored cookies are not a valid header value; sending without"),
            }
        }
        if guard.is_cancelled() {
            return Err(ClientError::RequestCancelled);
        }

        debug!(request = guard.id, method = %request.method, url = %request.url, "sending");
        let outcome = tokio::select! {
            biased;
            () = guard.token.cancelled() => return Err(ClientError::RequestCancelled),
            outcome = self.transport.execute(request) => outcome,
        };

        match outcome {
            Ok(response) => {
                self.cookies.lock().apply_response_headers(&response.headers);
                debug!(request = guard.id, status = response.status, "response received");
                Ok(response)
            }
            // An abort observed by the transport after cancellation is still a cancellation.
            Err(_) if guard.is_cancelled() => Err(ClientError::RequestCancelled),
            Err(e) => Err(e.into()),
        }
    }

    async fn build_request(&self, call: &Call<'_>) -> Result<TransportRequest, ClientError> {
        let mut headers = HeaderMap::new();
        match call {
            Call::Form { url, body } => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
                Ok(TransportRequest {
                    method: Method::POST,
                    url: url.clone(),
                    headers,
                    body: TransportBody::Bytes(Bytes::from(body.clone())),
                })
            }
            Call::Multipart {
                url,
                params,
                file,
                progress,
            } => {
                let form = params
                    .iter()
                    .fold(MultipartForm::new(), |form, p| form.text(&p.name, &p.value))
                    .file(UPLOAD_FIELD, file)
                    .await?;
                let content_type = HeaderValue::from_str(&form.content_type())
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
                headers.insert(CONTENT_TYPE, content_type);
                let length = form.content_length();
                let stream = form.into_stream().await?;
                let stream: ByteStream = match progress {
                    Some(sink) => Box::pin(ProgressStream::new(stream, Arc::clone(sink))),
                    None => stream,
                };
                Ok(TransportRequest {
                    method: Method::POST,
                    url: url.clone(),
                    headers,
                    body: TransportBody::Stream { stream, length },
                })
            }
        }
    }

    /// One attempt of `call`, without re-authentication.
    pub(crate) async fn execute_call(
        &self,
        guard: &InFlightGuard<'_>,
        call: &Call<'_>,
    ) -> Result<String, ClientError> {
        let request = self.build_request(call).await?;
        let response = self.send(guard, request).await?;
        let body = success_body(response)?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Credential exchange under an existing claim.
    pub(crate) async fn login(
        &self,
        guard: &InFlightGuard<'_>,
        params: &Params,
    ) -> Result<bool, ClientError> {
        let pairs = params
            .iter()
            .map(|p| (p.name.as_str(), p.value.as_str()))
            .chain([(ONLY_SEND_HTTP_RESPONSE_PARAM, "true")]);
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
        let request = TransportRequest {
            method: Method::POST,
            url: self.config.endpoint(&self.config.login_path)?,
            headers,
            body: TransportBody::Bytes(Bytes::from(encode_form(pairs))),
        };

        let response = self.send(guard, request).await?;
        match StatusClass::of(response.status) {
            StatusClass::Success => Ok(true),
            StatusClass::AuthorizationRequired => Err(ClientError::InvalidLoginCredentials),
            _ => {
                debug!(status = response.status, "login not accepted");
                Ok(false)
            }
        }
    }
}

impl std::fmt::Debug for CallEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallEngine")
            .field("config", &self.config)
            .field("busy", &self.is_busy())
            .field("has_auth_provider", &self.auth_provider.is_some())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
