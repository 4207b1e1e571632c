//! Scripted [`HttpTransport`] for engine tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use http::header::{HeaderName, CONTENT_LENGTH};
use http::{HeaderMap, HeaderValue, Method};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::transport::{
    HttpTransport, TransportBody, TransportError, TransportRequest, TransportResponse,
};

/// One scripted reaction to an incoming request.
pub(crate) enum Reply {
    Respond {
        status: u16,
        headers: HeaderMap,
        body: Bytes,
    },
    Fail(String),
    /// Never completes; only cancellation gets the caller out.
    Hang,
}

impl Reply {
    pub(crate) fn status(status: u16, body: &str) -> Self {
        Self::Respond {
            status,
            headers: HeaderMap::new(),
            body: Bytes::copy_from_slice(body.as_bytes()),
        }
    }

    pub(crate) fn ok(body: &str) -> Self {
        Self::status(200, body)
    }

    pub(crate) fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        if let Self::Respond { headers, .. } = &mut self {
            headers.append(HeaderName::from_static(name), HeaderValue::from_static(value));
        }
        self
    }
}

/// A request as the transport saw it, with any streamed body drained.
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub declared_length: Option<u64>,
}

impl RecordedRequest {
    pub(crate) fn header(&self, name: HeaderName) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    pub(crate) fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub(crate) struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<RecordedRequest>>,
    arrived: Notify,
}

impl ScriptedTransport {
    pub(crate) fn new(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            arrived: Notify::new(),
        })
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Waits until at least `count` requests have reached the transport.
    pub(crate) async fn wait_for_requests(&self, count: usize) {
        loop {
            let notified = self.arrived.notified();
            if self.requests.lock().len() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        let (body, declared_length) = match request.body {
            TransportBody::Empty => (Bytes::new(), None),
            TransportBody::Bytes(bytes) => (bytes, None),
            TransportBody::Stream { mut stream, length } => {
                let mut collected = Vec::new();
                while let Some(chunk) = stream.next().await {
                    collected.extend_from_slice(&chunk?);
                }
                (Bytes::from(collected), Some(length))
            }
        };
        let declared_length = declared_length.or_else(|| {
            request
                .headers
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
        });
        self.requests.lock().push(RecordedRequest {
            method: request.method,
            url: request.url.to_string(),
            headers: request.headers,
            body,
            declared_length,
        });
        self.arrived.notify_waiters();

        let reply = self.replies.lock().pop_front();
        match reply {
            Some(Reply::Respond {
                status,
                headers,
                body,
            }) => Ok(TransportResponse {
                status,
                headers,
                body,
            }),
            Some(Reply::Fail(message)) => Err(TransportError::Other(message)),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(TransportError::Other("no scripted reply left".to_string())),
        }
    }
}
