//! The seam between the call engine and the HTTP stack.
//!
//! The engine builds a [`TransportRequest`], hands it to an
//! [`HttpTransport`], and interprets the [`TransportResponse`]. The
//! production implementation is [`ReqwestTransport`]; tests plug in a
//! scripted one.

use std::fmt;
use std::io;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use http::header::CONTENT_LENGTH;
use http::{HeaderMap, Method};
use reqwest::Url;

use crate::config::ClientConfig;

/// Boxed chunk stream used for streamed request bodies.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Request body variants.
pub enum TransportBody {
    Empty,
    Bytes(Bytes),
    /// Chunks produced lazily; `length` is the exact total size.
    Stream { stream: ByteStream, length: u64 },
}

impl fmt::Debug for TransportBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::Stream { length, .. } => {
                f.debug_struct("Stream").field("length", length).finish()
            }
        }
    }
}

/// A fully described outgoing request.
#[derive(Debug)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: TransportBody,
}

/// Status, headers and the fully read body.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("I/O error while sending request: {0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Other(String),
}

/// Executes one HTTP exchange.
///
/// Dropping the returned future must abort the exchange; the engine relies
/// on that to cancel requests.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

// ---------------------------------------------------------------------------
// ReqwestTransport
// ---------------------------------------------------------------------------

/// [`HttpTransport`] backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a client honouring the timeout and certificate settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        if config.allow_untrusted_https {
            tracing::warn!(host = %config.host, "accepting untrusted TLS certificates");
            builder = builder.danger_accept_invalid_certs(true);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        let builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        let builder = match request.body {
            TransportBody::Empty => builder,
            TransportBody::Bytes(bytes) => builder.body(bytes),
            TransportBody::Stream { stream, length } => builder
                .header(CONTENT_LENGTH, length)
                .body(reqwest::Body::wrap_stream(stream)),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reqwest_transport_builds() {
        let config = ClientConfig {
            allow_untrusted_https: true,
            ..ClientConfig::default()
        };
        assert!(ReqwestTransport::new(&config).is_ok());
    }

    #[test]
    fn body_debug_hides_contents() {
        let body = TransportBody::Bytes(Bytes::from_static(b"secret"));
        assert_eq!(format!("{body:?}"), "Bytes(6)");
    }
}
