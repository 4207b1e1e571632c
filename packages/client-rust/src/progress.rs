//! Upload progress reporting.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;

/// Receives the cumulative number of body bytes handed to the transport.
///
/// Called inline from the upload stream; a slow sink slows the upload.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, bytes_sent: u64);
}

impl<F> ProgressSink for F
where
    F: Fn(u64) + Send + Sync,
{
    fn on_progress(&self, bytes_sent: u64) {
        self(bytes_sent);
    }
}

/// Wraps a body stream and reports the running total after each chunk.
///
/// Totals are strictly increasing; empty chunks are not reported. Once the
/// stream ends, the last reported total equals the body length.
pub struct ProgressStream<S> {
    inner: S,
    sink: Arc<dyn ProgressSink>,
    sent: u64,
}

impl<S> ProgressStream<S> {
    pub fn new(inner: S, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            inner,
            sink,
            sent: 0,
        }
    }

    #[must_use]
    pub fn bytes_sent(&self) -> u64 {
        self.sent
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = Pin::new(&mut self.inner).poll_next(cx);
        if let Poll::Ready(Some(Ok(chunk))) = &polled {
            if !chunk.is_empty() {
                self.sent += chunk.len() as u64;
                self.sink.on_progress(self.sent);
            }
        }
        polled
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{stream, StreamExt};
    use parking_lot::Mutex;

    use super::*;

    #[tokio::test]
    async fn reports_cumulative_totals() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let sink: Arc<dyn ProgressSink> = Arc::new(move |n: u64| sink_seen.lock().push(n));

        let chunks = vec![
            Ok(Bytes::from_static(b"abc")),
            Ok(Bytes::new()),
            Ok(Bytes::from_static(b"defgh")),
        ];
        let mut progress = ProgressStream::new(stream::iter(chunks), sink);
        let mut total = Vec::new();
        while let Some(chunk) = progress.next().await {
            total.extend_from_slice(&chunk.unwrap());
        }

        assert_eq!(*seen.lock(), vec![3, 8]);
        assert_eq!(progress.bytes_sent(), total.len() as u64);
    }

    #[tokio::test]
    async fn errors_pass_through_unreported() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let sink: Arc<dyn ProgressSink> = Arc::new(move |n: u64| sink_seen.lock().push(n));

        let chunks = vec![
            Ok(Bytes::from_static(b"ab")),
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "boom")),
        ];
        let mut progress = ProgressStream::new(stream::iter(chunks), sink);
        assert!(progress.next().await.unwrap().is_ok());
        assert!(progress.next().await.unwrap().is_err());
        assert_eq!(*seen.lock(), vec![2]);
    }
}
