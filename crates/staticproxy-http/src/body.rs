//! Response body types supporting buffered, empty, and streaming modes.
//!
//! [`ProxyBody`] is the body of every response the gateway produces:
//!
//! - **Buffered**: error messages, directory listings, cached responses.
//! - **Empty**: redirects and 204 responses.
//! - **Stream**: an object body read from the backend as the client reads.
//!
//! A streaming body is bounded by the request deadline. A backend read error
//! or an expired deadline is logged with the bytes already written and ends
//! the body with an error, which aborts the connection.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use http_body_util::Full;
use staticproxy_store::ByteStream;
use tokio::time::{Instant, Sleep};
use tracing::error;

/// Gateway response body.
///
/// Implements [`http_body::Body`] so it can be used directly with hyper responses.
#[derive(Debug, Default)]
pub enum ProxyBody {
    /// Fully buffered bytes.
    Buffered(Full<Bytes>),
    /// No body.
    #[default]
    Empty,
    /// Object body streamed from the backend.
    Stream(Box<ObjectBody>),
}

impl ProxyBody {
    /// Create a buffered body from bytes.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::Buffered(Full::new(data.into()))
    }

    /// Create an empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }

    /// Create a buffered body from a UTF-8 string.
    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self::Buffered(Full::new(Bytes::from(s.into())))
    }

    /// Stream `stream` for object `key`.
    ///
    /// `length` is the backend-reported size, used as the size hint.
    /// `deadline` aborts the stream once reached.
    #[must_use]
    pub fn stream(
        stream: ByteStream,
        key: impl Into<String>,
        length: Option<u64>,
        deadline: Option<Instant>,
    ) -> Self {
        Self::Stream(Box::new(ObjectBody {
            stream,
            key: key.into(),
            length,
            bytes_written: 0,
            deadline: deadline.map(|at| Box::pin(tokio::time::sleep_until(at))),
            failed: false,
        }))
    }
}

impl http_body::Body for ProxyBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Buffered(full) => Pin::new(full)
                .poll_frame(cx)
                .map_err(|never| match never {}),
            Self::Empty => Poll::Ready(None),
            Self::Stream(body) => body.poll_chunk(cx).map(|chunk| {
                chunk.map(|result| result.map(http_body::Frame::data))
            }),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Buffered(full) => full.is_end_stream(),
            Self::Empty => true,
            Self::Stream(body) => body.failed,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            Self::Buffered(full) => full.size_hint(),
            Self::Empty => http_body::SizeHint::with_exact(0),
            Self::Stream(body) => body
                .length
                .map_or_else(http_body::SizeHint::default, http_body::SizeHint::with_exact),
        }
    }
}

/// A backend object body in flight.
pub struct ObjectBody {
    stream: ByteStream,
    key: String,
    length: Option<u64>,
    bytes_written: u64,
    deadline: Option<Pin<Box<Sleep>>>,
    failed: bool,
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBody")
            .field("key", &self.key)
            .field("length", &self.length)
            .field("bytes_written", &self.bytes_written)
            .finish_non_exhaustive()
    }
}

impl ObjectBody {
    fn poll_chunk(&mut self, cx: &mut Context<'_>) -> Poll<Option<io::Result<Bytes>>> {
        if self.failed {
            return Poll::Ready(None);
        }

        if let Some(deadline) = self.deadline.as_mut() {
            if deadline.as_mut().poll(cx).is_ready() {
                self.failed = true;
                error!(
                    key = %self.key,
                    bytes_written = self.bytes_written,
                    "request deadline expired while streaming object"
                );
                return Poll::Ready(Some(Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "request deadline expired",
                ))));
            }
        }

        match self.stream.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                self.bytes_written += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                self.failed = true;
                error!(
                    key = %self.key,
                    bytes_written = self.bytes_written,
                    error = %e,
                    "failed to copy object body"
                );
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}
