//! Request decorators applied around routing.
//!
//! - [`RequestContext`] captures the request metadata once, resolves the
//!   effective host (honoring `X-Forwarded-Host` only when trusted), and owns
//!   the request span every later event is recorded in.
//! - [`AccessLogBody`] wraps the response body and emits one access-log
//!   event when the body finishes or is dropped.

use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use http::header::{HOST, REFERER, USER_AGENT};
use http::{HeaderMap, Method, Request};
use percent_encoding::percent_decode_str;
use pin_project_lite::pin_project;
use tracing::{Span, field, info, info_span};
use uuid::Uuid;

/// Header consulted for the client-facing host behind a proxy.
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Per-request metadata, built once when the request arrives.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Generated request id.
    pub request_id: String,
    /// Request method.
    pub method: Method,
    /// Effective host used for routing and logging.
    pub host: String,
    /// Raw request path as received.
    pub path: String,
    /// Percent-decoded request path, used for matching.
    pub decoded_path: String,
    /// Raw query string.
    pub query: Option<String>,
    /// Peer address.
    pub remote_addr: Option<SocketAddr>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Arrival time.
    pub started: Instant,
    /// The `request` span.
    pub span: Span,
}

impl RequestContext {
    /// Capture `req`. When `trust_forwarded_host` is set, a present
    /// `X-Forwarded-Host` replaces the `Host` header as the effective host.
    pub fn from_request<B>(
        req: &Request<B>,
        remote_addr: Option<SocketAddr>,
        trust_forwarded_host: bool,
    ) -> Self {
        let headers = req.headers().clone();
        let host = effective_host(req, trust_forwarded_host);
        let path = req.uri().path().to_owned();
        let decoded_path = percent_decode_str(&path).decode_utf8_lossy().into_owned();
        let request_id = Uuid::new_v4().to_string();

        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %req.method(),
            host = %host,
            path = %path,
            referer = header_str(&headers, REFERER.as_str()).unwrap_or(""),
            remote_addr = %remote_addr.map(|a| a.to_string()).unwrap_or_default(),
            user_agent = header_str(&headers, USER_AGENT.as_str()).unwrap_or(""),
            backend = field::Empty,
            key = field::Empty,
        );

        Self {
            request_id,
            method: req.method().clone(),
            host,
            path,
            decoded_path,
            query: req.uri().query().map(str::to_owned),
            remote_addr,
            headers,
            started: Instant::now(),
            span,
        }
    }

    /// Path plus query, as the client sent it.
    #[must_use]
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{q}", self.path),
            None => self.path.clone(),
        }
    }

    /// Diagnostic dump of the request, for debug-mode route misses.
    #[must_use]
    pub fn dump(&self) -> String {
        let mut out = format!(
            "method: {}\npath: {}\nquery: {}\nhost: {}\nremote_addr: {}\nrequest_id: {}\nheaders:\n",
            self.method,
            self.path,
            self.query.as_deref().unwrap_or(""),
            self.host,
            self.remote_addr.map(|a| a.to_string()).unwrap_or_default(),
            self.request_id,
        );
        for (name, value) in &self.headers {
            out.push_str("  ");
            out.push_str(name.as_str());
            out.push_str(": ");
            out.push_str(&String::from_utf8_lossy(value.as_bytes()));
            out.push('\n');
        }
        out
    }
}

fn effective_host<B>(req: &Request<B>, trust_forwarded_host: bool) -> String {
    if trust_forwarded_host {
        if let Some(forwarded) = header_str(req.headers(), X_FORWARDED_HOST)
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            return forwarded.to_owned();
        }
    }
    header_str(req.headers(), HOST.as_str())
        .map(str::to_owned)
        .or_else(|| req.uri().authority().map(ToString::to_string))
        .unwrap_or_default()
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Emits the access-log event exactly once, on drop.
#[derive(Debug)]
struct AccessLog {
    status: u16,
    bytes: u64,
    started: Instant,
    span: Span,
}

impl Drop for AccessLog {
    fn drop(&mut self) {
        let duration_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            target: "staticproxy::access",
            parent: &self.span,
            status = self.status,
            bytes = self.bytes,
            duration_ms,
            "request completed"
        );
    }
}

pin_project! {
    /// Response body that counts bytes written and logs the request when the
    /// body ends or is dropped.
    #[derive(Debug)]
    pub struct AccessLogBody<B> {
        #[pin]
        inner: B,
        log: AccessLog,
    }
}

impl<B> AccessLogBody<B> {
    /// Wrap `inner` for a response with `status` to the request in `ctx`.
    pub fn new(inner: B, status: http::StatusCode, ctx: &RequestContext) -> Self {
        Self {
            inner,
            log: AccessLog {
                status: status.as_u16(),
                bytes: 0,
                started: ctx.started,
                span: ctx.span.clone(),
            },
        }
    }
}

impl<B> http_body::Body for AccessLogBody<B>
where
    B: http_body::Body<Data = bytes::Bytes>,
{
    type Data = bytes::Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        let polled = this.inner.poll_frame(cx);
        if let Poll::Ready(Some(Ok(frame))) = &polled {
            if let Some(data) = frame.data_ref() {
                this.log.bytes += data.len() as u64;
            }
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> http_body::SizeHint {
        self.inner.size_hint()
    }
}

/// Wrap a response so its completion is access-logged.
pub fn with_access_log<B>(
    response: http::Response<B>,
    ctx: &RequestContext,
) -> http::Response<AccessLogBody<B>> {
    let status = response.status();
    response.map(|body| AccessLogBody::new(body, status, ctx))
}
