//! The gateway service implementing hyper's `Service` trait.
//!
//! [`Gateway`] runs each request through:
//!
//! 1. Request context and span (request id, effective host, metadata)
//! 2. Health check interception (`GET /healthz`)
//! 3. Timeout around everything below
//! 4. Response cache lookup (when enabled)
//! 5. Route matching and path rewriting
//! 6. Content resolution against the route's object store
//! 7. `X-Request-Id` header and access logging on completion

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use http::header::HeaderValue;
use http::{Method, Request, Response, StatusCode};
use hyper::body::Incoming;
use hyper::service::Service;
use staticproxy_core::GatewayConfig;
use tokio::time::Instant;
use tracing::{Instrument, debug, field, warn};

use crate::body::ProxyBody;
use crate::cache::ResponseCache;
use crate::middleware::{AccessLogBody, RequestContext, with_access_log};
use crate::resolve::ContentResolver;
use crate::response::text_response;
use crate::route::RouteTable;

/// Path of the health endpoint.
pub const HEALTH_PATH: &str = "/healthz";

/// Header carrying the generated request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Body type of every gateway response.
pub type GatewayBody = AccessLogBody<ProxyBody>;

#[derive(Debug)]
struct Inner {
    routes: RouteTable,
    config: GatewayConfig,
    cache: Option<ResponseCache>,
}

/// The request pipeline. Cheap to clone; all clones share one route table
/// and one cache.
#[derive(Debug, Clone)]
pub struct Gateway {
    inner: Arc<Inner>,
}

impl Gateway {
    /// Create a gateway serving `routes` with the behavior in `config`.
    #[must_use]
    pub fn new(routes: RouteTable, config: GatewayConfig) -> Self {
        let cache = ResponseCache::from_config(&config);
        Self {
            inner: Arc::new(Inner {
                routes,
                config,
                cache,
            }),
        }
    }

    /// Bind this gateway to a connection from `remote_addr`.
    #[must_use]
    pub fn service(&self, remote_addr: Option<SocketAddr>) -> GatewayService {
        GatewayService {
            gateway: self.clone(),
            remote_addr,
        }
    }

    /// Handle one request. Never fails; every error becomes a response.
    pub async fn handle<B>(
        &self,
        req: Request<B>,
        remote_addr: Option<SocketAddr>,
    ) -> Response<GatewayBody> {
        let ctx = RequestContext::from_request(
            &req,
            remote_addr,
            self.inner.config.trust_forwarded_host,
        );
        drop(req);
        let span = ctx.span.clone();

        async move {
            let response = if is_health_check(&ctx.method, &ctx.path) {
                health_check_response()
            } else {
                let deadline = Instant::now() + self.inner.config.request_timeout;
                match tokio::time::timeout_at(deadline, self.respond(&ctx, deadline)).await {
                    Ok(response) => response,
                    Err(_) => {
                        warn!(
                            timeout_secs = self.inner.config.request_timeout.as_secs(),
                            "request timed out"
                        );
                        text_response(StatusCode::GATEWAY_TIMEOUT, "Request timed out\n")
                    }
                }
            };
            with_access_log(add_common_headers(response, &ctx.request_id), &ctx)
        }
        .instrument(span)
        .await
    }

    async fn respond(&self, ctx: &RequestContext, deadline: Instant) -> Response<ProxyBody> {
        let Some(cache) = &self.inner.cache else {
            return self.route(ctx, deadline).await;
        };

        let key = ResponseCache::key(ctx);
        if let Some(hit) = cache.get(&key) {
            debug!(key = %key, "cache hit");
            return hit;
        }
        let response = self.route(ctx, deadline).await;
        cache.store(key, response).await
    }

    async fn route(&self, ctx: &RequestContext, deadline: Instant) -> Response<ProxyBody> {
        let matched = match self
            .inner
            .routes
            .match_request(&ctx.host, &ctx.method, &ctx.decoded_path)
        {
            Ok(matched) => matched,
            Err(miss) => {
                debug!(host = %miss.host, path = %miss.path, "no route matched");
                return self.route_miss_response(ctx);
            }
        };

        let route = matched.route;
        let key = route.object_key(&ctx.decoded_path, &matched.variables);
        ctx.span.record("backend", field::display(route.store().describe()));
        ctx.span.record("key", key.as_str());
        debug!(route = route.index(), key = %key, "route matched");

        ContentResolver::new(route.store(), route.options(), &ctx.path)
            .with_query(ctx.query.as_deref())
            .with_deadline(Some(deadline))
            .resolve(&key)
            .await
    }

    fn route_miss_response(&self, ctx: &RequestContext) -> Response<ProxyBody> {
        let mut body = format!("No route for host {}\n", ctx.host);
        if self.inner.config.debug {
            body.push('\n');
            body.push_str(&ctx.dump());
        }
        text_response(StatusCode::NOT_FOUND, body)
    }
}

/// Per-connection hyper service.
#[derive(Debug, Clone)]
pub struct GatewayService {
    gateway: Gateway,
    remote_addr: Option<SocketAddr>,
}

impl Service<Request<Incoming>> for GatewayService {
    type Response = Response<GatewayBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let gateway = self.gateway.clone();
        let remote_addr = self.remote_addr;
        Box::pin(async move { Ok(gateway.handle(req, remote_addr).await) })
    }
}

/// Check if the request is a health check probe.
fn is_health_check(method: &Method, path: &str) -> bool {
    *method == Method::GET && path == HEALTH_PATH
}

/// Produce a health check response.
fn health_check_response() -> Response<ProxyBody> {
    text_response(StatusCode::OK, "ok")
}

/// Add common response headers to every response.
fn add_common_headers(mut response: Response<ProxyBody>, request_id: &str) -> Response<ProxyBody> {
    if let Ok(hv) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, hv);
    }
    response
}
