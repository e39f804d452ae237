//! HTTP layer for staticproxy.
//!
//! This crate turns the rule table and object stores into an HTTP gateway:
//!
//! - [`template`]: `{name}` substitution in prefix strings.
//! - [`pattern`]: path patterns with captured segments, compiled to regexes.
//! - [`route`]: the compiled, read-only route table and path rewriting.
//! - [`resolve`]: the content resolution state machine (index probing,
//!   autoindex, redirects, header translation, streaming).
//! - [`body`]: the response body type.
//! - [`response`]: response and header helpers.
//! - [`middleware`]: request context, forwarded host, access log.
//! - [`cache`]: the optional in-memory response cache.
//! - [`service`]: [`Gateway`](service::Gateway) and the hyper `Service`.
//! - [`server`]: the accept loop with graceful shutdown.

pub mod body;
pub mod cache;
pub mod error;
pub mod middleware;
pub mod pattern;
pub mod resolve;
pub mod response;
pub mod route;
pub mod server;
pub mod service;
pub mod template;

pub use body::ProxyBody;
pub use error::{RouteError, RouteResult};
pub use route::{Route, RouteMatch, RouteMiss, RouteTable};
pub use service::{Gateway, GatewayBody, GatewayService};
