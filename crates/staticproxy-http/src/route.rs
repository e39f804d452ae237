//! The compiled route table.
//!
//! Rules are compiled once at startup into [`Route`]s, each bound to its own
//! object store handle. The table is read-only afterwards and shared by all
//! in-flight requests. Matching is first-match-wins in declaration order.

use std::fmt;
use std::sync::Arc;

use http::Method;
use staticproxy_core::{ConfigError, HandlerRule, RuleOptions};
use staticproxy_store::{ObjectStore, StoreConnector};
use tracing::{debug, info};

use crate::error::{RouteError, RouteResult};
use crate::pattern::PathPattern;
use crate::template::{PathVariables, substitute};

#[derive(Debug, Clone)]
enum HostMatcher {
    Any,
    /// Lowercased host; compared with the request port stripped.
    Name(String),
    /// Lowercased `host:port`; compared verbatim.
    NameAndPort(String),
}

impl HostMatcher {
    fn new(host: &str) -> Self {
        if host.is_empty() {
            Self::Any
        } else if strip_port(host).len() == host.len() {
            Self::Name(host.to_ascii_lowercase())
        } else {
            Self::NameAndPort(host.to_ascii_lowercase())
        }
    }

    fn matches(&self, host: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Name(name) => strip_port(host).eq_ignore_ascii_case(name),
            Self::NameAndPort(full) => host.eq_ignore_ascii_case(full),
        }
    }
}

/// Drop a trailing `:port` from a host, keeping IPv6 brackets intact.
fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host.find(']').map_or(host, |end| &host[..=end]);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            name
        }
        _ => host,
    }
}

#[derive(Debug, Clone)]
enum PathMatcher {
    Exact(PathPattern),
    Prefix(PathPattern),
}

impl PathMatcher {
    fn captures(&self, path: &str) -> Option<PathVariables> {
        match self {
            Self::Exact(p) | Self::Prefix(p) => p.captures(path),
        }
    }
}

/// One compiled rule.
pub struct Route {
    index: usize,
    host: HostMatcher,
    path: PathMatcher,
    strip: Option<PathPattern>,
    prepend: String,
    store: Arc<dyn ObjectStore>,
    options: RuleOptions,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("index", &self.index)
            .field("host", &self.host)
            .field("path", &self.path)
            .field("prepend", &self.prepend)
            .field("store", &self.store.describe())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Route {
    /// Compile `rule` (at position `index`) bound to `store`.
    ///
    /// An exact `path` takes precedence over `path_prefix` for matching. A
    /// rule with neither matches every path.
    pub fn new(index: usize, rule: &HandlerRule, store: Arc<dyn ObjectStore>) -> RouteResult<Self> {
        let invalid = |pattern: &str, message: String| {
            RouteError::Config(ConfigError::InvalidRule {
                index,
                message: format!("invalid path pattern {pattern:?}: {message}"),
            })
        };

        let path = if rule.path.is_empty() {
            PathMatcher::Prefix(
                PathPattern::prefix(&rule.path_prefix)
                    .map_err(|e| invalid(&rule.path_prefix, e))?,
            )
        } else {
            PathMatcher::Exact(PathPattern::exact(&rule.path).map_err(|e| invalid(&rule.path, e))?)
        };

        let strip = if rule.path_prefix.is_empty() {
            None
        } else {
            Some(PathPattern::prefix(&rule.path_prefix).map_err(|e| invalid(&rule.path_prefix, e))?)
        };

        Ok(Self {
            index,
            host: HostMatcher::new(&rule.host),
            path,
            strip,
            prepend: rule.backend_prefix().to_owned(),
            store,
            options: rule.options(),
        })
    }

    /// Position of the source rule in the `handlers` sequence.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The store this route serves from.
    #[must_use]
    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    /// Directory-handling options.
    #[must_use]
    pub fn options(&self) -> &RuleOptions {
        &self.options
    }

    /// Rewrite a matched request path into an object key candidate.
    ///
    /// The prefix-to-strip is rendered with `variables` and removed when it
    /// is a literal prefix of `path`; otherwise `path` is kept as is. The
    /// prefix-to-prepend is then substituted and put in front. The result
    /// still carries any leading slash.
    #[must_use]
    pub fn rewrite(&self, path: &str, variables: &PathVariables) -> String {
        let mut rest = path;
        if let Some(strip) = &self.strip {
            let prefix = strip.render(variables);
            match path.strip_prefix(prefix.as_str()) {
                Some(stripped) => rest = stripped,
                None => debug!(
                    route = self.index,
                    prefix = %prefix,
                    path,
                    "prefix to strip does not match the request path; leaving it unchanged"
                ),
            }
        }
        let mut key = substitute(&self.prepend, variables);
        key.push_str(rest);
        key
    }

    /// Rewrite and drop the leading slash, producing the lookup key.
    #[must_use]
    pub fn object_key(&self, path: &str, variables: &PathVariables) -> String {
        let rewritten = self.rewrite(path, variables);
        if rewritten.starts_with('/') {
            rewritten[1..].to_owned()
        } else {
            rewritten
        }
    }

    fn matches(&self, host: &str, path: &str) -> Option<PathVariables> {
        if !self.host.matches(host) {
            return None;
        }
        self.path.captures(path)
    }
}

/// A successful match.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    /// The winning route.
    pub route: &'a Route,
    /// Variables captured from the request path.
    pub variables: PathVariables,
}

/// No route matched the request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no route for host {host:?} and path {path:?}")]
pub struct RouteMiss {
    /// Effective request host.
    pub host: String,
    /// Request path.
    pub path: String,
}

/// The ordered set of compiled routes.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Compile `rules` in order, connecting each rule's backend through
    /// `connector`. The first failure aborts construction.
    pub async fn build(
        rules: &[HandlerRule],
        connector: &dyn StoreConnector,
    ) -> RouteResult<Self> {
        let mut routes = Vec::with_capacity(rules.len());
        for (index, rule) in rules.iter().enumerate() {
            let spec = rule.backend_spec(index)?;
            let store = connector
                .connect(&spec)
                .await
                .map_err(|source| RouteError::Connect {
                    index,
                    backend: spec.kind(),
                    source,
                })?;
            let route = Route::new(index, rule, store)?;
            info!(
                route = index,
                host = %rule.host,
                path = %rule.path,
                path_prefix = %rule.path_prefix,
                backend = spec.kind(),
                bucket = spec.bucket(),
                "route installed"
            );
            routes.push(route);
        }
        Ok(Self { routes })
    }

    /// Build a table from already compiled routes.
    #[must_use]
    pub fn from_routes(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// Number of installed routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no routes are installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the first route matching the request.
    ///
    /// Only `GET` is routed; any other method is a miss.
    pub fn match_request(
        &self,
        host: &str,
        method: &Method,
        path: &str,
    ) -> Result<RouteMatch<'_>, RouteMiss> {
        let miss = || RouteMiss {
            host: host.to_owned(),
            path: path.to_owned(),
        };
        if method != Method::GET {
            return Err(miss());
        }
        self.routes
            .iter()
            .find_map(|route| {
                route
                    .matches(host, path)
                    .map(|variables| RouteMatch { route, variables })
            })
            .ok_or_else(miss)
    }
}
