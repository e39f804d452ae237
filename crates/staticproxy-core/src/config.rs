//! Process configuration.
//!
//! Provides [`GatewayConfig`], loaded from environment variables, and
//! [`RejectedValue`] for values that could not be used. The configuration
//! gates behavior around the routing core (listener, log format, debug
//! diagnostics, timeout, response cache) but never the routing rules
//! themselves, which come from the rule file named by `config_file`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use typed_builder::TypedBuilder;

/// Deployment environment; selects log format and default verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Human-readable logs at `debug`.
    #[default]
    Dev,
    /// JSON logs at `info`.
    Prod,
}

impl Environment {
    /// The environment name as written in `STATICPROXY_ENV`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Prod => "prod",
        }
    }

    /// Default `EnvFilter` directive for this environment.
    #[must_use]
    pub fn default_log_level(self) -> &'static str {
        match self {
            Self::Dev => "debug",
            Self::Prod => "info",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Self::Dev),
            "prod" | "production" => Ok(Self::Prod),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

/// Gateway process configuration.
///
/// # Examples
///
/// ```
/// use staticproxy_core::config::GatewayConfig;
///
/// let config = GatewayConfig::default();
/// assert_eq!(config.listen, "0.0.0.0:8080");
/// assert!(!config.debug);
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct GatewayConfig {
    /// Bind address.
    #[builder(default = String::from("0.0.0.0:8080"))]
    pub listen: String,

    /// Deployment environment.
    #[builder(default)]
    pub environment: Environment,

    /// Rule file path. `None` starts a server with no routes.
    #[builder(default)]
    pub config_file: Option<String>,

    /// Explicit log filter; `None` uses the environment default.
    #[builder(default)]
    pub log_level: Option<String>,

    /// Global per-request deadline.
    #[builder(default = Duration::from_secs(60))]
    pub request_timeout: Duration,

    /// Echo request diagnostics in route-miss responses.
    #[builder(default = false)]
    pub debug: bool,

    /// Route and log by `X-Forwarded-Host` when present.
    #[builder(default = false)]
    pub trust_forwarded_host: bool,

    /// Enable the in-memory response cache.
    #[builder(default = false)]
    pub cache_enabled: bool,

    /// Maximum number of cached responses.
    #[builder(default = 1024)]
    pub cache_capacity: usize,

    /// Lifetime of a cached response.
    #[builder(default = Duration::from_secs(60))]
    pub cache_ttl: Duration,

    /// Largest body, in bytes, the cache will hold.
    #[builder(default = 1_048_576)]
    pub cache_max_entry_bytes: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// An environment value that was rejected while loading [`GatewayConfig`].
///
/// The default is kept for the variable. Rejections are returned to the
/// caller so they can be reported once logging is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedValue {
    /// Variable name.
    pub variable: &'static str,
    /// The value as given.
    pub value: String,
    /// Why it was rejected.
    pub reason: String,
}

impl fmt::Display for RejectedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?}: {}", self.variable, self.value, self.reason)
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `STATICPROXY_LISTEN` | `0.0.0.0:8080` |
    /// | `STATICPROXY_ENV` | `dev` |
    /// | `STATICPROXY_CONFIG` | *(unset)* |
    /// | `LOG_LEVEL` | per environment |
    /// | `STATICPROXY_REQUEST_TIMEOUT_SECS` | `60` |
    /// | `STATICPROXY_DEBUG` | `false` |
    /// | `STATICPROXY_TRUST_FORWARDED_HOST` | `false` |
    /// | `STATICPROXY_CACHE` | `false` |
    /// | `STATICPROXY_CACHE_CAPACITY` | `1024` |
    /// | `STATICPROXY_CACHE_TTL_SECS` | `60` |
    /// | `STATICPROXY_CACHE_MAX_ENTRY_BYTES` | `1048576` |
    ///
    /// Unparseable values, and a zero request timeout, keep the default and
    /// are returned alongside the configuration.
    #[must_use]
    pub fn from_env() -> (Self, Vec<RejectedValue>) {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> (Self, Vec<RejectedValue>) {
        let mut config = Self::default();
        let mut rejected = Vec::new();

        if let Some(v) = lookup("STATICPROXY_LISTEN") {
            config.listen = v;
        }
        if let Some(v) = lookup("STATICPROXY_ENV") {
            match v.parse() {
                Ok(env) => config.environment = env,
                Err(reason) => rejected.push(RejectedValue {
                    variable: "STATICPROXY_ENV",
                    value: v,
                    reason,
                }),
            }
        }
        if let Some(v) = lookup("STATICPROXY_CONFIG") {
            if !v.is_empty() {
                config.config_file = Some(v);
            }
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = Some(v);
        }
        if let Some(secs) =
            parse_number::<u64>(&lookup, "STATICPROXY_REQUEST_TIMEOUT_SECS", &mut rejected)
        {
            if secs == 0 {
                rejected.push(RejectedValue {
                    variable: "STATICPROXY_REQUEST_TIMEOUT_SECS",
                    value: secs.to_string(),
                    reason: "timeout must be at least one second".to_owned(),
                });
            } else {
                config.request_timeout = Duration::from_secs(secs);
            }
        }
        if let Some(v) = lookup("STATICPROXY_DEBUG") {
            config.debug = parse_bool(&v);
        }
        if let Some(v) = lookup("STATICPROXY_TRUST_FORWARDED_HOST") {
            config.trust_forwarded_host = parse_bool(&v);
        }
        if let Some(v) = lookup("STATICPROXY_CACHE") {
            config.cache_enabled = parse_bool(&v);
        }
        if let Some(n) = parse_number::<usize>(&lookup, "STATICPROXY_CACHE_CAPACITY", &mut rejected)
        {
            config.cache_capacity = n;
        }
        if let Some(secs) =
            parse_number::<u64>(&lookup, "STATICPROXY_CACHE_TTL_SECS", &mut rejected)
        {
            config.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(n) =
            parse_number::<u64>(&lookup, "STATICPROXY_CACHE_MAX_ENTRY_BYTES", &mut rejected)
        {
            config.cache_max_entry_bytes = n;
        }

        (config, rejected)
    }

    /// The effective log filter.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_level
            .as_deref()
            .unwrap_or_else(|| self.environment.default_log_level())
    }
}

fn parse_number<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    variable: &'static str,
    rejected: &mut Vec<RejectedValue>,
) -> Option<T> {
    let value = lookup(variable)?;
    match value.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            rejected.push(RejectedValue {
                variable,
                value,
                reason: "not a number".to_owned(),
            });
            None
        }
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
