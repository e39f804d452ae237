//! staticproxy server - serve object store buckets as static websites.
//!
//! Loads the rule file, connects one object store per rule, and serves
//! `GET` requests by resolving them to objects, index files, directory
//! listings, or redirects.
//!
//! # Usage
//!
//! ```text
//! STATICPROXY_CONFIG=/etc/staticproxy.yaml staticproxy-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `STATICPROXY_LISTEN` | `0.0.0.0:8080` | Bind address |
//! | `STATICPROXY_ENV` | `dev` | `dev` (text logs) or `prod` (JSON logs) |
//! | `STATICPROXY_CONFIG` | *(unset)* | Rule file; unset serves no routes |
//! | `STATICPROXY_REQUEST_TIMEOUT_SECS` | `60` | Global request timeout |
//! | `STATICPROXY_DEBUG` | `false` | Echo request details on route miss |
//! | `STATICPROXY_TRUST_FORWARDED_HOST` | `false` | Route by `X-Forwarded-Host` |
//! | `STATICPROXY_CACHE` | `false` | Enable the response cache |
//! | `LOG_LEVEL` | per environment | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::net::SocketAddr;

use anyhow::{Context, Result};
use staticproxy_core::{ConfigRoot, Environment, GatewayConfig, RejectedValue};
use staticproxy_http::server::serve;
use staticproxy_http::service::HEALTH_PATH;
use staticproxy_http::{Gateway, RouteTable};
use staticproxy_store::CloudConnector;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise the configured filter. `prod` logs JSON.
fn init_tracing(config: &GatewayConfig) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = config.log_filter();
        EnvFilter::try_new(level).with_context(|| format!("invalid log level filter: {level}"))?
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match config.environment {
        Environment::Dev => builder.init(),
        Environment::Prod => builder.json().with_current_span(true).init(),
    }

    Ok(())
}

/// Log every environment value that was ignored while loading the config.
fn report_rejected(rejected: &[RejectedValue]) {
    for value in rejected {
        warn!(
            variable = value.variable,
            value = %value.value,
            reason = %value.reason,
            "ignoring environment value, keeping default"
        );
    }
}

/// Load and resolve the rule file, if one is configured.
fn load_rules(config: &GatewayConfig) -> Result<ConfigRoot> {
    match &config.config_file {
        Some(path) => {
            ConfigRoot::load(path).with_context(|| format!("failed to load rules from {path}"))
        }
        None => {
            warn!("STATICPROXY_CONFIG is not set, serving no routes");
            Ok(ConfigRoot::default())
        }
    }
}

/// Perform a health check by connecting to the gateway and requesting the health endpoint.
///
/// Exits with code 0 if healthy, 1 otherwise.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request = format!("GET {HEALTH_PATH} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if response.starts_with("HTTP/1.1 200") && response.ends_with("ok") {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --health-check flag for container health checks.
    if std::env::args().any(|a| a == "--health-check") {
        let (config, _) = GatewayConfig::from_env();
        let addr = config.listen.replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    let (config, rejected) = GatewayConfig::from_env();

    init_tracing(&config)?;
    report_rejected(&rejected);

    info!(
        listen = %config.listen,
        environment = %config.environment,
        config_file = ?config.config_file,
        request_timeout_secs = config.request_timeout.as_secs(),
        debug = config.debug,
        trust_forwarded_host = config.trust_forwarded_host,
        cache = config.cache_enabled,
        version = VERSION,
        "starting staticproxy",
    );
    if config.debug && config.environment == Environment::Prod {
        warn!("debug diagnostics are enabled in prod; route misses will echo request headers");
    }

    let rules = load_rules(&config)?.into_resolved();
    let routes = RouteTable::build(&rules, &CloudConnector)
        .await
        .context("failed to build route table")?;
    info!(routes = routes.len(), "route table ready");

    let addr: SocketAddr = config
        .listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.listen))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "listening for connections");

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    serve(listener, Gateway::new(routes, config), shutdown).await;
    Ok(())
}
