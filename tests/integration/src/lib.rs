//! End-to-end tests for the staticproxy gateway.
//!
//! Most tests start a gateway on `127.0.0.1:0` backed by in-memory stores
//! and talk to it over real HTTP with `reqwest`.
//!
//! Tests in `test_s3` need an S3-compatible server (e.g. MinIO) and are
//! marked `#[ignore]`. Run them with:
//! ```text
//! S3_ENDPOINT_URL=http://localhost:9000 cargo test -p staticproxy-integration -- --ignored
//! ```

use std::net::SocketAddr;
use std::sync::Once;

use staticproxy_core::{ConfigRoot, GatewayConfig};
use staticproxy_http::server::serve;
use staticproxy_http::{Gateway, RouteTable};
use staticproxy_store::{MemoryConnector, MemoryStore, StoreConnector};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A gateway running on an ephemeral port.
#[derive(Debug)]
pub struct TestGateway {
    addr: SocketAddr,
    connector: MemoryConnector,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl TestGateway {
    /// Start a gateway for `rules` (YAML) backed by in-memory stores.
    pub async fn start(rules: &str, config: GatewayConfig) -> Self {
        let connector = MemoryConnector::default();
        let (addr, shutdown, task) = start_with(rules, config, &connector).await;
        Self {
            addr,
            connector,
            shutdown,
            task,
        }
    }

    /// Absolute URL for `path_and_query` on this gateway.
    #[must_use]
    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{path_and_query}", self.addr)
    }

    /// The in-memory store behind `bucket`.
    #[must_use]
    pub fn bucket(&self, bucket: &str) -> MemoryStore {
        self.connector.bucket(bucket)
    }

    /// Stop accepting connections and wait for the server to drain.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.task.await;
    }
}

/// Start a gateway for `rules` using `connector`, returning its address, a
/// shutdown trigger, and the server task.
pub async fn start_with(
    rules: &str,
    config: GatewayConfig,
    connector: &dyn StoreConnector,
) -> (SocketAddr, oneshot::Sender<()>, JoinHandle<()>) {
    init_tracing();

    let rules = ConfigRoot::from_yaml(rules)
        .expect("valid rules")
        .into_resolved();
    let routes = RouteTable::build(&rules, connector)
        .await
        .expect("route table");
    let gateway = Gateway::new(routes, config);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (tx, rx) = oneshot::channel::<()>();
    let task = tokio::spawn(serve(listener, gateway, async move {
        let _ = rx.await;
    }));
    (addr, tx, task)
}

/// HTTP client that does not follow redirects.
#[must_use]
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("client")
}

mod test_cache;
mod test_content;
mod test_routing;
mod test_s3;
