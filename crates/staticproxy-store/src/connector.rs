//! Backend construction from rule configuration.

use std::sync::Arc;

use async_trait::async_trait;
use staticproxy_core::BackendSpec;
use tracing::info;

use crate::error::StoreResult;
use crate::gcs::{GcsOptions, GcsStore};
use crate::s3::{S3Options, S3Store};
use crate::store::ObjectStore;

/// Builds the store a route is bound to.
///
/// Route table construction goes through this seam so tests can bind
/// in-memory stores while the server binds cloud clients.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Build a store for `spec`. Errors are fatal at startup.
    async fn connect(&self, spec: &BackendSpec) -> StoreResult<Arc<dyn ObjectStore>>;
}

/// Connects to S3 and GCS with the default credential chains.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloudConnector;

#[async_trait]
impl StoreConnector for CloudConnector {
    async fn connect(&self, spec: &BackendSpec) -> StoreResult<Arc<dyn ObjectStore>> {
        let store: Arc<dyn ObjectStore> = match spec {
            BackendSpec::S3 {
                bucket,
                region,
                endpoint,
                force_path_style,
            } => Arc::new(
                S3Store::connect(S3Options {
                    bucket: bucket.clone(),
                    region: region.clone(),
                    endpoint: endpoint.clone(),
                    force_path_style: *force_path_style,
                })
                .await?,
            ),
            BackendSpec::Gcs { bucket, key_file } => Arc::new(GcsStore::connect(&GcsOptions {
                bucket: bucket.clone(),
                key_file: key_file.clone(),
            })?),
        };
        info!(backend = spec.kind(), store = %store.describe(), "backend connected");
        Ok(store)
    }
}
