//! Google Cloud Storage backend over OpenDAL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use opendal::{ErrorKind, Metadata, Operator, services};

use crate::attributes::ObjectAttributes;
use crate::error::{StoreError, StoreResult};
use crate::listing::{DirectoryEntry, DirectoryListing, relative_name};
use crate::store::{ObjectStore, StoredObject};

/// Connection parameters for a [`GcsStore`].
#[derive(Debug, Clone, Default)]
pub struct GcsOptions {
    /// Bucket name.
    pub bucket: String,
    /// Service account key file; `None` uses ambient credentials.
    pub key_file: Option<String>,
}

/// A bucket served through the GCS JSON API.
#[derive(Debug, Clone)]
pub struct GcsStore {
    operator: Operator,
    bucket: String,
}

impl GcsStore {
    /// Build an operator for `options.bucket`.
    pub fn connect(options: &GcsOptions) -> StoreResult<Self> {
        let mut builder = services::Gcs::default().bucket(&options.bucket);
        if let Some(path) = &options.key_file {
            builder = builder.credential_path(path);
        }
        let operator = Operator::new(builder)
            .map_err(|e| StoreError::Build {
                backend: "gcs",
                message: e.to_string(),
            })?
            .finish();
        Ok(Self::from_operator(operator, options.bucket.clone()))
    }

    /// Wrap an existing operator.
    #[must_use]
    pub fn from_operator(operator: Operator, bucket: impl Into<String>) -> Self {
        Self {
            operator,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn head_object(&self, key: &str) -> StoreResult<bool> {
        match self.operator.stat(key).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(map_error(&e, key)),
        }
    }

    async fn get_object(&self, key: &str) -> StoreResult<StoredObject> {
        let metadata = self
            .operator
            .stat(key)
            .await
            .map_err(|e| map_error(&e, key))?;
        let attributes = attributes_from_metadata(&metadata);

        if attributes.is_prefix_marker {
            return Ok(StoredObject {
                attributes,
                body: Box::pin(futures::stream::empty()),
            });
        }

        let stream = self
            .operator
            .reader(key)
            .await
            .map_err(|e| map_error(&e, key))?
            .into_bytes_stream(..)
            .await
            .map_err(|e| map_error(&e, key))?;

        Ok(StoredObject {
            attributes,
            body: Box::pin(stream),
        })
    }

    async fn list_objects(&self, prefix: &str, delimiter: &str) -> StoreResult<DirectoryListing> {
        let path = if prefix.is_empty() { delimiter } else { prefix };
        let entries = self
            .operator
            .lister_with(path)
            .await
            .map_err(|e| map_error(&e, prefix))?
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| map_error(&e, prefix))?;

        let mut listing = DirectoryListing::default();
        for entry in entries {
            let name = relative_name(entry.path(), path);
            if name.is_empty() {
                continue;
            }
            let metadata = entry.metadata();
            if metadata.is_dir() {
                listing.prefixes.push(name.to_owned());
            } else {
                listing.entries.push(DirectoryEntry {
                    name: name.to_owned(),
                    size: metadata.content_length(),
                    last_modified: last_modified(metadata),
                });
            }
        }
        Ok(listing)
    }

    fn describe(&self) -> String {
        format!("gcs://{}", self.bucket)
    }
}

fn attributes_from_metadata(metadata: &Metadata) -> ObjectAttributes {
    let is_dir = metadata.is_dir();
    ObjectAttributes {
        content_type: metadata.content_type().map(str::to_owned),
        content_encoding: metadata.content_encoding().map(str::to_owned),
        content_language: None,
        content_disposition: metadata.content_disposition().map(str::to_owned),
        cache_control: metadata.cache_control().map(str::to_owned),
        etag: metadata.etag().map(str::to_owned),
        expires: None,
        last_modified: last_modified(metadata),
        content_length: (!is_dir).then(|| metadata.content_length()),
        version_id: metadata.version().map(str::to_owned),
        user_metadata: metadata.user_metadata().cloned().unwrap_or_default(),
        website_redirect_location: None,
        is_prefix_marker: is_dir,
        content_range: None,
    }
}

/// Parse the RFC 3339 rendering of OpenDAL's timestamp.
fn last_modified(metadata: &Metadata) -> Option<DateTime<Utc>> {
    let rendered = metadata.last_modified()?.to_string();
    DateTime::parse_from_rfc3339(&rendered)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| rendered.parse::<DateTime<Utc>>())
        .ok()
}

fn map_error(err: &opendal::Error, key: &str) -> StoreError {
    match err.kind() {
        ErrorKind::NotFound => StoreError::not_found(key),
        ErrorKind::PermissionDenied => {
            StoreError::backend(Some(403), "PermissionDenied", err.to_string(), None)
        }
        ErrorKind::RateLimited => {
            StoreError::backend(Some(429), "RateLimited", err.to_string(), None)
        }
        kind => StoreError::backend(None, kind.to_string(), err.to_string(), None),
    }
}
