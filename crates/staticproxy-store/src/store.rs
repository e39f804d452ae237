//! The object store capability interface.

use std::fmt;
use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;

use crate::attributes::ObjectAttributes;
use crate::error::StoreResult;
use crate::listing::DirectoryListing;

/// Object body as a stream of chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// A fetched object: normalized metadata plus its body.
pub struct StoredObject {
    /// Metadata projected from the backend response.
    pub attributes: ObjectAttributes,
    /// Object body. Not yet read.
    pub body: ByteStream,
}

impl fmt::Debug for StoredObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredObject")
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

/// Read-only access to one bucket.
///
/// Implementations are long-lived, shared between all in-flight requests,
/// and hold no per-request state. Dropping a returned future cancels the
/// underlying call.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync + fmt::Debug {
    /// Probe whether `key` exists.
    ///
    /// Returns `Ok(false)` only for a genuine not-found. Any other failure
    /// is returned as an error.
    async fn head_object(&self, key: &str) -> StoreResult<bool>;

    /// Fetch `key` with its metadata.
    async fn get_object(&self, key: &str) -> StoreResult<StoredObject>;

    /// List the objects and sub-prefixes directly under `prefix`.
    async fn list_objects(&self, prefix: &str, delimiter: &str) -> StoreResult<DirectoryListing>;

    /// Short description for logs, e.g. `s3://bucket`.
    fn describe(&self) -> String;
}
