//! In-process object store.
//!
//! Holds objects in a map and implements [`ObjectStore`] with the same
//! semantics as the cloud backends. Used by tests and for local runs.
//! Per-key failures can be injected to exercise error paths.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::DateTime;
use parking_lot::RwLock;

use staticproxy_core::BackendSpec;

use crate::attributes::ObjectAttributes;
use crate::connector::StoreConnector;
use crate::error::{StoreError, StoreResult};
use crate::listing::{DirectoryEntry, DirectoryListing};
use crate::store::{ObjectStore, StoredObject};

/// A stored object: attributes plus body chunks.
#[derive(Debug, Clone, Default)]
pub struct MemoryObject {
    /// Attributes returned as-is from `get_object`.
    pub attributes: ObjectAttributes,
    /// Body chunks, yielded in order.
    pub chunks: Vec<Bytes>,
    /// Fail the body stream after all chunks are yielded.
    pub fail_mid_stream: bool,
}

impl MemoryObject {
    /// An object with a body and content type. Content length and a fixed
    /// last-modified time are filled in.
    #[must_use]
    pub fn new(content_type: &str, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        Self {
            attributes: ObjectAttributes {
                content_type: Some(content_type.to_owned()),
                content_length: Some(body.len() as u64),
                last_modified: DateTime::from_timestamp(1_700_000_000, 0),
                ..Default::default()
            },
            chunks: vec![body],
            fail_mid_stream: false,
        }
    }

    /// An object with explicit attributes.
    #[must_use]
    pub fn with_attributes(attributes: ObjectAttributes, body: impl Into<Bytes>) -> Self {
        Self {
            attributes,
            chunks: vec![body.into()],
            fail_mid_stream: false,
        }
    }

    fn size(&self) -> u64 {
        self.attributes
            .content_length
            .unwrap_or_else(|| self.chunks.iter().map(|c| c.len() as u64).sum())
    }
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<String, MemoryObject>,
    failures: HashMap<String, (u16, String)>,
    calls: Vec<String>,
}

/// A map-backed [`ObjectStore`]. Cloning shares the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    name: String,
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    /// Create an empty store labelled `name` in logs.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::default(),
        }
    }

    /// Insert or replace an object.
    pub fn insert(&self, key: impl Into<String>, object: MemoryObject) {
        self.inner.write().objects.insert(key.into(), object);
    }

    /// Make every call touching `key` fail with a backend error.
    pub fn fail_key(&self, key: impl Into<String>, status: u16, code: impl Into<String>) {
        self.inner
            .write()
            .failures
            .insert(key.into(), (status, code.into()));
    }

    /// Operations performed so far, as `"<op> <key>"`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.inner.read().calls.clone()
    }

    fn record(&self, op: &str, key: &str) -> StoreResult<()> {
        let mut inner = self.inner.write();
        inner.calls.push(format!("{op} {key}"));
        match inner.failures.get(key) {
            Some((status, code)) => Err(StoreError::backend(
                Some(*status),
                code.clone(),
                format!("injected failure for {key}"),
                Some(format!("mem-{}", inner.calls.len())),
            )),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn head_object(&self, key: &str) -> StoreResult<bool> {
        self.record("head", key)?;
        Ok(self.inner.read().objects.contains_key(key))
    }

    async fn get_object(&self, key: &str) -> StoreResult<StoredObject> {
        self.record("get", key)?;
        let object = self
            .inner
            .read()
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(key))?;

        let mut items: Vec<io::Result<Bytes>> = object.chunks.into_iter().map(Ok).collect();
        if object.fail_mid_stream {
            items.push(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "stream interrupted",
            )));
        }
        Ok(StoredObject {
            attributes: object.attributes,
            body: Box::pin(futures::stream::iter(items)),
        })
    }

    async fn list_objects(&self, prefix: &str, delimiter: &str) -> StoreResult<DirectoryListing> {
        self.record("list", prefix)?;
        let inner = self.inner.read();
        let mut listing = DirectoryListing::default();

        for (key, object) in inner.objects.range(prefix.to_owned()..) {
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };
            match rest.find(delimiter) {
                Some(pos) if !delimiter.is_empty() => {
                    let common = &rest[..pos + delimiter.len()];
                    if listing.prefixes.last().map(String::as_str) != Some(common) {
                        listing.prefixes.push(common.to_owned());
                    }
                }
                _ => listing.entries.push(DirectoryEntry {
                    name: rest.to_owned(),
                    size: object.size(),
                    last_modified: object.attributes.last_modified,
                }),
            }
        }
        Ok(listing)
    }

    fn describe(&self) -> String {
        format!("memory://{}", self.name)
    }
}

/// Hands out one [`MemoryStore`] per bucket name, creating it on first use.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    stores: Arc<RwLock<HashMap<String, MemoryStore>>>,
}

impl MemoryConnector {
    /// The store for `bucket`, shared with every route bound to it.
    #[must_use]
    pub fn bucket(&self, bucket: &str) -> MemoryStore {
        self.stores
            .write()
            .entry(bucket.to_owned())
            .or_insert_with(|| MemoryStore::new(bucket))
            .clone()
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(&self, spec: &BackendSpec) -> StoreResult<Arc<dyn ObjectStore>> {
        Ok(Arc::new(self.bucket(spec.bucket())))
    }
}
