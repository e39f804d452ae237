//! Object store capability interface for staticproxy.
//!
//! Every backend implements [`ObjectStore`], a three-operation interface
//! (existence probe, fetch, delimited list) with backend-agnostic results:
//!
//! - [`ObjectAttributes`]: normalized object metadata, with "absent" kept
//!   distinct from "empty" or "zero".
//! - [`DirectoryListing`]: one page of a delimited listing.
//! - [`StoreError`]: not-found kept distinct from backend and transport
//!   failures.
//!
//! Concrete backends:
//!
//! - [`s3::S3Store`] over `aws-sdk-s3`
//! - [`gcs::GcsStore`] over OpenDAL's GCS service
//! - [`memory::MemoryStore`], an in-process store for tests and local use,
//!   with [`memory::MemoryConnector`] to bind it by bucket name
//!
//! [`connector::CloudConnector`] builds the right backend for a
//! [`BackendSpec`](staticproxy_core::BackendSpec) at startup.

pub mod attributes;
pub mod connector;
pub mod error;
pub mod gcs;
pub mod listing;
pub mod memory;
pub mod s3;
pub mod store;

pub use attributes::ObjectAttributes;
pub use connector::{CloudConnector, StoreConnector};
pub use error::{StoreError, StoreResult};
pub use listing::{DirectoryEntry, DirectoryListing};
pub use memory::{MemoryConnector, MemoryObject, MemoryStore};
pub use store::{ByteStream, ObjectStore, StoredObject};
