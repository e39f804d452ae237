//! S3 and S3-compatible backend over `aws-sdk-s3`.

use std::io;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::RequestId;
use aws_sdk_s3::operation::get_object::GetObjectOutput;
use aws_sdk_s3::primitives::{ByteStream as SdkByteStream, DateTime as SdkDateTime};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::attributes::ObjectAttributes;
use crate::error::{StoreError, StoreResult};
use crate::listing::{DirectoryEntry, DirectoryListing, relative_name};
use crate::store::{ByteStream, ObjectStore, StoredObject};

/// Connection parameters for an [`S3Store`].
#[derive(Debug, Clone, Default)]
pub struct S3Options {
    /// Bucket name.
    pub bucket: String,
    /// Region; `None` defers to the default provider chain.
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible servers.
    pub endpoint: Option<String>,
    /// Path-style addressing.
    pub force_path_style: bool,
}

/// A bucket served through the AWS S3 API.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Build a client from the default provider chain plus `options`.
    ///
    /// Fails when no region can be determined.
    pub async fn connect(options: S3Options) -> StoreResult<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = options.region.clone() {
            loader = loader.region(Region::new(region));
        }
        let sdk_config = loader.load().await;

        if sdk_config.region().is_none() {
            return Err(StoreError::Build {
                backend: "s3",
                message: format!("no region configured for bucket {}", options.bucket),
            });
        }

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(options.force_path_style);
        if let Some(endpoint) = options.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        debug!(bucket = %options.bucket, region = ?sdk_config.region(), "s3 client ready");
        Ok(Self::from_client(
            Client::from_conf(builder.build()),
            options.bucket,
        ))
    }

    /// Wrap an existing client.
    #[must_use]
    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn head_object(&self, key: &str) -> StoreResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => match map_sdk_error(err, key, |e| e.is_not_found()) {
                StoreError::NotFound { .. } => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn get_object(&self, key: &str) -> StoreResult<StoredObject> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| map_sdk_error(err, key, |e| e.is_no_such_key()))?;

        let attributes = attributes_from_output(&output);
        Ok(StoredObject {
            attributes,
            body: byte_stream(output.body),
        })
    }

    async fn list_objects(&self, prefix: &str, delimiter: &str) -> StoreResult<DirectoryListing> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .delimiter(delimiter)
            .send()
            .await
            .map_err(|err| map_sdk_error(err, prefix, |_| false))?;

        let entries = output
            .contents()
            .iter()
            .filter_map(|object| {
                let name = relative_name(object.key()?, prefix);
                Some(DirectoryEntry {
                    name: name.to_owned(),
                    size: object
                        .size()
                        .and_then(|s| u64::try_from(s).ok())
                        .unwrap_or(0),
                    last_modified: object.last_modified().and_then(to_chrono),
                })
            })
            .collect();

        let prefixes = output
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix())
            .map(|p| relative_name(p, prefix).to_owned())
            .collect();

        Ok(DirectoryListing {
            entries,
            prefixes,
            is_truncated: output.is_truncated().unwrap_or(false),
        })
    }

    fn describe(&self) -> String {
        format!("s3://{}", self.bucket)
    }
}

fn attributes_from_output(output: &GetObjectOutput) -> ObjectAttributes {
    ObjectAttributes {
        content_type: output.content_type().map(str::to_owned),
        content_encoding: output.content_encoding().map(str::to_owned),
        content_language: output.content_language().map(str::to_owned),
        content_disposition: output.content_disposition().map(str::to_owned),
        cache_control: output.cache_control().map(str::to_owned),
        etag: output.e_tag().map(str::to_owned),
        expires: output.expires_string().map(str::to_owned),
        last_modified: output.last_modified().and_then(to_chrono),
        content_length: output
            .content_length()
            .and_then(|len| u64::try_from(len).ok()),
        version_id: output.version_id().map(str::to_owned),
        user_metadata: output.metadata().cloned().unwrap_or_default(),
        website_redirect_location: output.website_redirect_location().map(str::to_owned),
        is_prefix_marker: ObjectAttributes::is_directory_content_type(output.content_type()),
        content_range: output.content_range().map(str::to_owned),
    }
}

fn to_chrono(value: &SdkDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}

fn byte_stream(body: SdkByteStream) -> ByteStream {
    Box::pin(futures::stream::unfold(body, |mut body| async move {
        body.next()
            .await
            .map(|chunk| (chunk.map_err(io::Error::other), body))
    }))
}

/// Translate an SDK error, keeping not-found apart from everything else.
fn map_sdk_error<E>(
    err: SdkError<E, HttpResponse>,
    key: &str,
    is_not_found: impl Fn(&E) -> bool,
) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let status = err.raw_response().map(|raw| raw.status().as_u16());
    let request_id = err.request_id().map(str::to_owned);

    if let SdkError::ServiceError(context) = &err {
        let service = context.err();
        if is_not_found(service) || status == Some(404) {
            return StoreError::not_found(key);
        }
        return StoreError::backend(
            status,
            service.code().unwrap_or("Unknown"),
            service.message().unwrap_or_default(),
            request_id,
        );
    }

    if status == Some(404) {
        return StoreError::not_found(key);
    }
    StoreError::Transport(DisplayErrorContext(&err).to_string())
}
