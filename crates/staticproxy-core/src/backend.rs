//! Backend selection for a resolved rule.

use crate::error::{ConfigError, ConfigResult};
use crate::rules::HandlerRule;

/// The object store a rule is bound to, with its connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSpec {
    /// An S3 or S3-compatible bucket.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Region; `None` defers to the AWS default provider chain.
        region: Option<String>,
        /// Custom endpoint URL.
        endpoint: Option<String>,
        /// Path-style addressing.
        force_path_style: bool,
    },
    /// A Google Cloud Storage bucket.
    Gcs {
        /// Bucket name.
        bucket: String,
        /// Service account key file; `None` uses ambient credentials.
        key_file: Option<String>,
    },
}

impl BackendSpec {
    /// Short backend name used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::S3 { .. } => "s3",
            Self::Gcs { .. } => "gcs",
        }
    }

    /// The bucket this backend serves.
    #[must_use]
    pub fn bucket(&self) -> &str {
        match self {
            Self::S3 { bucket, .. } | Self::Gcs { bucket, .. } => bucket,
        }
    }
}

impl HandlerRule {
    /// Pick the backend for this rule.
    ///
    /// S3 is selected by `s3_bucket`, GCS by `gcs_bucket`. A region or key
    /// file alone selects nothing, so defaults may carry both safely.
    /// `index` is the rule's position, used in error messages.
    pub fn backend_spec(&self, index: usize) -> ConfigResult<BackendSpec> {
        let wants_s3 = !self.s3_bucket.is_empty();
        let wants_gcs = !self.gcs_bucket.is_empty();

        match (wants_s3, wants_gcs) {
            (true, true) => Err(ConfigError::AmbiguousBackend { index }),
            (false, false) => Err(ConfigError::NoBackend { index }),
            (true, false) => Ok(BackendSpec::S3 {
                bucket: self.s3_bucket.clone(),
                region: non_empty(&self.s3_region),
                endpoint: non_empty(&self.s3_endpoint),
                force_path_style: self.s3_force_path_style.unwrap_or(false),
            }),
            (false, true) => Ok(BackendSpec::Gcs {
                bucket: self.gcs_bucket.clone(),
                key_file: non_empty(&self.gcs_key_file),
            }),
        }
    }

    /// The key prefix prepended for whichever backend this rule names.
    #[must_use]
    pub fn backend_prefix(&self) -> &str {
        if self.gcs_bucket.is_empty() {
            &self.s3_prefix
        } else {
            &self.gcs_prefix
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}
