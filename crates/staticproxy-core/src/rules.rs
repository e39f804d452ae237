//! Routing rule schema and the defaults merge.
//!
//! A rule file has two top-level keys:
//!
//! ```yaml
//! defaults:
//!   s3_region: us-west-2
//!   index_files: [index.html]
//! handlers:
//!   - path_prefix: /static/
//!     s3_bucket: site-assets
//!     s3_prefix: /assets/
//! ```
//!
//! Every handler inherits unset fields from `defaults` exactly once, at load
//! time, through [`ConfigRoot::into_resolved`]. Request-time code never sees
//! the defaults block.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// One routing entry as written in the rule file.
///
/// String fields use the empty string as "unset", so a field that is absent
/// and a field that is explicitly `""` both inherit from the defaults rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HandlerRule {
    /// Exact host to match. Empty matches any host.
    pub host: String,
    /// Exact path to match. Takes precedence over `path_prefix`.
    pub path: String,
    /// Path prefix to match; also the prefix stripped before rewriting.
    pub path_prefix: String,

    /// S3 bucket name.
    pub s3_bucket: String,
    /// Key prefix prepended for the S3 backend.
    pub s3_prefix: String,
    /// S3 region. Falls back to the AWS default provider chain when empty.
    pub s3_region: String,
    /// Custom endpoint for S3-compatible servers.
    pub s3_endpoint: String,
    /// Use path-style bucket addressing against `s3_endpoint`.
    pub s3_force_path_style: Option<bool>,

    /// GCS bucket name.
    pub gcs_bucket: String,
    /// Key prefix prepended for the GCS backend.
    pub gcs_prefix: String,
    /// Service account key file. Empty uses ambient credentials.
    pub gcs_key_file: String,

    /// Whether to render a listing when no index file resolves.
    pub autoindex: Option<bool>,
    /// Index file names probed in order for directory requests.
    pub index_files: Vec<String>,
}

/// Directory-handling options resolved for one rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleOptions {
    /// Tri-state autoindex flag; `None` means deny.
    pub autoindex: Option<bool>,
    /// Index file names probed in declaration order.
    pub index_files: Vec<String>,
}

impl RuleOptions {
    /// Whether directory listings may be rendered.
    #[must_use]
    pub fn autoindex_enabled(&self) -> bool {
        self.autoindex.unwrap_or(false)
    }
}

impl HandlerRule {
    /// Fill every unset field from `defaults`.
    ///
    /// This is a shallow, field-by-field merge: a non-empty `index_files` on
    /// the rule replaces the default list entirely.
    pub fn apply_defaults(&mut self, defaults: &HandlerRule) {
        inherit(&mut self.host, &defaults.host);
        inherit(&mut self.path, &defaults.path);
        inherit(&mut self.path_prefix, &defaults.path_prefix);

        inherit(&mut self.s3_bucket, &defaults.s3_bucket);
        inherit(&mut self.s3_prefix, &defaults.s3_prefix);
        inherit(&mut self.s3_region, &defaults.s3_region);
        inherit(&mut self.s3_endpoint, &defaults.s3_endpoint);
        if self.s3_force_path_style.is_none() {
            self.s3_force_path_style = defaults.s3_force_path_style;
        }

        inherit(&mut self.gcs_bucket, &defaults.gcs_bucket);
        inherit(&mut self.gcs_prefix, &defaults.gcs_prefix);
        inherit(&mut self.gcs_key_file, &defaults.gcs_key_file);

        if self.autoindex.is_none() {
            self.autoindex = defaults.autoindex;
        }
        if self.index_files.is_empty() {
            self.index_files.clone_from(&defaults.index_files);
        }
    }

    /// The directory-handling options of this rule.
    #[must_use]
    pub fn options(&self) -> RuleOptions {
        RuleOptions {
            autoindex: self.autoindex,
            index_files: self.index_files.clone(),
        }
    }
}

fn inherit(field: &mut String, default: &str) {
    if field.is_empty() && !default.is_empty() {
        default.clone_into(field);
    }
}

/// The root of a rule file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigRoot {
    /// Fallback values for every handler.
    pub defaults: Option<HandlerRule>,
    /// Rules in match order; the first qualifying rule wins.
    pub handlers: Vec<HandlerRule>,
}

impl ConfigRoot {
    /// Load a rule file. JSON is accepted as well, being a subset of YAML.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse a rule file from a string.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Merge the defaults into every handler and return the handlers in
    /// declaration order.
    #[must_use]
    pub fn into_resolved(self) -> Vec<HandlerRule> {
        let Self { defaults, handlers } = self;
        match defaults {
            Some(defaults) => handlers
                .into_iter()
                .map(|mut rule| {
                    rule.apply_defaults(&defaults);
                    rule
                })
                .collect(),
            None => handlers,
        }
    }
}
