//! Error types for configuration loading and rule validation.

/// Errors raised while loading or validating configuration.
///
/// All of these are fatal at startup; none of them can occur while serving.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The rule file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that was being read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The rule file is not valid YAML/JSON or does not match the schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A rule names no backend.
    #[error("handler #{index} does not name a backend (set s3_bucket or gcs_bucket)")]
    NoBackend {
        /// Position of the rule in the `handlers` sequence.
        index: usize,
    },

    /// A rule names more than one backend.
    #[error("handler #{index} names both an S3 and a GCS backend")]
    AmbiguousBackend {
        /// Position of the rule in the `handlers` sequence.
        index: usize,
    },

    /// A rule is otherwise invalid.
    #[error("handler #{index}: {message}")]
    InvalidRule {
        /// Position of the rule in the `handlers` sequence.
        index: usize,
        /// What is wrong with it.
        message: String,
    },
}

/// Convenience result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
