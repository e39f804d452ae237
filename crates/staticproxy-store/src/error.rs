//! Object store error types.

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure of an object store call.
///
/// `NotFound` is an expected outcome and is kept apart from every other
/// failure so callers never confuse a transient error with a missing key.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key does not exist.
    #[error("object not found: {key}")]
    NotFound {
        /// The key that was looked up.
        key: String,
    },

    /// The backend answered with an error.
    #[error("{code}: {message}")]
    Backend {
        /// HTTP status reported by the backend, when derivable.
        status: Option<u16>,
        /// Backend error code, e.g. `AccessDenied`.
        code: String,
        /// Backend error message.
        message: String,
        /// Backend request id, for tracing the call upstream.
        request_id: Option<String>,
    },

    /// The backend could not be reached or the response could not be read.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend client could not be constructed.
    #[error("cannot build {backend} client: {message}")]
    Build {
        /// Backend kind, `s3` or `gcs`.
        backend: &'static str,
        /// What went wrong.
        message: String,
    },
}

impl StoreError {
    /// Create a backend error.
    #[must_use]
    pub fn backend(
        status: Option<u16>,
        code: impl Into<String>,
        message: impl Into<String>,
        request_id: Option<String>,
    ) -> Self {
        Self::Backend {
            status,
            code: code.into(),
            message: message.into(),
            request_id,
        }
    }

    /// Create a not-found error for `key`.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Whether this error means the key is absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The HTTP status this error translates to.
    ///
    /// Not-found is 404, a backend error uses the backend's own status when
    /// it is a valid error status, and everything else is 503.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Backend {
                status: Some(status),
                ..
            } if (400..600).contains(status) => *status,
            _ => 503,
        }
    }

    /// Backend request id, when one was reported.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Backend { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }

    /// Backend error code, when one was reported.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Backend { code, .. } => Some(code),
            _ => None,
        }
    }
}
