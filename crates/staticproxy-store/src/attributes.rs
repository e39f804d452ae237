//! Normalized object metadata.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Content type S3 assigns to "folder" placeholder objects.
pub const DIRECTORY_CONTENT_TYPE: &str = "application/x-directory";

/// Backend-agnostic projection of a stored object's metadata.
///
/// Every field is optional: `None` means the backend had no such value,
/// which is distinct from an empty string or a zero length. Downstream
/// header translation copies only present, non-empty fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectAttributes {
    /// `Content-Type`.
    pub content_type: Option<String>,
    /// `Content-Encoding`.
    pub content_encoding: Option<String>,
    /// `Content-Language`.
    pub content_language: Option<String>,
    /// `Content-Disposition`.
    pub content_disposition: Option<String>,
    /// `Cache-Control`.
    pub cache_control: Option<String>,
    /// Entity tag, already quoted as the backend returns it.
    pub etag: Option<String>,
    /// `Expires`, verbatim.
    pub expires: Option<String>,
    /// Last modification time.
    pub last_modified: Option<DateTime<Utc>>,
    /// Body length. `Some(0)` is a known-empty object.
    pub content_length: Option<u64>,
    /// Object version identifier.
    pub version_id: Option<String>,
    /// User-defined metadata, keys without any backend prefix.
    pub user_metadata: HashMap<String, String>,
    /// Website redirect target.
    pub website_redirect_location: Option<String>,
    /// The key names a directory placeholder rather than a file.
    pub is_prefix_marker: bool,
    /// `Content-Range` of a partial body returned by the backend.
    pub content_range: Option<String>,
}

impl ObjectAttributes {
    /// Whether a content type marks a directory placeholder.
    #[must_use]
    pub fn is_directory_content_type(content_type: Option<&str>) -> bool {
        content_type.is_some_and(|ct| ct.eq_ignore_ascii_case(DIRECTORY_CONTENT_TYPE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_default_to_all_absent() {
        let attrs = ObjectAttributes::default();
        assert!(attrs.content_type.is_none());
        assert!(attrs.content_length.is_none());
        assert!(attrs.user_metadata.is_empty());
        assert!(!attrs.is_prefix_marker);
    }

    #[test]
    fn test_should_recognize_directory_content_type() {
        assert!(ObjectAttributes::is_directory_content_type(Some(
            "application/x-directory"
        )));
        assert!(!ObjectAttributes::is_directory_content_type(Some(
            "text/html"
        )));
        assert!(!ObjectAttributes::is_directory_content_type(None));
    }
}
