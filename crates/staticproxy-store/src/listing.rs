//! Delimited listing results.

use chrono::{DateTime, Utc};

/// One object in a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Object name relative to the listed prefix.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, when the backend reports one.
    pub last_modified: Option<DateTime<Utc>>,
}

/// A point-in-time page of a delimited listing.
///
/// Entries and prefixes keep the order the backend returned them in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryListing {
    /// Objects directly under the prefix.
    pub entries: Vec<DirectoryEntry>,
    /// Common sub-prefixes, relative to the listed prefix and ending in the
    /// delimiter.
    pub prefixes: Vec<String>,
    /// The backend had more results than this page holds.
    pub is_truncated: bool,
}

/// Strip the listed prefix from a full key, as listing names are relative.
#[must_use]
pub fn relative_name<'a>(key: &'a str, prefix: &str) -> &'a str {
    key.strip_prefix(prefix).unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_make_names_relative() {
        assert_eq!(relative_name("assets/img.png", "assets/"), "img.png");
        assert_eq!(relative_name("assets/sub/", "assets/"), "sub/");
        assert_eq!(relative_name("other/x", "assets/"), "other/x");
        assert_eq!(relative_name("top.txt", ""), "top.txt");
    }
}
