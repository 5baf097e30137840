//! Prefix and path normalization
//!
//! Every key and path stored by the class map, the namespace map and the
//! autoloader's file list passes through these functions, so lookups never
//! depend on how the caller spelled a separator.

use std::path::{Path, PathBuf, MAIN_SEPARATOR};

/// Namespace separator used when none is configured (PHP style)
pub const DEFAULT_NAMESPACE_SEPARATOR: char = '\\';

/// Normalize a namespace prefix.
///
/// Leading and trailing separators are trimmed and exactly one trailing
/// separator is appended. The empty prefix becomes the lone separator, which
/// stands for the global namespace.
pub fn normalize_prefix(prefix: &str, separator: char) -> String {
    let mut normalized = prefix.trim_matches(separator).to_string();
    normalized.push(separator);
    normalized
}

/// Normalize a filesystem path.
///
/// Both `/` and `\` become the platform separator and trailing separators
/// are removed.
pub fn normalize_path(path: impl AsRef<Path>) -> PathBuf {
    let raw = path.as_ref().to_string_lossy();
    let unified: String = raw
        .chars()
        .map(|c| if c == '/' || c == '\\' { MAIN_SEPARATOR } else { c })
        .collect();
    PathBuf::from(unified.trim_end_matches(MAIN_SEPARATOR))
}

/// Whether `prefix` is the global namespace prefix for `separator`
pub fn is_root_prefix(prefix: &str, separator: char) -> bool {
    prefix.len() == separator.len_utf8() && prefix.starts_with(separator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_gets_single_trailing_separator() {
        assert_eq!(normalize_prefix("App", '\\'), "App\\");
        assert_eq!(normalize_prefix("App\\", '\\'), "App\\");
        assert_eq!(normalize_prefix("\\App\\Models\\\\", '\\'), "App\\Models\\");
        assert_eq!(normalize_prefix("App.", '.'), "App.");
    }

    #[test]
    fn test_empty_prefix_is_root() {
        let root = normalize_prefix("", '\\');
        assert_eq!(root, "\\");
        assert!(is_root_prefix(&root, '\\'));
        assert!(!is_root_prefix("App\\", '\\'));
    }

    #[test]
    fn test_prefix_normalization_is_idempotent() {
        for input in ["", "App", "\\App", "App\\", "\\\\Vendor\\Pkg\\\\", "A\\B\\C"] {
            let once = normalize_prefix(input, '\\');
            assert_eq!(normalize_prefix(&once, '\\'), once, "input: {input:?}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_path_separators_unified() {
        assert_eq!(normalize_path("/var/app/"), PathBuf::from("/var/app"));
        assert_eq!(normalize_path("C:\\code\\src\\"), PathBuf::from("C:/code/src"));
        assert_eq!(normalize_path("a\\b/c//"), PathBuf::from("a/b/c"));
    }

    #[test]
    fn test_path_normalization_is_idempotent() {
        for input in ["/a/b/", "a\\b", "", "/", "rel/dir\\x"] {
            let once = normalize_path(input);
            assert_eq!(normalize_path(&once), once, "input: {input:?}");
        }
    }
}
