//! PSR-4 style namespace prefix → directory mapping
//!
//! A class identifier is resolved by finding a registered prefix it starts
//! with, turning the rest of the identifier into a relative file path and
//! probing each directory registered for that prefix in order.

use crate::normalize::{is_root_prefix, normalize_path, normalize_prefix, DEFAULT_NAMESPACE_SEPARATOR};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

/// File extension appended to resolved class paths by default
pub const DEFAULT_EXTENSION: &str = "php";

/// One directory or an ordered list of directories for a prefix
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PathSpec {
    /// A single directory: `"src"`
    One(PathBuf),

    /// Several directories, searched in order: `["src", "lib"]`
    Many(Vec<PathBuf>),
}

impl PathSpec {
    /// Directories in declaration order
    pub fn paths(&self) -> &[PathBuf] {
        match self {
            PathSpec::One(path) => std::slice::from_ref(path),
            PathSpec::Many(paths) => paths,
        }
    }

    /// Collapse a list into `One` when it holds a single entry
    pub fn from_paths(mut paths: Vec<PathBuf>) -> Self {
        if paths.len() == 1 {
            PathSpec::One(paths.remove(0))
        } else {
            PathSpec::Many(paths)
        }
    }
}

impl From<&str> for PathSpec {
    fn from(path: &str) -> Self {
        PathSpec::One(PathBuf::from(path))
    }
}

impl From<String> for PathSpec {
    fn from(path: String) -> Self {
        PathSpec::One(PathBuf::from(path))
    }
}

impl From<PathBuf> for PathSpec {
    fn from(path: PathBuf) -> Self {
        PathSpec::One(path)
    }
}

impl From<&Path> for PathSpec {
    fn from(path: &Path) -> Self {
        PathSpec::One(path.to_path_buf())
    }
}

impl<P: Into<PathBuf>> From<Vec<P>> for PathSpec {
    fn from(paths: Vec<P>) -> Self {
        PathSpec::Many(paths.into_iter().map(Into::into).collect())
    }
}

/// How registered prefixes are matched against an identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchStrategy {
    /// Prefixes are tried in the order they were first registered
    #[default]
    FirstMatch,

    /// The most specific (longest) matching prefix is tried first
    LongestPrefix,
}

/// Namespace prefix → ordered directories
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceMap {
    namespaces: IndexMap<String, Vec<PathBuf>>,
    separator: char,
    extension: String,
    strategy: MatchStrategy,
}

impl Default for NamespaceMap {
    fn default() -> Self {
        Self {
            namespaces: IndexMap::new(),
            separator: DEFAULT_NAMESPACE_SEPARATOR,
            extension: DEFAULT_EXTENSION.to_string(),
            strategy: MatchStrategy::default(),
        }
    }
}

impl NamespaceMap {
    /// Create an empty map using `\` and the `.php` extension
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different namespace separator
    ///
    /// Only affects prefixes added afterwards.
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Use a different file extension (without the leading dot)
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Set the prefix matching strategy
    pub fn with_strategy(mut self, strategy: MatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    /// Register a directory for a prefix
    ///
    /// Registering a directory that is already present for the prefix is a
    /// no-op; otherwise it goes to the end of the list, or to the front
    /// when `prepend` is set.
    pub fn add_namespace(&mut self, prefix: &str, path: impl AsRef<Path>, prepend: bool) -> &mut Self {
        let prefix = normalize_prefix(prefix, self.separator);
        let path = normalize_path(path);

        let paths = self.namespaces.entry(prefix).or_default();
        if paths.contains(&path) {
            return self;
        }

        if prepend {
            paths.insert(0, path);
        } else {
            paths.push(path);
        }
        self
    }

    /// Register several prefixes, each with one or more directories
    pub fn add_namespaces<I, K, S>(&mut self, namespaces: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, S)>,
        K: AsRef<str>,
        S: Into<PathSpec>,
    {
        for (prefix, spec) in namespaces {
            let spec = spec.into();
            for path in spec.paths() {
                self.add_namespace(prefix.as_ref(), path, false);
            }
        }
        self
    }

    /// Directories registered for a prefix (empty when unknown)
    pub fn namespace_paths(&self, prefix: &str) -> &[PathBuf] {
        let prefix = normalize_prefix(prefix, self.separator);
        self.namespaces
            .get(&prefix)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_namespace(&self, prefix: &str) -> bool {
        self.namespaces
            .contains_key(&normalize_prefix(prefix, self.separator))
    }

    /// Drop a prefix and all of its directories
    pub fn remove_namespace(&mut self, prefix: &str) -> &mut Self {
        let prefix = normalize_prefix(prefix, self.separator);
        self.namespaces.shift_remove(&prefix);
        self
    }

    /// All prefixes in registration order
    pub fn all_namespaces(&self) -> &IndexMap<String, Vec<PathBuf>> {
        &self.namespaces
    }

    pub fn clear_namespaces(&mut self) -> &mut Self {
        self.namespaces.clear();
        self
    }

    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    /// Find the first existing file for a class identifier
    pub fn find_file(&self, class: &str) -> Option<PathBuf> {
        self.find_candidates(class)
            .into_iter()
            .find(|candidate| candidate.is_file())
    }

    /// Every candidate file for a class, in the order `find_file` probes them
    pub fn find_candidates(&self, class: &str) -> Vec<PathBuf> {
        let class = class.trim_start_matches(self.separator);

        let mut matches: Vec<(&String, &Vec<PathBuf>)> = self
            .namespaces
            .iter()
            .filter(|(prefix, _)| self.prefix_matches(prefix, class))
            .collect();

        if self.strategy == MatchStrategy::LongestPrefix {
            // Stable sort keeps registration order between equal lengths
            matches.sort_by_key(|(prefix, _)| std::cmp::Reverse(self.prefix_len(prefix)));
        }

        let mut candidates = Vec::new();
        for (prefix, paths) in matches {
            let relative = self.relative_file(&class[self.prefix_len(prefix)..]);
            for dir in paths {
                let mut candidate = OsString::from(dir.as_os_str());
                candidate.push(MAIN_SEPARATOR.to_string());
                candidate.push(&relative);
                candidates.push(PathBuf::from(candidate));
            }
        }
        candidates
    }

    /// The root prefix matches every identifier; others by string prefix
    fn prefix_matches(&self, prefix: &str, class: &str) -> bool {
        is_root_prefix(prefix, self.separator) || class.starts_with(prefix)
    }

    /// Number of identifier bytes consumed by a matching prefix
    fn prefix_len(&self, prefix: &str) -> usize {
        if is_root_prefix(prefix, self.separator) {
            0
        } else {
            prefix.len()
        }
    }

    fn relative_file(&self, remainder: &str) -> String {
        let mut relative: String = remainder
            .chars()
            .map(|c| if c == self.separator { MAIN_SEPARATOR } else { c })
            .collect();
        if !self.extension.is_empty() {
            relative.push('.');
            relative.push_str(&self.extension);
        }
        relative
    }
}
