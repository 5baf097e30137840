//! Explicit class-to-file mappings
//!
//! The class map is consulted before any namespace prefix and answers in a
//! single hash lookup.

use crate::normalize::normalize_path;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Class identifier → file path table (last write wins)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassMap {
    classes: IndexMap<String, PathBuf>,
}

impl ClassMap {
    /// Create an empty class map
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a class map from initial mappings
    pub fn from_classes<I, K, P>(classes: I) -> Self
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: AsRef<Path>,
    {
        let mut map = Self::new();
        map.add_classes(classes);
        map
    }

    /// Map a class to a file, replacing any earlier mapping
    pub fn add_class(&mut self, class: impl Into<String>, path: impl AsRef<Path>) -> &mut Self {
        self.classes.insert(class.into(), normalize_path(path));
        self
    }

    /// Add several mappings in the order given
    pub fn add_classes<I, K, P>(&mut self, classes: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: AsRef<Path>,
    {
        for (class, path) in classes {
            self.add_class(class, path);
        }
        self
    }

    /// File mapped for a class, if any
    pub fn class_file(&self, class: &str) -> Option<&Path> {
        self.classes.get(class).map(PathBuf::as_path)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    /// Remove a mapping (no-op when absent)
    pub fn remove_class(&mut self, class: &str) -> &mut Self {
        self.classes.shift_remove(class);
        self
    }

    /// All mappings in insertion order
    pub fn all_classes(&self) -> &IndexMap<String, PathBuf> {
        &self.classes
    }

    pub fn clear_classes(&mut self) -> &mut Self {
        self.classes.clear();
        self
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
