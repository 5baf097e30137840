//! Class and namespace discovery
//!
//! Scans source trees, reads `namespace` and type declarations with regular
//! expressions and turns them into namespace prefix mappings that can be fed
//! to an [`Autoloader`]. Discovery only populates mappings; it plays no part
//! in resolving identifiers.

use crate::autoloader::Autoloader;
use crate::namespace_map::PathSpec;
use crate::normalize::{normalize_prefix, DEFAULT_NAMESPACE_SEPARATOR};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

const NS: char = DEFAULT_NAMESPACE_SEPARATOR;

static NAMESPACE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*namespace\s+([^;\s]+)").expect("valid regex"));

/// Declaration patterns in the order their matches are reported
static TYPE_PATTERNS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        r"(?m)^\s*(?:abstract\s+|final\s+)?class\s+([\p{L}_][\p{L}\p{N}_]*)",
        r"(?m)^\s*interface\s+([\p{L}_][\p{L}\p{N}_]*)",
        r"(?m)^\s*trait\s+([\p{L}_][\p{L}\p{N}_]*)",
        r"(?m)^\s*enum\s+([\p{L}_][\p{L}\p{N}_]*)",
    ]
    .map(|pattern| Regex::new(pattern).expect("valid regex"))
});

/// Errors that can occur while scanning directories
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A directory could not be read
    #[error("Failed to scan {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Declarations found in one source file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassInfo {
    /// Declared namespace, if the file has one
    pub namespace: Option<String>,

    /// First declared type
    pub class: String,

    /// `namespace\class`, or just `class` in the global namespace
    pub full_class: String,

    /// Every declared type, classes first, then interfaces, traits, enums
    pub all_classes: Vec<String>,

    /// File the declarations came from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl ClassInfo {
    /// Fully-qualified names of every declared type
    pub fn qualified_names(&self) -> Vec<String> {
        self.all_classes
            .iter()
            .map(|name| qualify(self.namespace.as_deref(), name))
            .collect()
    }
}

fn qualify(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{ns}{NS}{name}"),
        _ => name.to_string(),
    }
}

/// Parse namespace and type declarations out of source text
///
/// Returns `None` when the text declares no type.
pub fn parse_source(content: &str) -> Option<ClassInfo> {
    let namespace = NAMESPACE_PATTERN
        .captures(content)
        .map(|caps| caps[1].trim().to_string());

    let mut classes: Vec<String> = Vec::new();
    for pattern in TYPE_PATTERNS.iter() {
        for caps in pattern.captures_iter(content) {
            let name = caps[1].to_string();
            if !classes.contains(&name) {
                classes.push(name);
            }
        }
    }

    let class = classes.first()?.clone();
    Some(ClassInfo {
        full_class: qualify(namespace.as_deref(), &class),
        namespace,
        class,
        all_classes: classes,
        file: None,
    })
}

/// Per-scan options
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryOptions {
    /// Descend into subdirectories
    pub recursive: bool,

    /// Extensions to scan instead of the discovery defaults
    pub extensions: Option<Vec<String>>,

    /// Extra path fragments to skip, on top of the discovery defaults
    pub exclude_directories: Vec<String>,

    /// With a base namespace, also register namespaces found below it
    pub discover_sub_namespaces: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            extensions: None,
            exclude_directories: Vec::new(),
            discover_sub_namespaces: true,
        }
    }
}

/// Source tree scanner
#[derive(Debug, Clone)]
pub struct ClassDiscovery {
    file_extensions: Vec<String>,
    exclude_directories: Vec<String>,
    discovered: Vec<ClassInfo>,
}

impl Default for ClassDiscovery {
    fn default() -> Self {
        Self {
            file_extensions: vec!["php".to_string()],
            exclude_directories: [
                "vendor",
                "node_modules",
                ".git",
                "storage",
                "bootstrap/cache",
                "tests",
            ]
            .map(String::from)
            .to_vec(),
            discovered: Vec::new(),
        }
    }
}

impl ClassDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_file_extensions(&mut self, extensions: Vec<String>) -> &mut Self {
        self.file_extensions = extensions;
        self
    }

    pub fn set_exclude_directories(&mut self, exclude: Vec<String>) -> &mut Self {
        self.exclude_directories = exclude;
        self
    }

    pub fn file_extensions(&self) -> &[String] {
        &self.file_extensions
    }

    pub fn exclude_directories(&self) -> &[String] {
        &self.exclude_directories
    }

    /// Everything found by earlier `discover_classes` calls
    pub fn discovered_classes(&self) -> &[ClassInfo] {
        &self.discovered
    }

    pub fn clear_cache(&mut self) -> &mut Self {
        self.discovered.clear();
        self
    }

    /// Read a file and parse its declarations
    pub fn extract_class_info(&self, path: &Path) -> Option<ClassInfo> {
        let content = fs::read_to_string(path).ok()?;
        if content.is_empty() {
            return None;
        }
        let mut info = parse_source(&content)?;
        info.file = Some(path.to_path_buf());
        Some(info)
    }

    /// Collect declarations from every matching file under `directory`
    ///
    /// A missing directory yields no classes.
    pub fn discover_classes(
        &mut self,
        directory: &Path,
        options: &DiscoveryOptions,
    ) -> Result<Vec<ClassInfo>, DiscoveryError> {
        if !directory.is_dir() {
            return Ok(Vec::new());
        }

        let extensions = options
            .extensions
            .clone()
            .unwrap_or_else(|| self.file_extensions.clone());
        let mut excluded = self.exclude_directories.clone();
        excluded.extend(options.exclude_directories.iter().cloned());

        let mut files = Vec::new();
        collect_files(directory, options.recursive, &mut files)?;

        let mut classes = Vec::new();
        for file in files {
            if !has_extension(&file, &extensions) {
                continue;
            }
            if is_excluded(&relative_display(&file, directory), &excluded) {
                continue;
            }
            if let Some(info) = self.extract_class_info(&file) {
                classes.push(info);
            }
        }

        tracing::debug!(
            directory = %directory.display(),
            count = classes.len(),
            "discovered classes"
        );
        self.discovered.extend(classes.iter().cloned());
        Ok(classes)
    }

    /// Map each discovered namespace to the directories holding its files
    pub fn discover_namespaces(
        &mut self,
        directory: &Path,
        options: &DiscoveryOptions,
    ) -> Result<IndexMap<String, PathSpec>, DiscoveryError> {
        let mut discovered: IndexMap<String, Vec<PathBuf>> = IndexMap::new();

        for info in self.discover_classes(directory, options)? {
            let (Some(namespace), Some(file)) = (info.namespace.as_deref(), info.file.as_deref())
            else {
                continue;
            };
            if namespace.is_empty() {
                continue;
            }
            let Some(dir) = file.parent() else {
                continue;
            };

            let paths = discovered
                .entry(normalize_prefix(namespace, NS))
                .or_default();
            if !paths.iter().any(|p| p == dir) {
                paths.push(dir.to_path_buf());
            }
        }

        Ok(discovered
            .into_iter()
            .map(|(namespace, paths)| (namespace, PathSpec::from_paths(paths)))
            .collect())
    }

    /// Discover namespaces in several directories and register them
    ///
    /// A directory paired with a base namespace is registered under it
    /// directly, together with any sub-namespaces found below it when
    /// `discover_sub_namespaces` is set.
    pub fn auto_discover_and_register(
        &mut self,
        autoloader: &Autoloader,
        directories: &[(PathBuf, Option<String>)],
        options: &DiscoveryOptions,
    ) -> Result<IndexMap<String, PathSpec>, DiscoveryError> {
        let mut discovered = IndexMap::new();

        for (directory, base_namespace) in directories {
            let namespaces = match base_namespace {
                None => self.discover_namespaces(directory, options)?,
                Some(base) => {
                    let mut namespaces = IndexMap::new();
                    namespaces.insert(
                        normalize_prefix(base, NS),
                        PathSpec::One(directory.clone()),
                    );
                    if options.discover_sub_namespaces {
                        namespaces.extend(self.discover_namespaces(directory, options)?);
                    }
                    namespaces
                }
            };

            for (namespace, spec) in namespaces {
                autoloader.add_namespaces([(namespace.as_str(), spec.clone())]);
                discovered.insert(namespace, spec);
            }
        }

        Ok(discovered)
    }

    /// Register `modules_dir/<Module>/<src_subdir>` as `Base\Module\`
    pub fn discover_modules(
        &self,
        autoloader: &Autoloader,
        modules_dir: &Path,
        base_namespace: &str,
        src_subdir: &str,
    ) -> Result<IndexMap<String, PathBuf>, DiscoveryError> {
        let mut discovered = IndexMap::new();
        if !modules_dir.is_dir() {
            return Ok(discovered);
        }

        for module_dir in sorted_entries(modules_dir)? {
            if !module_dir.is_dir() {
                continue;
            }
            let Some(module) = module_dir.file_name().map(|n| n.to_string_lossy().to_string())
            else {
                continue;
            };

            let src_dir = module_dir.join(src_subdir);
            if src_dir.is_dir() {
                let namespace = format!("{}{NS}{}{NS}", base_namespace.trim_end_matches(NS), module);
                autoloader.add_namespace(&namespace, &src_dir, false);
                discovered.insert(namespace, src_dir);
            }
        }

        Ok(discovered)
    }
}

/// Directory entries sorted by name
pub(crate) fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let read = fs::read_dir(dir).map_err(|source| DiscoveryError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut entries = Vec::new();
    for entry in read {
        let entry = entry.map_err(|source| DiscoveryError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

/// Files below `dir`; symlinked files are listed, symlinked directories are
/// not descended into
fn collect_files(dir: &Path, recursive: bool, files: &mut Vec<PathBuf>) -> Result<(), DiscoveryError> {
    for path in sorted_entries(dir)? {
        let file_type = fs::symlink_metadata(&path)
            .map_err(|source| DiscoveryError::Io {
                path: path.clone(),
                source,
            })?
            .file_type();

        if file_type.is_dir() {
            if recursive {
                collect_files(&path, recursive, files)?;
            }
        } else if path.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(&ext)))
}

/// Path below `base` using `/` separators, with a leading `/`
fn relative_display(path: &Path, base: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    let mut display = String::new();
    for component in relative.components() {
        display.push('/');
        display.push_str(&component.as_os_str().to_string_lossy());
    }
    display
}

fn is_excluded(relative: &str, excluded: &[String]) -> bool {
    excluded.iter().any(|fragment| relative.contains(fragment.as_str()))
}

/// Serialized discovery settings (the `discovery` configuration section)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryConfig {
    /// Whether directory scanning runs at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Scanner-wide settings
    #[serde(default)]
    pub options: DiscoverySettings,

    /// Named directories to scan, in order
    #[serde(default)]
    pub directories: IndexMap<String, DirectoryConfig>,

    /// Namespaces registered when discovery did not produce them
    #[serde(default)]
    pub fallback_namespaces: IndexMap<String, PathBuf>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            options: DiscoverySettings::default(),
            directories: IndexMap::new(),
            fallback_namespaces: IndexMap::new(),
        }
    }
}

/// Scanner-wide discovery settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DiscoverySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_extensions: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_directories: Option<Vec<String>>,
}

/// One directory to scan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirectoryConfig {
    /// Directory, relative paths are resolved against the manager's base path
    #[serde(default)]
    pub path: PathBuf,

    /// Treat each subdirectory as a module with its own source directory
    #[serde(default)]
    pub module_discovery: bool,

    /// Namespace to register the directory under instead of scanning it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_namespace: Option<String>,

    /// Source directory inside each module
    #[serde(default = "default_src_subdir")]
    pub src_subdir: String,

    #[serde(default = "default_true")]
    pub recursive: bool,

    #[serde(default)]
    pub exclude_directories: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_src_subdir() -> String {
    "src".to_string()
}

/// Runs discovery as described by a [`DiscoveryConfig`]
#[derive(Debug, Clone)]
pub struct DiscoveryManager {
    discovery: ClassDiscovery,
    config: DiscoveryConfig,
    base_path: PathBuf,
}

impl DiscoveryManager {
    /// Create a manager resolving relative directories against `base_path`
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            discovery: ClassDiscovery::new(),
            config: DiscoveryConfig::default(),
            base_path: base_path.into(),
        }
    }

    /// Use a pre-configured scanner
    pub fn with_discovery(mut self, discovery: ClassDiscovery) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn load_config(&mut self, config: DiscoveryConfig) -> &mut Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn discovery(&self) -> &ClassDiscovery {
        &self.discovery
    }

    /// Scan every configured directory and register what was found
    ///
    /// With discovery disabled only the fallback namespaces are applied.
    pub fn perform_auto_discovery(
        &mut self,
        autoloader: &Autoloader,
    ) -> Result<IndexMap<String, PathSpec>, DiscoveryError> {
        if !self.config.enabled {
            return Ok(self.load_fallback_namespaces(autoloader, &IndexMap::new()));
        }

        if let Some(extensions) = &self.config.options.file_extensions {
            self.discovery.set_file_extensions(extensions.clone());
        }
        if let Some(exclude) = &self.config.options.exclude_directories {
            self.discovery.set_exclude_directories(exclude.clone());
        }

        let mut discovered = IndexMap::new();
        let directories: Vec<(String, DirectoryConfig)> = self
            .config
            .directories
            .iter()
            .map(|(name, dir)| (name.clone(), dir.clone()))
            .collect();

        for (name, dir_config) in directories {
            let path = self.resolve_path(&dir_config.path);
            if !path.is_dir() {
                tracing::debug!(name = %name, path = %path.display(), "skipping missing discovery directory");
                continue;
            }

            let found: IndexMap<String, PathSpec> = if dir_config.module_discovery {
                let base = dir_config.base_namespace.as_deref().unwrap_or("Modules");
                self.discovery
                    .discover_modules(autoloader, &path, base, &dir_config.src_subdir)?
                    .into_iter()
                    .map(|(namespace, dir)| (namespace, PathSpec::One(dir)))
                    .collect()
            } else {
                self.process_regular_discovery(autoloader, &path, &dir_config)?
            };
            discovered.extend(found);
        }

        let fallbacks = self.load_fallback_namespaces(autoloader, &discovered);
        discovered.extend(fallbacks);
        Ok(discovered)
    }

    fn process_regular_discovery(
        &mut self,
        autoloader: &Autoloader,
        path: &Path,
        dir_config: &DirectoryConfig,
    ) -> Result<IndexMap<String, PathSpec>, DiscoveryError> {
        if let Some(base) = &dir_config.base_namespace {
            let namespace = normalize_prefix(base, NS);
            autoloader.add_namespace(&namespace, path, false);
            let mut registered = IndexMap::new();
            registered.insert(namespace, PathSpec::One(path.to_path_buf()));
            return Ok(registered);
        }

        let mut exclude = self.config.options.exclude_directories.clone().unwrap_or_default();
        exclude.extend(dir_config.exclude_directories.iter().cloned());
        let options = DiscoveryOptions {
            recursive: dir_config.recursive,
            exclude_directories: exclude,
            ..DiscoveryOptions::default()
        };

        let namespaces = self.discovery.discover_namespaces(path, &options)?;
        autoloader.add_namespaces(namespaces.iter().map(|(ns, spec)| (ns.as_str(), spec.clone())));
        Ok(namespaces)
    }

    fn load_fallback_namespaces(
        &self,
        autoloader: &Autoloader,
        already: &IndexMap<String, PathSpec>,
    ) -> IndexMap<String, PathSpec> {
        let mut loaded = IndexMap::new();
        for (namespace, path) in &self.config.fallback_namespaces {
            let namespace = normalize_prefix(namespace, NS);
            if already.contains_key(&namespace) {
                continue;
            }
            let full = self.resolve_path(path);
            if full.is_dir() {
                autoloader.add_namespace(&namespace, &full, false);
                loaded.insert(namespace, PathSpec::One(full));
            }
        }
        loaded
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }
}
