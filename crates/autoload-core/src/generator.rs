//! Module snapshot generation
//!
//! Scans a modules directory once, collects every module's PSR-4 prefixes
//! and bootstrap files, and writes them to a JSON snapshot. Loading the
//! snapshot at startup replaces a directory walk with a single file read.
//!
//! A module is a subdirectory with a `composer.json` declaring
//! `autoload.psr-4`. An optional `module.json` lists bootstrap `files`
//! relative to the module directory.

use crate::autoloader::Autoloader;
use crate::discovery::{sorted_entries, DiscoveryError};
use crate::namespace_map::PathSpec;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

/// Snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors that can occur while generating or loading snapshots
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// Failed to read or write a file
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse or serialize JSON
    #[error("Invalid snapshot {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Failed to scan the modules directory
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// Snapshot written by an incompatible version
    #[error("Unsupported snapshot version: {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

/// The parts of a `composer.json` the generator reads
#[derive(Debug, Default, Deserialize)]
struct ComposerFile {
    #[serde(default)]
    autoload: ComposerAutoload,
}

#[derive(Debug, Default, Deserialize)]
struct ComposerAutoload {
    #[serde(rename = "psr-4")]
    psr4: Option<IndexMap<String, PathSpec>>,
}

/// The parts of a `module.json` the generator reads
#[derive(Debug, Default, Deserialize)]
struct ModuleFile {
    #[serde(default)]
    files: Vec<String>,
}

/// A module found in the modules directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleManifest {
    /// Directory name
    pub name: String,

    /// Module directory
    pub path: PathBuf,

    /// Prefix → directories relative to the module
    pub psr4: IndexMap<String, PathSpec>,

    /// Bootstrap files relative to the module
    pub files: Vec<String>,
}

impl ModuleManifest {
    /// Prefix → absolute directories
    pub fn namespaces(&self) -> IndexMap<String, Vec<PathBuf>> {
        self.psr4
            .iter()
            .map(|(prefix, spec)| {
                let dirs = spec
                    .paths()
                    .iter()
                    .map(|relative| self.resolve(&relative.to_string_lossy()))
                    .collect();
                (prefix.clone(), dirs)
            })
            .collect()
    }

    /// Bootstrap files as absolute paths
    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|file| self.resolve(file)).collect()
    }

    fn resolve(&self, relative: &str) -> PathBuf {
        let trimmed = relative.trim_matches(|c| c == '/' || c == '\\');
        if trimmed.is_empty() {
            self.path.clone()
        } else {
            self.path.join(trimmed)
        }
    }
}

/// Generated mapping snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    /// Snapshot format version
    pub version: u32,

    /// Prefix → directories, in module order
    #[serde(default)]
    pub namespaces: IndexMap<String, Vec<PathBuf>>,

    /// Bootstrap files, in module order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<PathBuf>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            namespaces: IndexMap::new(),
            files: Vec::new(),
        }
    }
}

impl Snapshot {
    /// Read a snapshot written by [`SnapshotGenerator::generate`]
    pub fn load(path: &Path) -> Result<Self, GeneratorError> {
        let content = fs::read_to_string(path).map_err(|source| GeneratorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot: Snapshot =
            serde_json::from_str(&content).map_err(|source| GeneratorError::Json {
                path: path.to_path_buf(),
                source,
            })?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(GeneratorError::UnsupportedVersion {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        Ok(snapshot)
    }

    /// Register the snapshot's namespaces and bootstrap files
    pub fn apply(&self, autoloader: &Autoloader) {
        autoloader
            .add_namespaces(
                self.namespaces
                    .iter()
                    .map(|(prefix, dirs)| (prefix.as_str(), PathSpec::Many(dirs.clone()))),
            )
            .add_files(&self.files);
    }
}

/// Builds snapshots from a modules directory
#[derive(Debug, Clone)]
pub struct SnapshotGenerator {
    modules_dir: PathBuf,
    output_path: PathBuf,
}

impl SnapshotGenerator {
    pub fn new(modules_dir: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            modules_dir: modules_dir.into(),
            output_path: output_path.into(),
        }
    }

    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Modules in directory-name order
    ///
    /// Subdirectories without a readable `composer.json` declaring
    /// `autoload.psr-4` are skipped.
    pub fn discover_modules(&self) -> Result<Vec<ModuleManifest>, GeneratorError> {
        if !self.modules_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut modules = Vec::new();
        for dir in sorted_entries(&self.modules_dir)? {
            if !dir.is_dir() {
                continue;
            }
            let Some(name) = dir.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };

            let Some(composer) = read_json::<ComposerFile>(&dir.join("composer.json")) else {
                continue;
            };
            let Some(psr4) = composer.autoload.psr4 else {
                tracing::debug!(module = %name, "module has no psr-4 autoload section");
                continue;
            };
            let files = read_json::<ModuleFile>(&dir.join("module.json"))
                .map(|module| module.files)
                .unwrap_or_default();

            modules.push(ModuleManifest {
                name,
                path: dir,
                psr4,
                files,
            });
        }
        Ok(modules)
    }

    /// Build a snapshot without writing it
    pub fn build(&self) -> Result<Snapshot, GeneratorError> {
        let mut snapshot = Snapshot::default();
        for module in self.discover_modules()? {
            for (prefix, dirs) in module.namespaces() {
                let entry = snapshot.namespaces.entry(prefix).or_default();
                for dir in dirs {
                    if !entry.contains(&dir) {
                        entry.push(dir);
                    }
                }
            }
            snapshot.files.extend(module.file_paths());
        }
        Ok(snapshot)
    }

    /// Build a snapshot and write it to the output path
    pub fn generate(&self) -> Result<Snapshot, GeneratorError> {
        let snapshot = self.build()?;

        if let Some(parent) = self.output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| GeneratorError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content =
            serde_json::to_string_pretty(&snapshot).map_err(|source| GeneratorError::Json {
                path: self.output_path.clone(),
                source,
            })?;
        fs::write(&self.output_path, content + "\n").map_err(|source| GeneratorError::Io {
            path: self.output_path.clone(),
            source,
        })?;

        tracing::info!(
            path = %self.output_path.display(),
            namespaces = snapshot.namespaces.len(),
            files = snapshot.files.len(),
            "generated autoload snapshot"
        );
        Ok(snapshot)
    }

    /// Whether the snapshot exists and no module manifest changed after it
    pub fn is_up_to_date(&self) -> bool {
        let Some(generated) = modified(&self.output_path) else {
            return false;
        };
        if !self.modules_dir.is_dir() {
            return true;
        }

        let Ok(entries) = sorted_entries(&self.modules_dir) else {
            return false;
        };
        entries
            .iter()
            .filter(|dir| dir.is_dir())
            .flat_map(|dir| [dir.join("composer.json"), dir.join("module.json")])
            .filter_map(|manifest| modified(&manifest))
            .all(|changed| changed <= generated)
    }

    /// Copy the generated snapshot to `target`
    pub fn publish(&self, target: &Path) -> Result<(), GeneratorError> {
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| GeneratorError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::copy(&self.output_path, target).map_err(|source| GeneratorError::Io {
            path: self.output_path.clone(),
            source,
        })?;
        tracing::info!(path = %target.display(), "published autoload snapshot");
        Ok(())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable manifest");
            None
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}
