//! Autoload Core Library
//!
//! Resolves fully-qualified class identifiers to source files and includes
//! them on demand, including:
//! - Explicit class → file mappings (class map)
//! - Namespace prefix → directory mappings (PSR-4 style)
//! - One-time file inclusion and bootstrap files
//! - Installation as a hook in a host class-loading registry
//! - JSON/TOML configuration
//! - Namespace discovery by scanning source trees
//! - Pre-generated module snapshots

pub mod autoloader;
pub mod class_map;
pub mod config;
pub mod discovery;
pub mod generator;
pub mod hook;
pub mod include;
pub mod namespace_map;
pub mod normalize;

pub use autoloader::{Autoloader, AutoloaderBuilder};
pub use class_map::ClassMap;
pub use config::{AutoloadConfig, ConfigError, DevelopmentSettings, AUTO_REGISTER_ENV};
pub use discovery::{
    parse_source, ClassDiscovery, ClassInfo, DirectoryConfig, DiscoveryConfig, DiscoveryError,
    DiscoveryManager, DiscoveryOptions, DiscoverySettings,
};
pub use generator::{GeneratorError, ModuleManifest, Snapshot, SnapshotGenerator, SNAPSHOT_VERSION};
pub use hook::{ClassResolver, HookChain, HookError, HookId, HookRegistry, LoadOutcome};
pub use include::{FileIncluder, IncludeError, IncludeOnce, NoopIncluder, SymbolTable};
pub use namespace_map::{MatchStrategy, NamespaceMap, PathSpec, DEFAULT_EXTENSION};
pub use normalize::{normalize_path, normalize_prefix, DEFAULT_NAMESPACE_SEPARATOR};
