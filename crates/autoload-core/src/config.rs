//! Autoload configuration
//!
//! Reads JSON or TOML documents shaped like the `autoload` section of a
//! composer manifest and feeds them into an [`Autoloader`]:
//!
//! ```toml
//! auto_register = true
//!
//! [autoload.psr-4]
//! "App\\" = "src"
//! "Vendor\\Package\\" = ["packages/vendor/src", "packages/vendor/lib"]
//!
//! [autoload.classmap]
//! "Legacy\\ClassName" = "legacy/ClassName.php"
//!
//! [autoload]
//! files = ["helpers/functions.php"]
//! ```

use crate::autoloader::Autoloader;
use crate::discovery::DiscoveryConfig;
use crate::namespace_map::PathSpec;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding `auto_register`
pub const AUTO_REGISTER_ENV: &str = "AUTOLOAD_AUTO_REGISTER";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file does not exist
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    /// Extension is neither `json` nor `toml`
    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),

    /// Failed to read the file
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse JSON
    #[error("Invalid JSON in configuration file {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Failed to parse TOML
    #[error("Invalid TOML in configuration file {path}: {source}")]
    InvalidToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A section does not have the expected shape
    #[error("Invalid configuration at '{key}': {message}")]
    InvalidShape { key: String, message: String },
}

/// Settings of the `development` section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DevelopmentSettings {
    #[serde(default)]
    pub cache_enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<PathBuf>,

    #[serde(default)]
    pub debug: bool,
}

/// Configuration tree addressed with dotted keys (`autoload.psr-4`)
#[derive(Debug, Clone, PartialEq)]
pub struct AutoloadConfig {
    config: Value,

    /// Directory relative mapping paths are resolved against
    base_path: Option<PathBuf>,
}

impl Default for AutoloadConfig {
    fn default() -> Self {
        Self {
            config: Value::Object(Map::new()),
            base_path: None,
        }
    }
}

impl AutoloadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing JSON object
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        if !value.is_object() {
            return Err(ConfigError::InvalidShape {
                key: String::new(),
                message: "configuration root must be an object".to_string(),
            });
        }
        Ok(Self {
            config: value,
            base_path: None,
        })
    }

    /// Resolve relative `psr-4`, `classmap` and `files` paths against `base`
    ///
    /// Without a base path they are used as written, i.e. relative to the
    /// working directory.
    pub fn set_base_path(&mut self, base: impl Into<PathBuf>) -> &mut Self {
        self.base_path = Some(base.into());
        self
    }

    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }

    /// A configured path made absolute against the base path
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        match &self.base_path {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Read a configuration file and merge it into this configuration
    pub fn load_from_file(&mut self, path: &Path) -> Result<&mut Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let data: Value = match extension.as_str() {
            "json" => {
                let content = std::fs::read_to_string(path)?;
                serde_json::from_str(&content).map_err(|source| ConfigError::InvalidJson {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            "toml" => {
                let content = std::fs::read_to_string(path)?;
                let table: toml::Table =
                    toml::from_str(&content).map_err(|source| ConfigError::InvalidToml {
                        path: path.to_path_buf(),
                        source,
                    })?;
                serde_json::to_value(table).map_err(|e| ConfigError::InvalidShape {
                    key: String::new(),
                    message: e.to_string(),
                })?
            }
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };

        if !data.is_object() {
            return Err(ConfigError::InvalidShape {
                key: String::new(),
                message: format!("{} must contain an object", path.display()),
            });
        }

        tracing::debug!(path = %path.display(), "loaded autoload configuration");
        self.merge(data);
        Ok(self)
    }

    /// Value at a dotted key
    pub fn get(&self, key: &str) -> Option<&Value> {
        key.split('.')
            .try_fold(&self.config, |current, part| current.as_object()?.get(part))
    }

    /// Value at a dotted key, or `default`
    pub fn get_or<'a>(&'a self, key: &str, default: &'a Value) -> &'a Value {
        self.get(key).unwrap_or(default)
    }

    /// Set a value at a dotted key, creating intermediate objects
    pub fn set(&mut self, key: &str, value: Value) -> &mut Self {
        let mut current = &mut self.config;
        for part in key.split('.') {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            current = &mut current[part];
        }
        *current = value;
        self
    }

    /// Whether a dotted key holds a non-null value
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some_and(|value| !value.is_null())
    }

    /// The whole configuration tree
    pub fn all(&self) -> &Value {
        &self.config
    }

    /// Merge another tree into this one
    ///
    /// Objects merge key by key, arrays are concatenated, and for any other
    /// collision the incoming value wins.
    pub fn merge(&mut self, other: Value) -> &mut Self {
        merge_values(&mut self.config, other);
        self
    }

    /// `autoload.psr-4`: prefix → one or more directories
    pub fn psr4_namespaces(&self) -> Result<IndexMap<String, PathSpec>, ConfigError> {
        self.section("autoload.psr-4")
    }

    /// `autoload.classmap`: class → file
    pub fn classmap(&self) -> Result<IndexMap<String, String>, ConfigError> {
        self.section("autoload.classmap")
    }

    /// `autoload.files`: bootstrap files
    pub fn files(&self) -> Result<Vec<String>, ConfigError> {
        self.section("autoload.files")
    }

    /// `discovery`: directory scanning settings
    pub fn discovery(&self) -> Result<DiscoveryConfig, ConfigError> {
        self.section("discovery")
    }

    /// `development`: cache and debug settings
    pub fn development(&self) -> Result<DevelopmentSettings, ConfigError> {
        self.section("development")
    }

    /// Whether the autoloader should register right after configuration
    ///
    /// `AUTOLOAD_AUTO_REGISTER` takes precedence over the file when it holds
    /// a recognizable boolean.
    pub fn auto_register(&self) -> bool {
        let env_flag = std::env::var(AUTO_REGISTER_ENV)
            .ok()
            .as_deref()
            .and_then(parse_flag);
        if let Some(flag) = env_flag {
            return flag;
        }
        match self.get("auto_register") {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(s)) => parse_flag(s).unwrap_or(false),
            Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
            _ => false,
        }
    }

    /// Feed namespaces, class mappings and files into an autoloader
    ///
    /// Registers the autoloader when `auto_register` is on. Returns whether
    /// the autoloader is registered afterwards.
    pub fn apply(&self, autoloader: &Autoloader) -> Result<bool, ConfigError> {
        let namespaces = self.psr4_namespaces()?;
        let classes = self.classmap()?;
        let files = self.files()?;

        tracing::debug!(
            namespaces = namespaces.len(),
            classes = classes.len(),
            files = files.len(),
            "applying autoload configuration"
        );
        autoloader
            .add_namespaces(namespaces.into_iter().map(|(prefix, spec)| {
                let paths = spec.paths().iter().map(|p| self.resolve_path(p)).collect();
                (prefix, PathSpec::from_paths(paths))
            }))
            .add_classes(
                classes
                    .into_iter()
                    .map(|(class, path)| (class, self.resolve_path(path))),
            )
            .add_files(files.iter().map(|file| self.resolve_path(file)));

        if self.auto_register() {
            Ok(autoloader.register())
        } else {
            Ok(autoloader.is_registered())
        }
    }

    /// Deserialize a section, treating absent or null as the default
    fn section<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, ConfigError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(T::default()),
            Some(value) => {
                serde_json::from_value(value.clone()).map_err(|e| ConfigError::InvalidShape {
                    key: key.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }
}

fn merge_values(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(target), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match target.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(target), Value::Array(incoming)) => target.extend(incoming),
        (target, incoming) => *target = incoming,
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dotted_get_and_set() {
        let mut config = AutoloadConfig::new();
        config.set("autoload.psr-4.App\\", json!("src"));

        assert_eq!(config.get("autoload.psr-4.App\\"), Some(&json!("src")));
        assert!(config.has("autoload.psr-4"));
        assert!(!config.has("autoload.classmap"));
        assert_eq!(config.get_or("missing.key", &json!(42)), &json!(42));
    }

    #[test]
    fn test_set_replaces_scalar_with_object() {
        let mut config = AutoloadConfig::from_value(json!({"autoload": "oops"})).unwrap();
        config.set("autoload.files", json!(["a.php"]));
        assert_eq!(config.files().unwrap(), ["a.php"]);
    }

    #[test]
    fn test_merge_is_recursive() {
        let mut config = AutoloadConfig::from_value(json!({
            "autoload": {"psr-4": {"App\\": "src"}, "files": ["a.php"]},
            "auto_register": false
        }))
        .unwrap();
        config.merge(json!({
            "autoload": {"psr-4": {"Lib\\": "lib"}, "files": ["b.php"]},
            "auto_register": true
        }));

        let namespaces = config.psr4_namespaces().unwrap();
        assert_eq!(namespaces.keys().collect::<Vec<_>>(), ["App\\", "Lib\\"]);
        assert_eq!(config.files().unwrap(), ["a.php", "b.php"]);
        assert_eq!(config.get("auto_register"), Some(&json!(true)));
    }

    #[test]
    fn test_sections_default_when_absent() {
        let config = AutoloadConfig::new();
        assert!(config.psr4_namespaces().unwrap().is_empty());
        assert!(config.classmap().unwrap().is_empty());
        assert!(config.files().unwrap().is_empty());
        assert_eq!(config.development().unwrap(), DevelopmentSettings::default());
        assert!(config.discovery().unwrap().enabled);
    }

    #[test]
    fn test_malformed_section_is_an_error() {
        let config = AutoloadConfig::from_value(json!({"autoload": {"files": "not-a-list"}})).unwrap();
        assert!(matches!(
            config.files(),
            Err(ConfigError::InvalidShape { ref key, .. }) if key == "autoload.files"
        ));
    }

    #[test]
    fn test_root_must_be_object() {
        assert!(AutoloadConfig::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn test_resolve_path_uses_base() {
        let mut config = AutoloadConfig::new();
        assert_eq!(config.resolve_path("src"), PathBuf::from("src"));

        config.set_base_path("/srv/project");
        assert_eq!(config.resolve_path("src"), PathBuf::from("/srv/project/src"));
        assert_eq!(config.resolve_path("/opt/lib"), PathBuf::from("/opt/lib"));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
