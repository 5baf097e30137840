//! Integration tests for configuration loading

use autoload_core::{AutoloadConfig, Autoloader, ConfigError, HookChain, LoadOutcome, PathSpec};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_load_json_config() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("autoload.json");
    fs::write(
        &path,
        r#"{
            "autoload": {
                "psr-4": {
                    "App\\": "src",
                    "Vendor\\Package\\": ["packages/vendor/src", "packages/vendor/lib"]
                },
                "classmap": {"Legacy\\ClassName": "legacy/ClassName.php"},
                "files": ["helpers/functions.php"]
            },
            "auto_register": false
        }"#,
    )
    .unwrap();

    let mut config = AutoloadConfig::new();
    config.load_from_file(&path).unwrap();

    let namespaces = config.psr4_namespaces().unwrap();
    assert_eq!(namespaces["App\\"], PathSpec::One(PathBuf::from("src")));
    assert_eq!(
        namespaces["Vendor\\Package\\"].paths(),
        [PathBuf::from("packages/vendor/src"), PathBuf::from("packages/vendor/lib")]
    );
    assert_eq!(config.classmap().unwrap()["Legacy\\ClassName"], "legacy/ClassName.php");
    assert_eq!(config.files().unwrap(), ["helpers/functions.php"]);
}

#[test]
fn test_load_toml_config() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("autoload.toml");
    fs::write(
        &path,
        r#"
[autoload]
files = ["bootstrap.php"]

[autoload.psr-4]
"App\\" = "src"
"Lib\\" = ["lib", "vendor/lib"]

[development]
cache_enabled = true
debug = true
"#,
    )
    .unwrap();

    let mut config = AutoloadConfig::new();
    config.load_from_file(&path).unwrap();

    let namespaces = config.psr4_namespaces().unwrap();
    assert_eq!(namespaces.keys().collect::<Vec<_>>(), ["App\\", "Lib\\"]);
    assert_eq!(config.files().unwrap(), ["bootstrap.php"]);

    let development = config.development().unwrap();
    assert!(development.cache_enabled);
    assert!(development.debug);
    assert_eq!(development.cache_path, None);
}

#[test]
fn test_later_files_merge_into_earlier_ones() {
    let temp = TempDir::new().unwrap();
    let base = temp.path().join("base.json");
    let local = temp.path().join("local.toml");
    fs::write(&base, r#"{"autoload": {"psr-4": {"App\\": "src"}, "files": ["a.php"]}}"#).unwrap();
    fs::write(&local, "[autoload]\nfiles = [\"b.php\"]\n\n[autoload.psr-4]\n\"Tests\\\\\" = \"tests\"\n").unwrap();

    let mut config = AutoloadConfig::new();
    config.load_from_file(&base).unwrap().load_from_file(&local).unwrap();

    assert_eq!(config.files().unwrap(), ["a.php", "b.php"]);
    assert_eq!(config.psr4_namespaces().unwrap().len(), 2);
}

#[test]
fn test_missing_file_is_reported() {
    let mut config = AutoloadConfig::new();
    let err = config
        .load_from_file(std::path::Path::new("/no/such/autoload.json"))
        .unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(_)));
}

#[test]
fn test_unknown_extension_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("autoload.yaml");
    fs::write(&path, "autoload: {}\n").unwrap();

    let err = AutoloadConfig::new().load_from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat(ref ext) if ext == "yaml"));
}

#[test]
fn test_invalid_json_is_reported() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("autoload.json");
    fs::write(&path, "{ \"autoload\": ").unwrap();

    let err = AutoloadConfig::new().load_from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidJson { .. }));
}

#[test]
fn test_apply_feeds_autoloader() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    fs::create_dir_all(src.join("Models")).unwrap();
    let user = src.join("Models").join("User.php");
    fs::write(&user, "<?php\nnamespace App\\Models;\nclass User {}\n").unwrap();
    let helpers = temp.path().join("helpers.php");
    fs::write(&helpers, "<?php\n").unwrap();

    let config = AutoloadConfig::from_value(json!({
        "autoload": {
            "psr-4": {"App\\": src},
            "classmap": {"Legacy\\Thing": temp.path().join("Thing.php")},
            "files": [helpers]
        },
        "auto_register": true
    }))
    .unwrap();

    let chain = Arc::new(HookChain::new());
    let loader = Autoloader::new(chain.clone());
    assert!(config.apply(&loader).unwrap());

    assert_eq!(chain.len(), 1);
    assert_eq!(loader.included_files(), [helpers]);
    assert_eq!(chain.resolve("App\\Models\\User"), LoadOutcome::Loaded(user));
    assert!(matches!(chain.resolve("Legacy\\Thing"), LoadOutcome::Missing(_)));
}

#[test]
fn test_apply_without_auto_register_leaves_loader_unregistered() {
    let config = AutoloadConfig::from_value(json!({
        "autoload": {"psr-4": {"App\\": "/srv/app/src"}}
    }))
    .unwrap();

    let chain = Arc::new(HookChain::new());
    let loader = Autoloader::new(chain.clone());
    assert!(!config.apply(&loader).unwrap());
    assert!(chain.is_empty());
    assert!(loader.namespace_map().has_namespace("App"));
}

#[test]
fn test_apply_rejects_malformed_sections() {
    let config = AutoloadConfig::from_value(json!({"autoload": {"classmap": ["not", "a", "map"]}})).unwrap();
    let loader = Autoloader::new(Arc::new(HookChain::new()));

    assert!(matches!(
        config.apply(&loader),
        Err(ConfigError::InvalidShape { ref key, .. }) if key == "autoload.classmap"
    ));
    assert!(!loader.is_registered());
}

#[test]
fn test_apply_resolves_relative_paths_against_base() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("src/Models")).unwrap();
    fs::create_dir_all(temp.path().join("legacy")).unwrap();
    let user = temp.path().join("src/Models/User.php");
    let thing = temp.path().join("legacy/Thing.php");
    let helpers = temp.path().join("helpers.php");
    for file in [&user, &thing, &helpers] {
        fs::write(file, "<?php\n").unwrap();
    }

    let mut config = AutoloadConfig::from_value(json!({
        "autoload": {
            "psr-4": {"App\\": ["src", "/opt/shared/src"]},
            "classmap": {"Legacy\\Thing": "legacy/Thing.php"},
            "files": ["helpers.php"]
        }
    }))
    .unwrap();
    config.set_base_path(temp.path());

    let loader = Autoloader::new(Arc::new(HookChain::new()));
    config.apply(&loader).unwrap();

    assert_eq!(
        loader.namespaces()["App\\"],
        [temp.path().join("src"), PathBuf::from("/opt/shared/src")]
    );
    assert_eq!(loader.find_file("App\\Models\\User"), Some(user));
    assert_eq!(loader.find_file("Legacy\\Thing"), Some(thing));
    assert_eq!(loader.files(), [helpers]);
}
