//! Integration tests for namespace discovery and module snapshots

use autoload_core::{
    AutoloadConfig, Autoloader, ClassDiscovery, DiscoveryManager, DiscoveryOptions, HookChain,
    LoadOutcome, PathSpec, Snapshot, SnapshotGenerator,
};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

fn loader() -> Autoloader {
    Autoloader::new(Arc::new(HookChain::new()))
}

#[test]
fn test_discovered_namespaces_resolve_classes() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let user = write(root, "app/Models/User.php", "<?php\nnamespace App\\Models;\nclass User {}\n");
    write(root, "app/Http/Kernel.php", "<?php\nnamespace App\\Http;\nclass Kernel {}\n");

    let autoloader = loader();
    let mut discovery = ClassDiscovery::new();
    let found = discovery
        .auto_discover_and_register(&autoloader, &[(root.join("app"), None)], &DiscoveryOptions::default())
        .unwrap();

    assert!(found.contains_key("App\\Models\\"));
    assert!(found.contains_key("App\\Http\\"));
    assert_eq!(autoloader.load_class("App\\Models\\User"), LoadOutcome::Loaded(user));
}

#[test]
fn test_base_namespace_registers_directory_directly() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let service = write(root, "lib/Services/Mailer.php", "<?php\nnamespace Acme\\Services;\nclass Mailer {}\n");

    let autoloader = loader();
    let mut discovery = ClassDiscovery::new();
    let options = DiscoveryOptions {
        discover_sub_namespaces: false,
        ..DiscoveryOptions::default()
    };
    let found = discovery
        .auto_discover_and_register(&autoloader, &[(root.join("lib"), Some("Acme".to_string()))], &options)
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found["Acme\\"], PathSpec::One(root.join("lib")));
    assert_eq!(autoloader.find_file("Acme\\Services\\Mailer"), Some(service));
}

#[test]
fn test_discover_modules_registers_module_sources() {
    let temp = TempDir::new().unwrap();
    let modules = temp.path().join("modules");
    let post = write(&modules, "Blog/src/Post.php", "<?php\nnamespace Modules\\Blog;\nclass Post {}\n");
    fs::create_dir_all(modules.join("NoSources")).unwrap();

    let autoloader = loader();
    let found = ClassDiscovery::new()
        .discover_modules(&autoloader, &modules, "Modules\\", "src")
        .unwrap();

    assert_eq!(found.keys().collect::<Vec<_>>(), ["Modules\\Blog\\"]);
    assert_eq!(autoloader.find_file("Modules\\Blog\\Post"), Some(post));
}

#[test]
fn test_manager_runs_configured_directories_and_fallbacks() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, "app/Models/User.php", "<?php\nnamespace App\\Models;\nclass User {}\n");
    write(root, "modules/Shop/src/Cart.php", "<?php\nnamespace Modules\\Shop;\nclass Cart {}\n");
    fs::create_dir_all(root.join("support")).unwrap();

    let config = AutoloadConfig::from_value(json!({
        "discovery": {
            "directories": {
                "app": {"path": "app"},
                "modules": {"path": "modules", "module_discovery": true},
                "missing": {"path": "does-not-exist"}
            },
            "fallback_namespaces": {
                "App\\Models": "app/Models",
                "Support": "support",
                "Gone": "gone"
            }
        }
    }))
    .unwrap();

    let autoloader = loader();
    let mut manager = DiscoveryManager::new(root);
    manager.load_config(config.discovery().unwrap());
    let found = manager.perform_auto_discovery(&autoloader).unwrap();

    assert_eq!(
        found.keys().collect::<Vec<_>>(),
        ["App\\Models\\", "Modules\\Shop\\", "Support\\"]
    );
    assert_eq!(found["Support\\"], PathSpec::One(root.join("support")));
    assert!(autoloader.find_file("Modules\\Shop\\Cart").is_some());
    assert!(!autoloader.namespace_map().has_namespace("Gone"));
}

#[test]
fn test_disabled_discovery_only_applies_fallbacks() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, "app/Models/User.php", "<?php\nnamespace App\\Models;\nclass User {}\n");
    fs::create_dir_all(root.join("support")).unwrap();

    let config = AutoloadConfig::from_value(json!({
        "discovery": {
            "enabled": false,
            "directories": {"app": {"path": "app"}},
            "fallback_namespaces": {"Support\\": "support"}
        }
    }))
    .unwrap();

    let autoloader = loader();
    let mut manager = DiscoveryManager::new(root);
    manager.load_config(config.discovery().unwrap());
    let found = manager.perform_auto_discovery(&autoloader).unwrap();

    assert_eq!(found.keys().collect::<Vec<_>>(), ["Support\\"]);
    assert!(!autoloader.namespace_map().has_namespace("App\\Models"));
}

#[test]
fn test_snapshot_round_trip_through_autoloader() {
    let temp = TempDir::new().unwrap();
    let modules = temp.path().join("modules");
    write(&modules, "Blog/composer.json", r#"{"autoload": {"psr-4": {"Blog\\": "src/"}}}"#);
    write(&modules, "Blog/module.json", r#"{"files": ["helpers.php"]}"#);
    let post = write(&modules, "Blog/src/Post.php", "<?php\nnamespace Blog;\nclass Post {}\n");
    let helpers = write(&modules, "Blog/helpers.php", "<?php\n");
    let output = temp.path().join("cache/autoload.json");

    SnapshotGenerator::new(&modules, &output).generate().unwrap();

    let autoloader = loader();
    Snapshot::load(&output).unwrap().apply(&autoloader);
    assert!(autoloader.register());

    assert_eq!(autoloader.included_files(), [helpers]);
    assert_eq!(autoloader.load_class("Blog\\Post"), LoadOutcome::Loaded(post));
}
