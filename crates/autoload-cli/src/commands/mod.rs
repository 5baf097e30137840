//! CLI command implementations

pub mod discover;
pub mod dump;
pub mod generate;
pub mod resolve;

use anyhow::Context;
use autoload_core::{
    AutoloadConfig, Autoloader, DiscoveryManager, FileIncluder, HookChain, Snapshot,
};
use std::path::Path;
use std::sync::Arc;

/// A configured autoloader and the hook chain it registers into
pub struct Session {
    pub config: AutoloadConfig,
    pub autoloader: Autoloader,
    pub hooks: Arc<HookChain>,
}

/// Build an autoloader from a configuration file
///
/// Mappings are applied in this order: the development snapshot (when
/// caching is enabled and the snapshot exists), the `autoload` section,
/// then discovery. Relative mapping, snapshot and discovery paths are all
/// resolved against the configuration file's directory. A missing
/// configuration file yields an empty configuration.
pub fn open_session(config_path: &Path, includer: Arc<dyn FileIncluder>) -> anyhow::Result<Session> {
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let mut config = AutoloadConfig::new();
    config.set_base_path(base);
    if config_path.exists() {
        config
            .load_from_file(config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?;
    } else {
        tracing::warn!(path = %config_path.display(), "configuration file not found, using defaults");
    }

    let hooks = Arc::new(HookChain::new());
    let autoloader = Autoloader::builder(hooks.clone()).includer(includer).build();

    let development = config.development()?;
    if development.cache_enabled {
        let snapshot = development.cache_path.map(|p| config.resolve_path(p));
        if let Some(snapshot) = snapshot.as_deref().filter(|p| p.is_file()) {
            Snapshot::load(snapshot)?.apply(&autoloader);
            tracing::debug!(path = %snapshot.display(), "applied autoload snapshot");
        }
    }

    config.apply(&autoloader)?;

    let mut manager = DiscoveryManager::new(base);
    manager.load_config(config.discovery()?);
    manager
        .perform_auto_discovery(&autoloader)
        .context("Discovery failed")?;

    Ok(Session {
        config,
        autoloader,
        hooks,
    })
}
