//! `autoload discover`: Scan a directory for namespaces.

use crate::output::StyledOutput;
use autoload_core::{Autoloader, ClassDiscovery, DiscoveryOptions, HookChain};
use std::path::Path;
use std::sync::Arc;
use termcolor::ColorChoice;

/// Options for the discover command
pub struct DiscoverOptions {
    /// Register the whole directory under this namespace
    pub namespace: Option<String>,
    /// List discovered classes
    pub classes: bool,
    pub recursive: bool,
    pub json: bool,
}

pub fn execute(directory: &Path, options: DiscoverOptions, color: ColorChoice) -> anyhow::Result<()> {
    if !directory.is_dir() {
        anyhow::bail!("Not a directory: {}", directory.display());
    }

    let autoloader = Autoloader::new(Arc::new(HookChain::new()));
    let mut discovery = ClassDiscovery::new();
    let scan = DiscoveryOptions {
        recursive: options.recursive,
        ..DiscoveryOptions::default()
    };
    let namespaces = discovery.auto_discover_and_register(
        &autoloader,
        &[(directory.to_path_buf(), options.namespace.clone())],
        &scan,
    )?;
    let classes = discovery.discovered_classes();

    if options.json {
        let value = serde_json::json!({
            "namespaces": namespaces,
            "classes": classes,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let mut out = StyledOutput::new(color);
    out.heading("Namespaces", namespaces.len());
    for (prefix, spec) in &namespaces {
        let dirs: Vec<String> = spec.paths().iter().map(|d| d.display().to_string()).collect();
        out.mapping(prefix, &dirs.join(", "));
    }

    if options.classes {
        out.newline();
        out.heading("Classes", classes.len());
        for info in classes {
            let file = info
                .file
                .as_deref()
                .map(|f| f.display().to_string())
                .unwrap_or_default();
            out.mapping(&info.full_class, &file);
        }
    }
    out.flush();
    Ok(())
}
