//! `autoload resolve`: Resolve class identifiers to files.

use super::open_session;
use crate::output::StyledOutput;
use autoload_core::{Autoloader, FileIncluder, LoadOutcome, NoopIncluder, SymbolTable};
use std::path::Path;
use std::sync::Arc;
use termcolor::ColorChoice;

/// Options for the resolve command
pub struct ResolveOptions {
    /// List every candidate file probed
    pub candidates: bool,
    /// Register the autoloader and load through the hook chain
    pub load: bool,
}

pub fn execute(
    config_path: &Path,
    classes: &[String],
    options: ResolveOptions,
    color: ColorChoice,
) -> anyhow::Result<()> {
    let symbols = Arc::new(SymbolTable::new());
    let includer: Arc<dyn FileIncluder> = if options.load {
        symbols.clone()
    } else {
        Arc::new(NoopIncluder)
    };

    let session = open_session(config_path, includer)?;
    if options.load && !session.autoloader.register() {
        anyhow::bail!("Failed to register the autoloader");
    }

    let class_map = session.autoloader.class_map();
    let namespace_map = session.autoloader.namespace_map();
    let mut out = StyledOutput::new(color);
    let mut unresolved = 0;

    for class in classes {
        let outcome = if options.load {
            session.hooks.resolve(class)
        } else {
            locate(&session.autoloader, class)
        };

        match &outcome {
            LoadOutcome::Loaded(path) => {
                out.success(if options.load { "loaded  " } else { "found   " });
                out.info(class);
                out.plain(&format!(" → {}", path.display()));
            }
            LoadOutcome::Missing(path) => {
                unresolved += 1;
                out.warning("missing ");
                out.info(class);
                out.plain(&format!(" → {}", path.display()));
            }
            LoadOutcome::NotFound => {
                unresolved += 1;
                out.warning("unknown ");
                out.info(class);
            }
        }
        if class_map.has_class(class) {
            out.dim(" (class map)");
        }
        out.newline();

        if options.candidates && !class_map.has_class(class) {
            for candidate in namespace_map.find_candidates(class) {
                let marker = if candidate.is_file() { "  ✓ " } else { "  ✗ " };
                out.dim(marker);
                out.dim(&candidate.display().to_string());
                out.newline();
            }
        }
    }

    if options.load {
        out.dim(&format!("{} symbols defined", symbols.len()));
        out.newline();
    }
    out.flush();

    if unresolved > 0 {
        anyhow::bail!("{} of {} classes could not be resolved", unresolved, classes.len());
    }
    Ok(())
}

/// Resolve without including; class-map hits are checked on disk here
fn locate(autoloader: &Autoloader, class: &str) -> LoadOutcome {
    match autoloader.find_file(class) {
        Some(path) if path.is_file() => LoadOutcome::Loaded(path),
        Some(path) => LoadOutcome::Missing(path),
        None => LoadOutcome::NotFound,
    }
}
