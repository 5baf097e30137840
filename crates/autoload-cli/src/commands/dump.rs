//! `autoload dump`: Show the effective mappings.

use super::open_session;
use crate::output::StyledOutput;
use autoload_core::NoopIncluder;
use std::path::Path;
use std::sync::Arc;
use termcolor::ColorChoice;

pub fn execute(config_path: &Path, json: bool, color: ColorChoice) -> anyhow::Result<()> {
    let session = open_session(config_path, Arc::new(NoopIncluder))?;
    let class_map = session.autoloader.class_map();
    let namespaces = session.autoloader.namespaces();
    let files = session.autoloader.files();

    if json {
        let value = serde_json::json!({
            "classmap": class_map.all_classes(),
            "psr-4": namespaces,
            "files": files,
            "auto_register": session.config.auto_register(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let mut out = StyledOutput::new(color);

    out.heading("Class map", class_map.len());
    for (class, path) in class_map.all_classes() {
        out.mapping(class, &path.display().to_string());
    }
    out.newline();

    out.heading("Namespaces", namespaces.len());
    for (prefix, dirs) in &namespaces {
        let dirs: Vec<String> = dirs.iter().map(|d| d.display().to_string()).collect();
        out.mapping(prefix, &dirs.join(", "));
    }
    out.newline();

    out.heading("Files", files.len());
    for file in &files {
        out.plain("  ");
        out.plain(&file.display().to_string());
        out.newline();
    }

    if session.config.auto_register() {
        out.newline();
        out.dim("auto_register is on");
        out.newline();
    }
    out.flush();
    Ok(())
}
