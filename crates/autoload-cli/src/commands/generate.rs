//! `autoload generate`: Write a module snapshot.

use crate::output::StyledOutput;
use autoload_core::SnapshotGenerator;
use std::path::Path;
use termcolor::ColorChoice;

pub fn execute(
    modules_dir: &Path,
    output: &Path,
    force: bool,
    publish: Option<&Path>,
    color: ColorChoice,
) -> anyhow::Result<()> {
    let generator = SnapshotGenerator::new(modules_dir, output);
    let mut out = StyledOutput::new(color);

    if !force && generator.is_up_to_date() {
        out.info("Snapshot is already up to date: ");
        out.plain(&generator.output_path().display().to_string());
        out.newline();
        out.flush();
        return Ok(());
    }

    let snapshot = generator.generate()?;
    out.success("Generated ");
    out.plain(&format!(
        "{} ({} namespaces, {} files)",
        generator.output_path().display(),
        snapshot.namespaces.len(),
        snapshot.files.len()
    ));
    out.newline();

    if let Some(target) = publish {
        generator.publish(target)?;
        out.success("Published ");
        out.plain(&target.display().to_string());
        out.newline();
    }
    out.flush();
    Ok(())
}
