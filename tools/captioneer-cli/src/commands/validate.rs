//! Validate a Captioneer project bundle.

use std::path::PathBuf;

use captioneer_project_model::project::LoadedProject;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating project at: {}", path.display());

    let project =
        LoadedProject::load(&path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;

    let export = &project.project.export;
    println!("  Name: {}", project.project.name);
    println!("  Version: {}", project.project.version);
    println!("  Source: {}", project.project.clip.source.display());
    println!("  Resolution: {}x{}", export.width, export.height);
    println!("  FPS: {}", export.fps);
    println!("  Cues: {}", project.captions.cues.len());

    let errors = project.validate();
    if errors.is_empty() {
        println!("\nProject is valid.");
        return Ok(());
    }

    println!("\nValidation issues:");
    for error in &errors {
        println!("  - {error}");
    }
    Err(anyhow::anyhow!("{} issue(s) found", errors.len()))
}
