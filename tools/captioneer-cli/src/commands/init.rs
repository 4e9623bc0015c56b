//! Initialize a new Captioneer project.

use std::path::PathBuf;

use captioneer_common::config::AppConfig;
use captioneer_project_model::clip::Clip;
use captioneer_project_model::project::{LoadedProject, Project};
use captioneer_render_engine::{AssetProvider, FfprobeAssetProvider};

pub async fn run(
    config: &AppConfig,
    name: String,
    source: PathBuf,
    output: PathBuf,
    width: Option<u32>,
    height: Option<u32>,
) -> anyhow::Result<()> {
    let project_dir = output.join(&name);
    println!("Creating project '{}' at {}", name, project_dir.display());

    let file_name = source
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Source has no file name: {}", source.display()))?
        .to_owned();
    let info = FfprobeAssetProvider::new()
        .load(&source)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to probe source: {e}"))?;

    let width = width.unwrap_or(config.render.width);
    let height = height.unwrap_or(config.render.height);
    let relative = PathBuf::from("sources").join(&file_name);
    let clip = Clip::new(relative.clone(), info.duration);
    let mut project = Project::new(&name, clip, width, height, config.render.fps);
    project.export.video_bitrate_kbps = config.render.video_bitrate_kbps;
    project.export.audio_bitrate_kbps = config.render.audio_bitrate_kbps;
    if let Ok(format) = config.render.format.parse() {
        project.export.format = format;
    }

    let loaded = LoadedProject::create(&project_dir, project)
        .map_err(|e| anyhow::anyhow!("Failed to create project: {e}"))?;
    std::fs::copy(&source, loaded.root.join(&relative))
        .map_err(|e| anyhow::anyhow!("Failed to copy source: {e}"))?;

    println!("Project created successfully:");
    println!("  Directory: {}", loaded.root.display());
    println!("  Source: {} ({:.2}s)", relative.display(), info.duration);
    println!("  Resolution: {}x{}", width, height);
    println!("  FPS: {}", config.render.fps);
    println!();
    println!("Directory structure:");
    println!("  {}/", name);
    println!("  ├── sources/     (source media)");
    println!("  ├── meta/        (project.json, captions.json)");
    println!("  └── exports/     (rendered output)");

    Ok(())
}
