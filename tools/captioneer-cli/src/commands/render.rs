//! Render a project to video.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use captioneer_common::config::AppConfig;
use captioneer_project_model::cue::TimedSegment;
use captioneer_project_model::project::{ExportFormat, LoadedProject};
use captioneer_project_model::subtitles::save_subtitles;
use captioneer_render_engine::{
    burned_segments, export_project, CancelFlag, FfprobeAssetProvider, ProgressCallback,
    ProgressEvent, RenderJob,
};

pub async fn run(
    config: &AppConfig,
    path: PathBuf,
    output: Option<PathBuf>,
    width: Option<u32>,
    height: Option<u32>,
    format: Option<String>,
    subtitles: Option<PathBuf>,
) -> anyhow::Result<()> {
    println!("Rendering project at: {}", path.display());

    let mut project =
        LoadedProject::load(&path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;

    let export = &mut project.project.export;
    if let Some(format) = format {
        export.format = format.parse::<ExportFormat>().map_err(|e| anyhow::anyhow!(e))?;
    }
    if let Some(width) = width {
        export.width = width;
    }
    if let Some(height) = height {
        export.height = height;
    }

    let output_path = output.unwrap_or_else(|| default_output(&project));

    println!("  Output: {}", output_path.display());
    println!("  Format: {:?}", project.project.export.format);
    println!(
        "  Resolution: {}x{} (source axes)",
        project.project.export.width, project.project.export.height
    );
    println!("  Cues: {}", project.captions.cues.len());

    if let Some(sidecar) = subtitles {
        let segments = sidecar_segments(&project, &output_path, config).await?;
        save_subtitles(&segments, &sidecar)
            .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", sidecar.display()))?;
        println!("  Subtitles: {}", sidecar.display());
    }

    let cancel = CancelFlag::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    let progress_cb: ProgressCallback = Arc::new(|event: ProgressEvent| {
        print!(
            "\r  Progress: {:5.1}% ({})          ",
            event.fraction * 100.0,
            event.stage
        );
        let _ = std::io::stdout().flush();
    });

    match export_project(&project, output_path, config, Some(progress_cb), cancel).await {
        Ok(written) => {
            println!("\nRender complete: {}", written.display());
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            println!("\nRender cancelled.");
            Ok(())
        }
        Err(e) => {
            println!("\nRender failed.");
            Err(e.into())
        }
    }
}

/// `exports/<name>-<timestamp>.<ext>` inside the project.
fn default_output(project: &LoadedProject) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let name: String = project
        .project
        .name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    project.root.join("exports").join(format!(
        "{name}-{stamp}.{}",
        project.project.export.format.extension()
    ))
}

/// Subtitle lines split the same way as the burned-in captions.
async fn sidecar_segments(
    project: &LoadedProject,
    output_path: &Path,
    config: &AppConfig,
) -> anyhow::Result<Vec<TimedSegment>> {
    let job = RenderJob::from_project(project, output_path, config);
    burned_segments(&job, &FfprobeAssetProvider::new())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to lay out subtitles: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use captioneer_project_model::clip::Clip;
    use captioneer_project_model::cue::CaptionCue;
    use captioneer_project_model::project::Project;

    #[test]
    fn test_default_output_lives_in_exports() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::new("My Clip", Clip::new("sources/clip.mp4", 5.0), 1920, 1080, 30);
        let loaded = LoadedProject::create(dir.path(), project).unwrap();

        let out = default_output(&loaded);
        assert_eq!(out.parent().unwrap(), dir.path().join("exports"));
        let file = out.file_name().unwrap().to_string_lossy().to_string();
        assert!(file.starts_with("My_Clip-"));
        assert!(file.ends_with(".mp4"));
    }

    #[tokio::test]
    async fn test_sidecar_without_segmentation_keeps_cue_timing() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::new("clip", Clip::new("sources/clip.mp4", 5.0), 1920, 1080, 30);
        let mut loaded = LoadedProject::create(dir.path(), project).unwrap();
        loaded.captions.cues = vec![CaptionCue::new("Hi", 0.5, 1.25)];

        let out = dir.path().join("out.mp4");
        let segments = sidecar_segments(&loaded, &out, &AppConfig::default())
            .await
            .unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "Hi");
        assert_eq!((segments[0].start, segments[0].end), (0.5, 1.25));
    }
}
