//! Inspect a media file.

use std::path::PathBuf;

use captioneer_common::config::AppConfig;
use captioneer_processing_core::layout::{resolve, Orientation};
use captioneer_project_model::geometry::Size;
use captioneer_render_engine::{AssetProvider, FfprobeAssetProvider, TrackKind};

pub async fn run(config: &AppConfig, media: PathBuf) -> anyhow::Result<()> {
    let provider = FfprobeAssetProvider::new();
    if !provider.is_available() {
        return Err(anyhow::anyhow!("ffprobe not found on PATH"));
    }

    let info = provider.load(&media).await?;
    println!("{}", serde_json::to_string_pretty(&info)?);

    let Some(video) = info.first_track(TrackKind::Video) else {
        println!("\nNo video track.");
        return Ok(());
    };
    let Some(natural) = video.natural_size else {
        println!("\nVideo track has no frame size.");
        return Ok(());
    };

    println!();
    match Orientation::detect(&video.transform) {
        Ok(orientation) => {
            println!(
                "Orientation: {orientation:?} ({} degrees clockwise)",
                orientation.degrees()
            );
            let target = Size::new(config.render.width as f64, config.render.height as f64);
            let canvas = resolve(natural, &video.transform, target, false)?;
            println!(
                "Default canvas: {}x{} (fill scale {:.3})",
                canvas.size.width, canvas.size.height, canvas.fill_scale
            );
        }
        Err(e) => println!("Orientation: {e}"),
    }

    Ok(())
}
