//! Pack word timings into caption lines.

use std::path::PathBuf;

use captioneer_common::config::{AppConfig, CaptionDefaults};
use captioneer_processing_core::measure::{ApproxGlyphMeasurer, TextMeasurer};
use captioneer_processing_core::segmenter::{segment, SegmenterConfig};
use captioneer_project_model::cue::{CaptionCue, TimedSegment, WordTiming};
use captioneer_project_model::project::{LoadedProject, SegmentationSettings};
use captioneer_project_model::style::CaptionStyle;
use captioneer_project_model::subtitles::{generate_srt, generate_vtt};

pub struct SegmentArgs {
    pub words: PathBuf,
    pub max_width: Option<f64>,
    pub font_size: f64,
    pub cps: Option<f64>,
    pub format: String,
    pub output: Option<PathBuf>,
    pub project: Option<PathBuf>,
}

pub fn run(config: &AppConfig, args: SegmentArgs) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.words)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", args.words.display()))?;
    let timings: Vec<WordTiming> = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("Failed to parse word timings: {e}"))?;

    let mut project = match &args.project {
        Some(path) => Some(
            LoadedProject::load(path)
                .map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?,
        ),
        None => None,
    };

    let mut settings = settings_from_defaults(&config.captions);
    if let Some(cps) = args.cps {
        settings.target_cps = cps;
    }
    let canvas_width = project
        .as_ref()
        .map(|p| p.project.export.width)
        .unwrap_or(config.render.width);
    let max_width = args
        .max_width
        .unwrap_or(canvas_width as f64 * settings.max_width_ratio);
    if max_width <= 0.0 || args.font_size <= 0.0 {
        return Err(anyhow::anyhow!(
            "max width and font size must be positive (got {max_width} and {})",
            args.font_size
        ));
    }

    let measurer = ApproxGlyphMeasurer::new(args.font_size);
    let segmenter = SegmenterConfig::from_settings(&settings, max_width);
    let lines = segment(&timings, &segmenter, |s| measurer.width(s));
    tracing::info!(
        words = timings.len(),
        lines = lines.len(),
        max_width,
        "Segmented word timings"
    );

    if let Some(project) = project.as_mut() {
        let added = append_cues(project, &lines, &config.captions.preset);
        project
            .save()
            .map_err(|e| anyhow::anyhow!("Failed to save project: {e}"))?;
        println!(
            "Added {added} cue(s) to {} ({} total)",
            project.root.display(),
            project.captions.cues.len()
        );
    }

    let rendered = render_segments(&lines, &args.format)?;
    match args.output {
        Some(path) => {
            std::fs::write(&path, rendered)
                .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", path.display()))?;
            println!("Wrote {} line(s) to {}", lines.len(), path.display());
        }
        None if args.project.is_none() => print!("{rendered}"),
        None => {}
    }
    Ok(())
}

/// Segmentation settings seeded from the user's caption defaults.
pub fn settings_from_defaults(defaults: &CaptionDefaults) -> SegmentationSettings {
    SegmentationSettings {
        max_width_ratio: defaults.max_width_ratio,
        target_cps: defaults.target_cps,
        min_duration_secs: defaults.min_duration_secs,
        max_duration_secs: defaults.max_duration_secs,
        gap_secs: defaults.gap_secs,
        expand_short_cues: defaults.expand_short_cues,
        joiner: defaults.joiner.clone(),
    }
}

/// Append one cue per line, styled with `preset`, keeping cues in time order.
fn append_cues(project: &mut LoadedProject, lines: &[TimedSegment], preset: &str) -> usize {
    let style = CaptionStyle::preset(preset).unwrap_or_else(|| {
        tracing::warn!(preset, "Unknown caption preset, using the default style");
        CaptionStyle::default()
    });
    let template = CaptionCue {
        style,
        ..CaptionCue::new("", 0.0, 0.0)
    };

    let cues = &mut project.captions.cues;
    cues.extend(lines.iter().map(|line| template.with_segment(line)));
    cues.sort_by(|a, b| a.range.start.total_cmp(&b.range.start));
    lines.len()
}

fn render_segments(lines: &[TimedSegment], format: &str) -> anyhow::Result<String> {
    match format {
        "json" => Ok(format!("{}\n", serde_json::to_string_pretty(lines)?)),
        "srt" => Ok(generate_srt(lines)),
        "vtt" => Ok(generate_vtt(lines)),
        _ => Err(anyhow::anyhow!("Unknown format: {format}. Use: json, srt, vtt")),
    }
}
