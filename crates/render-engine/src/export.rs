//! Render jobs and the main rendering entry point.

use std::path::PathBuf;
use std::sync::Arc;

use captioneer_common::config::{AppConfig, ProgressTuning};
use captioneer_common::error::{CaptioneerError, CaptioneerResult};
use captioneer_processing_core::layout::{resolve, Canvas};
use captioneer_processing_core::measure::{ApproxGlyphMeasurer, TextMeasurer};
use captioneer_processing_core::segmenter::{segment, SegmenterConfig};
use captioneer_project_model::clip::Clip;
use captioneer_project_model::cue::{CaptionCue, TimedSegment};
use captioneer_project_model::geometry::Size;
use captioneer_project_model::project::{
    ExportConfig, ExportFormat, LoadedProject, OverlayBackendCapability, SegmentationSettings,
};

use crate::asset::AssetProvider;
use crate::backend::{CancelFlag, EncodeRequest, RenderBackend, SessionGuard};
use crate::composer::{compose, ComposedTimeline};
use crate::ffmpeg::FfmpegBackend;
use crate::overlay::{self, OverlayConfig};
use crate::probe::FfprobeAssetProvider;
use crate::progress::{ProgressCallback, ProgressMonitor, ProgressReporter, StagePlan};

/// A render ready to run.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub clip: Clip,

    /// Cues on the output timeline.
    pub cues: Vec<CaptionCue>,

    /// Requested output size in the source's natural axes.
    pub target_size: Size,

    pub output_path: PathBuf,

    /// Encoder settings. `segmentation` enables inline re-segmentation of
    /// cues that carry word timings.
    pub export: ExportConfig,

    pub overlay: OverlayConfig,
    pub progress: ProgressTuning,
    pub stages: StagePlan,
}

impl RenderJob {
    /// A job with default encoder, overlay and progress settings.
    pub fn new(
        clip: Clip,
        cues: Vec<CaptionCue>,
        target_size: Size,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            clip,
            cues,
            target_size,
            output_path: output_path.into(),
            export: ExportConfig {
                format: ExportFormat::Mp4H264,
                width: target_size.width.round() as u32,
                height: target_size.height.round() as u32,
                fps: 30,
                video_bitrate_kbps: 8000,
                audio_bitrate_kbps: 192,
                overlay: OverlayBackendCapability::default(),
                segmentation: None,
            },
            overlay: OverlayConfig::default(),
            progress: ProgressTuning::default(),
            stages: StagePlan::default(),
        }
    }

    /// A job rendering a loaded project with its export settings.
    pub fn from_project(
        loaded: &LoadedProject,
        output_path: impl Into<PathBuf>,
        config: &AppConfig,
    ) -> Self {
        let export = loaded.project.export.clone();
        Self {
            clip: loaded.resolved_clip(),
            cues: loaded.captions.cues.clone(),
            target_size: Size::new(export.width as f64, export.height as f64),
            output_path: output_path.into(),
            export,
            overlay: OverlayConfig::default(),
            progress: config.progress.clone(),
            stages: StagePlan::default(),
        }
    }
}

/// Render `job` to its output path.
///
/// Stages run in order (compose, layout, overlay) and abort on the first
/// error; the encode then runs under a [`ProgressMonitor`]. `progress`
/// receives a non-decreasing sequence of events ending at 1.0 on success.
/// Setting `cancel` stops the encode and returns
/// [`CaptioneerError::Cancelled`]; dropping the returned future does the same.
pub async fn render(
    job: &RenderJob,
    provider: &dyn AssetProvider,
    backend: &dyn RenderBackend,
    progress: Option<ProgressCallback>,
    cancel: CancelFlag,
) -> CaptioneerResult<PathBuf> {
    let started = std::time::Instant::now();
    let reporter = Arc::new(ProgressReporter::new(progress));
    let stages = &job.stages;

    tracing::info!(
        source = %job.clip.source.display(),
        output = %job.output_path.display(),
        cues = job.cues.len(),
        backend = backend.name(),
        "Starting render"
    );
    reporter.emit(stages.setup.stage, stages.setup.start);

    validate_job(job)?;

    let timeline = compose(&job.clip, provider).await?;
    check_cancelled(&cancel)?;
    reporter.emit(stages.setup.stage, stages.setup.end);

    let canvas = resolve_canvas(job, &timeline)?;
    let cues = segment_cues(&job.cues, &canvas, job.export.segmentation.as_ref());
    tracing::info!(
        stage = "layout",
        orientation = ?canvas.orientation,
        width = canvas.size.width,
        height = canvas.size.height,
        mirrored = canvas.mirrored,
        cues = cues.len(),
        "Layout resolved"
    );
    reporter.emit(stages.layout.stage, stages.layout.end);

    let overlay = overlay::build(
        &cues,
        &canvas,
        timeline.duration,
        job.clip.frame_style.as_ref(),
        &job.export.overlay,
        &job.overlay,
    );
    reporter.emit(stages.overlay.stage, stages.overlay.end);
    check_cancelled(&cancel)?;

    if !backend.is_available() {
        return Err(CaptioneerError::composition(format!(
            "render backend '{}' is not available",
            backend.name()
        )));
    }
    let session = backend.create_session(EncodeRequest {
        timeline,
        canvas,
        overlay,
        export: job.export.clone(),
        output_path: job.output_path.clone(),
    })?;
    let _guard = SessionGuard::new(Arc::clone(&session));
    session.start()?;

    let monitor = ProgressMonitor::new(
        stages.encode,
        job.progress.clone(),
        Arc::clone(&reporter),
        cancel,
    );
    let output = monitor.run(session.as_ref()).await?;

    tracing::info!(
        output = %output.display(),
        elapsed_secs = started.elapsed().as_secs_f64(),
        "Render finished"
    );
    Ok(output)
}

/// Subtitle lines for the captions `render` would burn into `job`.
///
/// With segmentation enabled this composes the clip and resolves the
/// canvas, so the lines split exactly where the video's do. Without it the
/// authored cues are returned and no asset is loaded.
pub async fn burned_segments(
    job: &RenderJob,
    provider: &dyn AssetProvider,
) -> CaptioneerResult<Vec<TimedSegment>> {
    validate_job(job)?;
    let Some(settings) = job.export.segmentation.as_ref() else {
        return Ok(job.cues.iter().map(CaptionCue::as_segment).collect());
    };

    let timeline = compose(&job.clip, provider).await?;
    let canvas = resolve_canvas(job, &timeline)?;
    Ok(segment_cues(&job.cues, &canvas, Some(settings))
        .iter()
        .map(CaptionCue::as_segment)
        .collect())
}

fn validate_job(job: &RenderJob) -> CaptioneerResult<()> {
    let mut issues = job.clip.validate();
    issues.extend(job.cues.iter().flat_map(CaptionCue::validate));
    if !issues.is_empty() {
        return Err(CaptioneerError::invalid_input(issues.join("; ")));
    }
    if job.target_size.is_empty() {
        return Err(CaptioneerError::invalid_input(format!(
            "target size {}x{} has no area",
            job.target_size.width, job.target_size.height
        )));
    }
    Ok(())
}

fn resolve_canvas(job: &RenderJob, timeline: &ComposedTimeline) -> CaptioneerResult<Canvas> {
    let natural = timeline.natural_size()?;
    resolve(
        natural,
        &timeline.video.transform,
        job.target_size,
        job.clip.mirror,
    )
}

fn check_cancelled(cancel: &CancelFlag) -> CaptioneerResult<()> {
    if cancel.is_cancelled() {
        tracing::info!("Render cancelled before encode");
        return Err(CaptioneerError::Cancelled);
    }
    Ok(())
}

/// Re-segment cues that carry word timings into width-bounded lines.
///
/// Each cue is segmented within its own time range and every line inherits
/// the cue's style and placement. Cues without words, and cues whose text
/// has explicit line breaks, are kept as they are. Without `settings` the
/// cues are returned unchanged.
pub fn segment_cues(
    cues: &[CaptionCue],
    canvas: &Canvas,
    settings: Option<&SegmentationSettings>,
) -> Vec<CaptionCue> {
    let Some(settings) = settings else {
        return cues.to_vec();
    };

    let scale = canvas.style_scale();
    let max_width = canvas.size.width * settings.max_width_ratio;
    let mut segmented = Vec::with_capacity(cues.len());
    for cue in cues {
        if cue.words.is_empty() || cue.text.contains('\n') {
            segmented.push(cue.clone());
            continue;
        }

        let measurer = ApproxGlyphMeasurer::new(cue.style.font_size * scale);
        let config = SegmenterConfig::from_settings(settings, max_width).with_sentence_window(cue.range);
        let lines = segment(&cue.words, &config, |s| measurer.width(s));
        if lines.is_empty() {
            segmented.push(cue.clone());
        } else {
            segmented.extend(lines.iter().map(|line| cue.with_segment(line)));
        }
    }

    tracing::debug!(
        cues = cues.len(),
        lines = segmented.len(),
        max_width,
        "Cues segmented"
    );
    segmented
}

/// Render a loaded project with ffprobe and ffmpeg.
///
/// This is the main entry point for rendering.
pub async fn export_project(
    loaded: &LoadedProject,
    output_path: PathBuf,
    config: &AppConfig,
    progress: Option<ProgressCallback>,
    cancel: CancelFlag,
) -> CaptioneerResult<PathBuf> {
    let issues = loaded.validate();
    if !issues.is_empty() {
        return Err(CaptioneerError::invalid_input(issues.join("; ")));
    }

    let job = RenderJob::from_project(loaded, output_path, config);
    let provider = FfprobeAssetProvider::new();
    let backend = FfmpegBackend::new();
    render(&job, &provider, &backend, progress, cancel).await
}
