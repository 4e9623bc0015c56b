//! ffmpeg encode backend.
//!
//! Builds a single `-filter_complex` graph from the composed timeline, the
//! resolved canvas and the overlay tree, then runs ffmpeg in the background.
//! Progress comes from `-progress pipe:1`; the encode writes to a temporary
//! file next to the destination that is only moved into place on success.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use captioneer_common::error::{CaptioneerError, CaptioneerResult};
use captioneer_processing_core::layout::Orientation;
use captioneer_project_model::color::Rgba;
use captioneer_project_model::geometry::Rect;
use captioneer_project_model::project::{ExportConfig, ExportFormat};
use tempfile::{TempDir, TempPath};

use crate::backend::{EncodeBackend, EncodeRequest, EncodeStatus, RenderBackend};
use crate::composer::ComposedTrack;
use crate::layer::{AnimatedProperty, LayerContent, RenderLayer, TextBitmap};
use crate::overlay::AttachmentStrategy;

/// Encodes through the `ffmpeg` binary on `PATH`.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    binary: String,
}

impl FfmpegBackend {
    pub fn new() -> Self {
        Self::with_binary("ffmpeg")
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for FfmpegBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn is_available(&self) -> bool {
        command_exists(&self.binary)
    }

    fn create_session(&self, request: EncodeRequest) -> CaptioneerResult<Arc<dyn EncodeBackend>> {
        let session = FfmpegSession::prepare(&self.binary, request)?;
        Ok(Arc::new(session))
    }
}

/// Arguments and side files for one ffmpeg run.
#[derive(Debug, Clone)]
pub struct FfmpegPlan {
    pub args: Vec<String>,
    pub filter_graph: String,
    /// Caption text written to disk and referenced through `textfile=`.
    pub text_files: Vec<(PathBuf, String)>,
}

impl FfmpegPlan {
    /// Build the ffmpeg invocation writing to `output`, with caption text
    /// files placed under `text_dir`.
    pub fn build(request: &EncodeRequest, output: &Path, text_dir: &Path) -> CaptioneerResult<Self> {
        let timeline = &request.timeline;
        let canvas = &request.canvas;
        let export = &request.export;

        if !timeline.duration.is_finite() || timeline.duration <= 0.0 {
            return Err(CaptioneerError::composition(format!(
                "output duration {} must be positive",
                timeline.duration
            )));
        }
        if canvas.size.is_empty() {
            return Err(CaptioneerError::composition("canvas has no area"));
        }

        let natural = timeline.natural_size()?;
        let fps = export.fps.max(1);
        let duration = timeline.duration;
        let width = even(canvas.size.width);
        let height = even(canvas.size.height);

        let mut args: Vec<String> = [
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-nostats",
            "-progress",
            "pipe:1",
            "-noautorotate",
            "-i",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(timeline.video.source.display().to_string());

        let secondary_input = match &timeline.secondary_audio {
            Some(track) => {
                args.push("-i".to_string());
                args.push(track.source.display().to_string());
                Some(1)
            }
            None => None,
        };

        let mut graph = Vec::new();

        // Source video: trim, retime, orient, aspect-fill.
        let video = &timeline.video;
        let mut chain = vec![
            format!(
                "trim=start={:.6}:end={:.6}",
                video.source_range.start, video.source_range.end
            ),
            format!("setpts=(PTS-STARTPTS)/{:.6}", video.speed()),
        ];
        match canvas.orientation {
            Orientation::Up => {}
            Orientation::Right => chain.push("transpose=1".to_string()),
            Orientation::Left => chain.push("transpose=2".to_string()),
            Orientation::Down => {
                chain.push("hflip".to_string());
                chain.push("vflip".to_string());
            }
        }
        let placement = match request.overlay.video_layer() {
            Some(framed) => canvas
                .framed_transform(framed.frame.width / canvas.size.width)
                .map_rect(&Rect::from_size(natural)),
            None => canvas.video_rect(natural),
        };
        chain.push(format!(
            "scale={}:{}",
            even(placement.width),
            even(placement.height)
        ));
        if canvas.mirrored {
            chain.push("hflip".to_string());
        }
        chain.push("setsar=1".to_string());
        graph.push(format!("[0:{}]{}[src]", video.track_index, chain.join(",")));

        let background = match request.overlay.background_layer().map(|l| &l.content) {
            Some(LayerContent::Solid { color, .. }) => *color,
            _ => Rgba::BLACK,
        };
        graph.push(format!(
            "color=c={}:s={width}x{height}:r={fps}:d={duration:.6}[base]",
            ffmpeg_color(background)
        ));
        graph.push(format!(
            "[base][src]overlay=x={:.0}:y={:.0}:eof_action=pass[scene]",
            placement.x, placement.y
        ));

        // Captions.
        let mut caption_filters = Vec::new();
        let mut text_files = Vec::new();
        request.overlay.captions.walk(&mut |layer, ancestors| {
            let alpha = property_expr(layer, ancestors, AnimatedProperty::Opacity);
            match &layer.content {
                LayerContent::Text(bitmap) => {
                    let scale = property_expr(layer, ancestors, AnimatedProperty::Scale);
                    for (line_index, (line, center_y)) in line_centers(layer.frame, bitmap).enumerate() {
                        if line.trim().is_empty() {
                            continue;
                        }
                        let path = text_dir.join(format!("line-{}.txt", text_files.len()));
                        caption_filters.push(drawtext_filter(
                            &path,
                            bitmap,
                            layer.frame.center().x,
                            center_y,
                            &alpha,
                            &scale,
                        ));
                        tracing::trace!(layer = %layer.name, line_index, "Caption line");
                        text_files.push((path, line.to_string()));
                    }
                }
                LayerContent::Solid { color, .. } => {
                    caption_filters.push(drawbox_filter(layer.frame, *color, &alpha));
                }
                LayerContent::Group | LayerContent::Video => {}
            }
        });

        if caption_filters.is_empty() {
            graph.push("[scene]null[vout]".to_string());
        } else {
            match request.overlay.strategy {
                AttachmentStrategy::PostProcess => {
                    graph.push(format!("[scene]{}[vout]", caption_filters.join(",")));
                }
                AttachmentStrategy::AdditionalTrack => {
                    graph.push(format!(
                        "color=c=black@0.0:s={width}x{height}:r={fps}:d={duration:.6},format=rgba,{}[captions]",
                        caption_filters.join(",")
                    ));
                    graph.push("[scene][captions]overlay=x=0:y=0[vout]".to_string());
                }
            }
        }

        // Audio.
        let primary = timeline
            .audio
            .as_ref()
            .map(|track| audio_chain(0, track, "a0"));
        let secondary = timeline
            .secondary_audio
            .as_ref()
            .zip(secondary_input)
            .map(|(track, input)| audio_chain(input, track, "a1"));
        let has_audio = match (primary, secondary) {
            (Some(a), Some(b)) => {
                graph.push(a);
                graph.push(b);
                graph.push("[a0][a1]amix=inputs=2:duration=first:normalize=0[aout]".to_string());
                true
            }
            (Some(only), None) | (None, Some(only)) => {
                let label = if only.ends_with("[a0]") { "[a0]" } else { "[a1]" };
                graph.push(only);
                graph.push(format!("{label}anull[aout]"));
                true
            }
            (None, None) => false,
        };

        let filter_graph = graph.join(";");
        args.push("-filter_complex".to_string());
        args.push(filter_graph.clone());
        args.push("-map".to_string());
        args.push("[vout]".to_string());
        if has_audio {
            args.push("-map".to_string());
            args.push("[aout]".to_string());
        } else {
            args.push("-an".to_string());
        }
        args.push("-r".to_string());
        args.push(fps.to_string());
        args.push("-t".to_string());
        args.push(format!("{duration:.6}"));
        args.extend(codec_args_for_config(export, has_audio));
        args.push("-f".to_string());
        args.push(muxer(export.format).to_string());
        args.push(output.display().to_string());

        Ok(Self {
            args,
            filter_graph,
            text_files,
        })
    }
}

/// Round to an even pixel count (yuv420p needs even dimensions).
fn even(value: f64) -> u32 {
    let rounded = value.round().max(2.0) as u32;
    rounded - rounded % 2
}

fn ffmpeg_color(color: Rgba) -> String {
    format!(
        "0x{:02X}{:02X}{:02X}@{:.3}",
        color.r,
        color.g,
        color.b,
        color.alpha()
    )
}

/// Strip characters that would end a quoted filter option.
fn escape_option(value: &str) -> String {
    value.replace('\'', "").replace(':', "\\:")
}

/// Product of the piecewise curves of `layer` and its ancestors.
fn property_expr(layer: &RenderLayer, ancestors: &[&RenderLayer], property: AnimatedProperty) -> String {
    let factors: Vec<String> = ancestors
        .iter()
        .copied()
        .chain(std::iter::once(layer))
        .filter_map(|l| {
            let points = l.keypoints(property);
            if points.len() == 1 && (points[0].1 - 1.0).abs() < 1e-9 {
                None
            } else {
                Some(format!("({})", build_piecewise_expr(points)))
            }
        })
        .collect();
    if factors.is_empty() {
        "1".to_string()
    } else {
        factors.join("*")
    }
}

/// Each line of `bitmap` with the canvas y of its vertical center.
fn line_centers<'a>(frame: Rect, bitmap: &'a TextBitmap) -> impl Iterator<Item = (&'a str, f64)> {
    let count = bitmap.lines().count().max(1) as f64;
    let top = frame.center().y - bitmap.line_height * count / 2.0;
    let line_height = bitmap.line_height;
    bitmap
        .lines()
        .enumerate()
        .map(move |(i, line)| (line, top + line_height * (i as f64 + 0.5)))
}

fn drawtext_filter(
    text_file: &Path,
    bitmap: &TextBitmap,
    center_x: f64,
    center_y: f64,
    alpha: &str,
    scale: &str,
) -> String {
    let font_size = if scale == "1" {
        format!("{:.2}", bitmap.font_size)
    } else {
        format!("{:.2}*{scale}", bitmap.font_size)
    };

    let mut filter = format!(
        "drawtext=textfile='{}':expansion=none",
        escape_option(&text_file.display().to_string())
    );
    if let Some(family) = &bitmap.font_family {
        filter.push_str(&format!(":font='{}'", escape_option(family)));
    }
    filter.push_str(&format!(
        ":fontsize='{font_size}':fontcolor={}:alpha='{alpha}':x='{center_x:.2}-text_w/2':y='{center_y:.2}-({font_size})/2'",
        ffmpeg_color(bitmap.color)
    ));
    if let Some(stroke) = &bitmap.stroke {
        if stroke.width > 0.0 {
            filter.push_str(&format!(
                ":borderw={}:bordercolor={}",
                stroke.width.round().max(1.0) as u32,
                ffmpeg_color(stroke.color)
            ));
        }
    }
    if let Some(shadow) = &bitmap.shadow {
        filter.push_str(&format!(
            ":shadowcolor={}:shadowx={:.0}:shadowy={:.0}",
            ffmpeg_color(shadow.color.with_opacity(shadow.opacity)),
            shadow.offset.x,
            shadow.offset.y
        ));
    }
    if let Some(background) = bitmap.background {
        filter.push_str(&format!(
            ":box=1:boxcolor={}:boxborderw={}",
            ffmpeg_color(background),
            bitmap.padding.round().max(0.0) as u32
        ));
    }
    filter
}

fn drawbox_filter(frame: Rect, color: Rgba, alpha: &str) -> String {
    let mut filter = format!(
        "drawbox=x={:.0}:y={:.0}:w={:.0}:h={:.0}:color={}:t=fill",
        frame.x,
        frame.y,
        frame.width.max(1.0),
        frame.height.max(1.0),
        ffmpeg_color(color)
    );
    if alpha != "1" {
        filter.push_str(&format!(":enable='gt({alpha},0.5)'"));
    }
    filter
}

fn audio_chain(input: usize, track: &ComposedTrack, label: &str) -> String {
    let mut chain = vec![
        format!(
            "atrim=start={:.6}:end={:.6}",
            track.source_range.start, track.source_range.end
        ),
        "asetpts=PTS-STARTPTS".to_string(),
    ];
    chain.extend(atempo_factors(track.speed()).into_iter().map(|f| format!("atempo={f:.6}")));
    chain.push(format!("volume={:.4}", track.volume.max(0.0)));
    format!("[{input}:{}]{}[{label}]", track.track_index, chain.join(","))
}

/// Split a speed factor into `atempo` stages within the 0.5 to 2.0 range.
fn atempo_factors(speed: f64) -> Vec<f64> {
    if !speed.is_finite() || speed <= 0.0 || (speed - 1.0).abs() < 1e-9 {
        return vec![];
    }
    let mut factors = vec![];
    let mut remaining = speed;
    while remaining > 2.0 {
        factors.push(2.0);
        remaining /= 2.0;
    }
    while remaining < 0.5 {
        factors.push(0.5);
        remaining /= 0.5;
    }
    factors.push(remaining);
    factors
}

/// Nested `if(lt(t,..))` expression interpolating linearly between points.
fn build_piecewise_expr(mut points: Vec<(f64, f64)>) -> String {
    if points.is_empty() {
        return "0".to_string();
    }

    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    points.dedup_by(|a, b| (a.0 - b.0).abs() < 1e-6);

    let mut sanitized: Vec<(f64, f64)> = Vec::with_capacity(points.len());
    for (t, v) in points {
        if let Some((last_t, last_v)) = sanitized.last_mut() {
            if (t - *last_t).abs() < 1e-4 {
                *last_t = t;
                *last_v = v;
                continue;
            }
        }
        sanitized.push((t, v));
    }

    let points = sanitized;
    let Some(&(_, last_value)) = points.last() else {
        return "0".to_string();
    };
    if points.len() == 1 {
        return format!("{last_value:.6}");
    }

    let mut expr = format!("{last_value:.6}");
    for idx in (0..points.len() - 1).rev() {
        let (t0, v0) = points[idx];
        let (t1, v1) = points[idx + 1];
        if (t1 - t0).abs() < 1e-9 {
            continue;
        }

        let interp = format!(
            "{v0:.6}+({delta:.6})*(t-{t0:.6})/{dur:.6}",
            delta = v1 - v0,
            dur = (t1 - t0).max(1e-4)
        );
        expr = format!("if(lt(t,{t1:.6}),{interp},{tail})", tail = expr);
    }

    expr
}

fn muxer(format: ExportFormat) -> &'static str {
    match format {
        ExportFormat::Mp4H264 | ExportFormat::Mp4H265 => "mp4",
        ExportFormat::Webm => "webm",
    }
}

fn codec_args_for_config(config: &ExportConfig, has_audio: bool) -> Vec<String> {
    let video_bitrate = format!("{}k", config.video_bitrate_kbps.max(1000));
    let audio_bitrate = format!("{}k", config.audio_bitrate_kbps.max(64));

    let (video, audio): (Vec<&str>, Vec<&str>) = match config.format {
        ExportFormat::Mp4H264 => (
            vec![
                "-c:v",
                "libx264",
                "-preset",
                "medium",
                "-profile:v",
                "high",
                "-pix_fmt",
                "yuv420p",
            ],
            vec!["-c:a", "aac"],
        ),
        ExportFormat::Mp4H265 => (
            vec!["-c:v", "libx265", "-preset", "medium", "-pix_fmt", "yuv420p"],
            vec!["-c:a", "aac"],
        ),
        ExportFormat::Webm => (vec!["-c:v", "libvpx-vp9"], vec!["-c:a", "libopus"]),
    };

    let mut args: Vec<String> = video.into_iter().map(str::to_string).collect();
    args.push("-b:v".to_string());
    args.push(video_bitrate);
    if has_audio {
        args.extend(audio.into_iter().map(str::to_string));
        args.push("-b:a".to_string());
        args.push(audio_bitrate);
    }
    if config.format != ExportFormat::Webm {
        args.push("-movflags".to_string());
        args.push("+faststart".to_string());
    }
    args
}

/// Whether `binary` resolves on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports microseconds under both keys.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }

    fn fraction(&self, duration: f64) -> f64 {
        if self.complete {
            return 1.0;
        }
        if duration <= 0.0 {
            return 0.0;
        }
        (self.out_time_secs / duration).clamp(0.0, 1.0)
    }
}

struct SessionState {
    status: EncodeStatus,
    progress: f64,
    error: Option<String>,
    output: Option<PathBuf>,
}

struct Shared {
    state: Mutex<SessionState>,
    child: Mutex<Option<Child>>,
    cancel_requested: AtomicBool,
}

impl Shared {
    fn set_status(&self, status: EncodeStatus) {
        lock(&self.state).status = status;
    }

    fn fail(&self, message: String) {
        tracing::error!(error = %message, "ffmpeg encode failed");
        let mut state = lock(&self.state);
        state.status = EncodeStatus::Failed;
        state.error = Some(message);
    }
}

struct Prepared {
    args: Vec<String>,
    temp_output: TempPath,
    text_dir: TempDir,
}

/// One ffmpeg run.
pub struct FfmpegSession {
    binary: String,
    output_path: PathBuf,
    duration: f64,
    pending: Mutex<Option<Prepared>>,
    shared: Arc<Shared>,
}

impl FfmpegSession {
    fn prepare(binary: &str, request: EncodeRequest) -> CaptioneerResult<Self> {
        let dest_dir = request
            .output_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dest_dir).map_err(|e| {
            CaptioneerError::composition(format!(
                "Failed to create output directory {}: {e}",
                dest_dir.display()
            ))
        })?;

        let temp_output = tempfile::Builder::new()
            .prefix(".captioneer-")
            .suffix(&format!(".{}", request.export.format.extension()))
            .tempfile_in(dest_dir)
            .map_err(|e| CaptioneerError::composition(format!("Failed to create temporary output: {e}")))?
            .into_temp_path();
        let text_dir = tempfile::Builder::new()
            .prefix("captioneer-text-")
            .tempdir()
            .map_err(|e| CaptioneerError::composition(format!("Failed to create caption workdir: {e}")))?;

        let plan = FfmpegPlan::build(&request, &temp_output, text_dir.path())?;
        for (path, contents) in &plan.text_files {
            std::fs::write(path, contents).map_err(|e| {
                CaptioneerError::composition(format!(
                    "Failed to write caption text {}: {e}",
                    path.display()
                ))
            })?;
        }
        tracing::debug!(
            graph_len = plan.filter_graph.len(),
            text_files = plan.text_files.len(),
            "ffmpeg plan built"
        );

        Ok(Self {
            binary: binary.to_string(),
            output_path: request.output_path,
            duration: request.timeline.duration,
            pending: Mutex::new(Some(Prepared {
                args: plan.args,
                temp_output,
                text_dir,
            })),
            shared: Arc::new(Shared {
                state: Mutex::new(SessionState {
                    status: EncodeStatus::Waiting,
                    progress: 0.0,
                    error: None,
                    output: None,
                }),
                child: Mutex::new(None),
                cancel_requested: AtomicBool::new(false),
            }),
        })
    }
}

impl EncodeBackend for FfmpegSession {
    fn start(&self) -> CaptioneerResult<()> {
        let prepared = lock(&self.pending)
            .take()
            .ok_or_else(|| CaptioneerError::encode("ffmpeg session already started"))?;

        tracing::debug!(args = ?prepared.args, "Running ffmpeg");
        let mut child = Command::new(&self.binary)
            .args(&prepared.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CaptioneerError::encode(format!("Failed to start ffmpeg: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptioneerError::encode("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| CaptioneerError::encode("Failed to capture ffmpeg stderr"))?;

        tracing::info!(
            pid = child.id(),
            args_len = prepared.args.len(),
            duration = self.duration,
            "ffmpeg process started"
        );
        *lock(&self.shared.child) = Some(child);
        self.shared.set_status(EncodeStatus::Running);

        // Drain stderr concurrently to avoid ffmpeg blocking on a full stderr pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let shared = Arc::clone(&self.shared);
        let output_path = self.output_path.clone();
        let duration = self.duration;
        std::thread::spawn(move || {
            let Prepared {
                temp_output,
                text_dir,
                ..
            } = prepared;

            watch_progress(&shared, stdout, duration);

            let child = lock(&shared.child).take();
            let exit = child.map(|mut c| c.wait());
            let stderr_output = stderr_task
                .join()
                .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

            if shared.cancel_requested.load(Ordering::SeqCst) {
                tracing::info!("ffmpeg encode cancelled");
                shared.set_status(EncodeStatus::Cancelled);
                return;
            }

            match exit {
                Some(Ok(status)) if status.success() => match temp_output.persist(&output_path) {
                    Ok(()) => {
                        tracing::info!(output = %output_path.display(), "ffmpeg encode finished");
                        let mut state = lock(&shared.state);
                        state.progress = 1.0;
                        state.output = Some(output_path);
                        state.status = EncodeStatus::Completed;
                    }
                    Err(e) => shared.fail(format!("Failed to move encoded file into place: {e}")),
                },
                Some(Ok(status)) => shared.fail(format!(
                    "ffmpeg export failed (status {}): {}",
                    status,
                    stderr_output.trim()
                )),
                Some(Err(e)) => shared.fail(format!("Failed to wait on ffmpeg: {e}")),
                None => shared.fail("ffmpeg process handle was lost".to_string()),
            }
            drop(text_dir);
        });

        Ok(())
    }

    fn progress(&self) -> f64 {
        lock(&self.shared.state).progress
    }

    fn status(&self) -> EncodeStatus {
        lock(&self.shared.state).status
    }

    fn error(&self) -> Option<String> {
        lock(&self.shared.state).error.clone()
    }

    fn output_handle(&self) -> Option<PathBuf> {
        lock(&self.shared.state).output.clone()
    }

    fn cancel(&self) {
        self.shared.cancel_requested.store(true, Ordering::SeqCst);
        if let Some(child) = lock(&self.shared.child).as_mut() {
            if let Err(err) = child.kill() {
                tracing::debug!(error = %err, "ffmpeg already exited");
            }
        }
        // Never started: drop the temp files now.
        if lock(&self.pending).take().is_some() {
            self.shared.set_status(EncodeStatus::Cancelled);
        }
    }
}

fn watch_progress(shared: &Shared, stdout: ChildStdout, duration: f64) {
    let mut reader = BufReader::new(stdout);
    let mut line = String::new();
    let mut latest = ProgressState::default();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "Failed reading ffmpeg progress");
                break;
            }
        }

        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        latest.update(key, value);
        if key == "progress" {
            lock(&shared.state).progress = latest.fraction(duration);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use captioneer_processing_core::layout::resolve;
    use captioneer_project_model::clip::TimeRange;
    use captioneer_project_model::cue::CaptionCue;
    use captioneer_project_model::geometry::{Affine, Size};
    use captioneer_project_model::project::OverlayBackendCapability;

    use crate::asset::TrackKind;
    use crate::composer::ComposedTimeline;
    use crate::overlay::{build, OverlayConfig};

    fn track(kind: TrackKind, index: usize, source: &str, range: TimeRange, dest: f64) -> ComposedTrack {
        ComposedTrack {
            source: PathBuf::from(source),
            track_index: index,
            kind,
            source_range: range,
            dest_range: TimeRange::from_duration(dest),
            transform: Affine::IDENTITY,
            natural_size: (kind == TrackKind::Video).then(|| Size::new(1920.0, 1080.0)),
            volume: 0.8,
        }
    }

    fn request(capability: OverlayBackendCapability, with_audio: bool) -> EncodeRequest {
        let timeline = ComposedTimeline {
            duration: 4.0,
            video: track(TrackKind::Video, 0, "clip.mp4", TimeRange::new(1.0, 9.0), 4.0),
            audio: with_audio.then(|| track(TrackKind::Audio, 1, "clip.mp4", TimeRange::new(1.0, 9.0), 4.0)),
            secondary_audio: None,
        };
        let canvas = resolve(
            Size::new(1920.0, 1080.0),
            &Affine::IDENTITY,
            Size::new(1280.0, 720.0),
            false,
        )
        .unwrap();
        let cues = vec![CaptionCue::new("Hello: world", 1.0, 2.0)];
        let overlay = build(&cues, &canvas, 4.0, None, &capability, &OverlayConfig::default());
        EncodeRequest {
            timeline,
            canvas,
            overlay,
            export: serde_json::from_str(
                r#"{"format":"mp4-h264","width":1280,"height":720,"fps":30,"video_bitrate_kbps":4000,"audio_bitrate_kbps":128}"#,
            )
            .unwrap(),
            output_path: PathBuf::from("out/final.mp4"),
        }
    }

    #[test]
    fn test_piecewise_expr_single_point() {
        assert_eq!(build_piecewise_expr(vec![(0.0, 0.5)]), "0.500000");
        assert_eq!(build_piecewise_expr(vec![]), "0");
    }

    #[test]
    fn test_piecewise_expr_nests_segments() {
        let expr = build_piecewise_expr(vec![(0.0, 0.0), (1.0, 0.0), (1.05, 1.0)]);
        assert!(expr.starts_with("if(lt(t,1.000000),"));
        assert!(expr.contains("if(lt(t,1.050000),"));
        assert!(expr.ends_with(",1.000000))"));
    }

    #[test]
    fn test_atempo_factors_stay_in_range() {
        assert!(atempo_factors(1.0).is_empty());
        assert_eq!(atempo_factors(1.25), vec![1.25]);
        assert_eq!(atempo_factors(5.0), vec![2.0, 2.0, 1.25]);
        assert_eq!(atempo_factors(0.25), vec![0.5, 0.5]);
    }

    #[test]
    fn test_even_dimensions() {
        assert_eq!(even(1080.0), 1080);
        assert_eq!(even(721.4), 720);
        assert_eq!(even(0.2), 2);
    }

    #[test]
    fn test_progress_state_parses_microseconds() {
        let mut state = ProgressState::default();
        state.update("out_time_us", "2000000");
        assert!((state.fraction(4.0) - 0.5).abs() < 1e-9);
        state.update("out_time_ms", "3000000");
        assert!((state.fraction(4.0) - 0.75).abs() < 1e-9);
        state.update("progress", "end");
        assert_eq!(state.fraction(4.0), 1.0);
    }

    #[test]
    fn test_plan_trims_retimes_and_draws_captions() {
        let plan = FfmpegPlan::build(
            &request(OverlayBackendCapability::default(), true),
            Path::new("out/.captioneer-x.mp4"),
            Path::new("/tmp/captions"),
        )
        .unwrap();

        let graph = &plan.filter_graph;
        assert!(graph.contains("[0:0]trim=start=1.000000:end=9.000000,setpts=(PTS-STARTPTS)/2.000000"));
        assert!(graph.contains("scale=1280:720"));
        assert!(graph.contains("color=c=0x000000@1.000:s=1280x720:r=30:d=4.000000[base]"));
        assert!(graph.contains("[scene]drawtext=textfile='/tmp/captions/line-0.txt'"));
        assert!(graph.contains("atempo=2.000000,volume=0.8000[a0]"));
        assert!(graph.contains("[a0]anull[aout]"));

        assert_eq!(plan.text_files.len(), 1);
        assert_eq!(plan.text_files[0].1, "Hello: world");
        assert!(plan.args.windows(2).any(|w| w[0] == "-map" && w[1] == "[aout]"));
        assert!(plan.args.windows(2).any(|w| w[0] == "-c:v" && w[1] == "libx264"));
        assert_eq!(plan.args.last().map(String::as_str), Some("out/.captioneer-x.mp4"));
    }

    #[test]
    fn test_additional_track_strategy_overlays_caption_canvas() {
        let capability = OverlayBackendCapability {
            supports_post_process_layer: false,
            requires_additional_track: true,
        };
        let plan = FfmpegPlan::build(
            &request(capability, false),
            Path::new("out.mp4"),
            Path::new("/tmp/captions"),
        )
        .unwrap();
        assert!(plan.filter_graph.contains("color=c=black@0.0:s=1280x720"));
        assert!(plan.filter_graph.contains("[scene][captions]overlay=x=0:y=0[vout]"));
        assert!(plan.args.contains(&"-an".to_string()));
        assert!(!plan.args.contains(&"-c:a".to_string()));
    }

    #[test]
    fn test_plan_rejects_empty_timeline() {
        let mut req = request(OverlayBackendCapability::default(), false);
        req.timeline.duration = 0.0;
        let err = FfmpegPlan::build(&req, Path::new("out.mp4"), Path::new("/tmp")).unwrap_err();
        assert!(matches!(err, CaptioneerError::Composition { .. }));
    }

    #[test]
    fn test_escape_option() {
        assert_eq!(escape_option("It's: fine"), "Its\\: fine");
    }
}
