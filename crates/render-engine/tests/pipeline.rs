use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use captioneer_common::config::AppConfig;
use captioneer_common::error::{CaptioneerError, CaptioneerResult};
use captioneer_processing_core::layout::Orientation;
use captioneer_project_model::clip::Clip;
use captioneer_project_model::cue::CaptionCue;
use captioneer_project_model::geometry::{Affine, Size};
use captioneer_project_model::project::LoadedProject;
use captioneer_render_engine::{
    burned_segments, render, AssetInfo, AssetProvider, CancelFlag, EncodeBackend, EncodeRequest, EncodeStatus,
    ProgressCallback, ProgressEvent, ProgressStage, RenderBackend, RenderJob, TrackInfo,
    TrackKind,
};

struct FakeAssets(HashMap<String, AssetInfo>);

impl FakeAssets {
    fn standard() -> Self {
        let video = TrackInfo {
            index: 0,
            kind: TrackKind::Video,
            natural_size: Some(Size::new(1920.0, 1080.0)),
            transform: Affine::IDENTITY,
        };
        let audio = TrackInfo {
            index: 1,
            kind: TrackKind::Audio,
            natural_size: None,
            transform: Affine::IDENTITY,
        };
        let mut assets = HashMap::new();
        assets.insert(
            "clip.mp4".to_string(),
            AssetInfo {
                path: PathBuf::from("clip.mp4"),
                duration: 12.0,
                tracks: vec![video, audio.clone()],
            },
        );
        assets.insert(
            "music.m4a".to_string(),
            AssetInfo {
                path: PathBuf::from("music.m4a"),
                duration: 30.0,
                tracks: vec![TrackInfo { index: 0, ..audio }],
            },
        );
        Self(assets)
    }
}

#[async_trait::async_trait]
impl AssetProvider for FakeAssets {
    async fn load(&self, path: &Path) -> CaptioneerResult<AssetInfo> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.0
            .get(&name)
            .cloned()
            .ok_or_else(|| CaptioneerError::asset_load(format!("{} unreadable", path.display())))
    }
}

#[derive(Debug, Clone, Copy)]
enum Finish {
    Complete,
    Fail,
    Hang,
}

/// Reports one raw progress value per poll, then finishes as scripted.
struct ScriptedSession {
    trace: Vec<f64>,
    finish: Finish,
    polls: Mutex<usize>,
    started: AtomicBool,
    cancelled: AtomicBool,
    output: PathBuf,
}

impl EncodeBackend for ScriptedSession {
    fn start(&self) -> CaptioneerResult<()> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn progress(&self) -> f64 {
        let mut polls = self.polls.lock().unwrap();
        let value = self
            .trace
            .get(*polls)
            .or(self.trace.last())
            .copied()
            .unwrap_or(0.0);
        *polls += 1;
        value
    }

    fn status(&self) -> EncodeStatus {
        if self.cancelled.load(Ordering::SeqCst) {
            return EncodeStatus::Cancelled;
        }
        if !self.started.load(Ordering::SeqCst) {
            return EncodeStatus::Waiting;
        }
        if *self.polls.lock().unwrap() < self.trace.len() {
            return EncodeStatus::Running;
        }
        match self.finish {
            Finish::Complete => EncodeStatus::Completed,
            Finish::Fail => EncodeStatus::Failed,
            Finish::Hang => EncodeStatus::Running,
        }
    }

    fn error(&self) -> Option<String> {
        matches!(self.finish, Finish::Fail).then(|| "muxer: disk full".to_string())
    }

    fn output_handle(&self) -> Option<PathBuf> {
        (self.status() == EncodeStatus::Completed).then(|| self.output.clone())
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

struct ScriptedBackend {
    session: Arc<ScriptedSession>,
    available: bool,
    requests: Mutex<Vec<EncodeRequest>>,
}

impl ScriptedBackend {
    fn new(trace: Vec<f64>, finish: Finish) -> Self {
        Self {
            session: Arc::new(ScriptedSession {
                trace,
                finish,
                polls: Mutex::new(0),
                started: AtomicBool::new(false),
                cancelled: AtomicBool::new(false),
                output: PathBuf::from("out/final.mp4"),
            }),
            available: true,
            requests: Mutex::new(vec![]),
        }
    }
}

impl RenderBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn create_session(&self, request: EncodeRequest) -> CaptioneerResult<Arc<dyn EncodeBackend>> {
        self.requests.lock().unwrap().push(request);
        Ok(Arc::clone(&self.session) as Arc<dyn EncodeBackend>)
    }
}

fn recorder() -> (ProgressCallback, Arc<Mutex<Vec<ProgressEvent>>>) {
    let events = Arc::new(Mutex::new(vec![]));
    let sink = Arc::clone(&events);
    let callback: ProgressCallback = Arc::new(move |event| sink.lock().unwrap().push(event));
    (callback, events)
}

fn simple_job() -> RenderJob {
    RenderJob::new(
        Clip::new("clip.mp4", 12.0),
        vec![
            CaptionCue::new("First line", 0.0, 2.0),
            CaptionCue::new("Second line", 2.5, 4.0),
        ],
        Size::new(1280.0, 720.0),
        "out/final.mp4",
    )
}

fn assert_monotonic(events: &[ProgressEvent]) {
    assert!(!events.is_empty());
    for pair in events.windows(2) {
        assert!(
            pair[0].fraction <= pair[1].fraction,
            "progress went backwards: {:?} -> {:?}",
            pair[0],
            pair[1]
        );
    }
}

#[tokio::test(start_paused = true)]
async fn slow_starting_encode_reports_monotonic_progress_to_one() {
    let backend = ScriptedBackend::new(vec![0.0, 0.0, 0.02, 0.5, 1.0], Finish::Complete);
    let (callback, events) = recorder();

    let output = render(
        &simple_job(),
        &FakeAssets::standard(),
        &backend,
        Some(callback),
        CancelFlag::new(),
    )
    .await
    .unwrap();
    assert_eq!(output, PathBuf::from("out/final.mp4"));

    let events = events.lock().unwrap();
    assert_monotonic(&events);
    let last = events.last().unwrap();
    assert_eq!(last.stage, ProgressStage::Completed);
    assert_eq!(last.fraction, 1.0);

    assert!(events
        .iter()
        .any(|e| e.stage == ProgressStage::Encode && e.fraction > 0.6 && e.fraction < 1.0));
    assert!(events.iter().any(|e| e.stage == ProgressStage::Layout));
    assert!(events.iter().any(|e| e.stage == ProgressStage::Overlay));
}

#[tokio::test(start_paused = true)]
async fn raw_progress_resets_do_not_regress() {
    let backend = ScriptedBackend::new(vec![0.3, 0.0, 0.0, 0.6, 0.1, 0.0, 1.0], Finish::Complete);
    let (callback, events) = recorder();

    render(
        &simple_job(),
        &FakeAssets::standard(),
        &backend,
        Some(callback),
        CancelFlag::new(),
    )
    .await
    .unwrap();

    let events = events.lock().unwrap();
    assert_monotonic(&events);
    assert_eq!(events.last().map(|e| e.fraction), Some(1.0));
}

#[tokio::test(start_paused = true)]
async fn encoder_failure_is_returned_verbatim() {
    let backend = ScriptedBackend::new(vec![0.1, 0.2], Finish::Fail);
    let (callback, events) = recorder();

    let err = render(
        &simple_job(),
        &FakeAssets::standard(),
        &backend,
        Some(callback),
        CancelFlag::new(),
    )
    .await
    .unwrap_err();

    match err {
        CaptioneerError::Encode { message } => assert_eq!(message, "muxer: disk full"),
        other => panic!("expected encode error, got {other:?}"),
    }
    let events = events.lock().unwrap();
    assert!(events.iter().all(|e| e.stage != ProgressStage::Completed));
    assert!(events.iter().all(|e| e.fraction < 1.0));
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_encoder_and_stream() {
    let backend = ScriptedBackend::new(vec![0.1], Finish::Hang);
    let (callback, events) = recorder();
    let cancel = CancelFlag::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let err = render(
        &simple_job(),
        &FakeAssets::standard(),
        &backend,
        Some(callback),
        cancel,
    )
    .await
    .unwrap_err();

    assert!(err.is_cancelled());
    assert!(backend.session.cancelled.load(Ordering::SeqCst));

    let seen = events.lock().unwrap().len();
    tokio::time::sleep(Duration::from_secs(1)).await;
    let events = events.lock().unwrap();
    assert_eq!(events.len(), seen);
    assert!(events.iter().all(|e| e.stage != ProgressStage::Completed));
}

#[tokio::test]
async fn unavailable_backend_is_a_composition_error() {
    let mut backend = ScriptedBackend::new(vec![1.0], Finish::Complete);
    backend.available = false;

    let err = render(
        &simple_job(),
        &FakeAssets::standard(),
        &backend,
        None,
        CancelFlag::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CaptioneerError::Composition { .. }));
}

#[tokio::test]
async fn skewed_transform_fails_before_encode() {
    let backend = ScriptedBackend::new(vec![1.0], Finish::Complete);
    let mut job = simple_job();
    job.clip.transform = Some(Affine::new(1.0, 0.5, 0.0, 1.0, 0.0, 0.0));

    let err = render(&job, &FakeAssets::standard(), &backend, None, CancelFlag::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CaptioneerError::UnsupportedOrientation { .. }));
    assert!(backend.requests.lock().unwrap().is_empty());
    assert!(!backend.session.started.load(Ordering::SeqCst));
}

#[tokio::test]
async fn missing_source_is_an_asset_error() {
    let backend = ScriptedBackend::new(vec![1.0], Finish::Complete);
    let mut job = simple_job();
    job.clip.source = PathBuf::from("elsewhere.mov");

    let err = render(&job, &FakeAssets::standard(), &backend, None, CancelFlag::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CaptioneerError::AssetLoad { .. }));
}

#[tokio::test(start_paused = true)]
async fn sample_project_reaches_backend_as_portrait() {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("fixtures")
        .join("sample-project");
    let loaded = LoadedProject::load(&root).expect("fixture project should load");
    let job = RenderJob::from_project(&loaded, "out/final.mp4", &AppConfig::default());
    let backend = ScriptedBackend::new(vec![0.5, 1.0], Finish::Complete);

    render(&job, &FakeAssets::standard(), &backend, None, CancelFlag::new())
        .await
        .unwrap();

    let requests = backend.requests.lock().unwrap();
    let request = &requests[0];
    assert_eq!(request.canvas.orientation, Orientation::Right);
    assert_eq!(request.canvas.size, Size::new(1080.0, 1920.0));
    assert!((request.timeline.duration - 8.0).abs() < 1e-9);

    let secondary = request.timeline.secondary_audio.as_ref().unwrap();
    assert!((secondary.volume - 0.35).abs() < 1e-9);

    // The long word is split across lines, so there are more cue
    // containers than authored cues.
    assert!(request.overlay.captions.children.len() > loaded.captions.cues.len());
    assert!(request.overlay.frame_layers.is_empty());
}

#[tokio::test(start_paused = true)]
async fn sidecar_segments_match_burned_captions() {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("fixtures")
        .join("sample-project");
    let loaded = LoadedProject::load(&root).expect("fixture project should load");
    let job = RenderJob::from_project(&loaded, "out/final.mp4", &AppConfig::default());
    let backend = ScriptedBackend::new(vec![1.0], Finish::Complete);

    let segments = burned_segments(&job, &FakeAssets::standard()).await.unwrap();
    render(&job, &FakeAssets::standard(), &backend, None, CancelFlag::new())
        .await
        .unwrap();

    let requests = backend.requests.lock().unwrap();
    let drawn = requests[0].overlay.captions.children.len();
    let visible = segments.iter().filter(|s| !s.text.trim().is_empty()).count();
    assert!(segments.len() > loaded.captions.cues.len());
    assert_eq!(visible, drawn);

    let authored: String = loaded
        .captions
        .cues
        .iter()
        .flat_map(|c| c.words.iter().map(|w| w.text.as_str()))
        .collect();
    let split: String = segments
        .iter()
        .flat_map(|s| s.words.iter().map(|w| w.text.as_str()))
        .collect();
    assert_eq!(split, authored);
}
