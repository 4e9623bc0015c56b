//! Captioneer Render Engine
//!
//! Turns a clip and its caption cues into a finished video: the clip's
//! tracks are composed onto the output timeline, the canvas is resolved
//! from the source orientation, captions are laid out into a layer tree,
//! and an encode backend renders the result while progress is streamed
//! back to the caller.
//!
//! # Pipeline Architecture
//!
//! ```text
//! clip ──── compose ──── resolve canvas ──┐
//!                                         ├── overlay tree ── encode ── output.mp4
//! cues ──── segment (optional) ───────────┘                     │
//!                                                               ▼
//!                                                        progress events
//! ```

pub mod asset;
pub mod backend;
pub mod composer;
pub mod export;
pub mod ffmpeg;
pub mod layer;
pub mod overlay;
pub mod probe;
pub mod progress;

pub use asset::{AssetInfo, AssetProvider, TrackInfo, TrackKind};
pub use backend::{CancelFlag, EncodeBackend, EncodeRequest, EncodeStatus, RenderBackend};
pub use composer::{compose, ComposedTimeline, ComposedTrack};
pub use export::*;
pub use ffmpeg::FfmpegBackend;
pub use layer::{AnimatedProperty, LayerContent, PropertyCurve, RenderLayer, TextBitmap};
pub use overlay::{AttachmentStrategy, OverlayConfig, OverlayTree};
pub use probe::FfprobeAssetProvider;
pub use progress::{
    ProgressCallback, ProgressEvent, ProgressMonitor, ProgressReporter, ProgressStage,
    ProgressTracker, StagePlan, StageSpan,
};
