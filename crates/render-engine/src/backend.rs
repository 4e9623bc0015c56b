//! Encode backend abstraction.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use captioneer_common::error::CaptioneerResult;
use captioneer_processing_core::layout::Canvas;
use captioneer_project_model::project::ExportConfig;

use crate::composer::ComposedTimeline;
use crate::overlay::OverlayTree;

/// Lifecycle state of an encode session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeStatus {
    Waiting,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl EncodeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EncodeStatus::Completed | EncodeStatus::Failed | EncodeStatus::Cancelled
        )
    }
}

/// A running (or runnable) encode.
///
/// Sessions are shared between the pipeline and the progress monitor, so
/// every method takes `&self`.
pub trait EncodeBackend: Send + Sync {
    /// Begin encoding. Returns once the encode is underway.
    fn start(&self) -> CaptioneerResult<()>;

    /// Raw completion in `[0, 1]`. May reset or stall.
    fn progress(&self) -> f64;

    fn status(&self) -> EncodeStatus;

    /// Failure reported by the encoder, once status is `Failed`.
    fn error(&self) -> Option<String>;

    /// Finished output file, once status is `Completed`.
    fn output_handle(&self) -> Option<PathBuf>;

    /// Request cancellation. Idempotent.
    fn cancel(&self);
}

/// Everything an encoder needs to produce the output file.
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub timeline: ComposedTimeline,
    pub canvas: Canvas,
    pub overlay: OverlayTree,
    pub export: ExportConfig,
    pub output_path: PathBuf,
}

/// Factory for encode sessions (ffmpeg, a hardware encoder, a test double).
pub trait RenderBackend: Send + Sync {
    /// Backend name.
    fn name(&self) -> &str;

    /// Check if this backend is available on the system.
    fn is_available(&self) -> bool;

    /// Build a session for `request`. Fails with
    /// [`CaptioneerError::Composition`] when the request cannot be encoded.
    ///
    /// [`CaptioneerError::Composition`]: captioneer_common::error::CaptioneerError::Composition
    fn create_session(&self, request: EncodeRequest) -> CaptioneerResult<Arc<dyn EncodeBackend>>;
}

/// Cooperative cancellation shared between a caller and a render.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Cancels a session that is still running when the guard is dropped, so
/// dropping the render future stops the encoder.
pub(crate) struct SessionGuard {
    session: Arc<dyn EncodeBackend>,
}

impl SessionGuard {
    pub(crate) fn new(session: Arc<dyn EncodeBackend>) -> Self {
        Self { session }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.session.status().is_terminal() {
            tracing::debug!("Render dropped with encode in flight, cancelling");
            self.session.cancel();
        }
    }
}
