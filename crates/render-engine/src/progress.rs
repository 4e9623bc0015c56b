//! Staged, monotonic render progress.
//!
//! Every pipeline phase owns a [`StageSpan`] of the overall `[0, 1]` range.
//! Encoder samples go through a [`ProgressTracker`], which smooths the raw
//! value (simulated ramp before the encoder reports anything, running
//! maximum afterwards) and filters out negligible changes. The
//! [`ProgressReporter`] is the single exit point for events and clamps each
//! one to the highest fraction already emitted, so callers always observe a
//! non-decreasing sequence that ends at exactly 1.0.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use captioneer_common::config::ProgressTuning;
use captioneer_common::error::{CaptioneerError, CaptioneerResult};
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, MissedTickBehavior};

use crate::backend::{CancelFlag, EncodeBackend, EncodeStatus};

/// Pipeline phase an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStage {
    Setup,
    Layout,
    Overlay,
    Encode,
    Completed,
}

impl ProgressStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStage::Setup => "setup",
            ProgressStage::Layout => "layout",
            ProgressStage::Overlay => "overlay",
            ProgressStage::Encode => "encode",
            ProgressStage::Completed => "completed",
        }
    }
}

impl std::fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One progress notification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: ProgressStage,
    /// Overall fraction in `[0, 1]`.
    pub fraction: f64,
}

/// Receives progress events. Called from whichever task produced the
/// event, so it must be thread-safe.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Portion of overall progress allotted to one stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageSpan {
    pub stage: ProgressStage,
    pub start: f64,
    pub end: f64,
}

impl StageSpan {
    pub fn new(stage: ProgressStage, start: f64, end: f64) -> Self {
        Self { stage, start, end }
    }

    /// Map a stage-local fraction into overall progress.
    pub fn map(&self, local: f64) -> f64 {
        self.start + (self.end - self.start) * local.clamp(0.0, 1.0)
    }

    pub fn len(&self) -> f64 {
        self.end - self.start
    }
}

/// Stage spans of a full render: setup, layout, overlay, encode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagePlan {
    pub setup: StageSpan,
    pub layout: StageSpan,
    pub overlay: StageSpan,
    pub encode: StageSpan,
}

impl Default for StagePlan {
    fn default() -> Self {
        Self {
            setup: StageSpan::new(ProgressStage::Setup, 0.0, 0.1),
            layout: StageSpan::new(ProgressStage::Layout, 0.1, 0.3),
            overlay: StageSpan::new(ProgressStage::Overlay, 0.3, 0.6),
            encode: StageSpan::new(ProgressStage::Encode, 0.6, 1.0),
        }
    }
}

/// Emits events through an optional callback, never going backwards.
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    highest: Mutex<f64>,
}

impl ProgressReporter {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            highest: Mutex::new(0.0),
        }
    }

    /// A reporter that drops every event.
    pub fn silent() -> Self {
        Self::new(None)
    }

    /// Emit `fraction` for `stage`, raised to the highest value emitted so far.
    pub fn emit(&self, stage: ProgressStage, fraction: f64) {
        // Held across the callback: concurrent emitters must deliver events
        // in the order their fractions were clamped, or the stream could
        // appear to go backwards.
        let mut highest = self.highest.lock().unwrap_or_else(|e| e.into_inner());
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0).max(*highest)
        } else {
            *highest
        };
        *highest = fraction;
        if let Some(callback) = &self.callback {
            callback(ProgressEvent { stage, fraction });
        }
    }

    /// Highest fraction emitted so far.
    pub fn current(&self) -> f64 {
        *self.highest.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("has_callback", &self.callback.is_some())
            .field("highest", &self.current())
            .finish()
    }
}

/// Synchronous smoothing of raw encoder progress for one stage.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    span: StageSpan,
    tuning: ProgressTuning,
    highest: f64,
    reported: bool,
    last_emitted: Option<f64>,
}

impl ProgressTracker {
    pub fn new(span: StageSpan, tuning: ProgressTuning) -> Self {
        Self {
            span,
            tuning,
            highest: 0.0,
            reported: false,
            last_emitted: None,
        }
    }

    /// Feed one raw sample taken `elapsed` after the stage began.
    ///
    /// Returns the overall fraction to emit, or `None` when the change since
    /// the last emission is within the threshold.
    pub fn sample(&mut self, raw: f64, elapsed: Duration) -> Option<f64> {
        let raw = if raw.is_finite() { raw.clamp(0.0, 1.0) } else { 0.0 };
        if raw > self.tuning.epsilon {
            self.reported = true;
        }

        let local = if self.reported {
            raw
        } else {
            self.simulated(elapsed)
        };
        self.highest = self.highest.max(local);

        let overall = self.span.map(self.highest);
        let emit = match self.last_emitted {
            None => true,
            Some(last) => overall - last > self.tuning.emit_threshold,
        };
        if emit {
            self.last_emitted = Some(overall);
            Some(overall)
        } else {
            None
        }
    }

    fn simulated(&self, elapsed: Duration) -> f64 {
        let ramp = self.tuning.simulated_ramp_secs;
        let progress = if ramp > 0.0 {
            (elapsed.as_secs_f64() / ramp).min(1.0)
        } else {
            1.0
        };
        progress * self.tuning.simulated_ceiling.clamp(0.0, 1.0)
    }

    /// Whether the encoder has reported real progress yet.
    pub fn has_reported(&self) -> bool {
        self.reported
    }

    /// Stage-local running maximum.
    pub fn highest(&self) -> f64 {
        self.highest
    }

    /// Equal steps from the last emitted fraction up to exactly 1.0.
    pub fn finishing_steps(&self) -> Vec<f64> {
        let from = self
            .last_emitted
            .unwrap_or_else(|| self.span.map(self.highest));
        let steps = self.tuning.finish_steps.max(1);
        (1..=steps)
            .map(|i| {
                if i == steps {
                    1.0
                } else {
                    from + (1.0 - from) * i as f64 / steps as f64
                }
            })
            .collect()
    }
}

/// Polls an encode session and streams smoothed progress.
pub struct ProgressMonitor {
    span: StageSpan,
    tuning: ProgressTuning,
    reporter: Arc<ProgressReporter>,
    cancel: CancelFlag,
}

impl ProgressMonitor {
    pub fn new(
        span: StageSpan,
        tuning: ProgressTuning,
        reporter: Arc<ProgressReporter>,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            span,
            tuning,
            reporter,
            cancel,
        }
    }

    /// Drive `session` until it reaches a terminal state.
    ///
    /// On completion runs the finishing ramp, emits the terminal
    /// `completed` event, and returns the output handle. Failures and
    /// cancellation end the stream without further events.
    pub async fn run(&self, session: &dyn EncodeBackend) -> CaptioneerResult<PathBuf> {
        let mut tracker = ProgressTracker::new(self.span, self.tuning.clone());
        let poll = Duration::from_millis(self.tuning.poll_interval_ms.max(1));
        let mut ticker = tokio::time::interval(poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let started = Instant::now();
        let mut polls = 0u64;

        loop {
            ticker.tick().await;
            if self.cancel.is_cancelled() {
                return Err(self.cancelled(session));
            }

            match session.status() {
                EncodeStatus::Waiting | EncodeStatus::Running => {
                    polls += 1;
                    if let Some(fraction) = tracker.sample(session.progress(), started.elapsed()) {
                        self.reporter.emit(self.span.stage, fraction);
                    }
                }
                EncodeStatus::Completed => break,
                EncodeStatus::Failed => {
                    let message = session
                        .error()
                        .unwrap_or_else(|| "encoder failed without reporting an error".to_string());
                    tracing::error!(stage = "encode", error = %message, "Encode failed");
                    return Err(CaptioneerError::encode(message));
                }
                EncodeStatus::Cancelled => {
                    tracing::info!(stage = "encode", "Encoder reported cancellation");
                    return Err(CaptioneerError::Cancelled);
                }
            }
        }

        tracing::debug!(
            stage = "encode",
            polls,
            reported = tracker.has_reported(),
            "Encode finished, running finishing ramp"
        );

        let step_delay = Duration::from_millis(self.tuning.finish_step_ms);
        for fraction in tracker.finishing_steps() {
            tokio::time::sleep(step_delay).await;
            if self.cancel.is_cancelled() {
                return Err(self.cancelled(session));
            }
            self.reporter.emit(self.span.stage, fraction);
        }
        self.reporter.emit(ProgressStage::Completed, 1.0);

        session
            .output_handle()
            .ok_or_else(|| CaptioneerError::encode("encoder completed without an output file"))
    }

    fn cancelled(&self, session: &dyn EncodeBackend) -> CaptioneerError {
        tracing::info!(stage = "encode", "Render cancelled, stopping encoder");
        session.cancel();
        CaptioneerError::Cancelled
    }
}
