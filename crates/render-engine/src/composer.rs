//! Timeline composition: trimmed, time-scaled tracks on the output timeline.
//!
//! The clip's trim range is placed at time zero and stretched to
//! `range / rate`, so a rate of 2.0 halves the output duration.

use std::path::PathBuf;

use captioneer_common::error::{CaptioneerError, CaptioneerResult};
use captioneer_project_model::clip::{Clip, TimeRange};
use captioneer_project_model::geometry::{Affine, Size};

use crate::asset::{AssetProvider, TrackKind};

/// One source track placed on the output timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedTrack {
    pub source: PathBuf,

    /// Stream index inside `source`.
    pub track_index: usize,

    pub kind: TrackKind,

    /// Portion of the source that is played.
    pub source_range: TimeRange,

    /// Output-timeline range the source range is scaled into.
    pub dest_range: TimeRange,

    /// Display transform carried over from the track (or the clip override).
    pub transform: Affine,

    pub natural_size: Option<Size>,

    /// Linear gain for audio tracks.
    pub volume: f64,
}

impl ComposedTrack {
    /// Playback speed of this track: source seconds per output second.
    pub fn speed(&self) -> f64 {
        let dest = self.dest_range.duration();
        if dest <= 0.0 {
            return 1.0;
        }
        self.source_range.duration() / dest
    }
}

/// Output timeline assembled from a clip.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedTimeline {
    /// Output duration in seconds.
    pub duration: f64,

    pub video: ComposedTrack,
    pub audio: Option<ComposedTrack>,
    pub secondary_audio: Option<ComposedTrack>,
}

impl ComposedTimeline {
    /// Natural frame size of the primary video track.
    pub fn natural_size(&self) -> CaptioneerResult<Size> {
        self.video.natural_size.ok_or_else(|| {
            CaptioneerError::asset_load(format!(
                "video track {} of {} has no frame size",
                self.video.track_index,
                self.video.source.display()
            ))
        })
    }
}

/// Compose the clip's primary tracks and optional secondary audio.
///
/// Fails with [`CaptioneerError::AssetLoad`] when the source cannot be read
/// or has no video track. A secondary audio file without an audio track is
/// skipped.
pub async fn compose(clip: &Clip, provider: &dyn AssetProvider) -> CaptioneerResult<ComposedTimeline> {
    if !clip.rate.is_finite() || clip.rate <= 0.0 {
        return Err(CaptioneerError::invalid_input(format!(
            "playback rate {} must be positive",
            clip.rate
        )));
    }

    let source_range = clip.trim;
    let duration = source_range.duration() / clip.rate;
    let dest_range = TimeRange::from_duration(duration);

    let asset = provider.load(&clip.source).await?;

    let video_track = asset.first_track(TrackKind::Video).ok_or_else(|| {
        CaptioneerError::asset_load(format!(
            "{} contains no video track",
            clip.source.display()
        ))
    })?;
    if video_track.natural_size.map_or(true, |s| s.is_empty()) {
        return Err(CaptioneerError::asset_load(format!(
            "video track {} of {} has no usable frame size",
            video_track.index,
            clip.source.display()
        )));
    }

    let video = ComposedTrack {
        source: clip.source.clone(),
        track_index: video_track.index,
        kind: TrackKind::Video,
        source_range,
        dest_range,
        transform: clip.transform.unwrap_or(video_track.transform),
        natural_size: video_track.natural_size,
        volume: 1.0,
    };

    let audio = asset
        .first_track(TrackKind::Audio)
        .map(|track| ComposedTrack {
            source: clip.source.clone(),
            track_index: track.index,
            kind: TrackKind::Audio,
            source_range,
            dest_range,
            transform: Affine::IDENTITY,
            natural_size: None,
            volume: clip.volume,
        });

    let secondary_audio = match &clip.secondary_audio {
        Some(secondary) => {
            let secondary_asset = provider.load(&secondary.source).await?;
            match secondary_asset.first_track(TrackKind::Audio) {
                Some(track) => {
                    let length = secondary_asset.duration.min(source_range.duration()).max(0.0);
                    Some(ComposedTrack {
                        source: secondary.source.clone(),
                        track_index: track.index,
                        kind: TrackKind::Audio,
                        source_range: TimeRange::from_duration(length),
                        dest_range: TimeRange::from_duration(length / clip.rate),
                        transform: Affine::IDENTITY,
                        natural_size: None,
                        volume: secondary.volume,
                    })
                }
                None => {
                    tracing::debug!(
                        source = %secondary.source.display(),
                        "Secondary audio asset has no audio track, skipping"
                    );
                    None
                }
            }
        }
        None => None,
    };

    tracing::info!(
        stage = "compose",
        source = %clip.source.display(),
        duration,
        rate = clip.rate,
        has_audio = audio.is_some(),
        has_secondary_audio = secondary_audio.is_some(),
        "Timeline composed"
    );

    Ok(ComposedTimeline {
        duration,
        video,
        audio,
        secondary_audio,
    })
}
