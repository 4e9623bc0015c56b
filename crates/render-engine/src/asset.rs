//! Source media metadata.

use std::path::{Path, PathBuf};

use captioneer_common::error::CaptioneerResult;
use captioneer_project_model::geometry::{Affine, Size};
use serde::{Deserialize, Serialize};

/// Kind of elementary stream in a media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    Other,
}

/// One track of a media asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Stream index inside the container.
    pub index: usize,

    pub kind: TrackKind,

    /// Encoded frame size, before the display transform. Video only.
    pub natural_size: Option<Size>,

    /// Display transform stored with the track.
    pub transform: Affine,
}

/// Metadata of a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub path: PathBuf,

    /// Container duration in seconds.
    pub duration: f64,

    pub tracks: Vec<TrackInfo>,
}

impl AssetInfo {
    /// First track of `kind`, in stream order.
    pub fn first_track(&self, kind: TrackKind) -> Option<&TrackInfo> {
        self.tracks.iter().find(|t| t.kind == kind)
    }
}

/// Asynchronous access to media metadata.
///
/// Implementations fail with [`CaptioneerError::AssetLoad`] when the file
/// cannot be read or parsed.
///
/// [`CaptioneerError::AssetLoad`]: captioneer_common::error::CaptioneerError::AssetLoad
#[async_trait::async_trait]
pub trait AssetProvider: Send + Sync {
    /// Read track list, duration, and transforms of the file at `path`.
    async fn load(&self, path: &Path) -> CaptioneerResult<AssetInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_track_respects_stream_order() {
        let info = AssetInfo {
            path: PathBuf::from("clip.mp4"),
            duration: 3.0,
            tracks: vec![
                TrackInfo {
                    index: 0,
                    kind: TrackKind::Audio,
                    natural_size: None,
                    transform: Affine::IDENTITY,
                },
                TrackInfo {
                    index: 1,
                    kind: TrackKind::Video,
                    natural_size: Some(Size::new(640.0, 480.0)),
                    transform: Affine::IDENTITY,
                },
                TrackInfo {
                    index: 2,
                    kind: TrackKind::Audio,
                    natural_size: None,
                    transform: Affine::IDENTITY,
                },
            ],
        };
        assert_eq!(info.first_track(TrackKind::Audio).map(|t| t.index), Some(0));
        assert_eq!(info.first_track(TrackKind::Video).map(|t| t.index), Some(1));
        assert!(info.first_track(TrackKind::Other).is_none());
    }
}
