//! Media metadata through `ffprobe`.

use std::path::Path;

use captioneer_common::error::{CaptioneerError, CaptioneerResult};
use captioneer_processing_core::layout::Orientation;
use captioneer_project_model::geometry::{Affine, Size};
use serde::Deserialize;

use crate::asset::{AssetInfo, AssetProvider, TrackInfo, TrackKind};

/// [`AssetProvider`] backed by the `ffprobe` binary.
#[derive(Debug, Clone)]
pub struct FfprobeAssetProvider {
    binary: String,
}

impl FfprobeAssetProvider {
    pub fn new() -> Self {
        Self {
            binary: "ffprobe".to_string(),
        }
    }

    pub fn is_available(&self) -> bool {
        crate::ffmpeg::command_exists(&self.binary)
    }
}

impl Default for FfprobeAssetProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AssetProvider for FfprobeAssetProvider {
    async fn load(&self, path: &Path) -> CaptioneerResult<AssetInfo> {
        if !path.exists() {
            return Err(CaptioneerError::asset_load(format!(
                "{} does not exist",
                path.display()
            )));
        }

        let output = tokio::process::Command::new(&self.binary)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| CaptioneerError::asset_load(format!("Failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(CaptioneerError::asset_load(format!(
                "ffprobe could not read {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        let info = parse_probe_output(path, &raw)?;
        tracing::debug!(
            path = %path.display(),
            duration = info.duration,
            tracks = info.tracks.len(),
            "Probed asset"
        );
        Ok(info)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    index: usize,
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    #[serde(default)]
    tags: std::collections::HashMap<String, String>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    side_data_type: Option<String>,
    rotation: Option<f64>,
}

impl ProbeStream {
    /// Clockwise display rotation in degrees.
    fn rotation_degrees(&self) -> i64 {
        // The display matrix stores counter-clockwise degrees.
        let from_matrix = self
            .side_data_list
            .iter()
            .filter(|s| s.side_data_type.as_deref() == Some("Display Matrix"))
            .find_map(|s| s.rotation)
            .map(|ccw| (-ccw).round() as i64);
        let from_tag = self
            .tags
            .get("rotate")
            .and_then(|r| r.trim().parse::<f64>().ok())
            .map(|cw| cw.round() as i64);
        from_matrix.or(from_tag).unwrap_or(0)
    }
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_probe_output(path: &Path, json: &str) -> CaptioneerResult<AssetInfo> {
    let probe: ProbeOutput = serde_json::from_str(json).map_err(|e| {
        CaptioneerError::asset_load(format!(
            "Unreadable ffprobe output for {}: {e}",
            path.display()
        ))
    })?;

    let container_duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok());

    let mut stream_duration: f64 = 0.0;
    let tracks = probe
        .streams
        .iter()
        .map(|stream| {
            if let Some(d) = stream.duration.as_deref().and_then(|d| d.parse::<f64>().ok()) {
                stream_duration = stream_duration.max(d);
            }
            let kind = match stream.codec_type.as_deref() {
                Some("video") => TrackKind::Video,
                Some("audio") => TrackKind::Audio,
                _ => TrackKind::Other,
            };
            let natural_size = match (kind, stream.width, stream.height) {
                (TrackKind::Video, Some(w), Some(h)) if w > 0 && h > 0 => {
                    Some(Size::new(w as f64, h as f64))
                }
                _ => None,
            };
            let transform = match natural_size {
                Some(natural) => {
                    let degrees = stream.rotation_degrees();
                    match Orientation::from_degrees(degrees) {
                        Some(orientation) => orientation.track_transform(natural),
                        // Rejected later by the layout resolver.
                        None => Affine::rotate((degrees as f64).to_radians()),
                    }
                }
                None => Affine::IDENTITY,
            };
            TrackInfo {
                index: stream.index,
                kind,
                natural_size,
                transform,
            }
        })
        .collect();

    Ok(AssetInfo {
        path: path.to_path_buf(),
        duration: container_duration.unwrap_or(stream_duration),
        tracks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PORTRAIT_PHONE: &str = r#"{
        "streams": [
            {
                "index": 0,
                "codec_type": "video",
                "width": 1920,
                "height": 1080,
                "duration": "12.012",
                "side_data_list": [
                    { "side_data_type": "Display Matrix", "rotation": -90 }
                ]
            },
            { "index": 1, "codec_type": "audio", "duration": "12.000" },
            { "index": 2, "codec_type": "data" }
        ],
        "format": { "duration": "12.040000" }
    }"#;

    #[test]
    fn test_display_matrix_maps_to_canonical_transform() {
        let info = parse_probe_output(Path::new("clip.mov"), PORTRAIT_PHONE).unwrap();
        assert!((info.duration - 12.04).abs() < 1e-9);
        assert_eq!(info.tracks.len(), 3);

        let video = info.first_track(TrackKind::Video).unwrap();
        assert_eq!(video.natural_size, Some(Size::new(1920.0, 1080.0)));
        assert_eq!(
            Orientation::detect(&video.transform).unwrap(),
            Orientation::Right
        );
        assert_eq!(info.tracks[2].kind, TrackKind::Other);
    }

    #[test]
    fn test_rotate_tag_and_missing_format() {
        let json = r#"{
            "streams": [
                { "index": 0, "codec_type": "video", "width": 640, "height": 480,
                  "duration": "3.5", "tags": { "rotate": "270" } }
            ]
        }"#;
        let info = parse_probe_output(Path::new("clip.mp4"), json).unwrap();
        assert!((info.duration - 3.5).abs() < 1e-9);
        let video = info.first_track(TrackKind::Video).unwrap();
        assert_eq!(
            Orientation::detect(&video.transform).unwrap(),
            Orientation::Left
        );
    }

    #[test]
    fn test_odd_rotation_is_not_canonical() {
        let json = r#"{
            "streams": [
                { "index": 0, "codec_type": "video", "width": 640, "height": 480,
                  "tags": { "rotate": "45" } }
            ],
            "format": { "duration": "1.0" }
        }"#;
        let info = parse_probe_output(Path::new("clip.mp4"), json).unwrap();
        let video = info.first_track(TrackKind::Video).unwrap();
        assert!(Orientation::detect(&video.transform).is_err());
    }

    #[test]
    fn test_garbage_is_asset_error() {
        let err = parse_probe_output(Path::new("clip.mp4"), "not json").unwrap_err();
        assert!(matches!(err, CaptioneerError::AssetLoad { .. }));
    }
}
