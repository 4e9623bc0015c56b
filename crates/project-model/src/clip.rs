//! Source clip description: media, trim, speed, orientation, and audio.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::color::Rgba;
use crate::geometry::Affine;

/// A half-open time range `[start, end)` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Range covering `[0, duration)`.
    pub fn from_duration(duration: f64) -> Self {
        Self::new(0.0, duration)
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Letterbox/border presentation of the video inside the output canvas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameStyle {
    /// Fill color of the area around the video.
    pub border_color: Rgba,

    /// Size of the video bounds relative to the canvas, in (0, 1].
    pub scale: f64,
}

/// Additional audio mixed under the clip (music, voice-over).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecondaryAudio {
    /// Media file holding the audio track.
    pub source: PathBuf,

    /// Linear volume gain applied to this track only.
    #[serde(default = "unit_volume")]
    pub volume: f64,
}

/// The video clip a render is built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clip {
    /// Media file holding the primary video (and usually audio) track.
    pub source: PathBuf,

    /// Source duration in seconds.
    pub duration: f64,

    /// Sub-range of the source that is rendered.
    pub trim: TimeRange,

    /// Playback speed multiplier (2.0 plays twice as fast).
    #[serde(default = "unit_rate")]
    pub rate: f64,

    /// Orientation override; when `None` the track's own matrix is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Affine>,

    /// Flip the output horizontally.
    #[serde(default)]
    pub mirror: bool,

    /// Linear volume gain for the primary audio track.
    #[serde(default = "unit_volume")]
    pub volume: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_style: Option<FrameStyle>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_audio: Option<SecondaryAudio>,
}

fn unit_rate() -> f64 {
    1.0
}

fn unit_volume() -> f64 {
    1.0
}

impl Clip {
    /// An untrimmed clip at normal speed.
    pub fn new(source: impl Into<PathBuf>, duration: f64) -> Self {
        Self {
            source: source.into(),
            duration,
            trim: TimeRange::from_duration(duration),
            rate: 1.0,
            transform: None,
            mirror: false,
            volume: 1.0,
            frame_style: None,
            secondary_audio: None,
        }
    }

    /// Duration of the clip on the output timeline.
    pub fn output_duration(&self) -> f64 {
        if self.rate <= 0.0 {
            return 0.0;
        }
        self.trim.duration() / self.rate
    }

    /// Check the clip invariants, returning every violation found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = vec![];

        if !self.duration.is_finite() || self.duration < 0.0 {
            issues.push(format!("clip duration {} is not a valid length", self.duration));
        }
        if self.trim.start < 0.0 || self.trim.start > self.trim.end {
            issues.push(format!(
                "trim range [{:.3}, {:.3}] is inverted or negative",
                self.trim.start, self.trim.end
            ));
        }
        if self.trim.end > self.duration + 1e-9 {
            issues.push(format!(
                "trim end {:.3} exceeds clip duration {:.3}",
                self.trim.end, self.duration
            ));
        }
        if !self.rate.is_finite() || self.rate <= 0.0 {
            issues.push(format!("rate {} must be positive", self.rate));
        }
        if self.volume < 0.0 {
            issues.push(format!("volume {} must not be negative", self.volume));
        }
        if let Some(frame) = &self.frame_style {
            if !(frame.scale > 0.0 && frame.scale <= 1.0) {
                issues.push(format!("frame scale {} must be in (0, 1]", frame.scale));
            }
        }
        if let Some(audio) = &self.secondary_audio {
            if audio.volume < 0.0 {
                issues.push(format!(
                    "secondary audio volume {} must not be negative",
                    audio.volume
                ));
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_duration_shrinks_with_rate() {
        let mut clip = Clip::new("in.mp4", 10.0);
        assert!((clip.output_duration() - 10.0).abs() < 1e-9);
        clip.rate = 2.0;
        assert!((clip.output_duration() - 5.0).abs() < 1e-9);
        clip.trim = TimeRange::new(2.0, 8.0);
        assert!((clip.output_duration() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_validate_reports_each_violation() {
        let mut clip = Clip::new("in.mp4", 10.0);
        assert!(clip.validate().is_empty());

        clip.trim = TimeRange::new(4.0, 12.0);
        clip.rate = 0.0;
        let issues = clip.validate();
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().any(|i| i.contains("exceeds clip duration")));
        assert!(issues.iter().any(|i| i.contains("rate")));
    }

    #[test]
    fn test_legacy_json_defaults_rate_and_volume() {
        let json = r#"{ "source": "a.mov", "duration": 3.0, "trim": { "start": 0.0, "end": 3.0 } }"#;
        let clip: Clip = serde_json::from_str(json).unwrap();
        assert_eq!(clip.rate, 1.0);
        assert_eq!(clip.volume, 1.0);
        assert!(!clip.mirror);
        assert!(clip.transform.is_none());
    }

    #[test]
    fn test_inverted_time_range_has_no_duration() {
        assert!((TimeRange::new(3.0, 1.0).duration()).abs() < 1e-9);
    }
}
