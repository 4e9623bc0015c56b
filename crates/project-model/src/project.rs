//! Project metadata and configuration types.
//!
//! A project is a directory bundle tying together the source clip, the
//! caption track, and export configuration:
//!
//! ```text
//! my-project/
//!   meta/project.json    clip + export settings
//!   meta/captions.json   caption cues
//!   sources/             media files (optional, paths may be absolute)
//!   exports/             rendered output
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::clip::Clip;
use crate::cue::CaptionCue;

/// Current schema version written by [`Project::new`].
pub const PROJECT_VERSION: &str = "1.0";

/// Top-level project file (`project.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Schema version.
    pub version: String,

    /// Human-readable project name.
    pub name: String,

    /// Creation timestamp (ISO 8601).
    pub created_at: String,

    /// Last modified timestamp (ISO 8601).
    pub modified_at: String,

    /// The clip being captioned.
    pub clip: Clip,

    /// Export configuration.
    pub export: ExportConfig,
}

/// Caption track file (`captions.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptionTrack {
    /// Schema version.
    #[serde(default = "default_version")]
    pub version: String,

    /// Cues in display order.
    #[serde(default)]
    pub cues: Vec<CaptionCue>,
}

fn default_version() -> String {
    PROJECT_VERSION.to_string()
}

/// Export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Output format.
    pub format: ExportFormat,

    /// Requested output resolution in the source's natural axes; portrait
    /// sources render onto the swapped size.
    pub width: u32,
    pub height: u32,

    /// Output frame rate.
    pub fps: u32,

    /// Video bitrate in kbps (0 = auto).
    pub video_bitrate_kbps: u32,

    /// Audio bitrate in kbps.
    pub audio_bitrate_kbps: u32,

    /// How the encoder attaches the caption overlay.
    #[serde(default)]
    pub overlay: OverlayBackendCapability,

    /// Re-segment cues with word timings before rendering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<SegmentationSettings>,
}

/// Output video format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[serde(rename = "mp4-h264")]
    Mp4H264,
    #[serde(rename = "mp4-h265")]
    Mp4H265,
    Webm,
}

impl ExportFormat {
    /// File extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Mp4H264 | ExportFormat::Mp4H265 => "mp4",
            ExportFormat::Webm => "webm",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mp4-h264" => Ok(ExportFormat::Mp4H264),
            "mp4-h265" => Ok(ExportFormat::Mp4H265),
            "webm" => Ok(ExportFormat::Webm),
            _ => Err(format!("Unknown format: {s}. Use: mp4-h264, mp4-h265, webm")),
        }
    }
}

/// Overlay attachment capabilities of the host encoder.
///
/// Hosts that can composite a layer tree over the decoded video during
/// encode set `supports_post_process_layer`; hosts that can only add the
/// overlay as its own video track set `requires_additional_track`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayBackendCapability {
    pub supports_post_process_layer: bool,
    pub requires_additional_track: bool,
}

impl Default for OverlayBackendCapability {
    fn default() -> Self {
        Self {
            supports_post_process_layer: true,
            requires_additional_track: false,
        }
    }
}

/// Parameters for re-packing word timings into display lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationSettings {
    /// Maximum line width as a fraction of canvas width.
    pub max_width_ratio: f64,
    pub target_cps: f64,
    pub min_duration_secs: f64,
    pub max_duration_secs: f64,
    pub gap_secs: f64,
    pub expand_short_cues: bool,
    pub joiner: String,
}

impl Default for SegmentationSettings {
    fn default() -> Self {
        Self {
            max_width_ratio: 0.8,
            target_cps: 17.0,
            min_duration_secs: 0.7,
            max_duration_secs: 6.0,
            gap_secs: 0.04,
            expand_short_cues: false,
            joiner: " ".to_string(),
        }
    }
}

/// The complete in-memory representation of a loaded project.
#[derive(Debug, Clone)]
pub struct LoadedProject {
    /// Filesystem path to the project directory.
    pub root: PathBuf,

    /// Project metadata.
    pub project: Project,

    /// Caption cues.
    pub captions: CaptionTrack,
}

impl Project {
    /// Create a new project for `clip` with default export settings.
    pub fn new(name: impl Into<String>, clip: Clip, width: u32, height: u32, fps: u32) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            version: PROJECT_VERSION.to_string(),
            name: name.into(),
            created_at: now.clone(),
            modified_at: now,
            clip,
            export: ExportConfig {
                format: ExportFormat::Mp4H264,
                width,
                height,
                fps,
                video_bitrate_kbps: 8000,
                audio_bitrate_kbps: 192,
                overlay: OverlayBackendCapability::default(),
                segmentation: None,
            },
        }
    }
}

impl LoadedProject {
    /// Load a project from a directory.
    pub fn load(root: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let root = root.as_ref().to_path_buf();

        let project_path = root.join("meta").join("project.json");
        let captions_path = root.join("meta").join("captions.json");

        let project_json =
            std::fs::read_to_string(&project_path).map_err(|e| ProjectError::IoError {
                path: project_path.clone(),
                source: e,
            })?;

        let project: Project =
            serde_json::from_str(&project_json).map_err(|e| ProjectError::ParseError {
                path: project_path,
                source: e,
            })?;

        let captions = if captions_path.exists() {
            let captions_json =
                std::fs::read_to_string(&captions_path).map_err(|e| ProjectError::IoError {
                    path: captions_path.clone(),
                    source: e,
                })?;
            serde_json::from_str(&captions_json).map_err(|e| ProjectError::ParseError {
                path: captions_path,
                source: e,
            })?
        } else {
            CaptionTrack::default()
        };

        Ok(Self {
            root,
            project,
            captions,
        })
    }

    /// Save project and captions to disk.
    pub fn save(&self) -> Result<(), ProjectError> {
        let meta_dir = self.root.join("meta");
        std::fs::create_dir_all(&meta_dir).map_err(|e| ProjectError::IoError {
            path: meta_dir.clone(),
            source: e,
        })?;

        let project_path = meta_dir.join("project.json");
        let project_json =
            serde_json::to_string_pretty(&self.project).map_err(|e| ProjectError::ParseError {
                path: project_path.clone(),
                source: e,
            })?;
        std::fs::write(&project_path, project_json).map_err(|e| ProjectError::IoError {
            path: project_path,
            source: e,
        })?;

        let captions_path = meta_dir.join("captions.json");
        let captions_json =
            serde_json::to_string_pretty(&self.captions).map_err(|e| ProjectError::ParseError {
                path: captions_path.clone(),
                source: e,
            })?;
        std::fs::write(&captions_path, captions_json).map_err(|e| ProjectError::IoError {
            path: captions_path,
            source: e,
        })?;

        Ok(())
    }

    /// Create a new project on disk with the standard directory structure.
    pub fn create(root: impl AsRef<Path>, project: Project) -> Result<Self, ProjectError> {
        let root = root.as_ref().to_path_buf();

        for subdir in &["sources", "meta", "exports"] {
            std::fs::create_dir_all(root.join(subdir)).map_err(|e| ProjectError::IoError {
                path: root.join(subdir),
                source: e,
            })?;
        }

        let loaded = Self {
            root,
            project,
            captions: CaptionTrack::default(),
        };
        loaded.save()?;
        Ok(loaded)
    }

    /// Resolve a media path relative to the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// The clip with its media paths resolved against the project root.
    pub fn resolved_clip(&self) -> Clip {
        let mut clip = self.project.clip.clone();
        clip.source = self.resolve(&clip.source);
        if let Some(audio) = clip.secondary_audio.as_mut() {
            audio.source = self.resolve(&audio.source);
        }
        clip
    }

    /// Validate sources and invariants, returning every problem found.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = vec![];

        let clip = self.resolved_clip();
        if !clip.source.exists() {
            errors.push(format!("Clip source missing: {}", clip.source.display()));
        }
        if let Some(audio) = &clip.secondary_audio {
            if !audio.source.exists() {
                errors.push(format!(
                    "Secondary audio source missing: {}",
                    audio.source.display()
                ));
            }
        }
        errors.extend(clip.validate());

        let export = &self.project.export;
        if export.width == 0 || export.height == 0 || export.fps == 0 {
            errors.push("Export width, height and fps must be non-zero".to_string());
        }

        for (i, cue) in self.captions.cues.iter().enumerate() {
            errors.extend(
                cue.validate()
                    .into_iter()
                    .map(|issue| format!("cue {}: {issue}", i + 1)),
            );
            if cue.range.end > clip.output_duration() + 1e-6 {
                errors.push(format!(
                    "cue {}: ends at {:.3}s, after the clip's {:.3}s output duration",
                    i + 1,
                    cue.range.end,
                    clip.output_duration()
                ));
            }
        }

        errors
    }
}

/// Errors that can occur when working with projects.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid project: {message}")]
    ValidationError { message: String },
}
