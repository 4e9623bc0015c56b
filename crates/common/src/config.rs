//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where rendered videos are written by default.
    pub output_dir: PathBuf,

    /// Default output settings.
    pub render: RenderDefaults,

    /// Caption segmentation and styling defaults.
    pub captions: CaptionDefaults,

    /// Progress reporting tuning.
    pub progress: ProgressTuning,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default render parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// Requested output width in the source's natural (unrotated) axes.
    pub width: u32,

    /// Requested output height in the source's natural axes.
    pub height: u32,

    /// Output FPS.
    pub fps: u32,

    /// Video bitrate in kbps.
    pub video_bitrate_kbps: u32,

    /// Audio bitrate in kbps.
    pub audio_bitrate_kbps: u32,

    /// Default container/codec, e.g. "mp4-h264".
    pub format: String,
}

/// Caption defaults used when a project does not override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionDefaults {
    /// Style preset applied to new cues.
    pub preset: String,

    /// Maximum line width as a fraction of canvas width.
    pub max_width_ratio: f64,

    /// Target reading speed in visible characters per second.
    pub target_cps: f64,

    /// Shortest allowed caption duration.
    pub min_duration_secs: f64,

    /// Longest allowed caption duration.
    pub max_duration_secs: f64,

    /// Minimum gap kept between consecutive captions.
    pub gap_secs: f64,

    /// Allow captions to be lengthened up to their ideal reading time.
    pub expand_short_cues: bool,

    /// String used to join words within a line.
    pub joiner: String,
}

/// Tuning for the encode progress monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressTuning {
    /// Interval between encoder progress samples.
    pub poll_interval_ms: u64,

    /// Raw progress below this is treated as "nothing reported yet".
    pub epsilon: f64,

    /// Ceiling (fraction of the stage span) for the simulated ramp.
    pub simulated_ceiling: f64,

    /// Time for the simulated ramp to reach its ceiling.
    pub simulated_ramp_secs: f64,

    /// Minimum change in overall fraction before a new event is emitted.
    pub emit_threshold: f64,

    /// Number of steps in the finishing ramp to 1.0.
    pub finish_steps: u32,

    /// Delay between finishing-ramp steps.
    pub finish_step_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "captioneer=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            render: RenderDefaults::default(),
            captions: CaptionDefaults::default(),
            progress: ProgressTuning::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 30,
            video_bitrate_kbps: 8000,
            audio_bitrate_kbps: 192,
            format: "mp4-h264".to_string(),
        }
    }
}

impl Default for CaptionDefaults {
    fn default() -> Self {
        Self {
            preset: "classic".to_string(),
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

impl Default for ProgressTuning {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            epsilon: 0.01,
            simulated_ceiling: 0.3,
            simulated_ramp_secs: 8.0,
            emit_threshold: 0.005,
            finish_steps: 10,
            finish_step_ms: 20,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("captioneer").join("config.json")
}

/// Default render output directory.
fn default_output_dir() -> PathBuf {
    let base = std::env::var("XDG_VIDEOS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join("Videos")
        });
    base.join("captioneer")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let json = r#"{ "captions": { "target_cps": 12.5 }, "logging": { "json": true } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert!((config.captions.target_cps - 12.5).abs() < 1e-9);
        assert_eq!(config.captions.preset, "classic");
        assert_eq!(config.captions.joiner, " ");
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.progress.poll_interval_ms, 50);
    }

    #[test]
    fn test_default_durations_are_ordered() {
        let captions = CaptionDefaults::default();
        assert!(captions.min_duration_secs < captions.max_duration_secs);
        assert!(captions.gap_secs < captions.min_duration_secs);
    }
}
