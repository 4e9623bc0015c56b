//! Error types shared across Captioneer crates.

use std::path::PathBuf;

/// Top-level error type for Captioneer operations.
///
/// Pre-encode stages (composition, layout, overlay) fail fast with the
/// variant describing the malformed input; encode failures are reported
/// verbatim from the backend wrapped in [`CaptioneerError::Encode`].
#[derive(Debug, thiserror::Error)]
pub enum CaptioneerError {
    #[error("Asset load error: {message}")]
    AssetLoad { message: String },

    #[error(
        "Unsupported orientation: transform [{}, {}, {}, {}] is not a canonical rotation",
        matrix[0],
        matrix[1],
        matrix[2],
        matrix[3]
    )]
    UnsupportedOrientation { matrix: [f64; 4] },

    #[error("Composition error: {message}")]
    Composition { message: String },

    #[error("Encode error: {message}")]
    Encode { message: String },

    #[error("Render cancelled")]
    Cancelled,

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using CaptioneerError.
pub type CaptioneerResult<T> = Result<T, CaptioneerError>;

impl CaptioneerError {
    pub fn asset_load(msg: impl Into<String>) -> Self {
        Self::AssetLoad {
            message: msg.into(),
        }
    }

    pub fn composition(msg: impl Into<String>) -> Self {
        Self::Composition {
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether the error came from cooperative cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        assert!(CaptioneerError::asset_load("no video")
            .to_string()
            .starts_with("Asset load error:"));
        assert!(CaptioneerError::encode("boom")
            .to_string()
            .contains("boom"));
        assert_eq!(CaptioneerError::Cancelled.to_string(), "Render cancelled");
    }

    #[test]
    fn test_orientation_error_lists_matrix() {
        let err = CaptioneerError::UnsupportedOrientation {
            matrix: [0.5, 0.0, 0.0, 0.5],
        };
        assert!(err.to_string().contains("[0.5, 0, 0, 0.5]"));
    }

    #[test]
    fn test_other_preserves_source() {
        let base = std::io::Error::other("disk gone");
        let err = CaptioneerError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("disk gone"));
        assert!(!err.is_cancelled());
    }
}
