//! Captioneer Project Model
//!
//! Defines the core data contracts for caption renders:
//! - **Clip:** source media, trim range, speed, orientation, and audio
//! - **Cues:** caption text, timing, style, and per-word karaoke data
//! - **Geometry:** sizes, rectangles, and affine transforms in canvas space
//! - **Project:** on-disk bundle of clip, captions, and export configuration
//!
//! Times are seconds on the output timeline unless a field says otherwise.

pub mod clip;
pub mod color;
pub mod cue;
pub mod geometry;
pub mod project;
pub mod style;
pub mod subtitles;

pub use clip::*;
pub use color::*;
pub use cue::*;
pub use geometry::*;
pub use project::*;
pub use style::*;
