//! Captioneer Processing Core
//!
//! The pure stages of a caption render:
//! - **Layout:** Detect source orientation and resolve the aspect-filled output canvas
//! - **Segmentation:** Pack word timings into width-bounded, reading-speed-timed lines
//! - **Word layout:** Place individual words for karaoke highlighting
//!
//! This crate is pure computation with no I/O and no platform dependencies.
//! All inputs are data; all outputs are data.

pub mod layout;
pub mod measure;
pub mod segmenter;
pub mod word_layout;

pub use layout::{resolve, Canvas, Orientation};
pub use measure::{ApproxGlyphMeasurer, TextMeasurer};
pub use segmenter::{segment, SegmenterConfig};
pub use word_layout::{layout_words, WordCell, WordLayout};
