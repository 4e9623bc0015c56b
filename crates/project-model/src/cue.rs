//! Caption cues, word timings, and the timed segments derived from them.

use serde::{Deserialize, Serialize};

use crate::clip::TimeRange;
use crate::color::Rgba;
use crate::geometry::Point;
use crate::style::CaptionStyle;

/// Timing of a single spoken word, in output-timeline seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl WordTiming {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Per-word highlight style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KaraokeVariant {
    /// Plain caption, no per-word animation.
    #[default]
    None,
    /// Active word switches to the highlight color.
    Word,
    /// Highlight color plus a rounded background behind the active word.
    WordBackground,
    /// Highlight color plus a scale pulse on the active word.
    WordAndScale,
}

/// Colors and scale used by karaoke variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KaraokeStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight_color: Option<Rgba>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Rgba>,
    pub active_word_scale: f64,
}

impl Default for KaraokeStyle {
    fn default() -> Self {
        Self {
            highlight_color: None,
            background_color: None,
            active_word_scale: 1.15,
        }
    }
}

/// A caption item with a time range and style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionCue {
    /// Display text; explicit `\n` line breaks are preserved.
    pub text: String,

    /// Time window on the output timeline.
    pub range: TimeRange,

    #[serde(default)]
    pub style: CaptionStyle,

    /// Center offset from the canvas center, as fractions of canvas width/height.
    #[serde(default)]
    pub offset: Point,

    /// Ordered word timings, when the transcription provided them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub words: Vec<WordTiming>,

    #[serde(default)]
    pub karaoke: KaraokeVariant,

    #[serde(default)]
    pub karaoke_style: KaraokeStyle,
}

impl CaptionCue {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            range: TimeRange::new(start, end),
            style: CaptionStyle::default(),
            offset: Point::default(),
            words: vec![],
            karaoke: KaraokeVariant::None,
            karaoke_style: KaraokeStyle::default(),
        }
    }

    pub fn with_words(mut self, words: Vec<WordTiming>) -> Self {
        self.words = words;
        self
    }

    /// Whether this cue can be drawn with per-word highlighting.
    ///
    /// Cues that ask for karaoke but lack a highlight color or word timings
    /// are drawn as plain captions.
    pub fn is_karaoke(&self) -> bool {
        self.karaoke != KaraokeVariant::None
            && self.karaoke_style.highlight_color.is_some()
            && !self.words.is_empty()
    }

    /// A cue carrying this cue's style and placement with a segment's text and timing.
    pub fn with_segment(&self, segment: &TimedSegment) -> CaptionCue {
        CaptionCue {
            text: segment.text.clone(),
            range: TimeRange::new(segment.start, segment.end),
            words: segment.words.clone(),
            ..self.clone()
        }
    }

    /// This cue's text and timing as a subtitle line.
    pub fn as_segment(&self) -> TimedSegment {
        TimedSegment {
            text: self.text.clone(),
            start: self.range.start,
            end: self.range.end,
            words: self.words.clone(),
        }
    }

    /// Check the cue invariants, returning every violation found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = vec![];
        if self.range.start > self.range.end {
            issues.push(format!(
                "cue '{}' ends ({:.3}) before it starts ({:.3})",
                self.text, self.range.end, self.range.start
            ));
        }
        for (i, word) in self.words.iter().enumerate() {
            if word.start > word.end {
                issues.push(format!(
                    "word '{}' ends ({:.3}) before it starts ({:.3})",
                    word.text, word.end, word.start
                ));
            }
            if let Some(next) = self.words.get(i + 1) {
                if next.start < word.end - 1e-9 {
                    issues.push(format!(
                        "word '{}' overlaps or precedes '{}' at {:.3}",
                        next.text, word.text, next.start
                    ));
                }
            }
        }
        if self.style.font_size <= 0.0 {
            issues.push(format!("cue '{}' has non-positive font size", self.text));
        }
        issues
    }
}

/// One display line of caption text with its timing, produced by segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedSegment {
    pub text: String,
    pub start: f64,
    pub end: f64,

    /// The word timings this segment covers, after long-word splitting.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub words: Vec<WordTiming>,
}

impl TimedSegment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words() -> Vec<WordTiming> {
        vec![
            WordTiming::new("hello", 0.0, 0.5),
            WordTiming::new("there", 0.5, 1.0),
        ]
    }

    #[test]
    fn test_karaoke_requires_highlight_and_words() {
        let mut cue = CaptionCue::new("hello there", 0.0, 1.0);
        cue.karaoke = KaraokeVariant::Word;
        assert!(!cue.is_karaoke());

        cue.karaoke_style.highlight_color = Some(Rgba::rgb(255, 0, 0));
        assert!(!cue.is_karaoke());

        let cue = cue.with_words(words());
        assert!(cue.is_karaoke());
    }

    #[test]
    fn test_validate_flags_overlapping_words() {
        let mut cue = CaptionCue::new("hello there", 0.0, 1.0).with_words(words());
        assert!(cue.validate().is_empty());

        cue.words[1].start = 0.2;
        let issues = cue.validate();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("overlaps"));
    }

    #[test]
    fn test_with_segment_keeps_style_and_offset() {
        let mut cue = CaptionCue::new("a b", 0.0, 4.0);
        cue.offset = Point::new(0.0, 0.3);
        cue.style.font_size = 80.0;
        let seg = TimedSegment {
            text: "b".to_string(),
            start: 2.0,
            end: 3.0,
            words: vec![WordTiming::new("b", 2.0, 3.0)],
        };
        let derived = cue.with_segment(&seg);
        assert_eq!(derived.text, "b");
        assert_eq!(derived.range, TimeRange::new(2.0, 3.0));
        assert_eq!(derived.offset, cue.offset);
        assert_eq!(derived.style.font_size, 80.0);
        assert_eq!(derived.words.len(), 1);
    }

    #[test]
    fn test_as_segment_inverts_with_segment() {
        let cue = CaptionCue::new("hello there", 0.5, 1.25).with_words(words());
        let seg = cue.as_segment();
        assert_eq!(seg.text, "hello there");
        assert_eq!((seg.start, seg.end), (0.5, 1.25));
        assert_eq!(seg.words, cue.words);
        assert_eq!(cue.with_segment(&seg), cue);
    }

    #[test]
    fn test_karaoke_variant_serde_names() {
        let json = serde_json::to_string(&KaraokeVariant::WordAndScale).unwrap();
        assert_eq!(json, "\"word_and_scale\"");
        let cue: CaptionCue =
            serde_json::from_str(r#"{ "text": "x", "range": { "start": 0, "end": 1 } }"#).unwrap();
        assert_eq!(cue.karaoke, KaraokeVariant::None);
        assert!((cue.karaoke_style.active_word_scale - 1.15).abs() < 1e-9);
    }
}
