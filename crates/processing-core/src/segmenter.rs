//! Width-bounded caption segmentation.
//!
//! Turns a stream of word timings into display lines that each fit a
//! maximum measured width, then retimes the lines for comfortable reading:
//!
//! 1. trim words and drop empty ones
//! 2. split any word wider than the limit into the largest fitting runs
//! 3. greedily pack words into lines
//! 4. give each line the span of its words
//! 5. retime each line towards a characters-per-second target without
//!    overlapping the next line or leaving the sentence window
//!
//! The whole pass is a pure function of its inputs and the measuring
//! callback.

use std::ops::Range;

use captioneer_project_model::clip::TimeRange;
use captioneer_project_model::cue::{TimedSegment, WordTiming};
use captioneer_project_model::project::SegmentationSettings;
use serde::{Deserialize, Serialize};

/// Segmentation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Maximum measured line width, in the measuring callback's units.
    pub max_width: f64,

    /// Separator placed between words on a line.
    pub joiner: String,

    /// Target reading speed in visible characters per second.
    pub target_cps: f64,

    pub min_duration: f64,
    pub max_duration: f64,

    /// Minimum gap between one line's end and the next line's start.
    pub gap: f64,

    /// Allow retiming to lengthen a line beyond its spoken span.
    pub expand_short_cues: bool,

    /// No line may end after this window's end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentence_window: Option<TimeRange>,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self::from_settings(&SegmentationSettings::default(), f64::INFINITY)
    }
}

impl SegmenterConfig {
    /// Build from project settings and an absolute width limit.
    pub fn from_settings(settings: &SegmentationSettings, max_width: f64) -> Self {
        Self {
            max_width,
            joiner: settings.joiner.clone(),
            target_cps: settings.target_cps,
            min_duration: settings.min_duration_secs,
            max_duration: settings.max_duration_secs,
            gap: settings.gap_secs,
            expand_short_cues: settings.expand_short_cues,
            sentence_window: None,
        }
    }

    pub fn with_sentence_window(mut self, window: TimeRange) -> Self {
        self.sentence_window = Some(window);
        self
    }
}

/// Segment `words` into timed display lines.
///
/// Empty input yields no segments. A width limit narrower than a single
/// character degrades to one line per character.
pub fn segment<F>(words: &[WordTiming], config: &SegmenterConfig, measure: F) -> Vec<TimedSegment>
where
    F: Fn(&str) -> f64,
{
    let words = normalize_words(words);
    if words.is_empty() {
        return vec![];
    }

    let words = explode_wide_words(&words, config.max_width, &measure);
    let lines = pack_lines(&words, config.max_width, &config.joiner, &measure);

    let mut segments: Vec<TimedSegment> = lines
        .into_iter()
        .map(|range| {
            let line = &words[range];
            TimedSegment {
                text: line
                    .iter()
                    .map(|w| w.text.as_str())
                    .collect::<Vec<_>>()
                    .join(&config.joiner),
                start: line[0].start,
                end: line[line.len() - 1].end,
                words: line.to_vec(),
            }
        })
        .collect();

    normalize_timing(&mut segments, config);

    tracing::debug!(
        words = words.len(),
        segments = segments.len(),
        max_width = config.max_width,
        "Segmented caption words"
    );

    segments
}

/// Trim every word and drop the ones left empty.
pub fn normalize_words(words: &[WordTiming]) -> Vec<WordTiming> {
    words
        .iter()
        .filter_map(|w| {
            let text = w.text.trim();
            (!text.is_empty()).then(|| WordTiming::new(text, w.start, w.end))
        })
        .collect()
}

/// Replace every word wider than `max_width` with its fitting runs.
pub fn explode_wide_words<F>(words: &[WordTiming], max_width: f64, measure: &F) -> Vec<WordTiming>
where
    F: Fn(&str) -> f64,
{
    let mut out = Vec::with_capacity(words.len());
    for word in words {
        if measure(&word.text) > max_width {
            out.extend(split_word(word, max_width, measure));
        } else {
            out.push(word.clone());
        }
    }
    out
}

/// Split one word into the largest character runs that fit `max_width`.
///
/// Every run holds at least one character, so a word of N characters
/// produces at most N runs. Durations are shared by character count and
/// the last run ends exactly at the word's end.
pub fn split_word<F>(word: &WordTiming, max_width: f64, measure: &F) -> Vec<WordTiming>
where
    F: Fn(&str) -> f64,
{
    let chars: Vec<char> = word.text.chars().collect();
    let total = chars.len();
    if total == 0 {
        return vec![];
    }

    let span = word.end - word.start;
    let time_at = |offset: usize| word.start + span * offset as f64 / total as f64;

    let mut runs = vec![];
    let mut begin = 0;
    while begin < total {
        let mut end = begin + 1;
        while end < total {
            let candidate: String = chars[begin..=end].iter().collect();
            if measure(&candidate) > max_width {
                break;
            }
            end += 1;
        }

        let text: String = chars[begin..end].iter().collect();
        let run_end = if end == total { word.end } else { time_at(end) };
        runs.push(WordTiming::new(text, time_at(begin), run_end));
        begin = end;
    }

    runs
}

/// Greedily pack words into lines no wider than `max_width`.
///
/// Returns index ranges into `words`. A word that alone exceeds the limit
/// still gets its own line.
pub fn pack_lines<F>(
    words: &[WordTiming],
    max_width: f64,
    joiner: &str,
    measure: &F,
) -> Vec<Range<usize>>
where
    F: Fn(&str) -> f64,
{
    let mut lines = vec![];
    let Some(first) = words.first() else {
        return lines;
    };

    let mut line_start = 0;
    let mut line = first.text.clone();
    for (i, word) in words.iter().enumerate().skip(1) {
        let candidate = format!("{line}{joiner}{}", word.text);
        if measure(&candidate) <= max_width {
            line = candidate;
        } else {
            lines.push(line_start..i);
            line_start = i;
            line = word.text.clone();
        }
    }
    lines.push(line_start..words.len());

    lines
}

/// Characters that count towards reading speed.
pub fn visible_char_count(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// Retime segments towards the reading-speed target.
///
/// Starts never move. Ends are clipped against the next segment's
/// original start minus the gap and against the sentence window, and never
/// fall before the start.
pub fn normalize_timing(segments: &mut [TimedSegment], config: &SegmenterConfig) {
    let original_starts: Vec<f64> = segments.iter().map(|s| s.start).collect();

    for (i, segment) in segments.iter_mut().enumerate() {
        let raw = (segment.end - segment.start).max(0.0);
        let ideal = if config.target_cps > 0.0 {
            visible_char_count(&segment.text) as f64 / config.target_cps
        } else {
            config.max_duration
        };
        let clamped = ideal.max(config.min_duration).min(config.max_duration);
        let duration = if !config.expand_short_cues && clamped > raw {
            raw
        } else {
            clamped
        };

        let mut end = segment.start + duration;
        if let Some(next_start) = original_starts.get(i + 1) {
            end = end.min(next_start - config.gap);
        }
        if let Some(window) = &config.sentence_window {
            end = end.min(window.end);
        }
        segment.end = end.max(segment.start);
    }
}
