//! Per-word placement for karaoke captions.
//!
//! Words flow left to right with a fixed spacing. When the cue's original
//! text carries explicit line breaks, each word is assigned to the line it
//! occupies in that text by position, lines are centered within the widest
//! line, and stacked with a fixed spacing.

use captioneer_project_model::geometry::{Rect, Size};

use crate::measure::TextMeasurer;

/// One placed word.
#[derive(Debug, Clone, PartialEq)]
pub struct WordCell {
    /// Index into the word list the layout was built from.
    pub index: usize,
    pub line: usize,
    /// Bounds relative to the top-left corner of the text block.
    pub rect: Rect,
}

/// Placement of every word plus the block's overall size.
#[derive(Debug, Clone, PartialEq)]
pub struct WordLayout {
    pub cells: Vec<WordCell>,
    pub size: Size,
    pub line_count: usize,
}

/// Place `words` according to the line structure of `original_text`.
///
/// Words beyond the number of tokens in the original text go on its last
/// line. An original line with no words still takes its vertical space.
pub fn layout_words<M, S>(
    original_text: &str,
    words: &[S],
    measurer: &M,
    word_spacing: f64,
    line_spacing: f64,
) -> WordLayout
where
    M: TextMeasurer + ?Sized,
    S: AsRef<str>,
{
    let line_of_word = assign_lines(original_text, words.len());
    let line_count = line_of_word
        .last()
        .map(|last| last + 1)
        .unwrap_or(0)
        .max(original_text.split('\n').count());

    let widths: Vec<f64> = words.iter().map(|w| measurer.width(w.as_ref())).collect();

    let mut line_widths = vec![0.0_f64; line_count];
    let mut words_on_line = vec![0usize; line_count];
    for (i, &line) in line_of_word.iter().enumerate() {
        if words_on_line[line] > 0 {
            line_widths[line] += word_spacing;
        }
        line_widths[line] += widths[i];
        words_on_line[line] += 1;
    }

    let block_width = line_widths.iter().copied().fold(0.0, f64::max);
    let line_height = measurer.line_height();
    let block_height = if line_count == 0 {
        0.0
    } else {
        line_height * line_count as f64 + line_spacing * (line_count - 1) as f64
    };

    let mut cursor: Vec<f64> = line_widths
        .iter()
        .map(|w| (block_width - w) / 2.0)
        .collect();
    let cells = line_of_word
        .iter()
        .enumerate()
        .map(|(index, &line)| {
            let x = cursor[line];
            cursor[line] += widths[index] + word_spacing;
            WordCell {
                index,
                line,
                rect: Rect::new(
                    x,
                    line as f64 * (line_height + line_spacing),
                    widths[index],
                    line_height,
                ),
            }
        })
        .collect();

    WordLayout {
        cells,
        size: Size::new(block_width, block_height),
        line_count,
    }
}

/// Line index for each of `word_count` words, matching words to the
/// whitespace-separated tokens of each original line in order.
fn assign_lines(original_text: &str, word_count: usize) -> Vec<usize> {
    let token_counts: Vec<usize> = original_text
        .split('\n')
        .map(|line| line.split_whitespace().count())
        .collect();
    let last_line = token_counts.len().saturating_sub(1);

    let mut lines = Vec::with_capacity(word_count);
    let mut line = 0;
    let mut used = 0;
    for _ in 0..word_count {
        while line < last_line && used >= token_counts[line] {
            line += 1;
            used = 0;
        }
        lines.push(line);
        used += 1;
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl TextMeasurer for Fixed {
        fn width(&self, text: &str) -> f64 {
            text.chars().count() as f64 * 10.0
        }

        fn line_height(&self) -> f64 {
            20.0
        }
    }

    #[test]
    fn test_single_line_flows_left_to_right() {
        let layout = layout_words("one two", &["one", "two"], &Fixed, 5.0, 4.0);
        assert_eq!(layout.line_count, 1);
        assert_eq!(layout.size, Size::new(65.0, 20.0));
        assert_eq!(layout.cells[0].rect, Rect::new(0.0, 0.0, 30.0, 20.0));
        assert_eq!(layout.cells[1].rect, Rect::new(35.0, 0.0, 30.0, 20.0));
    }

    #[test]
    fn test_multi_line_follows_original_breaks_and_centers() {
        let layout = layout_words(
            "a bb\ncccc",
            &["a", "bb", "cccc"],
            &Fixed,
            10.0,
            5.0,
        );
        assert_eq!(layout.line_count, 2);
        assert_eq!(layout.cells[0].line, 0);
        assert_eq!(layout.cells[1].line, 0);
        assert_eq!(layout.cells[2].line, 1);

        // Line 0 is 10 + 10 + 20 = 40 wide, line 1 is 40 wide.
        assert_eq!(layout.size, Size::new(40.0, 45.0));
        assert_eq!(layout.cells[2].rect.y, 25.0);
        assert_eq!(layout.cells[2].rect.x, 0.0);
    }

    #[test]
    fn test_narrow_line_is_centered() {
        let layout = layout_words("aaaaaa\nb", &["aaaaaa", "b"], &Fixed, 10.0, 0.0);
        assert_eq!(layout.cells[1].rect.x, 25.0);
    }

    #[test]
    fn test_extra_words_land_on_last_line() {
        let layout = layout_words("a\nb", &["a", "b", "c", "d"], &Fixed, 0.0, 0.0);
        let lines: Vec<usize> = layout.cells.iter().map(|c| c.line).collect();
        assert_eq!(lines, vec![0, 1, 1, 1]);
    }

    #[test]
    fn test_blank_original_line_keeps_its_height() {
        let layout = layout_words("a\n\nb", &["a", "b"], &Fixed, 0.0, 0.0);
        assert_eq!(layout.line_count, 3);
        assert_eq!(layout.cells[1].line, 2);
        assert_eq!(layout.size.height, 60.0);
    }

    #[test]
    fn test_no_words() {
        let layout = layout_words::<_, &str>("", &[], &Fixed, 0.0, 0.0);
        assert!(layout.cells.is_empty());
        assert_eq!(layout.size.width, 0.0);
    }
}
