//! Text measurement used for line packing and word placement.

/// Measures rendered text in canvas pixels.
pub trait TextMeasurer {
    /// Advance width of `text` on a single line.
    fn width(&self, text: &str) -> f64;

    /// Distance between consecutive baselines.
    fn line_height(&self) -> f64;
}

impl<T: TextMeasurer + ?Sized> TextMeasurer for &T {
    fn width(&self, text: &str) -> f64 {
        (**self).width(text)
    }

    fn line_height(&self) -> f64 {
        (**self).line_height()
    }
}

/// Deterministic measurer that approximates proportional fonts with
/// per-character-class advances.
///
/// No font files are read, so the same text always measures the same on
/// every machine. Real glyph metrics differ by a few percent; line packing
/// only needs a consistent estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApproxGlyphMeasurer {
    pub font_size: f64,
    pub line_height_factor: f64,
}

impl ApproxGlyphMeasurer {
    pub fn new(font_size: f64) -> Self {
        Self {
            font_size,
            line_height_factor: 1.2,
        }
    }

    /// Advance of one character as a fraction of the font size.
    pub fn advance(c: char) -> f64 {
        match c {
            ' ' | '\u{a0}' => 0.28,
            'i' | 'j' | 'l' | 'I' | '!' | '|' | '\'' | '.' | ',' | ':' | ';' => 0.28,
            'f' | 't' | 'r' | '(' | ')' | '[' | ']' | '-' | '"' => 0.36,
            'm' | 'w' => 0.82,
            'M' | 'W' => 0.9,
            c if c.is_ascii_uppercase() || c.is_ascii_digit() => 0.64,
            c if c.is_ascii() => 0.54,
            c if is_wide(c) => 1.0,
            _ => 0.6,
        }
    }
}

impl TextMeasurer for ApproxGlyphMeasurer {
    fn width(&self, text: &str) -> f64 {
        text.chars().map(Self::advance).sum::<f64>() * self.font_size
    }

    fn line_height(&self) -> f64 {
        self.font_size * self.line_height_factor
    }
}

/// CJK ideographs, kana, hangul and fullwidth forms take a full em.
fn is_wide(c: char) -> bool {
    matches!(c as u32,
        0x1100..=0x115F
        | 0x2E80..=0x303E
        | 0x3041..=0x33FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6
        | 0x1F300..=0x1FAFF)
}
