//! Caption text styling and named presets.
//!
//! Lengths (font size, padding, stroke width, corner radius, shadow radius
//! and offset) are in reference units: pixels on a canvas whose short side
//! is [`REFERENCE_SHORT_SIDE`] pixels. Renderers scale them to the resolved
//! canvas.

use serde::{Deserialize, Serialize};

use crate::color::Rgba;
use crate::geometry::Point;

/// Canvas short side, in pixels, at which style lengths are authored.
pub const REFERENCE_SHORT_SIDE: f64 = 1080.0;

/// Text outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub color: Rgba,
    pub width: f64,
}

/// Drop shadow under the text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shadow {
    pub color: Rgba,
    pub radius: f64,
    pub offset: Point,
    pub opacity: f64,
}

/// Visual style of a caption cue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionStyle {
    /// Font family name; `None` uses the renderer's default font.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    pub font_size: f64,
    pub fill_color: Rgba,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke: Option<Stroke>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Rgba>,
    pub corner_radius: f64,
    pub padding: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow: Option<Shadow>,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_family: None,
            font_size: 56.0,
            fill_color: Rgba::WHITE,
            stroke: Some(Stroke {
                color: Rgba::BLACK,
                width: 4.0,
            }),
            background_color: None,
            corner_radius: 0.0,
            padding: 12.0,
            shadow: None,
        }
    }
}

impl CaptionStyle {
    /// Names accepted by [`CaptionStyle::preset`].
    pub const PRESETS: [&'static str; 4] = ["classic", "boxed", "karaoke", "bold-pop"];

    /// Look up a named style preset.
    pub fn preset(name: &str) -> Option<CaptionStyle> {
        match name {
            "classic" => Some(CaptionStyle::default()),
            "boxed" => Some(CaptionStyle {
                font_size: 48.0,
                stroke: None,
                background_color: Some(Rgba::rgba(0, 0, 0, 170)),
                corner_radius: 14.0,
                padding: 18.0,
                ..CaptionStyle::default()
            }),
            "karaoke" => Some(CaptionStyle {
                font_size: 64.0,
                stroke: Some(Stroke {
                    color: Rgba::BLACK,
                    width: 6.0,
                }),
                shadow: Some(Shadow {
                    color: Rgba::BLACK,
                    radius: 8.0,
                    offset: Point::new(0.0, 4.0),
                    opacity: 0.6,
                }),
                ..CaptionStyle::default()
            }),
            "bold-pop" => Some(CaptionStyle {
                font_size: 72.0,
                fill_color: Rgba::rgb(255, 221, 0),
                stroke: Some(Stroke {
                    color: Rgba::BLACK,
                    width: 8.0,
                }),
                shadow: Some(Shadow {
                    color: Rgba::BLACK,
                    radius: 0.0,
                    offset: Point::new(4.0, 6.0),
                    opacity: 1.0,
                }),
                ..CaptionStyle::default()
            }),
            _ => None,
        }
    }

    /// Copy of the style with every length multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> CaptionStyle {
        CaptionStyle {
            font_size: self.font_size * factor,
            stroke: self.stroke.as_ref().map(|s| Stroke {
                color: s.color,
                width: s.width * factor,
            }),
            corner_radius: self.corner_radius * factor,
            padding: self.padding * factor,
            shadow: self.shadow.as_ref().map(|s| Shadow {
                color: s.color,
                radius: s.radius * factor,
                offset: Point::new(s.offset.x * factor, s.offset.y * factor),
                opacity: s.opacity,
            }),
            ..self.clone()
        }
    }
}
