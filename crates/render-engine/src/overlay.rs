//! Caption overlay construction.
//!
//! Builds the [`RenderLayer`] tree an encoder draws over the video: optional
//! frame-style layers first, then one container per cue. Cue containers
//! carry the appear/disappear fades; karaoke words are children of their
//! cue container with their own highlight curves.

use captioneer_processing_core::layout::Canvas;
use captioneer_processing_core::measure::{ApproxGlyphMeasurer, TextMeasurer};
use captioneer_processing_core::word_layout::layout_words;
use captioneer_project_model::clip::FrameStyle;
use captioneer_project_model::cue::{CaptionCue, KaraokeVariant};
use captioneer_project_model::geometry::{Point, Rect, Size};
use captioneer_project_model::project::OverlayBackendCapability;
use captioneer_project_model::style::CaptionStyle;

use crate::layer::{LayerContent, PropertyCurve, RenderLayer, TextBitmap};

/// Animation timings and karaoke spacing.
///
/// Spacings are reference units, scaled with the canvas like style lengths.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayConfig {
    pub fade_duration: f64,
    pub highlight_duration: f64,
    pub scale_duration: f64,
    pub word_spacing: f64,
    pub line_spacing: f64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            fade_duration: 0.05,
            highlight_duration: 0.01,
            scale_duration: 0.15,
            word_spacing: 14.0,
            line_spacing: 8.0,
        }
    }
}

/// How the encoder attaches the overlay to the video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentStrategy {
    /// Overlay is composited onto the video frames during encode.
    PostProcess,
    /// Overlay is rendered as its own track and layered over the video.
    AdditionalTrack,
}

impl AttachmentStrategy {
    pub fn select(capability: &OverlayBackendCapability) -> Self {
        if capability.requires_additional_track || !capability.supports_post_process_layer {
            AttachmentStrategy::AdditionalTrack
        } else {
            AttachmentStrategy::PostProcess
        }
    }
}

/// Overlay layers for one render.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayTree {
    pub strategy: AttachmentStrategy,

    /// Background fill and framed video placement, present only with a
    /// frame style.
    pub frame_layers: Vec<RenderLayer>,

    /// Group holding one container per cue.
    pub captions: RenderLayer,
}

impl OverlayTree {
    /// The framed video layer, when a frame style is active.
    pub fn video_layer(&self) -> Option<&RenderLayer> {
        self.frame_layers
            .iter()
            .find(|l| matches!(l.content, LayerContent::Video))
    }

    pub fn background_layer(&self) -> Option<&RenderLayer> {
        self.frame_layers
            .iter()
            .find(|l| matches!(l.content, LayerContent::Solid { .. }))
    }

    /// Complete tree for post-process attachment: frame layers, a video
    /// layer, and the captions on top.
    #[cfg(test)]
    pub(crate) fn parent_layer(&self) -> RenderLayer {
        let bounds = self.captions.frame;
        let mut parent = RenderLayer::group("parent", bounds);
        for layer in &self.frame_layers {
            parent.push(layer.clone());
        }
        if self.video_layer().is_none() {
            parent.push(RenderLayer::video("video", bounds));
        }
        parent.push(self.captions.clone());
        parent
    }
}

/// Build the overlay for `cues` on `canvas`.
///
/// Karaoke cues lacking a highlight color or word timings are drawn as
/// plain captions. Cues with blank text are skipped.
pub fn build(
    cues: &[CaptionCue],
    canvas: &Canvas,
    total_duration: f64,
    frame_style: Option<&FrameStyle>,
    capability: &OverlayBackendCapability,
    config: &OverlayConfig,
) -> OverlayTree {
    let bounds = canvas.bounds();
    let mut frame_layers = vec![];
    if let Some(frame) = frame_style {
        frame_layers.push(RenderLayer::solid(
            "frame-background",
            bounds,
            frame.border_color,
            0.0,
        ));
        frame_layers.push(RenderLayer::video(
            "frame-video",
            Rect::centered_at(canvas.center(), canvas.size.scaled(frame.scale)),
        ));
    }

    let mut captions = RenderLayer::group("captions", bounds);
    for (index, cue) in cues.iter().enumerate() {
        if cue.text.trim().is_empty() {
            tracing::debug!(index, "Skipping blank cue");
            continue;
        }
        let layer = if cue.is_karaoke() {
            karaoke_cue_layer(index, cue, canvas, config)
        } else {
            if cue.karaoke != KaraokeVariant::None {
                tracing::debug!(
                    index,
                    variant = ?cue.karaoke,
                    "Karaoke cue lacks highlight color or word timings, drawing plain"
                );
            }
            plain_cue_layer(index, cue, canvas)
        };
        captions.push(with_fades(layer, cue, total_duration, config));
    }

    let strategy = AttachmentStrategy::select(capability);
    tracing::info!(
        stage = "overlay",
        cues = cues.len(),
        layers = captions.count(),
        framed = frame_style.is_some(),
        ?strategy,
        "Overlay built"
    );

    OverlayTree {
        strategy,
        frame_layers,
        captions,
    }
}

fn with_fades(
    mut layer: RenderLayer,
    cue: &CaptionCue,
    total_duration: f64,
    config: &OverlayConfig,
) -> RenderLayer {
    if cue.range.start > 0.0 {
        layer.opacity = 0.0;
        layer = layer.with_curve(PropertyCurve::opacity(
            0.0,
            1.0,
            cue.range.start,
            config.fade_duration,
        ));
    }
    if cue.range.end < total_duration {
        layer = layer.with_curve(PropertyCurve::opacity(
            1.0,
            0.0,
            cue.range.end,
            config.fade_duration,
        ));
    }
    layer
}

/// Canvas-space center of a cue.
fn cue_center(cue: &CaptionCue, canvas: &Canvas) -> Point {
    let c = canvas.center();
    Point::new(
        c.x + cue.offset.x * canvas.size.width,
        c.y + cue.offset.y * canvas.size.height,
    )
}

fn text_bitmap(text: &str, style: &CaptionStyle, measurer: &ApproxGlyphMeasurer) -> TextBitmap {
    TextBitmap {
        text: text.to_string(),
        font_family: style.font_family.clone(),
        font_size: style.font_size,
        line_height: measurer.line_height(),
        color: style.fill_color,
        stroke: style.stroke.clone(),
        shadow: style.shadow.clone(),
        background: style.background_color,
        corner_radius: style.corner_radius,
        padding: style.padding,
    }
}

fn plain_cue_layer(index: usize, cue: &CaptionCue, canvas: &Canvas) -> RenderLayer {
    let style = cue.style.scaled(canvas.style_scale());
    let measurer = ApproxGlyphMeasurer::new(style.font_size);

    let text = cue.text.trim();
    let lines: Vec<&str> = text.split('\n').collect();
    let text_width = lines
        .iter()
        .map(|l| measurer.width(l.trim()))
        .fold(0.0, f64::max);
    let text_height = measurer.line_height() * lines.len() as f64;
    let inset = style.padding + style.stroke.as_ref().map_or(0.0, |s| s.width);

    let frame = Rect::centered_at(
        cue_center(cue, canvas),
        Size::new(
            text_width + inset * 2.0,
            text_height + inset * 2.0,
        ),
    );

    let trimmed_lines = lines.iter().map(|l| l.trim()).collect::<Vec<_>>().join("\n");
    let mut container = RenderLayer::group(format!("cue-{index}"), frame);
    container.push(RenderLayer::text(
        format!("cue-{index}/text"),
        frame,
        text_bitmap(&trimmed_lines, &style, &measurer),
    ));
    container
}

fn karaoke_cue_layer(
    index: usize,
    cue: &CaptionCue,
    canvas: &Canvas,
    config: &OverlayConfig,
) -> RenderLayer {
    let scale = canvas.style_scale();
    let style = cue.style.scaled(scale);
    let karaoke = &cue.karaoke_style;
    let measurer = ApproxGlyphMeasurer::new(style.font_size);

    let word_texts: Vec<&str> = cue.words.iter().map(|w| w.text.trim()).collect();
    let layout = layout_words(
        &cue.text,
        &word_texts,
        &measurer,
        config.word_spacing * scale,
        config.line_spacing * scale,
    );

    let inset = style.padding + style.stroke.as_ref().map_or(0.0, |s| s.width);
    let frame = Rect::centered_at(
        cue_center(cue, canvas),
        Size::new(
            layout.size.width + inset * 2.0,
            layout.size.height + inset * 2.0,
        ),
    );

    let variant = match (cue.karaoke, karaoke.background_color) {
        (KaraokeVariant::WordBackground, None) => {
            tracing::debug!(index, "Word background requested without a color, highlighting words only");
            KaraokeVariant::Word
        }
        (variant, _) => variant,
    };
    // is_karaoke() guarantees a highlight color.
    let highlight = karaoke.highlight_color.unwrap_or(style.fill_color);
    let word_radius = if style.corner_radius > 0.0 {
        style.corner_radius
    } else {
        style.font_size * 0.2
    };

    let mut container = RenderLayer::group(format!("cue-{index}"), frame);
    if let Some(color) = style.background_color {
        container.push(RenderLayer::solid(
            format!("cue-{index}/background"),
            frame,
            color,
            style.corner_radius,
        ));
    }

    let plain = CaptionStyle {
        background_color: None,
        padding: 0.0,
        ..style.clone()
    };
    for cell in &layout.cells {
        let word = &cue.words[cell.index];
        let rect = cell.rect.offset_by(frame.x + inset, frame.y + inset);
        let name = format!("cue-{index}/word-{}", cell.index);

        if let (KaraokeVariant::WordBackground, Some(color)) = (variant, karaoke.background_color) {
            let pad = style.padding * 0.5;
            container.push(
                RenderLayer::solid(
                    format!("{name}/background"),
                    rect.inset_by(pad, pad * 0.5),
                    color,
                    word_radius,
                )
                .with_opacity(0.0)
                .with_curve(PropertyCurve::opacity(
                    0.0,
                    1.0,
                    word.start,
                    config.highlight_duration,
                )),
            );
        }

        let mut base = RenderLayer::text(
            format!("{name}/base"),
            rect,
            text_bitmap(word_texts[cell.index], &plain, &measurer),
        );
        let mut lit = RenderLayer::text(
            format!("{name}/highlight"),
            rect,
            TextBitmap {
                color: highlight,
                shadow: None,
                ..text_bitmap(word_texts[cell.index], &plain, &measurer)
            },
        )
        .with_opacity(0.0)
        .with_curve(PropertyCurve::opacity(
            0.0,
            1.0,
            word.start,
            config.highlight_duration,
        ));

        if variant == KaraokeVariant::WordAndScale {
            let s = karaoke.active_word_scale;
            for layer in [&mut base, &mut lit] {
                layer.curves.push(PropertyCurve::scale(
                    1.0,
                    s,
                    word.start,
                    config.scale_duration,
                ));
                layer.curves.push(PropertyCurve::scale(
                    s,
                    1.0,
                    word.end,
                    config.scale_duration,
                ));
            }
        }

        container.push(base);
        container.push(lit);
    }

    container
}
