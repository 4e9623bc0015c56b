//! Output geometry: orientation detection, aspect-fill, and mirroring.
//!
//! The caller requests a target size in the source's natural (unrotated)
//! axes. Portrait sources get the target's axes swapped so the canvas
//! always matches how the video is actually displayed.

use std::f64::consts::PI;

use captioneer_common::error::{CaptioneerError, CaptioneerResult};
use captioneer_project_model::geometry::{Affine, Point, Rect, Size};
use serde::{Deserialize, Serialize};

/// Display orientation encoded in a track's transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Identity.
    Up,
    /// Rotated 90° clockwise (portrait).
    Right,
    /// Rotated 90° counter-clockwise (portrait).
    Left,
    /// Rotated 180°.
    Down,
}

impl Orientation {
    /// Classify a transform by exact match of its 2×2 linear part.
    pub fn detect(transform: &Affine) -> CaptioneerResult<Orientation> {
        match transform.linear() {
            [1.0, 0.0, 0.0, 1.0] => Ok(Orientation::Up),
            [0.0, 1.0, -1.0, 0.0] => Ok(Orientation::Right),
            [0.0, -1.0, 1.0, 0.0] => Ok(Orientation::Left),
            [-1.0, 0.0, 0.0, -1.0] => Ok(Orientation::Down),
            matrix => Err(CaptioneerError::UnsupportedOrientation { matrix }),
        }
    }

    pub fn is_portrait(&self) -> bool {
        matches!(self, Orientation::Right | Orientation::Left)
    }

    /// Clockwise display rotation in degrees.
    pub fn degrees(&self) -> u32 {
        match self {
            Orientation::Up => 0,
            Orientation::Right => 90,
            Orientation::Down => 180,
            Orientation::Left => 270,
        }
    }

    /// Orientation for a clockwise display rotation, if it is a quarter turn.
    pub fn from_degrees(degrees: i64) -> Option<Orientation> {
        match degrees.rem_euclid(360) {
            0 => Some(Orientation::Up),
            90 => Some(Orientation::Right),
            180 => Some(Orientation::Down),
            270 => Some(Orientation::Left),
            _ => None,
        }
    }

    /// Canonical track transform for a frame of `natural` size, with the
    /// translation that keeps the rotated frame in the positive quadrant.
    pub fn track_transform(&self, natural: Size) -> Affine {
        match self {
            Orientation::Up => Affine::IDENTITY,
            Orientation::Right => Affine::new(0.0, 1.0, -1.0, 0.0, natural.height, 0.0),
            Orientation::Left => Affine::new(0.0, -1.0, 1.0, 0.0, 0.0, natural.width),
            Orientation::Down => {
                Affine::new(-1.0, 0.0, 0.0, -1.0, natural.width, natural.height)
            }
        }
    }
}

/// Resolved output canvas and the transform placing source pixels on it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    pub size: Size,
    pub transform: Affine,
    pub orientation: Orientation,
    pub mirrored: bool,
    /// Aspect-fill scale applied to source pixels.
    pub fill_scale: f64,
}

impl Canvas {
    /// Canvas-space bounds of a source frame of `natural` size.
    pub fn video_rect(&self, natural: Size) -> Rect {
        self.transform.map_rect(&Rect::from_size(natural))
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.size)
    }

    pub fn center(&self) -> Point {
        self.bounds().center()
    }

    /// The layer transform shrunk by `scale` about the canvas center, used
    /// when a frame style shows the video inside a border.
    pub fn framed_transform(&self, scale: f64) -> Affine {
        let c = self.center();
        self.transform
            .then(&Affine::translate(-c.x, -c.y))
            .then(&Affine::scale(scale, scale))
            .then(&Affine::translate(c.x, c.y))
    }

    /// Multiplier from reference style units to canvas pixels.
    pub fn style_scale(&self) -> f64 {
        self.size.short_side() / captioneer_project_model::style::REFERENCE_SHORT_SIDE
    }
}

/// Resolve the output canvas for a source frame.
///
/// `target_size` is expressed in the source's natural axes; the returned
/// canvas swaps it for portrait sources. Returns
/// [`CaptioneerError::UnsupportedOrientation`] for any transform whose
/// linear part is not one of the four canonical rotations.
pub fn resolve(
    natural_size: Size,
    source_transform: &Affine,
    target_size: Size,
    mirror: bool,
) -> CaptioneerResult<Canvas> {
    if natural_size.is_empty() || target_size.is_empty() {
        return Err(CaptioneerError::invalid_input(format!(
            "natural size {}x{} and target size {}x{} must be non-empty",
            natural_size.width, natural_size.height, target_size.width, target_size.height
        )));
    }

    let orientation = Orientation::detect(source_transform)?;

    let (canvas_size, fill_scale) = if orientation.is_portrait() {
        let canvas = target_size.swapped();
        let ratio = (canvas.width / natural_size.height).max(canvas.height / natural_size.width);
        (canvas, ratio)
    } else {
        let canvas = target_size;
        let ratio = (canvas.width / natural_size.width).max(canvas.height / natural_size.height);
        (canvas, ratio)
    };

    let oriented = match orientation {
        Orientation::Down => Affine::rotate(PI).then(&Affine::translate(
            natural_size.width,
            natural_size.height,
        )),
        _ => *source_transform,
    };
    let scaled = oriented.then(&Affine::scale(fill_scale, fill_scale));

    let displayed = scaled.map_rect(&Rect::from_size(natural_size));
    let center_x = (canvas_size.width - displayed.width) / 2.0 - displayed.x;
    let center_y = (canvas_size.height - displayed.height) / 2.0 - displayed.y;
    let mut transform = scaled.then(&Affine::translate(center_x, center_y));

    if mirror {
        // Mirroring replaces the centering translation computed above.
        transform = transform
            .then(&Affine::scale(-1.0, 1.0))
            .with_translation(canvas_size.width, 0.0);
    }

    tracing::debug!(
        ?orientation,
        canvas_w = canvas_size.width,
        canvas_h = canvas_size.height,
        fill_scale,
        mirror,
        "Canvas resolved"
    );

    Ok(Canvas {
        size: canvas_size,
        transform,
        orientation,
        mirrored: mirror,
        fill_scale,
    })
}
