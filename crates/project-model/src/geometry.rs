//! Plane geometry: sizes, points, rectangles, and affine transforms.
//!
//! Canvas space has its origin at the top-left corner with `y` growing
//! downwards, measured in output pixels.

use serde::{Deserialize, Serialize};

/// A width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const ZERO: Size = Size {
        width: 0.0,
        height: 0.0,
    };

    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// The same size with its axes exchanged.
    pub fn swapped(&self) -> Size {
        Size {
            width: self.height,
            height: self.width,
        }
    }

    /// Scale both axes by `factor`.
    pub fn scaled(&self, factor: f64) -> Size {
        Size {
            width: self.width * factor,
            height: self.height * factor,
        }
    }

    /// Length of the shorter side.
    pub fn short_side(&self) -> f64 {
        self.width.min(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// A 2D point in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle of `size` anchored at the origin.
    pub fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width, size.height)
    }

    /// Rectangle of `size` whose center sits at `center`.
    pub fn centered_at(center: Point, size: Size) -> Self {
        Self::new(
            center.x - size.width / 2.0,
            center.y - size.height / 2.0,
            size.width,
            size.height,
        )
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Grow the rectangle by `dx`/`dy` on every side.
    pub fn inset_by(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(
            self.x - dx,
            self.y - dy,
            self.width + dx * 2.0,
            self.height + dy * 2.0,
        )
    }

    pub fn offset_by(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Check whether `other` lies fully inside this rectangle (with a small tolerance).
    pub fn contains_rect(&self, other: &Rect) -> bool {
        const EPS: f64 = 1e-6;
        other.x >= self.x - EPS
            && other.y >= self.y - EPS
            && other.right() <= self.right() + EPS
            && other.bottom() <= self.bottom() + EPS
    }
}

/// A 2D affine transform.
///
/// Points map as `x' = a·x + c·y + tx` and `y' = b·x + d·y + ty`, the
/// row-vector convention used by media containers for track matrices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub fn new(a: f64, b: f64, c: f64, d: f64, tx: f64, ty: f64) -> Self {
        Self { a, b, c, d, tx, ty }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Rotation by `radians`; positive angles turn +x towards +y.
    ///
    /// Coefficients are snapped to exact values at quarter turns so that
    /// rotations compose into matrices that compare equal to the canonical
    /// orientation forms.
    pub fn rotate(radians: f64) -> Self {
        let snap = |v: f64| {
            let rounded = v.round();
            if (v - rounded).abs() < 1e-12 {
                rounded
            } else {
                v
            }
        };
        let (sin, cos) = radians.sin_cos();
        let (sin, cos) = (snap(sin), snap(cos));
        Self::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// The 2×2 linear part as `[a, b, c, d]`.
    pub fn linear(&self) -> [f64; 4] {
        [self.a, self.b, self.c, self.d]
    }

    /// Apply `self` first, then `next`.
    pub fn then(&self, next: &Affine) -> Affine {
        Affine {
            a: self.a * next.a + self.b * next.c,
            b: self.a * next.b + self.b * next.d,
            c: self.c * next.a + self.d * next.c,
            d: self.c * next.b + self.d * next.d,
            tx: self.tx * next.a + self.ty * next.c + next.tx,
            ty: self.tx * next.b + self.ty * next.d + next.ty,
        }
    }

    /// Same linear part, translation replaced.
    pub fn with_translation(&self, tx: f64, ty: f64) -> Affine {
        Affine { tx, ty, ..*self }
    }

    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.tx,
            self.b * p.x + self.d * p.y + self.ty,
        )
    }

    /// Axis-aligned bounding box of `rect` after transformation.
    pub fn map_rect(&self, rect: &Rect) -> Rect {
        let corners = [
            self.apply(Point::new(rect.x, rect.y)),
            self.apply(Point::new(rect.right(), rect.y)),
            self.apply(Point::new(rect.x, rect.bottom())),
            self.apply(Point::new(rect.right(), rect.bottom())),
        ];
        let min_x = corners.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let min_y = corners.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_x = corners.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let max_y = corners.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_then_applies_left_to_right() {
        let t = Affine::scale(2.0, 2.0).then(&Affine::translate(10.0, 5.0));
        let p = t.apply(Point::new(1.0, 1.0));
        assert!(approx(p.x, 12.0));
        assert!(approx(p.y, 7.0));

        let u = Affine::translate(10.0, 5.0).then(&Affine::scale(2.0, 2.0));
        let q = u.apply(Point::new(1.0, 1.0));
        assert!(approx(q.x, 22.0));
        assert!(approx(q.y, 12.0));
    }

    #[test]
    fn test_quarter_rotation_is_exact() {
        let r = Affine::rotate(std::f64::consts::FRAC_PI_2);
        assert_eq!(r.linear(), [0.0, 1.0, -1.0, 0.0]);
        let half = Affine::rotate(std::f64::consts::PI);
        assert_eq!(half.linear(), [-1.0, 0.0, 0.0, -1.0]);
    }

    #[test]
    fn test_map_rect_under_rotation() {
        let t = Affine::new(0.0, 1.0, -1.0, 0.0, 1080.0, 0.0);
        let r = t.map_rect(&Rect::new(0.0, 0.0, 1920.0, 1080.0));
        assert!(approx(r.x, 0.0));
        assert!(approx(r.y, 0.0));
        assert!(approx(r.width, 1080.0));
        assert!(approx(r.height, 1920.0));
    }

    #[test]
    fn test_rect_helpers() {
        let r = Rect::centered_at(Point::new(50.0, 50.0), Size::new(20.0, 10.0));
        assert!(approx(r.x, 40.0));
        assert!(approx(r.y, 45.0));
        let grown = r.inset_by(2.0, 3.0);
        assert!(approx(grown.width, 24.0));
        assert!(approx(grown.height, 16.0));
        assert!(grown.contains_rect(&r));
        assert!(!r.contains_rect(&grown));
    }

    proptest::proptest! {
        #[test]
        fn prop_then_matches_sequential_apply(
            sx in 0.1f64..4.0,
            sy in 0.1f64..4.0,
            tx in -500.0f64..500.0,
            ty in -500.0f64..500.0,
            quarter in 0u8..4,
            px in -1000.0f64..1000.0,
            py in -1000.0f64..1000.0,
        ) {
            let first = Affine::rotate(quarter as f64 * std::f64::consts::FRAC_PI_2);
            let second = Affine::scale(sx, sy).then(&Affine::translate(tx, ty));
            let p = Point::new(px, py);
            let composed = first.then(&second).apply(p);
            let sequential = second.apply(first.apply(p));
            proptest::prop_assert!((composed.x - sequential.x).abs() < 1e-6);
            proptest::prop_assert!((composed.y - sequential.y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_size_swapped() {
        let s = Size::new(1920.0, 1080.0).swapped();
        assert!(approx(s.width, 1080.0));
        assert!(approx(s.short_side(), 1080.0));
    }
}
