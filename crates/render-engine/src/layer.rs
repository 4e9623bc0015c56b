//! Render layer scene graph with time-keyed property curves.
//!
//! Frames are absolute canvas coordinates. A layer's animated value starts
//! at its base value; each curve takes over at its `begin` time, ramps
//! linearly over `duration`, then holds `to` until a later curve begins.

use captioneer_project_model::color::Rgba;
use captioneer_project_model::geometry::Rect;
use captioneer_project_model::style::{Shadow, Stroke};
use serde::{Deserialize, Serialize};

/// Property a curve animates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimatedProperty {
    Opacity,
    /// Uniform scale about the layer's center.
    Scale,
}

/// Linear ramp of one property between two values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PropertyCurve {
    pub property: AnimatedProperty,
    pub from: f64,
    pub to: f64,
    /// Output-timeline second the ramp starts.
    pub begin: f64,
    pub duration: f64,
}

impl PropertyCurve {
    pub fn opacity(from: f64, to: f64, begin: f64, duration: f64) -> Self {
        Self {
            property: AnimatedProperty::Opacity,
            from,
            to,
            begin,
            duration,
        }
    }

    pub fn scale(from: f64, to: f64, begin: f64, duration: f64) -> Self {
        Self {
            property: AnimatedProperty::Scale,
            from,
            to,
            begin,
            duration,
        }
    }

    pub fn end(&self) -> f64 {
        self.begin + self.duration
    }

    /// Value at `t`, or `None` before the curve begins.
    pub fn value_at(&self, t: f64) -> Option<f64> {
        if t < self.begin {
            return None;
        }
        if self.duration <= 0.0 || t >= self.end() {
            return Some(self.to);
        }
        let progress = (t - self.begin) / self.duration;
        Some(self.from + (self.to - self.from) * progress)
    }
}

/// Pre-styled caption text, drawn shadow first, then stroke, then fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBitmap {
    /// Text with explicit `\n` line breaks; each line is centered.
    pub text: String,
    pub font_family: Option<String>,
    /// Canvas pixels.
    pub font_size: f64,
    pub line_height: f64,
    pub color: Rgba,
    pub stroke: Option<Stroke>,
    pub shadow: Option<Shadow>,
    /// Box drawn behind the padded text bounds.
    pub background: Option<Rgba>,
    pub corner_radius: f64,
    pub padding: f64,
}

impl TextBitmap {
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.split('\n')
    }
}

/// What a layer draws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerContent {
    /// Draws nothing itself; groups children under shared curves.
    Group,
    Solid { color: Rgba, corner_radius: f64 },
    Text(TextBitmap),
    /// Placeholder for the decoded source video.
    Video,
}

/// A node of the render tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderLayer {
    pub name: String,
    pub frame: Rect,
    pub content: LayerContent,
    /// Base opacity before any opacity curve begins.
    pub opacity: f64,
    pub curves: Vec<PropertyCurve>,
    pub children: Vec<RenderLayer>,
}

impl RenderLayer {
    pub fn new(name: impl Into<String>, frame: Rect, content: LayerContent) -> Self {
        Self {
            name: name.into(),
            frame,
            content,
            opacity: 1.0,
            curves: vec![],
            children: vec![],
        }
    }

    pub fn group(name: impl Into<String>, frame: Rect) -> Self {
        Self::new(name, frame, LayerContent::Group)
    }

    pub fn solid(name: impl Into<String>, frame: Rect, color: Rgba, corner_radius: f64) -> Self {
        Self::new(
            name,
            frame,
            LayerContent::Solid {
                color,
                corner_radius,
            },
        )
    }

    pub fn text(name: impl Into<String>, frame: Rect, bitmap: TextBitmap) -> Self {
        Self::new(name, frame, LayerContent::Text(bitmap))
    }

    pub fn video(name: impl Into<String>, frame: Rect) -> Self {
        Self::new(name, frame, LayerContent::Video)
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_curve(mut self, curve: PropertyCurve) -> Self {
        self.curves.push(curve);
        self
    }

    pub fn push(&mut self, child: RenderLayer) {
        self.children.push(child);
    }

    /// Curves animating `property`, ordered by begin time.
    pub fn curves_for(&self, property: AnimatedProperty) -> Vec<PropertyCurve> {
        let mut curves: Vec<PropertyCurve> = self
            .curves
            .iter()
            .filter(|c| c.property == property)
            .copied()
            .collect();
        curves.sort_by(|a, b| a.begin.total_cmp(&b.begin));
        curves
    }

    fn animated(&self, property: AnimatedProperty, base: f64, t: f64) -> f64 {
        self.curves_for(property)
            .iter()
            .filter_map(|c| c.value_at(t))
            .last()
            .unwrap_or(base)
    }

    /// This layer's own opacity at `t`, ignoring ancestors.
    pub fn opacity_at(&self, t: f64) -> f64 {
        self.animated(AnimatedProperty::Opacity, self.opacity, t)
    }

    pub fn scale_at(&self, t: f64) -> f64 {
        self.animated(AnimatedProperty::Scale, 1.0, t)
    }

    /// Base value and breakpoints `(time, value)` of `property`, suitable
    /// for piecewise-linear evaluation.
    pub fn keypoints(&self, property: AnimatedProperty) -> Vec<(f64, f64)> {
        let base = match property {
            AnimatedProperty::Opacity => self.opacity,
            AnimatedProperty::Scale => 1.0,
        };
        let mut points = vec![(0.0, base)];
        for curve in self.curves_for(property) {
            points.push((curve.begin, curve.from));
            points.push((curve.end(), curve.to));
        }
        points
    }

    /// Depth-first visit of this layer and its descendants, with the chain
    /// of ancestors leading to each.
    pub fn walk<'a, F>(&'a self, visit: &mut F)
    where
        F: FnMut(&'a RenderLayer, &[&'a RenderLayer]),
    {
        let mut ancestors = vec![];
        self.walk_inner(&mut ancestors, visit);
    }

    fn walk_inner<'a, F>(&'a self, ancestors: &mut Vec<&'a RenderLayer>, visit: &mut F)
    where
        F: FnMut(&'a RenderLayer, &[&'a RenderLayer]),
    {
        visit(self, ancestors);
        ancestors.push(self);
        for child in &self.children {
            child.walk_inner(ancestors, visit);
        }
        ancestors.pop();
    }

    /// Total number of layers in this subtree.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(RenderLayer::count).sum::<usize>()
    }

    /// First descendant (or self) whose name matches.
    pub fn find(&self, name: &str) -> Option<&RenderLayer> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_curve_interpolates_and_holds() {
        let curve = PropertyCurve::opacity(0.0, 1.0, 2.0, 0.5);
        assert_eq!(curve.value_at(1.9), None);
        assert!(approx(curve.value_at(2.25).unwrap(), 0.5));
        assert!(approx(curve.value_at(10.0).unwrap(), 1.0));

        let instant = PropertyCurve::opacity(0.0, 1.0, 1.0, 0.0);
        assert_eq!(instant.value_at(1.0), Some(1.0));
    }

    #[test]
    fn test_fade_in_then_out() {
        let layer = RenderLayer::group("cue", Rect::new(0.0, 0.0, 10.0, 10.0))
            .with_opacity(0.0)
            .with_curve(PropertyCurve::opacity(1.0, 0.0, 3.0, 0.05))
            .with_curve(PropertyCurve::opacity(0.0, 1.0, 1.0, 0.05));

        assert!(approx(layer.opacity_at(0.5), 0.0));
        assert!(approx(layer.opacity_at(2.0), 1.0));
        assert!(approx(layer.opacity_at(3.025), 0.5));
        assert!(approx(layer.opacity_at(4.0), 0.0));
    }

    #[test]
    fn test_scale_pulse() {
        let layer = RenderLayer::group("word", Rect::new(0.0, 0.0, 1.0, 1.0))
            .with_curve(PropertyCurve::scale(1.0, 1.2, 1.0, 0.15))
            .with_curve(PropertyCurve::scale(1.2, 1.0, 2.0, 0.15));
        assert!(approx(layer.scale_at(0.0), 1.0));
        assert!(approx(layer.scale_at(1.5), 1.2));
        assert!(approx(layer.scale_at(3.0), 1.0));
    }

    #[test]
    fn test_keypoints_start_from_base() {
        let layer = RenderLayer::group("cue", Rect::new(0.0, 0.0, 1.0, 1.0))
            .with_opacity(0.0)
            .with_curve(PropertyCurve::opacity(0.0, 1.0, 1.0, 0.05));
        let points = layer.keypoints(AnimatedProperty::Opacity);
        assert_eq!(points.len(), 3);
        assert_eq!(points[0], (0.0, 0.0));
        assert!(approx(points[2].0, 1.05));
        assert!(layer.keypoints(AnimatedProperty::Scale) == vec![(0.0, 1.0)]);
    }

    #[test]
    fn test_walk_reports_ancestors() {
        let mut root = RenderLayer::group("root", Rect::new(0.0, 0.0, 1.0, 1.0));
        let mut cue = RenderLayer::group("cue", Rect::new(0.0, 0.0, 1.0, 1.0));
        cue.push(RenderLayer::solid(
            "bg",
            Rect::new(0.0, 0.0, 1.0, 1.0),
            Rgba::BLACK,
            0.0,
        ));
        root.push(cue);

        let mut seen = vec![];
        root.walk(&mut |layer, ancestors| {
            seen.push((layer.name.clone(), ancestors.len()));
        });
        assert_eq!(
            seen,
            vec![
                ("root".to_string(), 0),
                ("cue".to_string(), 1),
                ("bg".to_string(), 2)
            ]
        );
        assert_eq!(root.count(), 3);
        assert!(root.find("bg").is_some());
    }
}
