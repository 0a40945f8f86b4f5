//! Layer definitions for the whiteboard scene.
//!
//! A [`Layer`] carries the attributes every layer shares, while kind-specific
//! data lives in the [`LayerKind`] payload. Layers refer to each other only by
//! [`LayerId`]; resolving those ids goes through the [`Scene`](crate::scene::Scene).

use crate::geometry::{bounds_of_points, rotate_point};
use crate::mutation::{now_millis, random_nonce};
use crate::outline::smooth_curve;
use kurbo::{ParamCurve, Point, Rect};
use peniko::Color;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for layers.
pub type LayerId = Uuid;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self::new(rgba.r, rgba.g, rgba.b, rgba.a)
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Corner treatment. Curved lines are drawn as smooth splines through their points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Roundness {
    /// Radius proportional to the shape size.
    Proportional,
    /// Fixed radius, clamped for small shapes.
    Adaptive,
}

/// What kind of layer references this one through `bound_layers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundLayerKind {
    Arrow,
    Text,
}

/// Back-reference from a shape to an arrow or text label bound to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundLayer {
    pub id: LayerId,
    pub kind: BoundLayerKind,
}

impl BoundLayer {
    pub fn arrow(id: LayerId) -> Self {
        Self {
            id,
            kind: BoundLayerKind::Arrow,
        }
    }

    pub fn text(id: LayerId) -> Self {
        Self {
            id,
            kind: BoundLayerKind::Text,
        }
    }
}

/// Anchors one end of a line or arrow to a bindable shape.
///
/// `focus` in (-1, 1) locates the tangent point on a copy of the shape's
/// outline scaled by `|focus|`. `gap` is the distance kept between the shape's
/// border and the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointBinding {
    pub layer_id: LayerId,
    pub focus: f64,
    pub gap: f64,
}

/// Point data for lines and arrows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearData {
    /// Offsets from the layer's `(x, y)`. The first point is always the origin.
    pub points: Vec<Point>,
    pub start_binding: Option<PointBinding>,
    pub end_binding: Option<PointBinding>,
    /// Last point confirmed while drawing a multi-point line.
    #[serde(default)]
    pub last_committed_point: Option<Point>,
}

impl LinearData {
    pub fn new(points: Vec<Point>) -> Self {
        Self {
            points,
            start_binding: None,
            end_binding: None,
            last_committed_point: None,
        }
    }
}

/// Raw pointer samples of a freehand stroke, relative to `(x, y)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreedrawData {
    pub points: Vec<Point>,
    #[serde(default)]
    pub pressures: Vec<f64>,
    #[serde(default)]
    pub simulate_pressure: bool,
}

/// Horizontal text alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Vertical alignment of text inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VerticalAlign {
    Top,
    #[default]
    Middle,
    Bottom,
}

/// Text content and typography.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextData {
    /// Text as displayed, after wrapping.
    pub text: String,
    /// Text as typed, before wrapping.
    pub original_text: String,
    pub font_size: f64,
    /// Line height as a multiple of the font size.
    pub line_height: f64,
    pub text_align: TextAlign,
    pub vertical_align: VerticalAlign,
    /// Container this text is the label of.
    pub container_id: Option<LayerId>,
}

/// Image reference and mirroring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    pub file_id: Option<String>,
    /// Horizontal and vertical mirroring, each 1 or -1.
    pub scale: [f64; 2],
}

/// Frame metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameData {
    pub name: Option<String>,
}

/// Kind-specific payload of a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayerKind {
    /// Rubber-band selection box. Never part of a scene's geometry.
    Selection,
    Rectangle,
    Diamond,
    Ellipse,
    Text(TextData),
    Image(ImageData),
    Frame(FrameData),
    Line(LinearData),
    Arrow(LinearData),
    Freedraw(FreedrawData),
}

impl LayerKind {
    pub fn name(&self) -> &'static str {
        match self {
            LayerKind::Selection => "selection",
            LayerKind::Rectangle => "rectangle",
            LayerKind::Diamond => "diamond",
            LayerKind::Ellipse => "ellipse",
            LayerKind::Text(_) => "text",
            LayerKind::Image(_) => "image",
            LayerKind::Frame(_) => "frame",
            LayerKind::Line(_) => "line",
            LayerKind::Arrow(_) => "arrow",
            LayerKind::Freedraw(_) => "freedraw",
        }
    }
}

/// A layer in the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub kind: LayerKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Rotation about the layer's center, in radians.
    pub angle: f64,
    pub stroke_color: SerializableColor,
    /// Fill color (None = transparent).
    pub background_color: Option<SerializableColor>,
    pub stroke_width: f64,
    pub roundness: Option<Roundness>,
    /// Random seed for the hand-drawn outline.
    pub seed: u32,
    /// Bumped on every effective mutation.
    pub version: u32,
    /// Random value replaced on every effective mutation.
    pub version_nonce: u32,
    /// Milliseconds since the Unix epoch of the last mutation.
    pub updated: u64,
    pub is_deleted: bool,
    /// Groups this layer belongs to, deepest first.
    pub group_ids: Vec<String>,
    pub frame_id: Option<LayerId>,
    pub bound_layers: Vec<BoundLayer>,
    pub locked: bool,
}

/// Generate a random seed for new layers.
/// Uses a counter mixed through splitmix32, which works on all platforms including WASM.
fn generate_seed() -> u32 {
    use std::sync::atomic::{AtomicU32, Ordering};

    static SEED_COUNTER: AtomicU32 = AtomicU32::new(1);

    let counter = SEED_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut x = counter.wrapping_mul(0x9E37_79B9);
    x ^= x >> 16;
    x = x.wrapping_mul(0x85EB_CA6B);
    x ^= x >> 13;
    x = x.wrapping_mul(0xC2B2_AE35);
    x ^= x >> 16;
    x
}

impl Layer {
    /// Create a layer of the given kind with a fresh id.
    pub fn new(kind: LayerKind, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            x,
            y,
            width,
            height,
            angle: 0.0,
            stroke_color: SerializableColor::black(),
            background_color: None,
            stroke_width: 2.0,
            roundness: None,
            seed: generate_seed(),
            version: 1,
            version_nonce: random_nonce(),
            updated: now_millis(),
            is_deleted: false,
            group_ids: Vec::new(),
            frame_id: None,
            bound_layers: Vec::new(),
            locked: false,
        }
    }

    pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(LayerKind::Rectangle, x, y, width, height)
    }

    pub fn diamond(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(LayerKind::Diamond, x, y, width, height)
    }

    pub fn ellipse(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(LayerKind::Ellipse, x, y, width, height)
    }

    pub fn frame(x: f64, y: f64, width: f64, height: f64, name: Option<String>) -> Self {
        Self::new(LayerKind::Frame(FrameData { name }), x, y, width, height)
    }

    pub fn image(x: f64, y: f64, width: f64, height: f64, file_id: Option<String>) -> Self {
        let data = ImageData {
            file_id,
            scale: [1.0, 1.0],
        };
        Self::new(LayerKind::Image(data), x, y, width, height)
    }

    /// Create a line at `(x, y)` through `points`, given relative to `(x, y)`.
    pub fn line(x: f64, y: f64, points: Vec<Point>) -> Self {
        Self::linear(false, x, y, points)
    }

    /// Create an arrow at `(x, y)` through `points`, given relative to `(x, y)`.
    pub fn arrow(x: f64, y: f64, points: Vec<Point>) -> Self {
        Self::linear(true, x, y, points)
    }

    fn linear(arrow: bool, x: f64, y: f64, points: Vec<Point>) -> Self {
        let size = bounds_of_points(&points).unwrap_or(Rect::ZERO);
        let data = LinearData::new(points);
        let kind = if arrow {
            LayerKind::Arrow(data)
        } else {
            LayerKind::Line(data)
        };
        Self::new(kind, x, y, size.width(), size.height())
    }

    pub fn freedraw(x: f64, y: f64, points: Vec<Point>) -> Self {
        let size = bounds_of_points(&points).unwrap_or(Rect::ZERO);
        let data = FreedrawData {
            points,
            pressures: Vec::new(),
            simulate_pressure: true,
        };
        Self::new(LayerKind::Freedraw(data), x, y, size.width(), size.height())
    }

    /// Create a text layer. Width and height are supplied by the caller's
    /// measurement (see [`crate::text::TextMeasurer`]).
    pub fn text(x: f64, y: f64, width: f64, height: f64, text: &str, font_size: f64) -> Self {
        let data = TextData {
            text: text.to_string(),
            original_text: text.to_string(),
            font_size,
            line_height: 1.25,
            text_align: TextAlign::Left,
            vertical_align: VerticalAlign::Middle,
            container_id: None,
        };
        Self::new(LayerKind::Text(data), x, y, width, height)
    }

    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = Some(color.into());
        self
    }

    pub fn with_roundness(mut self, roundness: Roundness) -> Self {
        self.roundness = Some(roundness);
        self
    }

    pub fn with_group_ids(mut self, group_ids: Vec<String>) -> Self {
        self.group_ids = group_ids;
        self
    }

    /// Copy this layer under a fresh id. References to other layers are
    /// kept as-is; see [`crate::binding::fix_bindings_after_duplication`].
    pub fn duplicate(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            version_nonce: random_nonce(),
            updated: now_millis(),
            ..self.clone()
        }
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn is_linear(&self) -> bool {
        matches!(self.kind, LayerKind::Line(_) | LayerKind::Arrow(_))
    }

    pub fn is_arrow(&self) -> bool {
        matches!(self.kind, LayerKind::Arrow(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, LayerKind::Text(_))
    }

    pub fn is_frame(&self) -> bool {
        matches!(self.kind, LayerKind::Frame(_))
    }

    pub fn is_freedraw(&self) -> bool {
        matches!(self.kind, LayerKind::Freedraw(_))
    }

    /// Shapes a line or arrow endpoint can attach to.
    pub fn is_bindable(&self) -> bool {
        match &self.kind {
            LayerKind::Rectangle
            | LayerKind::Diamond
            | LayerKind::Ellipse
            | LayerKind::Image(_)
            | LayerKind::Frame(_) => true,
            LayerKind::Text(text) => text.container_id.is_none(),
            _ => false,
        }
    }

    /// Layers that can host a bound text label.
    pub fn is_text_container(&self) -> bool {
        matches!(
            self.kind,
            LayerKind::Rectangle | LayerKind::Diamond | LayerKind::Ellipse | LayerKind::Arrow(_)
        )
    }

    /// Box-shaped layers whose distance field is the axis-aligned box.
    pub fn is_rectangular(&self) -> bool {
        matches!(
            self.kind,
            LayerKind::Rectangle | LayerKind::Text(_) | LayerKind::Image(_) | LayerKind::Frame(_)
        )
    }

    pub fn linear_data(&self) -> Option<&LinearData> {
        match &self.kind {
            LayerKind::Line(data) | LayerKind::Arrow(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn linear_data_mut(&mut self) -> Option<&mut LinearData> {
        match &mut self.kind {
            LayerKind::Line(data) | LayerKind::Arrow(data) => Some(data),
            _ => None,
        }
    }

    pub fn text_data(&self) -> Option<&TextData> {
        match &self.kind {
            LayerKind::Text(data) => Some(data),
            _ => None,
        }
    }

    /// Relative points of lines, arrows and freehand strokes. Empty otherwise.
    pub fn points(&self) -> &[Point] {
        match &self.kind {
            LayerKind::Line(data) | LayerKind::Arrow(data) => &data.points,
            LayerKind::Freedraw(data) => &data.points,
            _ => &[],
        }
    }

    pub fn start_binding(&self) -> Option<PointBinding> {
        self.linear_data().and_then(|data| data.start_binding)
    }

    pub fn end_binding(&self) -> Option<PointBinding> {
        self.linear_data().and_then(|data| data.end_binding)
    }

    /// Id of the container this text is bound to.
    pub fn container_id(&self) -> Option<LayerId> {
        self.text_data().and_then(|data| data.container_id)
    }

    /// Id of the text label bound to this container.
    pub fn bound_text_id(&self) -> Option<LayerId> {
        self.bound_layers
            .iter()
            .find(|bound| bound.kind == BoundLayerKind::Text)
            .map(|bound| bound.id)
    }

    /// Whether a line is drawn as a smooth curve through its points.
    pub fn is_curved(&self) -> bool {
        self.roundness.is_some() && self.points().len() > 2
    }

    /// Transparent background: hit testing only considers the border.
    pub fn is_transparent(&self) -> bool {
        self.background_color.is_none_or(|c| c.is_transparent())
    }

    /// Unrotated scene-space box of the layer.
    ///
    /// For point-based layers this is the box of the drawn path, which may
    /// not start at `(x, y)`.
    pub fn absolute_rect(&self) -> Rect {
        match &self.kind {
            LayerKind::Line(_) | LayerKind::Arrow(_) | LayerKind::Freedraw(_) => {
                let local = self.local_path_bounds();
                local + kurbo::Vec2::new(self.x, self.y)
            }
            _ => Rect::new(self.x, self.y, self.x + self.width, self.y + self.height),
        }
    }

    /// Center of the unrotated box; the rotation pivot.
    pub fn center(&self) -> Point {
        self.absolute_rect().center()
    }

    fn local_path_bounds(&self) -> Rect {
        self.path_bounds_of(self.points())
    }

    /// Local box of the path this layer would draw through `points`.
    pub(crate) fn path_bounds_of(&self, points: &[Point]) -> Rect {
        if self.is_linear() && self.roundness.is_some() && points.len() > 2 {
            let samples = curve_samples(points);
            return bounds_of_points(&samples).unwrap_or(Rect::ZERO);
        }
        bounds_of_points(points).unwrap_or(Rect::ZERO)
    }

    /// Axis-aligned bounds of the layer after rotation.
    pub fn bounds(&self) -> Rect {
        let rect = self.absolute_rect();
        let center = rect.center();
        let hull: Vec<Point> = match &self.kind {
            LayerKind::Line(_) | LayerKind::Arrow(_) | LayerKind::Freedraw(_) => {
                let origin = kurbo::Vec2::new(self.x, self.y);
                let local: Vec<Point> = if self.is_curved() {
                    curve_samples(self.points())
                } else {
                    self.points().to_vec()
                };
                local
                    .into_iter()
                    .map(|p| rotate_point(p + origin, center, self.angle))
                    .collect()
            }
            LayerKind::Ellipse => {
                let (a, b) = (rect.width() / 2.0, rect.height() / 2.0);
                let (sin, cos) = self.angle.sin_cos();
                let hw = ((a * cos).powi(2) + (b * sin).powi(2)).sqrt();
                let hh = ((a * sin).powi(2) + (b * cos).powi(2)).sqrt();
                vec![
                    Point::new(center.x - hw, center.y - hh),
                    Point::new(center.x + hw, center.y + hh),
                ]
            }
            LayerKind::Diamond => [
                Point::new(center.x, rect.y0),
                Point::new(rect.x1, center.y),
                Point::new(center.x, rect.y1),
                Point::new(rect.x0, center.y),
            ]
            .into_iter()
            .map(|p| rotate_point(p, center, self.angle))
            .collect(),
            _ => [
                Point::new(rect.x0, rect.y0),
                Point::new(rect.x1, rect.y0),
                Point::new(rect.x1, rect.y1),
                Point::new(rect.x0, rect.y1),
            ]
            .into_iter()
            .map(|p| rotate_point(p, center, self.angle))
            .collect(),
        };
        bounds_of_points(&hull).unwrap_or(rect)
    }
}

fn curve_samples(points: &[Point]) -> Vec<Point> {
    let mut samples = Vec::with_capacity(points.len() * 8);
    if let Some(first) = points.first() {
        samples.push(*first);
    }
    for segment in smooth_curve(points) {
        for i in 1..=8 {
            samples.push(segment.eval(i as f64 / 8.0));
        }
    }
    samples
}

/// Union of the rotated bounds of `layers`.
pub fn common_bounds<'a>(layers: impl IntoIterator<Item = &'a Layer>) -> Option<Rect> {
    layers
        .into_iter()
        .map(Layer::bounds)
        .reduce(|acc, rect| acc.union(rect))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_linear_size_from_points() {
        let line = Layer::line(20.0, 20.0, vec![Point::ZERO, Point::new(40.0, -10.0)]);
        assert!((line.width - 40.0).abs() < f64::EPSILON);
        assert!((line.height - 10.0).abs() < f64::EPSILON);
        let rect = line.absolute_rect();
        assert!((rect.y0 - 10.0).abs() < f64::EPSILON);
        assert!((rect.x1 - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bounds_of_rotated_rectangle() {
        let rect = Layer::rectangle(0.0, 0.0, 100.0, 50.0).with_angle(FRAC_PI_2);
        let bounds = rect.bounds();
        assert!((bounds.width() - 50.0).abs() < 1e-9);
        assert!((bounds.height() - 100.0).abs() < 1e-9);
        assert!((bounds.center().x - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_common_bounds() {
        let a = Layer::rectangle(0.0, 0.0, 10.0, 10.0);
        let b = Layer::ellipse(50.0, 20.0, 10.0, 30.0);
        let bounds = common_bounds([&a, &b]).unwrap();
        assert_eq!(bounds, Rect::new(0.0, 0.0, 60.0, 50.0));
        assert!(common_bounds(std::iter::empty()).is_none());
    }

    #[test]
    fn test_bindable_kinds() {
        assert!(Layer::rectangle(0.0, 0.0, 1.0, 1.0).is_bindable());
        assert!(Layer::frame(0.0, 0.0, 1.0, 1.0, None).is_bindable());
        assert!(!Layer::arrow(0.0, 0.0, vec![Point::ZERO]).is_bindable());

        let mut label = Layer::text(0.0, 0.0, 10.0, 10.0, "hi", 20.0);
        assert!(label.is_bindable());
        if let LayerKind::Text(data) = &mut label.kind {
            data.container_id = Some(Uuid::new_v4());
        }
        assert!(!label.is_bindable());
    }

    #[test]
    fn test_duplicate_gets_fresh_id() {
        let rect = Layer::rectangle(5.0, 5.0, 10.0, 10.0);
        let copy = rect.duplicate();
        assert_ne!(rect.id, copy.id);
        assert!((copy.x - 5.0).abs() < f64::EPSILON);
        assert_eq!(copy.seed, rect.seed);
    }

    #[test]
    fn test_seeds_differ() {
        let a = Layer::rectangle(0.0, 0.0, 1.0, 1.0);
        let b = Layer::rectangle(0.0, 0.0, 1.0, 1.0);
        assert_ne!(a.seed, b.seed);
    }

    #[test]
    fn test_transparency() {
        let rect = Layer::rectangle(0.0, 0.0, 1.0, 1.0);
        assert!(rect.is_transparent());
        assert!(!rect.with_background(Color::from_rgba8(255, 0, 0, 255)).is_transparent());
    }
}
