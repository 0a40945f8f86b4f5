//! Shape outlines consumed by hit testing and the point editor.
//!
//! An [`Outline`] is the decomposed path of a layer in its local,
//! unrotated frame (relative to the layer's `(x, y)`). Producing it is the
//! job of an [`OutlineProvider`]; the [`OutlineCache`] keeps one outline per
//! layer until a shape-affecting field changes.

use crate::layer::{Layer, LayerId, LayerKind};
use kurbo::{BezPath, CubicBez, PathEl, Point, Shape};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Tolerance used when flattening ellipses into cubic segments.
const ELLIPSE_TOLERANCE: f64 = 0.1;

/// One drawing operation of an outline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathOp {
    Move(Point),
    LineTo(Point),
    /// Cubic curve: two control points and the end point.
    BCurveTo(Point, Point, Point),
}

impl PathOp {
    /// End point of the operation.
    pub fn end(&self) -> Point {
        match *self {
            PathOp::Move(p) | PathOp::LineTo(p) | PathOp::BCurveTo(_, _, p) => p,
        }
    }
}

/// The computed outline of a layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Outline {
    /// Each entry is one stroke pass over the shape.
    pub subshapes: Vec<Vec<PathOp>>,
    /// Closed polygon of the filled area, if the layer is filled.
    pub fill: Option<Vec<Point>>,
}

impl Outline {
    /// Convert the first pass to a kurbo path.
    pub fn to_bez_path(&self) -> BezPath {
        let mut path = BezPath::new();
        for op in self.subshapes.first().into_iter().flatten() {
            match *op {
                PathOp::Move(p) => path.move_to(p),
                PathOp::LineTo(p) => path.line_to(p),
                PathOp::BCurveTo(c1, c2, p) => path.curve_to(c1, c2, p),
            }
        }
        path
    }

    /// Cubic segments of all passes, with their start points resolved.
    pub fn curves(&self) -> Vec<CubicBez> {
        let mut curves = Vec::new();
        for ops in &self.subshapes {
            let mut current = Point::ZERO;
            for op in ops {
                if let PathOp::BCurveTo(c1, c2, p) = *op {
                    curves.push(CubicBez::new(current, c1, c2, p));
                }
                current = op.end();
            }
        }
        curves
    }
}

/// Produces outlines for layers.
pub trait OutlineProvider {
    /// Outline of `layer` in its local frame, or `None` if it has no shape.
    fn outline(&self, layer: &Layer) -> Option<Outline>;
}

/// Smooth spline through `points` as a sequence of cubic segments.
///
/// Catmull-Rom with tension 0.5, the curve used for rounded lines.
pub fn smooth_curve(points: &[Point]) -> Vec<CubicBez> {
    if points.len() < 2 {
        return Vec::new();
    }
    let tension = 0.5;
    let last = points.len() - 1;
    (0..last)
        .map(|i| {
            let p0 = points[i.saturating_sub(1)];
            let p1 = points[i];
            let p2 = points[i + 1];
            let p3 = points[(i + 2).min(last)];

            let t1 = (p2 - p0) * tension;
            let t2 = (p3 - p1) * tension;
            CubicBez::new(p1, p1 + t1 / 3.0, p2 - t2 / 3.0, p2)
        })
        .collect()
}

/// Exact outlines with a single pass and no hand-drawn jitter.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreciseOutlineProvider;

impl PreciseOutlineProvider {
    fn polygon(points: &[Point]) -> Vec<PathOp> {
        let mut ops = Vec::with_capacity(points.len() + 1);
        if let Some((first, rest)) = points.split_first() {
            ops.push(PathOp::Move(*first));
            ops.extend(rest.iter().map(|p| PathOp::LineTo(*p)));
            ops.push(PathOp::LineTo(*first));
        }
        ops
    }

    fn ellipse(width: f64, height: f64) -> Vec<PathOp> {
        let center = Point::new(width / 2.0, height / 2.0);
        let ellipse = kurbo::Ellipse::new(center, (width.abs() / 2.0, height.abs() / 2.0), 0.0);
        let mut ops = Vec::new();
        let mut current = Point::ZERO;
        for el in ellipse.path_elements(ELLIPSE_TOLERANCE) {
            match el {
                PathEl::MoveTo(p) => {
                    ops.push(PathOp::Move(p));
                    current = p;
                }
                PathEl::LineTo(p) => {
                    ops.push(PathOp::LineTo(p));
                    current = p;
                }
                PathEl::QuadTo(q, p) => {
                    let c1 = current + (q - current) * (2.0 / 3.0);
                    let c2 = p + (q - p) * (2.0 / 3.0);
                    ops.push(PathOp::BCurveTo(c1, c2, p));
                    current = p;
                }
                PathEl::CurveTo(c1, c2, p) => {
                    ops.push(PathOp::BCurveTo(c1, c2, p));
                    current = p;
                }
                PathEl::ClosePath => {}
            }
        }
        ops
    }
}

impl OutlineProvider for PreciseOutlineProvider {
    fn outline(&self, layer: &Layer) -> Option<Outline> {
        let (w, h) = (layer.width, layer.height);
        let corners = [
            Point::new(0.0, 0.0),
            Point::new(w, 0.0),
            Point::new(w, h),
            Point::new(0.0, h),
        ];
        let filled = !layer.is_transparent();
        match &layer.kind {
            LayerKind::Selection => None,
            LayerKind::Rectangle | LayerKind::Text(_) | LayerKind::Image(_) | LayerKind::Frame(_) => {
                Some(Outline {
                    subshapes: vec![Self::polygon(&corners)],
                    fill: filled.then(|| corners.to_vec()),
                })
            }
            LayerKind::Diamond => {
                let vertices = [
                    Point::new(w / 2.0, 0.0),
                    Point::new(w, h / 2.0),
                    Point::new(w / 2.0, h),
                    Point::new(0.0, h / 2.0),
                ];
                Some(Outline {
                    subshapes: vec![Self::polygon(&vertices)],
                    fill: filled.then(|| vertices.to_vec()),
                })
            }
            LayerKind::Ellipse => Some(Outline {
                subshapes: vec![Self::ellipse(w, h)],
                fill: None,
            }),
            LayerKind::Line(data) | LayerKind::Arrow(data) => {
                let points = &data.points;
                let first = *points.first()?;
                let mut ops = vec![PathOp::Move(first)];
                if layer.is_curved() {
                    ops.extend(
                        smooth_curve(points)
                            .into_iter()
                            .map(|c| PathOp::BCurveTo(c.p1, c.p2, c.p3)),
                    );
                } else {
                    ops.extend(points.iter().skip(1).map(|p| PathOp::LineTo(*p)));
                }
                let closed = points.len() > 2 && points.last() == points.first();
                Some(Outline {
                    subshapes: vec![ops],
                    fill: (filled && closed).then(|| points.clone()),
                })
            }
            LayerKind::Freedraw(data) => {
                let first = *data.points.first()?;
                let mut ops = vec![PathOp::Move(first)];
                ops.extend(data.points.iter().skip(1).map(|p| PathOp::LineTo(*p)));
                Some(Outline {
                    subshapes: vec![ops],
                    fill: filled.then(|| data.points.clone()),
                })
            }
        }
    }
}

/// Outlines keyed by layer id, regenerated on demand after invalidation.
#[derive(Default)]
pub struct OutlineCache {
    entries: RefCell<HashMap<LayerId, Rc<Outline>>>,
}

impl OutlineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached outline of `layer`, generating it with `provider` if missing.
    pub fn get_or_generate(
        &self,
        layer: &Layer,
        provider: &dyn OutlineProvider,
    ) -> Option<Rc<Outline>> {
        if let Some(outline) = self.entries.borrow().get(&layer.id) {
            return Some(Rc::clone(outline));
        }
        let outline = Rc::new(provider.outline(layer)?);
        self.entries
            .borrow_mut()
            .insert(layer.id, Rc::clone(&outline));
        Some(outline)
    }

    /// Drop the outline of a layer whose shape changed.
    pub fn invalidate(&self, id: LayerId) {
        self.entries.borrow_mut().remove(&id);
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.entries.borrow().contains_key(&id)
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl std::fmt::Debug for OutlineCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutlineCache")
            .field("len", &self.entries.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Roundness;

    #[test]
    fn test_smooth_curve_passes_through_points() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(50.0, 50.0),
            Point::new(100.0, 0.0),
        ];
        let curves = smooth_curve(&points);
        assert_eq!(curves.len(), 2);
        assert_eq!(curves[0].p3, points[1]);
        assert_eq!(curves[1].p0, points[1]);
        assert_eq!(curves[1].p3, points[2]);
        assert!(smooth_curve(&points[..1]).is_empty());
    }

    #[test]
    fn test_rectangle_outline_is_closed() {
        let rect = Layer::rectangle(10.0, 10.0, 20.0, 30.0);
        let outline = PreciseOutlineProvider.outline(&rect).unwrap();
        let ops = &outline.subshapes[0];
        assert_eq!(ops.len(), 5);
        assert_eq!(ops[0].end(), ops[4].end());
        assert!(outline.fill.is_none());
    }

    #[test]
    fn test_curved_line_uses_bezier_ops() {
        let line = Layer::line(
            0.0,
            0.0,
            vec![Point::ZERO, Point::new(50.0, 50.0), Point::new(100.0, 0.0)],
        )
        .with_roundness(Roundness::Proportional);
        let outline = PreciseOutlineProvider.outline(&line).unwrap();
        assert_eq!(outline.curves().len(), 2);
    }

    #[test]
    fn test_ellipse_outline_bounds() {
        let ellipse = Layer::ellipse(0.0, 0.0, 40.0, 20.0);
        let outline = PreciseOutlineProvider.outline(&ellipse).unwrap();
        let bbox = outline.to_bez_path().bounding_box();
        assert!((bbox.width() - 40.0).abs() < 0.5);
        assert!((bbox.height() - 20.0).abs() < 0.5);
    }

    #[test]
    fn test_cache_invalidation() {
        let rect = Layer::rectangle(0.0, 0.0, 10.0, 10.0);
        let cache = OutlineCache::new();
        assert!(cache.get_or_generate(&rect, &PreciseOutlineProvider).is_some());
        assert!(cache.contains(rect.id));
        cache.invalidate(rect.id);
        assert!(!cache.contains(rect.id));
    }
}
