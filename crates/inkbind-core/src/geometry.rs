//! Analytic geometry kernel.
//!
//! Pure functions over kurbo primitives. Every function here tolerates
//! degenerate input (zero-length segments, parallel lines, tangent circles)
//! by returning `None` or an empty result instead of producing NaN.

use kurbo::{CubicBez, ParamCurve, Point, Rect, Vec2};
use std::f64::consts::PI;

/// Number of chords used to approximate a cubic segment's arc length.
pub const BEZIER_ARC_SAMPLES: usize = 20;

/// Rotate `point` about `center` by `angle` radians.
///
/// Positive angles turn clockwise on screen (y axis pointing down).
pub fn rotate_point(point: Point, center: Point, angle: f64) -> Point {
    let (sin, cos) = angle.sin_cos();
    let d = point - center;
    Point::new(
        center.x + d.x * cos - d.y * sin,
        center.y + d.x * sin + d.y * cos,
    )
}

/// Wrap an angle into `[0, 2π)`.
pub fn normalize_angle(angle: f64) -> f64 {
    let full = 2.0 * PI;
    let wrapped = angle.rem_euclid(full);
    // rem_euclid can round up to `full` for tiny negative inputs.
    if wrapped >= full { 0.0 } else { wrapped }
}

/// A normalized line `a·x + b·y + c = 0` with `a² + b² = 1`.
///
/// The orientation matters: [`Line::signed_distance`] is positive on the
/// left of the travel direction of [`Line::through`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Line {
    /// Build a line from raw coefficients, normalizing them.
    pub fn equation(a: f64, b: f64, c: f64) -> Option<Self> {
        let norm = a.hypot(b);
        if norm < f64::EPSILON {
            return None;
        }
        Some(Self {
            a: a / norm,
            b: b / norm,
            c: c / norm,
        })
    }

    /// The oriented line travelling from `from` towards `to`.
    pub fn through(from: Point, to: Point) -> Option<Self> {
        Self::equation(from.y - to.y, to.x - from.x, cross(from.to_vec2(), to.to_vec2()))
    }

    /// Signed distance of `point` from the line.
    pub fn signed_distance(&self, point: Point) -> f64 {
        self.a * point.x + self.b * point.y + self.c
    }

    /// Intersection with another line, `None` when parallel.
    pub fn intersect(&self, other: &Line) -> Option<Point> {
        let det = self.a * other.b - other.a * self.b;
        if det.abs() < f64::EPSILON {
            return None;
        }
        Some(Point::new(
            (self.b * other.c - other.b * self.c) / det,
            (other.a * self.c - self.a * other.c) / det,
        ))
    }
}

fn cross(u: Vec2, v: Vec2) -> f64 {
    u.x * v.y - u.y * v.x
}

/// Intersections of `line` with the circle of `radius` around `center`.
pub fn circle_line_intersections(center: Point, radius: f64, line: &Line) -> Vec<Point> {
    let d = line.signed_distance(center);
    if radius == 0.0 {
        return if d == 0.0 { vec![center] } else { Vec::new() };
    }
    if d.abs() > radius {
        return Vec::new();
    }
    let foot = Point::new(center.x - line.a * d, center.y - line.b * d);
    let h = (radius * radius - d * d).max(0.0).sqrt();
    if h == 0.0 {
        return vec![foot];
    }
    let dir = Vec2::new(-line.b, line.a);
    vec![foot + dir * h, foot - dir * h]
}

/// Intersections of `line` with the origin-centred, axis-aligned ellipse
/// with half axes `a` (x) and `b` (y).
///
/// Tangent lines and misses both yield an empty result.
pub fn ellipse_line_intersections(a: f64, b: f64, line: &Line) -> Vec<Point> {
    let (m, n, c) = (line.a, line.b, line.c);
    let squares = a * a * m * m + b * b * n * n;
    let discr = squares - c * c;
    if squares == 0.0 || discr <= 0.0 {
        return Vec::new();
    }
    let root = discr.sqrt();
    let xn = -a * a * m * c;
    let yn = -b * b * n * c;
    vec![
        Point::new((xn + a * b * n * root) / squares, (yn - a * b * m * root) / squares),
        Point::new((xn - a * b * n * root) / squares, (yn + a * b * m * root) / squares),
    ]
}

/// Intersection of `line` with the open segment `start..end`.
pub fn segment_line_intersection(start: Point, end: Point, line: &Line) -> Option<Point> {
    let d_start = line.signed_distance(start);
    let d_end = line.signed_distance(end);
    if d_start * d_end >= 0.0 {
        return None;
    }
    Line::through(start, end).and_then(|edge| line.intersect(&edge))
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    (point - (a + seg * t)).hypot()
}

/// Minimum distance from a point to a polyline.
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    match points {
        [] => f64::INFINITY,
        [single] => point.distance(*single),
        _ => points
            .windows(2)
            .map(|w| point_to_segment_dist(point, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Even-odd containment test against a closed polygon.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.y > point.y) != (pj.y > point.y)
            && point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Whether a polyline closes on itself: at least three points and the
/// ends within `threshold` of each other.
pub fn is_path_a_loop(points: &[Point], threshold: f64) -> bool {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() >= 3 => first.distance(*last) <= threshold,
        _ => false,
    }
}

/// Axis-aligned bounds of a point cloud.
pub fn bounds_of_points(points: &[Point]) -> Option<Rect> {
    let first = *points.first()?;
    Some(
        points
            .iter()
            .skip(1)
            .fold(Rect::from_points(first, first), |acc, p| acc.union_pt(*p)),
    )
}

/// Cumulative chord lengths along a cubic, sampled at
/// [`BEZIER_ARC_SAMPLES`] uniform parameter steps. The first entry is 0.
pub fn bezier_arc_lengths(curve: &CubicBez) -> Vec<f64> {
    let mut lengths = Vec::with_capacity(BEZIER_ARC_SAMPLES + 1);
    lengths.push(0.0);
    let mut prev = curve.p0;
    let mut total = 0.0;
    for i in 1..=BEZIER_ARC_SAMPLES {
        let p = curve.eval(i as f64 / BEZIER_ARC_SAMPLES as f64);
        total += prev.distance(p);
        lengths.push(total);
        prev = p;
    }
    lengths
}

/// Approximate arc length of a cubic.
pub fn bezier_length(curve: &CubicBez) -> f64 {
    bezier_arc_lengths(curve).last().copied().unwrap_or(0.0)
}

/// Map a fraction of the arc length (`interval` in `[0, 1]`) to the curve
/// parameter reaching that length.
pub fn map_interval_to_bezier_t(curve: &CubicBez, interval: f64) -> f64 {
    let lengths = bezier_arc_lengths(curve);
    let count = lengths.len() - 1;
    let total = lengths[count];
    if total <= 0.0 {
        return interval.clamp(0.0, 1.0);
    }
    let target = interval.clamp(0.0, 1.0) * total;
    // Largest sample whose length does not exceed the target.
    let index = lengths.partition_point(|&len| len <= target).saturating_sub(1);
    if lengths[index] == target || index >= count {
        return index as f64 / count as f64;
    }
    let span = lengths[index + 1] - lengths[index];
    let frac = if span > 0.0 {
        (target - lengths[index]) / span
    } else {
        0.0
    };
    (index as f64 + frac) / count as f64
}
