//! Binding engine.
//!
//! Keeps the two ends of lines and arrows attached to the shapes they
//! touch. A binding stores a `focus` (where on a scaled copy of the shape
//! the endpoint's tangent anchors) and a `gap` (standoff from the border);
//! whenever the shape moves or resizes the endpoint is projected again from
//! those two numbers.

use crate::config::ViewState;
use crate::geometry::{Line, circle_line_intersections, ellipse_line_intersections, rotate_point, segment_line_intersection};
use crate::hit_test::{HitCheck, distance_to_bindable_layer, hit_test_point_against_layer};
use crate::layer::{BoundLayer, BoundLayerKind, Layer, LayerId, LayerKind, PointBinding};
use crate::linear_editor::{PointMove, move_points, point_at_index_global, point_from_absolute};
use crate::mutation::LayerUpdate;
use crate::scene::Scene;
use crate::text::handle_bind_text_resize;
use kurbo::{Point, Size, Vec2};
use std::collections::{HashMap, HashSet};

/// Smallest binding border, in scene units.
pub const MIN_BINDING_GAP: f64 = 16.0;
/// Largest binding border, in scene units.
pub const MAX_BINDING_GAP: f64 = 32.0;

/// One end of a line or arrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingEdge {
    Start,
    End,
}

impl BindingEdge {
    fn point_index(self, layer: &Layer) -> usize {
        match self {
            BindingEdge::Start => 0,
            BindingEdge::End => layer.points().len().saturating_sub(1),
        }
    }

    fn adjacent_index(self, layer: &Layer) -> usize {
        match self {
            BindingEdge::Start => 1.min(layer.points().len().saturating_sub(1)),
            BindingEdge::End => layer.points().len().saturating_sub(2),
        }
    }

    fn opposite(self) -> Self {
        match self {
            BindingEdge::Start => BindingEdge::End,
            BindingEdge::End => BindingEdge::Start,
        }
    }

    fn binding(self, layer: &Layer) -> Option<PointBinding> {
        match self {
            BindingEdge::Start => layer.start_binding(),
            BindingEdge::End => layer.end_binding(),
        }
    }

    fn update(self, binding: Option<PointBinding>) -> LayerUpdate {
        match self {
            BindingEdge::Start => LayerUpdate {
                start_binding: Some(binding),
                ..Default::default()
            },
            BindingEdge::End => LayerUpdate {
                end_binding: Some(binding),
                ..Default::default()
            },
        }
    }
}

/// What to do with one edge in [`bind_or_unbind_linear_layer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindingTarget {
    /// Leave the edge as it is.
    #[default]
    Keep,
    /// Remove the edge's binding.
    Unbind,
    /// Bind the edge to this shape.
    Layer(LayerId),
}

impl From<Option<LayerId>> for BindingTarget {
    fn from(id: Option<LayerId>) -> Self {
        id.map_or(BindingTarget::Unbind, BindingTarget::Layer)
    }
}

/// Which edges of a line could bind to a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestedEdge {
    Start,
    End,
    Both,
}

/// A binding that would be made if the current gesture ended now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestedBinding {
    /// A shape a selected line or arrow would bind to.
    Layer(LayerId),
    /// A line or arrow that would bind to a selected shape.
    LinearEdge {
        linear_id: LayerId,
        edge: SuggestedEdge,
        bindable_id: LayerId,
    },
}

/// How the old/new id map of a duplication is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicationRoles {
    #[default]
    Default,
    /// Alt-drag: the copies stay in place and the originals move, so only
    /// bindings between duplicated layers are rewritten.
    DuplicatesServeAsOld,
}

/// Options for [`update_bound_layers`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundUpdateOptions<'a> {
    /// Size the changed shape is being resized to.
    pub new_size: Option<Size>,
    /// Layers moved by the same transform; their points are not re-projected.
    pub simultaneously_updated: &'a [LayerId],
}

/// Distance from a shape's border within which endpoints bind.
pub fn max_binding_gap(layer: &Layer, width: f64, height: f64) -> f64 {
    // Aligns diamonds with rectangles.
    let shape_ratio = if matches!(layer.kind, LayerKind::Diamond) {
        1.0 / std::f64::consts::SQRT_2
    } else {
        1.0
    };
    let smaller = shape_ratio * width.min(height);
    (0.25 * smaller).min(MAX_BINDING_GAP).max(MIN_BINDING_GAP)
}

pub fn is_binding_enabled(view: &ViewState) -> bool {
    view.config.binding_enabled
}

/// Whether `point` is outside `layer` but within its binding border.
pub fn binding_border_test(scene: &Scene, layer: &Layer, point: Point) -> bool {
    let threshold = max_binding_gap(layer, layer.width, layer.height);
    hit_test_point_against_layer(scene, layer, point, threshold, HitCheck::Outside, None)
}

/// Topmost unlocked bindable shape whose binding border contains `point`.
pub fn get_hovered_layer_for_binding(scene: &Scene, point: Point) -> Option<LayerId> {
    scene
        .non_deleted_layers()
        .rev()
        .find(|layer| layer.is_bindable() && !layer.locked && binding_border_test(scene, layer, point))
        .map(|layer| layer.id)
}

fn local_center(layer: &Layer) -> Point {
    Point::new(layer.x + layer.width / 2.0, layer.y + layer.height / 2.0)
}

/// Scene point to the shape's frame: centered and unrotated.
fn to_local(layer: &Layer, point: Point) -> Point {
    let center = local_center(layer);
    let p = rotate_point(point, center, -layer.angle);
    Point::new(p.x - center.x, p.y - center.y)
}

fn to_scene(layer: &Layer, local: Point) -> Point {
    let center = local_center(layer);
    rotate_point(local + center.to_vec2(), center, layer.angle)
}

fn corners(layer: &Layer, scale: f64) -> [Point; 4] {
    let hx = scale * layer.width / 2.0;
    let hy = scale * layer.height / 2.0;
    if matches!(layer.kind, LayerKind::Diamond) {
        [
            Point::new(0.0, hy),
            Point::new(hx, 0.0),
            Point::new(0.0, -hy),
            Point::new(-hx, 0.0),
        ]
    } else {
        [
            Point::new(hx, hy),
            Point::new(hx, -hy),
            Point::new(-hx, -hy),
            Point::new(-hx, hy),
        ]
    }
}

/// Focus ratio of the line from `a` (adjacent point) to `b` (edge point)
/// relative to `layer`. Zero for degenerate input.
pub fn determine_focus_distance(layer: &Layer, a: Point, b: Point) -> f64 {
    let Some(line) = Line::through(to_local(layer, a), to_local(layer, b)) else {
        return 0.0;
    };
    let hw = layer.width / 2.0;
    let hh = layer.height / 2.0;
    let q = layer.height / layer.width;
    let (n, m, c) = (line.a, line.b, line.c);
    let (nabs, mabs) = (n.abs(), m.abs());
    let focus = match layer.kind {
        LayerKind::Diamond => {
            if mabs < nabs {
                c / (nabs * hw)
            } else {
                c / (mabs * hh)
            }
        }
        LayerKind::Ellipse => c / (hw * (n * n + q * q * m * m).sqrt()),
        _ if layer.is_bindable() => c / (hw * (nabs + q * mabs)),
        _ => 0.0,
    };
    if focus.is_finite() { focus } else { 0.0 }
}

fn focus_point_for_rectangulars(layer: &Layer, focus: f64, point: Point) -> Point {
    let orientation = focus.signum();
    let mut max_distance = 0.0;
    let mut tangent = Point::ZERO;
    for corner in corners(layer, focus.abs()) {
        let Some(line) = Line::through(point, corner) else {
            continue;
        };
        let distance = orientation * line.c;
        if distance > max_distance {
            max_distance = distance;
            tangent = corner;
        }
    }
    tangent
}

fn focus_point_for_ellipse(layer: &Layer, focus: f64, point: Point) -> Point {
    let scale = focus.abs();
    let a = layer.width * scale / 2.0;
    let b = layer.height * scale / 2.0;
    let orientation = focus.signum();
    let px = point.x;
    // The tangent construction below divides by py.
    let py = if point.y == 0.0 { 0.0001 } else { point.y };
    let squares = px * px * b * b + py * py * a * a;
    if squares == 0.0 {
        return Point::ZERO;
    }
    // Tangent m·x + n·y + 1 = 0.
    let m = (-px * b * b + orientation * py * (squares - a * a * b * b).max(0.0).sqrt()) / squares;
    let mut n = (-m * px - 1.0) / py;
    if n == 0.0 {
        n = if n.is_sign_negative() { -0.01 } else { 0.01 };
    }
    let denom = n * n * b * b + m * m * a * a;
    if denom == 0.0 {
        return Point::ZERO;
    }
    let x = -(a * a * m) / denom;
    Point::new(x, (-m * x - 1.0) / n)
}

/// Scene position of the focus point of `layer` for `focus`, as seen from
/// `adjacent`.
pub fn determine_focus_point(layer: &Layer, focus: f64, adjacent: Point) -> Point {
    if focus == 0.0 {
        return layer.absolute_rect().center();
    }
    let rel = to_local(layer, adjacent);
    let point = match layer.kind {
        LayerKind::Ellipse => focus_point_for_ellipse(layer, focus, rel),
        _ => focus_point_for_rectangulars(layer, focus, rel),
    };
    if point.x.is_finite() && point.y.is_finite() {
        to_scene(layer, point)
    } else {
        layer.absolute_rect().center()
    }
}

/// The nearest and farthest intersections (from `a`) of the line through
/// `a` and `b` with the outline of `layer` grown by `gap`. Empty when the
/// line crosses the outline fewer than twice.
pub fn intersect_layer_with_line(layer: &Layer, a: Point, b: Point, gap: f64) -> Vec<Point> {
    let a_rel = to_local(layer, a);
    let Some(line) = Line::through(a_rel, to_local(layer, b)) else {
        return Vec::new();
    };
    let mut hits: Vec<Point> = match layer.kind {
        LayerKind::Ellipse => {
            ellipse_line_intersections(layer.width / 2.0 + gap, layer.height / 2.0 + gap, &line)
        }
        _ => {
            let corners = corners(layer, 1.0);
            let mut hits = Vec::new();
            for i in 0..corners.len() {
                let (start, end) = (corners[i], corners[(i + 1) % corners.len()]);
                let offset = outward_offset(start, end, gap);
                if let Some(p) = segment_line_intersection(start + offset, end + offset, &line) {
                    hits.push(p);
                }
            }
            for corner in corners {
                hits.extend(circle_line_intersections(corner, gap, &line));
            }
            hits
        }
    };
    if hits.len() < 2 {
        return Vec::new();
    }
    hits.sort_by(|p, q| p.distance(a_rel).total_cmp(&q.distance(a_rel)));
    let nearest = hits[0];
    let farthest = hits[hits.len() - 1];
    vec![to_scene(layer, nearest), to_scene(layer, farthest)]
}

/// Normal of an edge pointing away from the origin, scaled to `gap`.
fn outward_offset(start: Point, end: Point, gap: f64) -> Vec2 {
    let edge = end - start;
    let len = edge.hypot();
    if len == 0.0 {
        return Vec2::ZERO;
    }
    let mut normal = Vec2::new(-edge.y, edge.x) / len;
    if normal.dot(start.midpoint(end).to_vec2()) < 0.0 {
        normal = -normal;
    }
    normal * gap
}

/// Focus and gap binding `edge` of `linear` to `bindable` where it is now.
pub fn calculate_focus_and_gap(linear: &Layer, bindable: &Layer, edge: BindingEdge) -> (f64, f64) {
    let edge_point = point_at_index_global(linear, edge.point_index(linear));
    let adjacent_point = point_at_index_global(linear, edge.adjacent_index(linear));
    match (edge_point, adjacent_point) {
        (Some(edge_point), Some(adjacent_point)) => (
            determine_focus_distance(bindable, adjacent_point, edge_point),
            distance_to_bindable_layer(bindable, edge_point).max(1.0),
        ),
        _ => (0.0, 1.0),
    }
}

/// Bind `edge` of a line or arrow to a shape, recording the back-reference.
pub fn bind_linear_layer(scene: &mut Scene, linear_id: LayerId, bindable_id: LayerId, edge: BindingEdge) {
    let (Some(linear), Some(bindable)) = (
        scene.get_non_deleted_layer(linear_id),
        scene.get_non_deleted_layer(bindable_id),
    ) else {
        return;
    };
    if !linear.is_linear() || !bindable.is_bindable() {
        return;
    }
    let (focus, gap) = calculate_focus_and_gap(linear, bindable, edge);
    let binding = PointBinding {
        layer_id: bindable_id,
        focus,
        gap,
    };
    let already_listed = bindable.bound_layers.iter().any(|bound| bound.id == linear_id);
    let mut bound_layers = bindable.bound_layers.clone();

    log::debug!("Binding {:?} of {} to {}", edge, linear_id, bindable_id);
    scene.mutate(linear_id, edge.update(Some(binding)));
    if !already_listed {
        bound_layers.push(BoundLayer::arrow(linear_id));
        scene.mutate(bindable_id, LayerUpdate::bound_layers(bound_layers));
    }
}

/// Remove the binding of `edge`, returning the shape it pointed at.
fn unbind_linear_layer(scene: &mut Scene, linear_id: LayerId, edge: BindingEdge) -> Option<LayerId> {
    let binding = scene.get_layer(linear_id).and_then(|layer| edge.binding(layer))?;
    log::debug!("Unbinding {:?} of {} from {}", edge, linear_id, binding.layer_id);
    scene.mutate(linear_id, edge.update(None));
    Some(binding.layer_id)
}

/// A line with at most two points already bound to `bindable` at the other
/// edge: binding both of its ends to one shape would collapse it.
fn is_simple_and_already_bound_on_opposite_edge(
    linear: &Layer,
    bindable_id: LayerId,
    edge: BindingEdge,
) -> bool {
    let other = edge.opposite().binding(linear);
    is_linear_layer_simple_and_already_bound(linear, other.map(|b| b.layer_id), bindable_id)
}

pub fn is_linear_layer_simple_and_already_bound(
    linear: &Layer,
    already_bound_to: Option<LayerId>,
    bindable_id: LayerId,
) -> bool {
    already_bound_to == Some(bindable_id) && linear.points().len() < 3
}

fn bind_or_unbind_edge(
    scene: &mut Scene,
    linear_id: LayerId,
    target: BindingTarget,
    other: BindingTarget,
    edge: BindingEdge,
    bound_to: &mut HashSet<LayerId>,
    unbound_from: &mut HashSet<LayerId>,
) {
    match target {
        BindingTarget::Keep => {}
        BindingTarget::Unbind => {
            if let Some(id) = unbind_linear_layer(scene, linear_id, edge) {
                unbound_from.insert(id);
            }
        }
        BindingTarget::Layer(bindable_id) => {
            let Some(linear) = scene.get_non_deleted_layer(linear_id) else {
                return;
            };
            let simple = linear.points().len() < 3;
            let should_bind = match other {
                BindingTarget::Unbind => true,
                BindingTarget::Keep => {
                    !is_simple_and_already_bound_on_opposite_edge(linear, bindable_id, edge)
                }
                // Start edge wins ties on simple lines.
                BindingTarget::Layer(other_id) => {
                    edge == BindingEdge::Start || other_id != bindable_id || !simple
                }
            };
            if should_bind {
                bind_linear_layer(scene, linear_id, bindable_id, edge);
                bound_to.insert(bindable_id);
            }
        }
    }
}

/// Bind, unbind or keep each edge of a line or arrow.
///
/// Shapes the line was unbound from and not re-bound to lose their
/// back-reference.
pub fn bind_or_unbind_linear_layer(
    scene: &mut Scene,
    linear_id: LayerId,
    start: BindingTarget,
    end: BindingTarget,
) {
    let mut bound_to = HashSet::new();
    let mut unbound_from = HashSet::new();
    bind_or_unbind_edge(scene, linear_id, start, end, BindingEdge::Start, &mut bound_to, &mut unbound_from);
    bind_or_unbind_edge(scene, linear_id, end, start, BindingEdge::End, &mut bound_to, &mut unbound_from);

    let still_bound: Vec<LayerId> = scene
        .get_layer(linear_id)
        .map(|linear| {
            [linear.start_binding(), linear.end_binding()]
                .iter()
                .flatten()
                .map(|binding| binding.layer_id)
                .collect()
        })
        .unwrap_or_default();
    for id in unbound_from.difference(&bound_to) {
        // The other edge may still hold this shape on lines with 3+ points.
        if still_bound.contains(id) {
            continue;
        }
        let Some(layer) = scene.get_non_deleted_layer(*id) else {
            continue;
        };
        let bound_layers: Vec<BoundLayer> = layer
            .bound_layers
            .iter()
            .filter(|bound| bound.kind != BoundLayerKind::Arrow || bound.id != linear_id)
            .copied()
            .collect();
        scene.mutate(*id, LayerUpdate::bound_layers(bound_layers));
    }
}

fn edge_coords(layer: &Layer, edge: BindingEdge) -> Option<Point> {
    point_at_index_global(layer, edge.point_index(layer))
}

/// Shape each edge of `linear` could bind to where it is now.
fn eligible_targets(scene: &Scene, linear: &Layer) -> (Option<LayerId>, Option<LayerId>) {
    let hovered = |edge| edge_coords(linear, edge).and_then(|p| get_hovered_layer_for_binding(scene, p));
    (hovered(BindingEdge::Start), hovered(BindingEdge::End))
}

/// After moving layers, re-evaluate the bindings of moved lines and of
/// lines near moved shapes.
pub fn bind_or_unbind_selected_layers(scene: &mut Scene, selected: &[LayerId]) {
    for &id in selected {
        let Some(layer) = scene.get_non_deleted_layer(id) else {
            continue;
        };
        if layer.is_linear() {
            let (start, end) = eligible_targets(scene, layer);
            bind_or_unbind_linear_layer(scene, id, start.into(), end.into());
        } else if layer.is_bindable() {
            let candidates = eligible_linear_layers_for_bindable(scene, layer);
            for (linear_id, edge) in candidates {
                let (start, end) = match edge {
                    SuggestedEdge::Start => (BindingTarget::Layer(id), BindingTarget::Keep),
                    SuggestedEdge::End => (BindingTarget::Keep, BindingTarget::Layer(id)),
                    SuggestedEdge::Both => (BindingTarget::Layer(id), BindingTarget::Layer(id)),
                };
                bind_or_unbind_linear_layer(scene, linear_id, start, end);
            }
        }
    }
}

/// Bind a freshly drawn line: the start edge to the shape drawing started
/// on, the end edge to the shape under the pointer.
pub fn maybe_bind_linear_layer(scene: &mut Scene, linear_id: LayerId, view: &ViewState, pointer: Point) {
    if let Some(start_id) = view.start_bound_layer {
        bind_linear_layer(scene, linear_id, start_id, BindingEdge::Start);
    }
    let Some(hovered) = get_hovered_layer_for_binding(scene, pointer) else {
        return;
    };
    let Some(linear) = scene.get_non_deleted_layer(linear_id) else {
        return;
    };
    if !is_simple_and_already_bound_on_opposite_edge(linear, hovered, BindingEdge::End) {
        bind_linear_layer(scene, linear_id, hovered, BindingEdge::End);
    }
}

/// Drop both bindings of every line or arrow in `ids`.
pub fn unbind_linear_layers(scene: &mut Scene, ids: &[LayerId]) {
    for &id in ids {
        if scene.get_non_deleted_layer(id).is_some_and(Layer::is_linear) {
            bind_or_unbind_linear_layer(scene, id, BindingTarget::Unbind, BindingTarget::Unbind);
        }
    }
}

fn scale_gap(bindable: &Layer, binding: Option<PointBinding>, new_size: Option<Size>) -> Option<PointBinding> {
    let (binding, size) = match (binding, new_size) {
        (Some(binding), Some(size)) if binding.layer_id == bindable.id => (binding, size),
        _ => return binding,
    };
    let ratio = if size.width < size.height {
        size.width / bindable.width
    } else {
        size.height / bindable.height
    };
    let scaled = binding.gap * ratio;
    let gap = if scaled.is_finite() {
        scaled.min(max_binding_gap(bindable, size.width, size.height)).max(1.0)
    } else {
        binding.gap
    };
    Some(PointBinding { gap, ..binding })
}

fn update_bound_point(
    scene: &mut Scene,
    linear_id: LayerId,
    edge: BindingEdge,
    binding: Option<PointBinding>,
    changed_id: LayerId,
) {
    let Some(binding) = binding else {
        return;
    };
    let Some(linear) = scene.get_non_deleted_layer(linear_id) else {
        return;
    };
    // The far end only follows along on two-point lines.
    if binding.layer_id != changed_id && linear.points().len() > 2 {
        return;
    }
    let Some(bindable) = scene.get_non_deleted_layer(binding.layer_id) else {
        return;
    };
    let edge_index = edge.point_index(linear);
    let Some(adjacent) = point_at_index_global(linear, edge.adjacent_index(linear)) else {
        return;
    };
    let focus_point = determine_focus_point(bindable, binding.focus, adjacent);
    let new_edge = if binding.gap == 0.0 {
        focus_point
    } else {
        intersect_layer_with_line(bindable, adjacent, focus_point, binding.gap)
            .first()
            .copied()
            .unwrap_or(focus_point)
    };
    let local = point_from_absolute(linear, new_edge);
    move_points(
        scene,
        linear_id,
        &[PointMove {
            index: edge_index,
            point: local,
        }],
        edge.update(Some(binding)),
    );
}

/// Re-project every line bound to `changed_id` after it moved, resized or
/// rotated.
pub fn update_bound_layers(scene: &mut Scene, changed_id: LayerId, options: BoundUpdateOptions<'_>) {
    let Some(changed) = scene.get_non_deleted_layer(changed_id).cloned() else {
        return;
    };
    let linear_ids: Vec<LayerId> = changed
        .bound_layers
        .iter()
        .filter(|bound| bound.kind == BoundLayerKind::Arrow)
        .map(|bound| bound.id)
        .collect();

    for linear_id in linear_ids {
        let Some(linear) = scene.get_non_deleted_layer(linear_id) else {
            continue;
        };
        if !linear.is_linear() {
            continue;
        }
        let start = linear.start_binding();
        let end = linear.end_binding();
        // Stale back-reference.
        let points_here = start.is_some_and(|b| b.layer_id == changed_id)
            || end.is_some_and(|b| b.layer_id == changed_id);
        if !points_here {
            continue;
        }
        let start = scale_gap(&changed, start, options.new_size);
        let end = scale_gap(&changed, end, options.new_size);

        if options.simultaneously_updated.contains(&linear_id) {
            scene.mutate(
                linear_id,
                LayerUpdate {
                    start_binding: Some(start),
                    end_binding: Some(end),
                    ..Default::default()
                },
            );
            continue;
        }
        update_bound_point(scene, linear_id, BindingEdge::Start, start, changed_id);
        update_bound_point(scene, linear_id, BindingEdge::End, end, changed_id);
        handle_bind_text_resize(scene, linear_id, None, false);
    }
}

fn eligible_linear_layers_for_bindable(scene: &Scene, bindable: &Layer) -> Vec<(LayerId, SuggestedEdge)> {
    let eligible = |linear: &Layer, edge: BindingEdge| {
        edge.binding(linear).is_none()
            && !is_simple_and_already_bound_on_opposite_edge(linear, bindable.id, edge)
            && edge_coords(linear, edge).is_some_and(|p| binding_border_test(scene, bindable, p))
    };
    scene
        .non_deleted_layers()
        .filter(|layer| layer.is_linear())
        .filter_map(|linear| {
            let start = eligible(linear, BindingEdge::Start);
            let end = eligible(linear, BindingEdge::End);
            let edge = match (start, end) {
                (true, true) => SuggestedEdge::Both,
                (true, false) => SuggestedEdge::Start,
                (false, true) => SuggestedEdge::End,
                (false, false) => return None,
            };
            Some((linear.id, edge))
        })
        .collect()
}

/// Bindings to highlight while `selected` layers are being moved.
pub fn get_eligible_layers_for_binding(scene: &Scene, selected: &[LayerId]) -> Vec<SuggestedBinding> {
    let included: HashSet<LayerId> = selected.iter().copied().collect();
    let mut suggestions = Vec::new();
    for layer in selected.iter().filter_map(|id| scene.get_non_deleted_layer(*id)) {
        if layer.is_linear() {
            let (start, end) = eligible_targets(scene, layer);
            suggestions.extend(
                [start, end]
                    .into_iter()
                    .flatten()
                    .filter(|id| !included.contains(id))
                    .map(SuggestedBinding::Layer),
            );
        } else if layer.is_bindable() {
            suggestions.extend(
                eligible_linear_layers_for_bindable(scene, layer)
                    .into_iter()
                    .filter(|(linear_id, _)| !included.contains(linear_id))
                    .map(|(linear_id, edge)| SuggestedBinding::LinearEdge {
                        linear_id,
                        edge,
                        bindable_id: layer.id,
                    }),
            );
        }
    }
    suggestions
}

/// Shapes the line would bind to at `coords`, skipping the shape the
/// opposite edge of a simple line is bound to.
pub fn suggested_bindings_for_linear_at_coords(
    scene: &Scene,
    linear: &Layer,
    coords: &[Point],
    opposite: Option<LayerId>,
) -> Vec<LayerId> {
    coords
        .iter()
        .filter_map(|p| get_hovered_layer_for_binding(scene, *p))
        .filter(|id| !is_linear_layer_simple_and_already_bound(linear, opposite, *id))
        .collect()
}

fn rebind_after_duplication(binding: Option<PointBinding>, map: &HashMap<LayerId, LayerId>) -> Option<PointBinding> {
    binding.map(|b| PointBinding {
        layer_id: map.get(&b.layer_id).copied().unwrap_or(b.layer_id),
        ..b
    })
}

/// Whether `layer_id` points back at `target` through a point binding or as
/// its label.
fn references(scene: &Scene, layer_id: LayerId, target: LayerId) -> bool {
    scene.get_layer(layer_id).is_some_and(|layer| {
        layer.container_id() == Some(target)
            || [layer.start_binding(), layer.end_binding()]
                .iter()
                .flatten()
                .any(|binding| binding.layer_id == target)
    })
}

/// Point bindings and back-references of duplicated layers at each other's
/// copies instead of the originals.
///
/// `old_layers` are the originals as they were before duplication and
/// `old_to_new` maps each original id to its copy. Both originals and
/// copies must already be in `scene`.
///
/// With [`DuplicationRoles::DuplicatesServeAsOld`] the copies take the
/// originals' place, so lines bound to a duplicated shape but not copied
/// themselves are moved over to the copy.
pub fn fix_bindings_after_duplication(
    scene: &mut Scene,
    old_layers: &[Layer],
    old_to_new: &HashMap<LayerId, LayerId>,
    roles: DuplicationRoles,
) {
    let reverse = roles == DuplicationRoles::DuplicatesServeAsOld;
    let mut linear_ids: HashSet<LayerId> = HashSet::new();
    let mut bindable_ids: HashSet<LayerId> = HashSet::new();

    for old in old_layers {
        if !old.bound_layers.is_empty() {
            for bound in &old.bound_layers {
                match old_to_new.get(&bound.id) {
                    Some(copy) => {
                        linear_ids.insert(*copy);
                    }
                    None if reverse => {
                        linear_ids.insert(bound.id);
                    }
                    None => {}
                }
            }
            if let Some(copy) = old_to_new.get(&old.id) {
                bindable_ids.insert(*copy);
                if reverse {
                    bindable_ids.insert(old.id);
                }
            }
        }
        if old.is_linear() {
            let bindings = [old.start_binding(), old.end_binding()];
            bindable_ids.extend(bindings.iter().flatten().map(|binding| binding.layer_id));
            if bindings.iter().any(Option::is_some) {
                if let Some(copy) = old_to_new.get(&old.id) {
                    linear_ids.insert(*copy);
                }
            }
        }
    }

    for id in &linear_ids {
        let Some(layer) = scene.get_layer(*id) else {
            continue;
        };
        if !layer.is_linear() {
            continue;
        }
        let update = LayerUpdate {
            start_binding: Some(rebind_after_duplication(layer.start_binding(), old_to_new)),
            end_binding: Some(rebind_after_duplication(layer.end_binding(), old_to_new)),
            ..Default::default()
        };
        scene.mutate(*id, update);
    }

    // Copied labels follow their container when it was copied too.
    for old in old_layers {
        let (Some(copy), Some(container)) = (old_to_new.get(&old.id), old.container_id()) else {
            continue;
        };
        if let Some(container_copy) = old_to_new.get(&container) {
            scene.mutate(
                *copy,
                LayerUpdate {
                    container_id: Some(Some(*container_copy)),
                    ..Default::default()
                },
            );
        }
    }

    // Back-references are rebuilt from the bindings above: an entry stays
    // only while the layer it names still points here.
    let copies: HashSet<LayerId> = old_to_new.values().copied().collect();
    for id in &bindable_ids {
        let Some(layer) = scene.get_layer(*id) else {
            continue;
        };
        let mut bound_layers: Vec<BoundLayer> = Vec::with_capacity(layer.bound_layers.len());
        for bound in &layer.bound_layers {
            let candidates = if copies.contains(id) {
                [old_to_new.get(&bound.id).copied(), Some(bound.id)]
            } else {
                [Some(bound.id), old_to_new.get(&bound.id).copied()]
            };
            for candidate in candidates.into_iter().flatten() {
                if references(scene, candidate, *id) && !bound_layers.iter().any(|b| b.id == candidate) {
                    bound_layers.push(BoundLayer {
                        id: candidate,
                        kind: bound.kind,
                    });
                }
            }
        }
        scene.mutate(*id, LayerUpdate::bound_layers(bound_layers));
    }
}

/// Strip every reference to `deleted` layers from the surviving layers.
pub fn fix_bindings_after_deletion(scene: &mut Scene, deleted: &[LayerId]) {
    let deleted: HashSet<LayerId> = deleted.iter().copied().collect();
    let survivors: Vec<LayerId> = scene
        .non_deleted_layers()
        .filter(|layer| !deleted.contains(&layer.id))
        .map(|layer| layer.id)
        .collect();

    for id in survivors {
        let Some(layer) = scene.get_layer(id) else {
            continue;
        };
        let mut update = LayerUpdate::default();
        if layer.bound_layers.iter().any(|bound| deleted.contains(&bound.id)) {
            update.bound_layers = Some(
                layer
                    .bound_layers
                    .iter()
                    .filter(|bound| !deleted.contains(&bound.id))
                    .copied()
                    .collect(),
            );
        }
        if layer.start_binding().is_some_and(|b| deleted.contains(&b.layer_id)) {
            update.start_binding = Some(None);
        }
        if layer.end_binding().is_some_and(|b| deleted.contains(&b.layer_id)) {
            update.end_binding = Some(None);
        }
        if layer.container_id().is_some_and(|c| deleted.contains(&c)) {
            update.container_id = Some(None);
        }
        if !update.is_empty() {
            scene.mutate(id, update);
        }
    }
}
