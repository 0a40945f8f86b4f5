//! Point editor for lines and arrows.
//!
//! Points are stored relative to the layer's `(x, y)` with the first one
//! pinned at the origin. Every edit here keeps that invariant by shifting
//! the layer instead of the first point, so the drawn path never jumps.

use crate::binding::{
    BindingTarget, bind_or_unbind_linear_layer, get_hovered_layer_for_binding, is_binding_enabled,
    suggested_bindings_for_linear_at_coords,
};
use crate::config::ViewState;
use crate::error::{EngineError, EngineResult};
use crate::geometry::{bezier_length, is_path_a_loop, map_interval_to_bezier_t, rotate_point};
use crate::layer::{Layer, LayerId};
use crate::mutation::LayerUpdate;
use crate::outline::smooth_curve;
use crate::scene::Scene;
use crate::text::handle_bind_text_resize;
use crate::transform::SHIFT_LOCKING_ANGLE;
use kurbo::{ParamCurve, Point, Vec2};
use std::f64::consts::FRAC_PI_2;

/// Move of one point to a new position in the layer's local frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointMove {
    pub index: usize,
    pub point: Point,
}

/// Keyboard modifiers held during a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointerModifiers {
    /// Lock angles / toggle point selection.
    pub shift: bool,
    /// Add points while editing.
    pub alt: bool,
    /// Bypass grid snapping.
    pub ctrl_or_cmd: bool,
}

/// Scene position of a local point of a linear layer.
pub fn point_global(layer: &Layer, point: Point) -> Point {
    rotate_point(
        Point::new(layer.x + point.x, layer.y + point.y),
        layer.center(),
        layer.angle,
    )
}

/// Scene positions of all points of a linear layer.
pub fn points_global(layer: &Layer) -> Vec<Point> {
    layer.points().iter().map(|p| point_global(layer, *p)).collect()
}

pub fn point_at_index_global(layer: &Layer, index: usize) -> Option<Point> {
    layer.points().get(index).map(|p| point_global(layer, *p))
}

/// Inverse of [`point_global`].
pub fn point_from_absolute(layer: &Layer, point: Point) -> Point {
    let p = rotate_point(point, layer.center(), -layer.angle);
    Point::new(p.x - layer.x, p.y - layer.y)
}

/// Snap a scene point to the grid, if there is one.
pub fn grid_point(point: Point, grid_size: Option<f64>) -> Point {
    match grid_size {
        Some(grid) if grid > 0.0 => Point::new(
            (point.x / grid).round() * grid,
            (point.y / grid).round() * grid,
        ),
        _ => point,
    }
}

/// Local point of `layer` under the scene point, grid-snapped.
pub fn create_point_at(layer: &Layer, scene_point: Point, grid_size: Option<f64>) -> Point {
    point_from_absolute(layer, grid_point(scene_point, grid_size))
}

/// Snap the vector from `origin` to `target` to the nearest multiple of
/// [`SHIFT_LOCKING_ANGLE`].
pub fn locked_linear_cursor_align_size(origin: Point, target: Point) -> Vec2 {
    let mut width = target.x - origin.x;
    let mut height = target.y - origin.y;
    if width == 0.0 && height == 0.0 {
        return Vec2::ZERO;
    }
    let locked = ((height / width).atan() / SHIFT_LOCKING_ANGLE).round() * SHIFT_LOCKING_ANGLE;
    if locked == 0.0 {
        height = 0.0;
    } else if (locked.abs() - FRAC_PI_2).abs() < 1e-9 {
        width = 0.0;
    } else {
        height = width * locked.tan();
    }
    Vec2::new(width, height)
}

fn shift_locked_delta(layer: &Layer, reference: Point, scene_point: Point, grid_size: Option<f64>) -> Vec2 {
    let reference = point_global(layer, reference);
    let target = grid_point(scene_point, grid_size);
    let size = locked_linear_cursor_align_size(reference, target);
    rotate_point(size.to_point(), Point::ZERO, -layer.angle).to_vec2()
}

/// Write `next_points`, moving the layer by `offset` (rotated about the
/// change in path center) so untouched points stay put on screen.
fn update_points(scene: &mut Scene, id: LayerId, next_points: Vec<Point>, offset: Vec2, extra: LayerUpdate) {
    let Some(layer) = scene.get_layer(id) else {
        return;
    };
    let prev_center = layer.path_bounds_of(layer.points()).center();
    let next_center = layer.path_bounds_of(&next_points).center();
    let pivot = prev_center - next_center.to_vec2();
    let rotated = rotate_point(offset.to_point(), pivot, layer.angle);
    let update = LayerUpdate {
        points: Some(next_points),
        x: Some(layer.x + rotated.x),
        y: Some(layer.y + rotated.y),
        ..extra
    };
    scene.mutate(id, update);
}

/// Move points to new local positions.
///
/// Moving the first point shifts every other point the opposite way and
/// moves the layer instead, keeping the first point at the origin.
pub fn move_points(scene: &mut Scene, id: LayerId, targets: &[PointMove], extra: LayerUpdate) {
    let Some(layer) = scene.get_layer(id) else {
        return;
    };
    let points = layer.points();
    let origin_move = targets.iter().find(|t| t.index == 0);
    let offset = origin_move
        .and_then(|t| points.first().map(|first| t.point.to_vec2() + first.to_vec2()))
        .unwrap_or(Vec2::ZERO);

    let next_points: Vec<Point> = points
        .iter()
        .enumerate()
        .map(|(index, point)| match targets.iter().find(|t| t.index == index) {
            Some(_) if origin_move.is_some() => *point,
            Some(target) => {
                let delta = target.point - points[index];
                *point + delta - offset
            }
            None => *point - offset,
        })
        .collect();
    update_points(scene, id, next_points, offset, extra);
}

/// Append points in the layer's local frame.
pub fn add_points(scene: &mut Scene, id: LayerId, new_points: &[Point]) {
    let Some(layer) = scene.get_layer(id) else {
        return;
    };
    let mut next_points = layer.points().to_vec();
    next_points.extend_from_slice(new_points);
    update_points(scene, id, next_points, Vec2::ZERO, LayerUpdate::default());
}

/// Remove points by index. If the first point goes, the next surviving one
/// becomes the new origin.
pub fn delete_points(scene: &mut Scene, id: LayerId, indices: &[usize]) {
    let Some(layer) = scene.get_layer(id) else {
        return;
    };
    let points = layer.points();
    let offset = if indices.contains(&0) {
        points
            .iter()
            .enumerate()
            .find(|(index, _)| !indices.contains(index))
            .map_or(Vec2::ZERO, |(_, p)| p.to_vec2())
    } else {
        Vec2::ZERO
    };
    let mut next_points = Vec::with_capacity(points.len());
    for (index, point) in points.iter().enumerate() {
        if indices.contains(&index) {
            continue;
        }
        next_points.push(if next_points.is_empty() {
            Point::ZERO
        } else {
            *point - offset
        });
    }
    update_points(scene, id, next_points, offset, LayerUpdate::default());
}

/// Shift a linear layer so its first point sits at the origin.
pub fn normalize_points(scene: &mut Scene, id: LayerId) {
    let Some(layer) = scene.get_layer(id) else {
        return;
    };
    let Some(&first) = layer.points().first() else {
        return;
    };
    if first == Point::ZERO {
        return;
    }
    let offset = first.to_vec2();
    let points = layer.points().iter().map(|p| *p - offset).collect();
    let update = LayerUpdate {
        points: Some(points),
        x: Some(layer.x + offset.x),
        y: Some(layer.y + offset.y),
        ..Default::default()
    };
    scene.mutate(id, update);
}

/// Cubic segment ending at point `end_index` of a curved line.
fn curve_ending_at(layer: &Layer, end_index: usize) -> Option<kurbo::CubicBez> {
    if !layer.is_curved() || end_index == 0 {
        return None;
    }
    smooth_curve(layer.points()).get(end_index - 1).copied()
}

/// Scene position halfway along the segment from `start` to `end` (scene
/// positions of points `end_index - 1` and `end_index`), following the
/// curve on rounded lines.
pub fn segment_mid_point(layer: &Layer, start: Point, end: Point, end_index: usize) -> Point {
    match curve_ending_at(layer, end_index) {
        Some(curve) => {
            let t = map_interval_to_bezier_t(&curve, 0.5);
            point_global(layer, curve.eval(t))
        }
        None => start.midpoint(end),
    }
}

/// Drawn length of the segment ending at point `end_index`.
pub fn segment_length(layer: &Layer, end_index: usize) -> f64 {
    if let Some(curve) = curve_ending_at(layer, end_index) {
        return bezier_length(&curve);
    }
    let points = layer.points();
    match (end_index.checked_sub(1).and_then(|i| points.get(i)), points.get(end_index)) {
        (Some(start), Some(end)) => start.distance(*end),
        _ => 0.0,
    }
}

/// Segments shorter on screen than four handles get no midpoint handle.
pub fn is_segment_too_short(layer: &Layer, end_index: usize, zoom: f64, handle_size: f64) -> bool {
    segment_length(layer, end_index) * zoom < handle_size * 4.0
}

/// Topmost point handle under `point`. Later points win ties.
pub fn point_index_under_cursor(layer: &Layer, point: Point, zoom: f64, handle_size: f64) -> Option<usize> {
    points_global(layer)
        .iter()
        .rposition(|p| p.distance(point) * zoom < handle_size + 1.0)
}

/// Sorted, deduplicated selection; `None` when empty.
pub fn normalize_selected_points(indices: impl IntoIterator<Item = usize>) -> Option<Vec<usize>> {
    let mut indices: Vec<usize> = indices.into_iter().collect();
    indices.sort_unstable();
    indices.dedup();
    (!indices.is_empty()).then_some(indices)
}

/// Midpoint handles, one per segment (`None` for segments too short to
/// show one), cached per layer version and zoom.
#[derive(Debug, Clone, Default)]
struct MidpointCache {
    key: Option<(u32, f64)>,
    points: Vec<Option<Point>>,
}

/// Segment midpoint grabbed by the last pointer-down.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SegmentMidpointState {
    pub value: Option<Point>,
    /// Index the new point gets when inserted.
    pub index: Option<usize>,
    pub added: bool,
}

/// State captured on pointer-down.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointerDownState {
    pub prev_selected_points: Option<Vec<usize>>,
    pub last_clicked_point: Option<usize>,
    pub last_clicked_is_end_point: bool,
    pub origin: Option<Point>,
    pub segment_midpoint: SegmentMidpointState,
}

/// Outcome of [`LinearElementEditor::handle_pointer_down`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointerDownResult {
    /// A point handle or midpoint was hit, so the layer stays selected.
    pub hit_layer: bool,
    pub did_add_point: bool,
}

/// Interactive editing session of one line or arrow.
#[derive(Debug, Clone)]
pub struct LinearElementEditor {
    pub layer_id: LayerId,
    pub selected_points: Option<Vec<usize>>,
    pub pointer_down_state: PointerDownState,
    pub is_dragging: bool,
    /// Trailing point following the pointer while alt is held.
    pub last_uncommitted_point: Option<Point>,
    pub pointer_offset: Vec2,
    pub start_binding_target: BindingTarget,
    pub end_binding_target: BindingTarget,
    pub hover_point_index: Option<usize>,
    pub segment_mid_point_hovered: Option<Point>,
    /// Shapes highlighted as binding targets during a drag.
    pub suggested_bindings: Vec<LayerId>,
    midpoints: MidpointCache,
}

impl LinearElementEditor {
    /// Start editing a line or arrow, normalizing its points.
    pub fn new(scene: &mut Scene, layer_id: LayerId) -> EngineResult<Self> {
        let layer = scene
            .get_non_deleted_layer(layer_id)
            .ok_or(EngineError::LayerNotFound(layer_id))?;
        if !layer.is_linear() {
            return Err(EngineError::NotLinear(layer_id));
        }
        if layer.points().first().is_some_and(|p| *p != Point::ZERO) {
            log::warn!("Linear layer {} is not normalized", layer_id);
            normalize_points(scene, layer_id);
        }
        Ok(Self {
            layer_id,
            selected_points: None,
            pointer_down_state: PointerDownState::default(),
            is_dragging: false,
            last_uncommitted_point: None,
            pointer_offset: Vec2::ZERO,
            start_binding_target: BindingTarget::Keep,
            end_binding_target: BindingTarget::Keep,
            hover_point_index: None,
            segment_mid_point_hovered: None,
            suggested_bindings: Vec::new(),
            midpoints: MidpointCache::default(),
        })
    }

    fn is_editing(&self, view: &ViewState) -> bool {
        view.editing_linear_layer == Some(self.layer_id)
    }

    fn grid(view: &ViewState, modifiers: PointerModifiers) -> Option<f64> {
        if modifiers.ctrl_or_cmd {
            None
        } else {
            view.config.grid_size
        }
    }

    /// Midpoint handles of the segments. Outside point editing only
    /// two-point lines and labelled lines show them.
    pub fn editor_midpoints(&mut self, scene: &Scene, view: &ViewState) -> Vec<Option<Point>> {
        let Some(layer) = scene.get_non_deleted_layer(self.layer_id) else {
            return Vec::new();
        };
        if !self.is_editing(view) && layer.points().len() > 2 && layer.bound_text_id().is_none() {
            return Vec::new();
        }
        let key = (layer.version, view.zoom);
        if self.midpoints.key != Some(key) {
            let globals = points_global(layer);
            let handle = view.config.point_handle_size;
            self.midpoints.points = (1..globals.len())
                .map(|end| {
                    (!is_segment_too_short(layer, end, view.zoom, handle))
                        .then(|| segment_mid_point(layer, globals[end - 1], globals[end], end))
                })
                .collect();
            self.midpoints.key = Some(key);
        }
        self.midpoints.points.clone()
    }

    /// Midpoint handle under `point`, if no point handle is.
    pub fn segment_midpoint_hit_coords(&mut self, scene: &Scene, view: &ViewState, point: Point) -> Option<Point> {
        let layer = scene.get_non_deleted_layer(self.layer_id)?;
        let handle = view.config.point_handle_size;
        if point_index_under_cursor(layer, point, view.zoom, handle).is_some() {
            return None;
        }
        if layer.points().len() >= 3 && !self.is_editing(view) {
            return None;
        }
        let threshold = handle / view.zoom;
        if let Some(hovered) = self.segment_mid_point_hovered {
            if hovered.distance(point) <= threshold {
                return Some(hovered);
            }
        }
        self.editor_midpoints(scene, view)
            .into_iter()
            .flatten()
            .find(|mid| mid.distance(point) <= threshold)
    }

    /// Index a point inserted at `midpoint` would get.
    fn segment_midpoint_index(&mut self, scene: &Scene, view: &ViewState, midpoint: Point) -> Option<usize> {
        self.editor_midpoints(scene, view)
            .iter()
            .position(|mid| *mid == Some(midpoint))
            .map(|i| i + 1)
    }

    /// Track which handle the pointer is over.
    pub fn handle_pointer_hover(&mut self, scene: &Scene, view: &ViewState, point: Point) {
        let Some(layer) = scene.get_non_deleted_layer(self.layer_id) else {
            return;
        };
        self.hover_point_index = point_index_under_cursor(layer, point, view.zoom, view.config.point_handle_size);
        self.segment_mid_point_hovered = self.segment_midpoint_hit_coords(scene, view, point);
    }

    pub fn handle_pointer_down(
        &mut self,
        scene: &mut Scene,
        view: &ViewState,
        point: Point,
        modifiers: PointerModifiers,
    ) -> PointerDownResult {
        let mut result = PointerDownResult::default();
        if scene.get_non_deleted_layer(self.layer_id).is_none() {
            return result;
        }
        let midpoint = self.segment_midpoint_hit_coords(scene, view, point);
        let midpoint_index = midpoint.and_then(|mid| self.segment_midpoint_index(scene, view, mid));
        let midpoint_state = SegmentMidpointState {
            value: midpoint,
            index: midpoint_index,
            added: false,
        };

        if modifiers.alt && self.is_editing(view) {
            if self.last_uncommitted_point.is_none() {
                if let Some(layer) = scene.get_layer(self.layer_id) {
                    let new_point = create_point_at(layer, point, Self::grid(view, modifiers));
                    let mut points = layer.points().to_vec();
                    points.push(new_point);
                    scene.mutate(self.layer_id, LayerUpdate::points(points));
                }
            }
            let Some(layer) = scene.get_layer(self.layer_id) else {
                return result;
            };
            let last_index = layer.points().len().saturating_sub(1);
            let last = layer.points().last().copied();
            scene.mutate(
                self.layer_id,
                LayerUpdate {
                    last_committed_point: Some(last),
                    ..Default::default()
                },
            );
            self.pointer_down_state = PointerDownState {
                prev_selected_points: self.selected_points.clone(),
                last_clicked_point: None,
                last_clicked_is_end_point: false,
                origin: Some(point),
                segment_midpoint: midpoint_state,
            };
            self.selected_points = Some(vec![last_index]);
            self.last_uncommitted_point = None;
            self.end_binding_target = get_hovered_layer_for_binding(scene, point).into();
            result.did_add_point = true;
            return result;
        }

        let Some(layer) = scene.get_layer(self.layer_id) else {
            return result;
        };
        let clicked = point_index_under_cursor(layer, point, view.zoom, view.config.point_handle_size);
        let point_count = layer.points().len();
        let target = clicked.and_then(|index| point_at_index_global(layer, index));

        if clicked.is_some() || midpoint.is_some() {
            result.hit_layer = true;
        } else if is_binding_enabled(view) {
            // Clicking off the handles settles the bindings picked by the last drag.
            bind_or_unbind_linear_layer(scene, self.layer_id, self.start_binding_target, self.end_binding_target);
            self.start_binding_target = BindingTarget::Keep;
            self.end_binding_target = BindingTarget::Keep;
        }

        let previous = self.selected_points.clone();
        let next_selected = match clicked {
            Some(index) => {
                let already = previous.as_ref().is_some_and(|s| s.contains(&index));
                if modifiers.shift || already {
                    normalize_selected_points(previous.iter().flatten().copied().chain([index]))
                } else {
                    Some(vec![index])
                }
            }
            None if modifiers.shift => previous.clone(),
            None => None,
        };

        self.pointer_down_state = PointerDownState {
            prev_selected_points: previous,
            last_clicked_point: clicked,
            last_clicked_is_end_point: clicked.is_some_and(|i| i + 1 == point_count),
            origin: Some(point),
            segment_midpoint: midpoint_state,
        };
        self.selected_points = next_selected;
        self.pointer_offset = target.map_or(Vec2::ZERO, |t| point - t);
        result
    }

    fn should_add_midpoint(&self, view: &ViewState, point: Point) -> bool {
        let state = &self.pointer_down_state;
        let (Some(_), Some(_), Some(origin)) = (state.segment_midpoint.value, state.segment_midpoint.index, state.origin)
        else {
            return false;
        };
        if state.segment_midpoint.added {
            return false;
        }
        self.is_editing(view) || origin.distance(point) >= view.config.dragging_threshold / view.zoom
    }

    fn add_midpoint(&mut self, scene: &mut Scene, view: &ViewState, point: Point, modifiers: PointerModifiers) {
        let Some(index) = self.pointer_down_state.segment_midpoint.index else {
            return;
        };
        let Some(layer) = scene.get_layer(self.layer_id) else {
            return;
        };
        let midpoint = create_point_at(layer, point, Self::grid(view, modifiers));
        let mut points = layer.points().to_vec();
        points.insert(index.min(points.len()), midpoint);
        scene.mutate(self.layer_id, LayerUpdate::points(points));

        self.pointer_down_state.segment_midpoint.added = true;
        self.pointer_down_state.last_clicked_point = Some(index);
        self.selected_points = Some(vec![index]);
    }

    /// Pointer moved with the button down. Returns whether anything changed.
    pub fn handle_pointer_move(
        &mut self,
        scene: &mut Scene,
        view: &ViewState,
        point: Point,
        modifiers: PointerModifiers,
    ) -> bool {
        if self.should_add_midpoint(view, point) {
            self.add_midpoint(scene, view, point, modifiers);
            return true;
        }
        let midpoint = self.pointer_down_state.segment_midpoint;
        if midpoint.value.is_some() && !midpoint.added {
            return false;
        }
        self.handle_point_dragging(scene, view, point, modifiers)
    }

    /// Drag the selected points so the clicked one follows the pointer.
    pub fn handle_point_dragging(
        &mut self,
        scene: &mut Scene,
        view: &ViewState,
        point: Point,
        modifiers: PointerModifiers,
    ) -> bool {
        let Some(selected) = self.selected_points.clone() else {
            return false;
        };
        let Some(layer) = scene.get_non_deleted_layer(self.layer_id) else {
            return false;
        };
        let Some(dragging_index) = self.pointer_down_state.last_clicked_point else {
            return false;
        };
        let points = layer.points().to_vec();
        let Some(&dragging_point) = points.get(dragging_index) else {
            return false;
        };
        let grid = Self::grid(view, modifiers);

        if modifiers.shift && selected.len() == 1 && points.len() > 1 {
            let index = selected[0];
            let reference = points[if index == 0 { 1 } else { index - 1 }];
            let delta = shift_locked_delta(layer, reference, point, grid);
            move_points(
                scene,
                self.layer_id,
                &[PointMove {
                    index,
                    point: reference + delta,
                }],
                LayerUpdate::default(),
            );
        } else {
            let new_position = create_point_at(layer, point - self.pointer_offset, grid);
            let delta = new_position - dragging_point;
            let moves: Vec<PointMove> = selected
                .iter()
                .filter(|index| **index < points.len())
                .map(|&index| PointMove {
                    index,
                    point: if index == dragging_index {
                        new_position
                    } else {
                        points[index] + delta
                    },
                })
                .collect();
            move_points(scene, self.layer_id, &moves, LayerUpdate::default());
        }
        self.is_dragging = true;

        handle_bind_text_resize(scene, self.layer_id, None, false);

        let Some(layer) = scene.get_non_deleted_layer(self.layer_id) else {
            return true;
        };
        let last_index = layer.points().len().saturating_sub(1);
        let mut coords = Vec::new();
        if selected.first() == Some(&0) {
            coords.extend(point_at_index_global(layer, 0));
        }
        if selected.last() == Some(&last_index) {
            coords.extend(point_at_index_global(layer, last_index));
        }
        self.suggested_bindings = suggested_bindings_for_linear_at_coords(scene, layer, &coords, None);
        true
    }

    /// Pointer released. Closes loops, picks binding targets for dragged
    /// endpoints and settles the point selection.
    pub fn handle_pointer_up(&mut self, scene: &mut Scene, view: &ViewState, modifiers: PointerModifiers) {
        let Some(layer) = scene.get_non_deleted_layer(self.layer_id) else {
            return;
        };
        let point_count = layer.points().len();
        let mut endpoint_moved = false;

        if self.is_dragging {
            for index in self.selected_points.clone().into_iter().flatten() {
                if index != 0 && index + 1 != point_count {
                    continue;
                }
                let Some(layer) = scene.get_layer(self.layer_id) else {
                    return;
                };
                let points = layer.points();
                if is_path_a_loop(points, view.config.line_confirm_threshold / view.zoom) {
                    let snapped = if index == 0 { points[points.len() - 1] } else { points[0] };
                    move_points(
                        scene,
                        self.layer_id,
                        &[PointMove { index, point: snapped }],
                        LayerUpdate::default(),
                    );
                }
                let hovered = match scene.get_layer(self.layer_id) {
                    Some(layer) if is_binding_enabled(view) => point_at_index_global(layer, index)
                        .and_then(|p| get_hovered_layer_for_binding(scene, p)),
                    _ => None,
                };
                if index == 0 {
                    self.start_binding_target = hovered.into();
                } else {
                    self.end_binding_target = hovered.into();
                }
                endpoint_moved = true;
            }
        }

        let state = &self.pointer_down_state;
        let clicked = state.last_clicked_point;
        self.selected_points = if self.is_dragging || modifiers.shift {
            let toggled_off = !self.is_dragging
                && modifiers.shift
                && clicked.is_some_and(|c| state.prev_selected_points.as_ref().is_some_and(|p| p.contains(&c)));
            if toggled_off {
                self.selected_points
                    .as_ref()
                    .and_then(|s| normalize_selected_points(s.iter().copied().filter(|i| Some(*i) != clicked)))
            } else {
                self.selected_points.clone()
            }
        } else {
            match clicked {
                Some(c) if self.selected_points.as_ref().is_some_and(|s| s.contains(&c)) => Some(vec![c]),
                _ => self.selected_points.clone(),
            }
        };

        if endpoint_moved && !self.is_editing(view) {
            bind_or_unbind_linear_layer(scene, self.layer_id, self.start_binding_target, self.end_binding_target);
            self.start_binding_target = BindingTarget::Keep;
            self.end_binding_target = BindingTarget::Keep;
        }
        self.is_dragging = false;
        self.pointer_offset = Vec2::ZERO;
        self.suggested_bindings.clear();
    }

    /// While editing with alt held, a trailing point follows the pointer.
    /// Releasing alt drops it again.
    pub fn handle_uncommitted_point_move(
        &mut self,
        scene: &mut Scene,
        view: &ViewState,
        point: Point,
        modifiers: PointerModifiers,
    ) {
        if !self.is_editing(view) {
            return;
        }
        let Some(layer) = scene.get_non_deleted_layer(self.layer_id) else {
            return;
        };
        let points = layer.points().to_vec();
        let Some(&last) = points.last() else {
            return;
        };
        let trailing = self.last_uncommitted_point == Some(last);

        if !modifiers.alt {
            if trailing {
                delete_points(scene, self.layer_id, &[points.len() - 1]);
            }
            self.last_uncommitted_point = None;
            return;
        }

        let grid = Self::grid(view, modifiers);
        let new_point = if modifiers.shift && points.len() >= 2 {
            let committed = points[points.len() - 2];
            committed + shift_locked_delta(layer, committed, point, grid)
        } else {
            create_point_at(layer, point - self.pointer_offset, grid)
        };
        if trailing {
            move_points(
                scene,
                self.layer_id,
                &[PointMove {
                    index: points.len() - 1,
                    point: new_point,
                }],
                LayerUpdate::default(),
            );
        } else {
            add_points(scene, self.layer_id, &[new_point]);
        }
        self.last_uncommitted_point = scene
            .get_layer(self.layer_id)
            .and_then(|layer| layer.points().last().copied());
    }

    /// Insert a copy after every selected point: halfway to the next point,
    /// or offset past the end for the last one.
    pub fn duplicate_selected_points(&mut self, scene: &mut Scene) -> bool {
        let Some(selected) = self.selected_points.clone() else {
            return false;
        };
        let Some(layer) = scene.get_non_deleted_layer(self.layer_id) else {
            return false;
        };
        let points = layer.points();
        let mut next_points = Vec::with_capacity(points.len() + selected.len());
        let mut next_selected = Vec::with_capacity(selected.len());
        let mut added_to_end = false;
        for (index, point) in points.iter().enumerate() {
            next_points.push(*point);
            if !selected.contains(&index) {
                continue;
            }
            match points.get(index + 1) {
                Some(next) => next_points.push(point.midpoint(*next)),
                None => {
                    added_to_end = true;
                    next_points.push(*point);
                }
            }
            next_selected.push(next_points.len() - 1);
        }
        scene.mutate(self.layer_id, LayerUpdate::points(next_points));

        if added_to_end {
            if let Some(layer) = scene.get_layer(self.layer_id) {
                let index = layer.points().len() - 1;
                let last = layer.points()[index];
                move_points(
                    scene,
                    self.layer_id,
                    &[PointMove {
                        index,
                        point: last + Vec2::new(30.0, 30.0),
                    }],
                    LayerUpdate::default(),
                );
            }
        }
        self.selected_points = Some(next_selected);
        true
    }

    /// Delete the selected points. A line left with fewer than two points
    /// is deleted altogether.
    pub fn delete_selected_points(&mut self, scene: &mut Scene) -> bool {
        let Some(selected) = self.selected_points.take() else {
            return false;
        };
        let Some(layer) = scene.get_non_deleted_layer(self.layer_id) else {
            return false;
        };
        if layer.points().len().saturating_sub(selected.len()) < 2 {
            scene.mutate(
                self.layer_id,
                LayerUpdate {
                    is_deleted: Some(true),
                    ..Default::default()
                },
            );
            crate::binding::fix_bindings_after_deletion(scene, &[self.layer_id]);
            return true;
        }
        delete_points(scene, self.layer_id, &selected);
        true
    }

    /// Leave point editing: drop a trailing uncommitted point and settle
    /// pending bindings.
    pub fn finalize(&mut self, scene: &mut Scene, view: &ViewState) {
        if let Some(layer) = scene.get_non_deleted_layer(self.layer_id) {
            let points = layer.points();
            if self.last_uncommitted_point.is_some() && points.last().copied() == self.last_uncommitted_point {
                let last = points.len() - 1;
                delete_points(scene, self.layer_id, &[last]);
            }
        }
        self.last_uncommitted_point = None;
        if is_binding_enabled(view) {
            bind_or_unbind_linear_layer(scene, self.layer_id, self.start_binding_target, self.end_binding_target);
        }
        self.start_binding_target = BindingTarget::Keep;
        self.end_binding_target = BindingTarget::Keep;
        self.selected_points = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn assert_point(actual: Point, expected: Point) {
        assert!(
            actual.distance(expected) < 1e-6,
            "expected {expected:?}, got {actual:?}"
        );
    }

    fn scene_with(layer: Layer) -> (Scene, LayerId) {
        let mut scene = Scene::new();
        let id = scene.insert_layer(layer).unwrap();
        (scene, id)
    }

    #[test]
    fn test_global_round_trip_with_rotation() {
        let line = Layer::line(10.0, 20.0, vec![Point::ZERO, Point::new(40.0, 0.0)]).with_angle(FRAC_PI_2);
        let global = point_global(&line, Point::new(40.0, 0.0));
        assert_point(global, Point::new(30.0, 40.0));
        assert_point(point_from_absolute(&line, global), Point::new(40.0, 0.0));
    }

    #[test]
    fn test_moving_origin_keeps_invariant() {
        let (mut scene, id) = scene_with(Layer::line(0.0, 0.0, vec![Point::ZERO, Point::new(100.0, 0.0)]));
        move_points(
            &mut scene,
            id,
            &[PointMove {
                index: 0,
                point: Point::new(10.0, 10.0),
            }],
            LayerUpdate::default(),
        );
        let layer = scene.get_layer(id).unwrap();
        assert_eq!(layer.points()[0], Point::ZERO);
        assert_point(point_at_index_global(layer, 0).unwrap(), Point::new(10.0, 10.0));
        assert_point(point_at_index_global(layer, 1).unwrap(), Point::new(100.0, 0.0));
    }

    #[test]
    fn test_delete_origin_point() {
        let points = vec![Point::ZERO, Point::new(10.0, 0.0), Point::new(20.0, 10.0)];
        let (mut scene, id) = scene_with(Layer::line(0.0, 0.0, points));
        delete_points(&mut scene, id, &[0]);
        let layer = scene.get_layer(id).unwrap();
        assert_eq!(layer.points(), &[Point::ZERO, Point::new(10.0, 10.0)]);
        assert_point(point_at_index_global(layer, 0).unwrap(), Point::new(10.0, 0.0));
        assert_point(point_at_index_global(layer, 1).unwrap(), Point::new(20.0, 10.0));
    }

    #[test]
    fn test_new_rejects_non_linear() {
        let (mut scene, id) = scene_with(Layer::rectangle(0.0, 0.0, 10.0, 10.0));
        assert!(matches!(
            LinearElementEditor::new(&mut scene, id),
            Err(EngineError::NotLinear(_))
        ));
        assert!(matches!(
            LinearElementEditor::new(&mut scene, LayerId::new_v4()),
            Err(EngineError::LayerNotFound(_))
        ));
    }

    #[test]
    fn test_new_normalizes_points() {
        let line = Layer::line(0.0, 0.0, vec![Point::new(5.0, 5.0), Point::new(15.0, 5.0)]);
        let (mut scene, id) = scene_with(line);
        LinearElementEditor::new(&mut scene, id).unwrap();
        let layer = scene.get_layer(id).unwrap();
        assert_eq!(layer.points()[0], Point::ZERO);
        assert!((layer.x - 5.0).abs() < f64::EPSILON);
        assert_point(point_at_index_global(layer, 1).unwrap(), Point::new(15.0, 5.0));
    }

    #[test]
    fn test_midpoint_drag_inserts_point() {
        let (mut scene, id) = scene_with(Layer::line(20.0, 20.0, vec![Point::ZERO, Point::new(40.0, 0.0)]));
        let view = ViewState::default();
        let mut editor = LinearElementEditor::new(&mut scene, id).unwrap();

        let down = editor.handle_pointer_down(&mut scene, &view, Point::new(40.0, 20.0), PointerModifiers::default());
        assert!(down.hit_layer);
        assert_eq!(editor.pointer_down_state.segment_midpoint.index, Some(1));

        assert!(editor.handle_pointer_move(&mut scene, &view, Point::new(90.0, 70.0), PointerModifiers::default()));
        editor.handle_pointer_up(&mut scene, &view, PointerModifiers::default());

        let layer = scene.get_layer(id).unwrap();
        assert_eq!(
            layer.points(),
            &[Point::ZERO, Point::new(70.0, 50.0), Point::new(40.0, 0.0)]
        );
        assert_eq!(editor.selected_points, Some(vec![1]));
    }

    #[test]
    fn test_short_segments_have_no_midpoint() {
        let (mut scene, id) = scene_with(Layer::line(0.0, 0.0, vec![Point::ZERO, Point::new(30.0, 0.0)]));
        let view = ViewState::default();
        let mut editor = LinearElementEditor::new(&mut scene, id).unwrap();
        assert_eq!(editor.editor_midpoints(&scene, &view), vec![None]);

        let zoomed = ViewState {
            zoom: 2.0,
            ..ViewState::default()
        };
        assert_eq!(editor.editor_midpoints(&scene, &zoomed), vec![Some(Point::new(15.0, 0.0))]);
    }

    #[test]
    fn test_shift_locks_drag_angle() {
        let (mut scene, id) = scene_with(Layer::line(0.0, 0.0, vec![Point::ZERO, Point::new(100.0, 0.0)]));
        let view = ViewState::default();
        let mut editor = LinearElementEditor::new(&mut scene, id).unwrap();
        editor.handle_pointer_down(&mut scene, &view, Point::new(100.0, 0.0), PointerModifiers::default());
        let shift = PointerModifiers {
            shift: true,
            ..Default::default()
        };
        assert!(editor.handle_pointer_move(&mut scene, &view, Point::new(100.0, 95.0), shift));
        let layer = scene.get_layer(id).unwrap();
        assert_point(layer.points()[1], Point::new(100.0, 100.0));
    }

    #[test]
    fn test_dragging_end_onto_start_closes_loop() {
        let points = vec![
            Point::ZERO,
            Point::new(50.0, 0.0),
            Point::new(50.0, 50.0),
            Point::new(10.0, 10.0),
        ];
        let (mut scene, id) = scene_with(Layer::line(0.0, 0.0, points));
        let view = ViewState::default();
        let mut editor = LinearElementEditor::new(&mut scene, id).unwrap();

        editor.handle_pointer_down(&mut scene, &view, Point::new(10.0, 10.0), PointerModifiers::default());
        assert_eq!(editor.selected_points, Some(vec![3]));
        editor.handle_pointer_move(&mut scene, &view, Point::new(3.0, 4.0), PointerModifiers::default());
        editor.handle_pointer_up(&mut scene, &view, PointerModifiers::default());

        let layer = scene.get_layer(id).unwrap();
        assert_eq!(layer.points().last(), Some(&Point::ZERO));
        assert!(!editor.is_dragging);
    }

    #[test]
    fn test_duplicate_selected_points() {
        let (mut scene, id) = scene_with(Layer::line(0.0, 0.0, vec![Point::ZERO, Point::new(40.0, 0.0)]));
        let mut editor = LinearElementEditor::new(&mut scene, id).unwrap();
        editor.selected_points = Some(vec![0]);
        assert!(editor.duplicate_selected_points(&mut scene));
        assert_eq!(
            scene.get_layer(id).unwrap().points(),
            &[Point::ZERO, Point::new(20.0, 0.0), Point::new(40.0, 0.0)]
        );
        assert_eq!(editor.selected_points, Some(vec![1]));

        editor.selected_points = Some(vec![2]);
        editor.duplicate_selected_points(&mut scene);
        let layer = scene.get_layer(id).unwrap();
        assert_eq!(layer.points().len(), 4);
        assert_point(layer.points()[3], Point::new(70.0, 30.0));
        assert_eq!(editor.selected_points, Some(vec![3]));
    }

    #[test]
    fn test_alt_click_appends_point_while_editing() {
        let (mut scene, id) = scene_with(Layer::line(0.0, 0.0, vec![Point::ZERO, Point::new(40.0, 0.0)]));
        let mut view = ViewState::default();
        view.editing_linear_layer = Some(id);
        let mut editor = LinearElementEditor::new(&mut scene, id).unwrap();
        let alt = PointerModifiers {
            alt: true,
            ..Default::default()
        };

        editor.handle_uncommitted_point_move(&mut scene, &view, Point::new(80.0, 40.0), alt);
        assert_eq!(scene.get_layer(id).unwrap().points().len(), 3);
        editor.handle_uncommitted_point_move(&mut scene, &view, Point::new(80.0, 60.0), alt);
        assert_eq!(scene.get_layer(id).unwrap().points().len(), 3);

        let down = editor.handle_pointer_down(&mut scene, &view, Point::new(80.0, 60.0), alt);
        assert!(down.did_add_point);
        let layer = scene.get_layer(id).unwrap();
        assert_eq!(layer.points().len(), 3);
        assert_eq!(editor.selected_points, Some(vec![2]));
        assert!(editor.last_uncommitted_point.is_none());
    }

    #[test]
    fn test_releasing_alt_drops_uncommitted_point() {
        let (mut scene, id) = scene_with(Layer::line(0.0, 0.0, vec![Point::ZERO, Point::new(40.0, 0.0)]));
        let mut view = ViewState::default();
        view.editing_linear_layer = Some(id);
        let mut editor = LinearElementEditor::new(&mut scene, id).unwrap();
        let alt = PointerModifiers {
            alt: true,
            ..Default::default()
        };
        editor.handle_uncommitted_point_move(&mut scene, &view, Point::new(80.0, 40.0), alt);
        editor.handle_uncommitted_point_move(&mut scene, &view, Point::new(80.0, 40.0), PointerModifiers::default());
        assert_eq!(scene.get_layer(id).unwrap().points().len(), 2);
    }

    #[test]
    fn test_locked_align_size() {
        let v = locked_linear_cursor_align_size(Point::ZERO, Point::new(100.0, 3.0));
        assert_eq!(v, Vec2::new(100.0, 0.0));
        let v = locked_linear_cursor_align_size(Point::ZERO, Point::new(2.0, 100.0));
        assert_eq!(v, Vec2::new(0.0, 100.0));
        assert_eq!(locked_linear_cursor_align_size(Point::ZERO, Point::ZERO), Vec2::ZERO);
    }
}
