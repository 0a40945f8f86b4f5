use super::{TransformHandle, TransformModifiers, apply_with_bindings};
use crate::geometry::{normalize_angle, rotate_point};
use crate::layer::{Layer, LayerId, LayerKind, common_bounds};
use crate::mutation::LayerUpdate;
use crate::scene::Scene;
use crate::text::{
    MIN_FONT_SIZE, approx_min_line_height, approx_min_line_width, get_bound_text, get_bound_text_max_width,
    handle_bind_text_resize, measure_font_size_from_width,
};
use kurbo::{Point, Rect, Size, Vec2};
use std::collections::HashMap;

/// Scale relative points so their extent becomes `new_size`.
///
/// Negative sizes mirror the points. Points are scaled about the origin, so
/// a first point at `(0, 0)` stays there. An axis with no extent is left
/// unscaled.
pub fn rescale_points(points: &[Point], new_size: Size) -> Vec<Point> {
    let Some(bounds) = crate::geometry::bounds_of_points(points) else {
        return Vec::new();
    };
    let factor = |extent: f64, next: f64| if extent == 0.0 { 1.0 } else { next / extent };
    let sx = factor(bounds.width(), new_size.width);
    let sy = factor(bounds.height(), new_size.height);
    points.iter().map(|p| Point::new(p.x * sx, p.y * sy)).collect()
}

fn is_point_based(layer: &Layer) -> bool {
    layer.is_linear() || layer.is_freedraw()
}

fn ratio(value: f64, extent: f64) -> f64 {
    if extent == 0.0 { 1.0 } else { value / extent }
}

/// Resize one layer by dragging `handle` to `pointer`.
///
/// `original` is the layer as it was when the gesture started; the result
/// is computed from it, not from the current state.
pub fn resize_single_layer(
    scene: &mut Scene,
    original: &Layer,
    handle: TransformHandle,
    pointer: Point,
    modifiers: TransformModifiers,
) {
    let id = original.id;
    let Some(latest) = scene.get_non_deleted_layer(id).cloned() else {
        return;
    };
    let start = original.absolute_rect();
    let start_center = start.center();
    let rotated_pointer = rotate_point(pointer, start_center, -original.angle);

    let mut scale_x = 1.0;
    let mut scale_y = 1.0;
    if handle.is_east() {
        scale_x = ratio(rotated_pointer.x - start.x0, start.width());
    }
    if handle.is_west() {
        scale_x = ratio(start.x1 - rotated_pointer.x, start.width());
    }
    if handle.is_south() {
        scale_y = ratio(rotated_pointer.y - start.y0, start.height());
    }
    if handle.is_north() {
        scale_y = ratio(start.y1 - rotated_pointer.y, start.height());
    }

    let mut new_width = original.width * scale_x;
    let mut new_height = original.height * scale_y;
    if modifiers.from_center {
        new_width = 2.0 * new_width - original.width;
        new_height = 2.0 * new_height - original.height;
    }
    if modifiers.keep_aspect_ratio {
        let width_ratio = new_width.abs() / original.width;
        let height_ratio = new_height.abs() / original.height;
        if handle.is_vertical_side() {
            new_width = original.width * height_ratio;
        } else if handle.is_horizontal_side() {
            new_height = original.height * width_ratio;
        } else {
            let r = width_ratio.max(height_ratio);
            new_width = original.width * r * new_width.signum();
            new_height = original.height * r * new_height.signum();
        }
    }

    let bound_text = get_bound_text(scene, &latest).cloned();
    let mut bound_font = None;
    if let Some(data) = bound_text.as_ref().and_then(Layer::text_data) {
        let text = bound_text.as_ref().map(|t| t.id);
        if modifiers.keep_aspect_ratio {
            let size = if latest.is_arrow() {
                let size = data.font_size * new_width.abs() / latest.width;
                (size.is_finite() && size >= MIN_FONT_SIZE).then_some(size)
            } else {
                let resized = Layer {
                    width: new_width.abs(),
                    height: new_height.abs(),
                    ..latest.clone()
                };
                bound_text.as_ref().and_then(|text| {
                    measure_font_size_from_width(
                        text,
                        get_bound_text_max_width(&latest),
                        get_bound_text_max_width(&resized),
                    )
                })
            };
            let Some(size) = size else {
                return;
            };
            bound_font = text.map(|id| (id, size));
        } else {
            let min_width = approx_min_line_width(data.font_size, scene.text_measurer());
            let min_height = approx_min_line_height(data.font_size, data.line_height);
            new_width = new_width.max(min_width);
            new_height = new_height.max(min_height);
        }
    }

    let (points, local) = if is_point_based(original) {
        let points = rescale_points(original.points(), Size::new(new_width, new_height));
        let local = original.path_bounds_of(&points);
        (Some(points), local)
    } else {
        (None, Rect::new(0.0, 0.0, new_width, new_height))
    };
    let bounds_width = local.width().abs();
    let bounds_height = local.height().abs();

    // The corner opposite the handle stays put.
    let mut top_left = Point::new(start.x0, start.y0);
    match handle {
        TransformHandle::N | TransformHandle::W | TransformHandle::NW => {
            top_left = Point::new(start.x1 - bounds_width, start.y1 - bounds_height);
        }
        TransformHandle::NE => top_left.y = start.y1 - bounds_height,
        TransformHandle::SW => top_left.x = start.x1 - bounds_width,
        _ => {}
    }
    if modifiers.keep_aspect_ratio {
        if handle.is_vertical_side() {
            top_left.x = start_center.x - bounds_width / 2.0;
        }
        if handle.is_horizontal_side() {
            top_left.y = start_center.y - bounds_height / 2.0;
        }
    }
    if new_width < 0.0 {
        if handle.is_east() {
            top_left.x -= bounds_width;
        }
        if handle.is_west() {
            top_left.x += bounds_width;
        }
    }
    if new_height < 0.0 {
        if handle.is_south() {
            top_left.y -= bounds_height;
        }
        if handle.is_north() {
            top_left.y += bounds_height;
        }
    }
    if modifiers.from_center {
        top_left = Point::new(start_center.x - bounds_width / 2.0, start_center.y - bounds_height / 2.0);
    }

    // Re-express the corner around the new rotation pivot.
    let angle = original.angle;
    let rotated_top_left = rotate_point(top_left, start_center, angle);
    let new_center = top_left + Vec2::new(bounds_width / 2.0, bounds_height / 2.0);
    let rotated_new_center = rotate_point(new_center, start_center, angle);
    let top_left = rotate_point(rotated_top_left, rotated_new_center, -angle);

    // Point-based layers are anchored at their first point, not their box.
    let origin = if points.is_some() {
        top_left - Vec2::new(local.x0.min(local.x1), local.y0.min(local.y1))
    } else {
        top_left
    };

    let width = new_width.abs();
    let height = new_height.abs();
    let degenerate = if points.is_some() {
        width == 0.0 && height == 0.0
    } else {
        width == 0.0 || height == 0.0
    };
    if degenerate || ![origin.x, origin.y, width, height].iter().all(|v| v.is_finite()) {
        return;
    }

    let mut update = LayerUpdate::position(origin.x, origin.y);
    match points {
        Some(points) => update.points = Some(points),
        None => {
            update.width = Some(width);
            update.height = Some(height);
        }
    }
    if let LayerKind::Image(data) = &original.kind {
        update.scale = Some([
            new_width.signum() * data.scale[0],
            new_height.signum() * data.scale[1],
        ]);
    }

    apply_with_bindings(scene, id, update, Some(Size::new(width, height)), &[]);
    if let Some((text_id, size)) = bound_font {
        scene.mutate_quiet(
            text_id,
            LayerUpdate {
                font_size: Some(size),
                ..Default::default()
            },
        );
    }
    if bound_text.is_some() {
        handle_bind_text_resize(scene, id, Some(handle), modifiers.keep_aspect_ratio);
    }
    scene.inform_mutation();
}

/// Shift `(x, y)` so the sides opposite the dragged ones stay fixed on a
/// rotated layer that shrank by `delta1` at its start and `delta2` at its
/// end (half extents).
fn adjust_xy_with_rotation(
    handle: TransformHandle,
    origin: Point,
    angle: f64,
    delta1: Vec2,
    delta2: Vec2,
) -> Point {
    let (sin, cos) = angle.sin_cos();
    let (mut x, mut y) = (origin.x, origin.y);
    if handle.is_east() {
        x += delta1.x * (1.0 + cos);
        y += delta1.x * sin;
        x += delta2.x * (1.0 - cos);
        y += delta2.x * -sin;
    } else if handle.is_west() {
        x += delta1.x * (1.0 - cos);
        y += delta1.x * -sin;
        x += delta2.x * (1.0 + cos);
        y += delta2.x * sin;
    }
    if handle.is_north() {
        x += delta1.y * sin;
        y += delta1.y * (1.0 - cos);
        x += delta2.y * -sin;
        y += delta2.y * (1.0 + cos);
    } else if handle.is_south() {
        x += delta1.y * -sin;
        y += delta1.y * (1.0 + cos);
        x += delta2.y * sin;
        y += delta2.y * (1.0 - cos);
    }
    Point::new(x, y)
}

/// Resize a free-standing text layer from a corner handle. The font size
/// scales with the box.
pub fn resize_single_text_layer(scene: &mut Scene, id: LayerId, handle: TransformHandle, pointer: Point) {
    let Some(layer) = scene.get_non_deleted_layer(id).cloned() else {
        return;
    };
    if !layer.is_text() {
        log::warn!("Text resize requested for {} layer {}", layer.kind_name(), id);
        return;
    }
    let rect = layer.absolute_rect();
    let p = rotate_point(pointer, rect.center(), -layer.angle);
    let (w, h) = (rect.width(), rect.height());
    let scale = match handle {
        TransformHandle::SE => ((p.x - rect.x0) / w).max((p.y - rect.y0) / h),
        TransformHandle::NW => ((rect.x1 - p.x) / w).max((rect.y1 - p.y) / h),
        TransformHandle::NE => ((p.x - rect.x0) / w).max((rect.y1 - p.y) / h),
        TransformHandle::SW => ((rect.x1 - p.x) / w).max((p.y - rect.y0) / h),
        _ => return,
    };
    if !(scale > 0.0 && scale.is_finite()) {
        return;
    }
    let next_width = layer.width * scale;
    let next_height = layer.height * scale;
    let Some(font_size) = measure_font_size_from_width(&layer, layer.width, next_width) else {
        return;
    };
    let delta = Vec2::new((w - next_width) / 2.0, (h - next_height) / 2.0);
    let next = adjust_xy_with_rotation(handle, Point::new(layer.x, layer.y), layer.angle, Vec2::ZERO, delta);
    scene.mutate(
        id,
        LayerUpdate {
            font_size: Some(font_size),
            width: Some(next_width),
            height: Some(next_height),
            x: Some(next.x),
            y: Some(next.y),
            ..Default::default()
        },
    );
}

struct PendingResize {
    id: LayerId,
    update: LayerUpdate,
    size: Size,
    angle: f64,
    bound_font: Option<f64>,
}

/// Resize several layers together by dragging a handle of their common box.
///
/// One uniform scale is derived from the pointer's distance to the anchor
/// (the opposite side, or the center when resizing from the center) and
/// applied to every layer's size and offset from the anchor. Bound text is
/// re-laid out through its container.
///
/// Side handles take the scale from their own axis only; corners take the
/// larger of the two axis ratios.
pub fn resize_multiple_layers(
    scene: &mut Scene,
    originals: &HashMap<LayerId, Layer>,
    selected: &[LayerId],
    handle: TransformHandle,
    pointer: Point,
    from_center: bool,
) {
    let targets: Vec<&Layer> = selected.iter().filter_map(|id| originals.get(id)).collect();
    let with_labels = targets.iter().flat_map(|layer| {
        let label = layer.bound_text_id().and_then(|id| originals.get(&id));
        std::iter::once(*layer).chain(label)
    });
    let Some(bounds) = common_bounds(with_labels) else {
        return;
    };
    let (width, height) = (bounds.width(), bounds.height());
    let center = bounds.center();

    let anchor = if from_center {
        center
    } else {
        match handle {
            TransformHandle::NE => Point::new(bounds.x0, bounds.y1),
            TransformHandle::SE => Point::new(bounds.x0, bounds.y0),
            TransformHandle::SW => Point::new(bounds.x1, bounds.y0),
            TransformHandle::NW => Point::new(bounds.x1, bounds.y1),
            TransformHandle::E => Point::new(bounds.x0, center.y),
            TransformHandle::W => Point::new(bounds.x1, center.y),
            TransformHandle::N => Point::new(center.x, bounds.y1),
            TransformHandle::S => Point::new(center.x, bounds.y0),
        }
    };

    let extent_ratio = |d: f64, extent: f64| if extent > 0.0 { d.abs() / extent } else { 0.0 };
    let scale_x = extent_ratio(pointer.x - anchor.x, width);
    let scale_y = extent_ratio(pointer.y - anchor.y, height);
    let axis_scale = if handle.is_horizontal_side() {
        scale_x
    } else if handle.is_vertical_side() {
        scale_y
    } else {
        scale_x.max(scale_y)
    };
    let scale = if from_center { axis_scale * 2.0 } else { axis_scale };
    if scale == 0.0 || !scale.is_finite() {
        return;
    }

    let flip_x = (handle.is_east() && pointer.x < anchor.x) || (handle.is_west() && pointer.x > anchor.x);
    let flip_y = (handle.is_south() && pointer.y < anchor.y) || (handle.is_north() && pointer.y > anchor.y);
    let fx = if flip_x { -1.0 } else { 1.0 };
    let fy = if flip_y { -1.0 } else { 1.0 };

    let mut pending = Vec::with_capacity(targets.len());
    for orig in &targets {
        // Labels follow their container.
        if orig.container_id().is_some() {
            continue;
        }
        let width = orig.width * scale;
        let height = orig.height * scale;
        let angle = normalize_angle(orig.angle * fx * fy);
        let point_based = is_point_based(orig);
        let shift_x = if flip_x && !point_based { width } else { 0.0 };
        let shift_y = if flip_y && !point_based { height } else { 0.0 };
        let x = anchor.x + fx * ((orig.x - anchor.x) * scale + shift_x);
        let y = anchor.y + fy * ((orig.y - anchor.y) * scale + shift_y);

        let mut update = LayerUpdate {
            x: Some(x),
            y: Some(y),
            angle: Some(angle),
            ..Default::default()
        };
        if point_based {
            update.points = Some(rescale_points(orig.points(), Size::new(width * fx, height * fy)));
        } else {
            update.width = Some(width);
            update.height = Some(height);
        }
        if let LayerKind::Image(data) = &orig.kind {
            if targets.len() == 1 {
                update.scale = Some([data.scale[0] * fx, data.scale[1] * fy]);
            }
        }
        if orig.is_text() {
            let Some(size) = measure_font_size_from_width(orig, orig.width, width) else {
                return;
            };
            update.font_size = Some(size);
        }
        let label_font = orig
            .bound_text_id()
            .and_then(|id| originals.get(&id))
            .and_then(Layer::text_data)
            .map(|data| data.font_size * scale);
        if label_font.is_some_and(|size| size < MIN_FONT_SIZE) {
            return;
        }
        pending.push(PendingResize {
            id: orig.id,
            update,
            size: Size::new(width, height),
            angle,
            bound_font: label_font,
        });
    }

    let moved: Vec<LayerId> = pending.iter().map(|p| p.id).collect();
    for resize in pending {
        apply_with_bindings(scene, resize.id, resize.update, Some(resize.size), &moved);
        let Some(font_size) = resize.bound_font else {
            continue;
        };
        let Some(layer) = scene.get_non_deleted_layer(resize.id) else {
            continue;
        };
        let is_linear = layer.is_linear();
        let Some(text_id) = layer.bound_text_id() else {
            continue;
        };
        scene.mutate_quiet(
            text_id,
            LayerUpdate {
                font_size: Some(font_size),
                angle: (!is_linear).then_some(resize.angle),
                ..Default::default()
            },
        );
        handle_bind_text_resize(scene, resize.id, Some(handle), true);
    }
    scene.inform_mutation();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindingEdge, bind_linear_layer};
    use crate::linear_editor::point_at_index_global;
    use crate::text::bind_text_to_container;
    use crate::transform::TransformSession;
    use std::f64::consts::FRAC_PI_2;

    fn resize(scene: &mut Scene, id: LayerId, handle: TransformHandle, pointer: Point, modifiers: TransformModifiers) {
        let original = scene.get_layer(id).unwrap().clone();
        resize_single_layer(scene, &original, handle, pointer, modifiers);
    }

    fn assert_box(layer: &Layer, x: f64, y: f64, width: f64, height: f64) {
        let actual = (layer.x, layer.y, layer.width, layer.height);
        assert!(
            (actual.0 - x).abs() < 1e-9
                && (actual.1 - y).abs() < 1e-9
                && (actual.2 - width).abs() < 1e-9
                && (actual.3 - height).abs() < 1e-9,
            "got {actual:?}"
        );
    }

    #[test]
    fn test_rescale_points_mirrors() {
        let points = [Point::ZERO, Point::new(10.0, -20.0)];
        let scaled = rescale_points(&points, Size::new(20.0, -10.0));
        assert_eq!(scaled, vec![Point::ZERO, Point::new(20.0, 10.0)]);
        let flat = rescale_points(&[Point::ZERO, Point::new(10.0, 0.0)], Size::new(5.0, 30.0));
        assert_eq!(flat[1], Point::new(5.0, 0.0));
    }

    #[test]
    fn test_resize_from_south_east() {
        let mut scene = Scene::new();
        let id = scene.insert_layer(Layer::rectangle(0.0, 0.0, 100.0, 100.0)).unwrap();
        resize(&mut scene, id, TransformHandle::SE, Point::new(70.0, 90.0), TransformModifiers::default());
        assert_box(scene.get_layer(id).unwrap(), 0.0, 0.0, 70.0, 90.0);
    }

    #[test]
    fn test_resize_from_north_west_keeps_opposite_corner() {
        let mut scene = Scene::new();
        let id = scene.insert_layer(Layer::rectangle(0.0, 0.0, 100.0, 100.0)).unwrap();
        resize(&mut scene, id, TransformHandle::NW, Point::new(20.0, 30.0), TransformModifiers::default());
        assert_box(scene.get_layer(id).unwrap(), 20.0, 30.0, 80.0, 70.0);
    }

    #[test]
    fn test_resize_past_opposite_side_flips() {
        let mut scene = Scene::new();
        let id = scene.insert_layer(Layer::rectangle(0.0, 0.0, 100.0, 100.0)).unwrap();
        resize(&mut scene, id, TransformHandle::E, Point::new(-50.0, 50.0), TransformModifiers::default());
        assert_box(scene.get_layer(id).unwrap(), -50.0, 0.0, 50.0, 100.0);
    }

    #[test]
    fn test_resize_with_aspect_ratio() {
        let mut scene = Scene::new();
        let id = scene.insert_layer(Layer::rectangle(0.0, 0.0, 100.0, 100.0)).unwrap();
        let modifiers = TransformModifiers {
            keep_aspect_ratio: true,
            ..Default::default()
        };
        resize(&mut scene, id, TransformHandle::SE, Point::new(50.0, 80.0), modifiers);
        assert_box(scene.get_layer(id).unwrap(), 0.0, 0.0, 80.0, 80.0);
    }

    #[test]
    fn test_resize_from_center() {
        let mut scene = Scene::new();
        let id = scene.insert_layer(Layer::rectangle(0.0, 0.0, 100.0, 100.0)).unwrap();
        let modifiers = TransformModifiers {
            from_center: true,
            ..Default::default()
        };
        resize(&mut scene, id, TransformHandle::E, Point::new(120.0, 50.0), modifiers);
        assert_box(scene.get_layer(id).unwrap(), -20.0, 0.0, 140.0, 100.0);
    }

    #[test]
    fn test_rotated_resize_keeps_anchor_corner() {
        let mut scene = Scene::new();
        let rect = Layer::rectangle(0.0, 0.0, 100.0, 50.0).with_angle(FRAC_PI_2);
        let anchor_before = rotate_point(Point::new(0.0, 0.0), rect.center(), rect.angle);
        let id = scene.insert_layer(rect.clone()).unwrap();
        // Local (120, 60) of the unrotated box, in scene space.
        let pointer = rotate_point(Point::new(120.0, 60.0), rect.center(), rect.angle);
        resize(&mut scene, id, TransformHandle::SE, pointer, TransformModifiers::default());

        let layer = scene.get_layer(id).unwrap();
        assert!((layer.width - 120.0).abs() < 1e-9);
        assert!((layer.height - 60.0).abs() < 1e-9);
        let anchor_after = rotate_point(Point::new(layer.x, layer.y), layer.center(), layer.angle);
        assert!((anchor_after - anchor_before).hypot() < 1e-9, "{anchor_after:?}");
    }

    #[test]
    fn test_resize_line_scales_points() {
        let mut scene = Scene::new();
        let id = scene
            .insert_layer(Layer::line(10.0, 10.0, vec![Point::ZERO, Point::new(100.0, 50.0)]))
            .unwrap();
        resize(&mut scene, id, TransformHandle::SE, Point::new(210.0, 110.0), TransformModifiers::default());
        let layer = scene.get_layer(id).unwrap();
        assert_eq!(layer.points(), &[Point::ZERO, Point::new(200.0, 100.0)]);
        assert!((layer.x - 10.0).abs() < 1e-9);
        assert!((layer.width - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_flipped_line_keeps_first_point_at_origin() {
        let mut scene = Scene::new();
        let points = vec![Point::ZERO, Point::new(100.0, 0.0), Point::new(100.0, 50.0)];
        let id = scene.insert_layer(Layer::line(0.0, 0.0, points)).unwrap();
        resize(&mut scene, id, TransformHandle::E, Point::new(-90.0, 25.0), TransformModifiers::default());
        let layer = scene.get_layer(id).unwrap();
        assert_eq!(layer.points()[0], Point::ZERO);
        assert!((layer.points()[2].x + 90.0).abs() < 1e-9);
        assert!(layer.x.abs() < 1e-9);
        assert!((layer.absolute_rect().x0 + 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_container_does_not_shrink_below_label() {
        let mut scene = Scene::new();
        let rect = scene.insert_layer(Layer::rectangle(0.0, 0.0, 200.0, 100.0)).unwrap();
        let text = scene
            .insert_layer(Layer::text(0.0, 0.0, 0.0, 0.0, "label", 20.0))
            .unwrap();
        bind_text_to_container(&mut scene, text, rect);

        resize(&mut scene, rect, TransformHandle::SE, Point::new(2.0, 2.0), TransformModifiers::default());
        let container = scene.get_layer(rect).unwrap();
        let min_width = approx_min_line_width(20.0, scene.text_measurer());
        assert!(container.width >= min_width - 1e-9);
        assert!(container.height >= approx_min_line_height(20.0, 1.25) - 1e-9);
        let label = scene.get_layer(text).unwrap();
        assert_eq!(label.container_id(), Some(rect));
    }

    #[test]
    fn test_bound_arrow_follows_resize() {
        let mut scene = Scene::new();
        let rect = scene.insert_layer(Layer::rectangle(100.0, 0.0, 100.0, 100.0)).unwrap();
        let arrow = scene
            .insert_layer(Layer::arrow(0.0, 50.0, vec![Point::ZERO, Point::new(90.0, 0.0)]))
            .unwrap();
        bind_linear_layer(&mut scene, arrow, rect, BindingEdge::End);

        resize(&mut scene, rect, TransformHandle::W, Point::new(120.0, 50.0), TransformModifiers::default());
        assert!((scene.get_layer(rect).unwrap().width - 80.0).abs() < 1e-9);
        let layer = scene.get_layer(arrow).unwrap();
        let binding = layer.end_binding().unwrap();
        assert!((binding.gap - 8.0).abs() < 1e-9, "gap {}", binding.gap);
        let tip = point_at_index_global(layer, 1).unwrap();
        assert!((tip.x - 112.0).abs() < 1e-6, "tip {tip:?}");
    }

    #[test]
    fn test_text_corner_resize_scales_font() {
        let mut scene = Scene::new();
        let id = scene
            .insert_layer(Layer::text(0.0, 0.0, 50.0, 20.0, "hello", 20.0))
            .unwrap();
        resize_single_text_layer(&mut scene, id, TransformHandle::NW, Point::new(-50.0, -20.0));
        let layer = scene.get_layer(id).unwrap();
        assert_box(layer, -50.0, -20.0, 100.0, 40.0);
        assert!((layer.text_data().unwrap().font_size - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_resize_multiple_scales_about_anchor() {
        let mut scene = Scene::new();
        let a = scene.insert_layer(Layer::rectangle(0.0, 0.0, 50.0, 50.0)).unwrap();
        let b = scene.insert_layer(Layer::rectangle(50.0, 50.0, 50.0, 50.0)).unwrap();
        let session = TransformSession::begin(&scene, &[a, b], Point::new(100.0, 100.0));

        resize_multiple_layers(
            &mut scene,
            session.originals(),
            session.selected(),
            TransformHandle::SE,
            Point::new(200.0, 200.0),
            false,
        );
        assert_box(scene.get_layer(a).unwrap(), 0.0, 0.0, 100.0, 100.0);
        assert_box(scene.get_layer(b).unwrap(), 100.0, 100.0, 100.0, 100.0);

        // Past the anchor the selection mirrors, still from the originals.
        resize_multiple_layers(
            &mut scene,
            session.originals(),
            session.selected(),
            TransformHandle::SE,
            Point::new(-100.0, -100.0),
            false,
        );
        assert_box(scene.get_layer(a).unwrap(), -50.0, -50.0, 50.0, 50.0);
        assert_box(scene.get_layer(b).unwrap(), -100.0, -100.0, 50.0, 50.0);
    }

    #[test]
    fn test_resize_multiple_side_handle_ignores_other_axis() {
        let mut scene = Scene::new();
        let a = scene.insert_layer(Layer::rectangle(0.0, 0.0, 50.0, 50.0)).unwrap();
        let b = scene.insert_layer(Layer::rectangle(50.0, 50.0, 50.0, 50.0)).unwrap();
        let session = TransformSession::begin(&scene, &[a, b], Point::new(100.0, 50.0));

        // The pointer is far below the box; only its x distance counts.
        resize_multiple_layers(
            &mut scene,
            session.originals(),
            session.selected(),
            TransformHandle::E,
            Point::new(200.0, 400.0),
            false,
        );
        assert_box(scene.get_layer(a).unwrap(), 0.0, -50.0, 100.0, 100.0);
        assert_box(scene.get_layer(b).unwrap(), 100.0, 50.0, 100.0, 100.0);
    }

    #[test]
    fn test_resize_multiple_scales_text_font() {
        let mut scene = Scene::new();
        let rect = scene.insert_layer(Layer::rectangle(0.0, 0.0, 50.0, 50.0)).unwrap();
        let text = scene
            .insert_layer(Layer::text(50.0, 0.0, 50.0, 50.0, "a", 10.0))
            .unwrap();
        let session = TransformSession::begin(&scene, &[rect, text], Point::ZERO);
        resize_multiple_layers(
            &mut scene,
            session.originals(),
            session.selected(),
            TransformHandle::SE,
            Point::new(300.0, 150.0),
            false,
        );
        let label = scene.get_layer(text).unwrap();
        assert!((label.text_data().unwrap().font_size - 30.0).abs() < 1e-9);
        assert!((label.x - 150.0).abs() < 1e-9);
    }
}
