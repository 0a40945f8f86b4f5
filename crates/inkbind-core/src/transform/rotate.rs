use super::SHIFT_LOCKING_ANGLE;
use crate::binding::{BoundUpdateOptions, update_bound_layers};
use crate::geometry::{normalize_angle, rotate_point};
use crate::layer::{Layer, LayerId};
use crate::mutation::LayerUpdate;
use crate::scene::Scene;
use kurbo::Point;
use std::collections::HashMap;
use std::f64::consts::PI;

/// Angle of `pointer` around `center`, zero pointing up.
fn pointer_angle(pointer: Point, center: Point, discrete: bool) -> f64 {
    let mut angle = 5.0 * PI / 2.0 + (pointer.y - center.y).atan2(pointer.x - center.x);
    if discrete {
        angle += SHIFT_LOCKING_ANGLE / 2.0;
        angle -= angle % SHIFT_LOCKING_ANGLE;
    }
    angle
}

/// Rotate a layer so its top faces `pointer`.
///
/// Frames never rotate. Bound text takes the container's angle, except on
/// arrows where labels stay upright.
pub fn rotate_single_layer(scene: &mut Scene, id: LayerId, pointer: Point, discrete_angle: bool) {
    let Some(layer) = scene.get_non_deleted_layer(id) else {
        return;
    };
    let angle = if layer.is_frame() {
        0.0
    } else {
        normalize_angle(pointer_angle(pointer, layer.center(), discrete_angle))
    };
    let label = layer.bound_text_id().filter(|_| !layer.is_arrow());

    let update = LayerUpdate {
        angle: Some(angle),
        ..Default::default()
    };
    scene.mutate_quiet(id, update.clone());
    if let Some(text_id) = label {
        scene.mutate_quiet(text_id, update);
    }
    update_bound_layers(scene, id, BoundUpdateOptions::default());
    scene.inform_mutation();
}

/// Rotate several layers together around `center`.
///
/// The pointer angle around `center` is added to each layer's original
/// angle, and each layer's own center orbits `center` by the same amount.
pub fn rotate_multiple_layers(
    scene: &mut Scene,
    originals: &HashMap<LayerId, Layer>,
    selected: &[LayerId],
    pointer: Point,
    discrete_angle: bool,
    center: Point,
) {
    let center_angle = pointer_angle(pointer, center, discrete_angle);
    for &id in selected {
        let Some(layer) = scene.get_non_deleted_layer(id) else {
            continue;
        };
        if layer.is_frame() {
            continue;
        }
        let layer_center = layer.center();
        let original_angle = originals.get(&id).map_or(layer.angle, |orig| orig.angle);
        let rotated = rotate_point(layer_center, center, center_angle + original_angle - layer.angle);
        let shift = rotated - layer_center;
        let angle = normalize_angle(center_angle + original_angle);
        let position = Point::new(layer.x, layer.y) + shift;
        let label = layer
            .bound_text_id()
            .filter(|_| !layer.is_arrow())
            .and_then(|text_id| scene.get_non_deleted_layer(text_id))
            .map(|text| (text.id, Point::new(text.x, text.y) + shift));

        scene.mutate_quiet(
            id,
            LayerUpdate {
                x: Some(position.x),
                y: Some(position.y),
                angle: Some(angle),
                ..Default::default()
            },
        );
        update_bound_layers(
            scene,
            id,
            BoundUpdateOptions {
                new_size: None,
                simultaneously_updated: selected,
            },
        );
        if let Some((text_id, position)) = label {
            scene.mutate_quiet(
                text_id,
                LayerUpdate {
                    x: Some(position.x),
                    y: Some(position.y),
                    angle: Some(angle),
                    ..Default::default()
                },
            );
        }
    }
    scene.inform_mutation();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::bind_text_to_container;
    use crate::transform::TransformSession;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_pointer_above_center_is_zero() {
        let mut scene = Scene::new();
        let id = scene.insert_layer(Layer::rectangle(0.0, 0.0, 100.0, 100.0)).unwrap();
        rotate_single_layer(&mut scene, id, Point::new(50.0, -100.0), false);
        assert!(scene.get_layer(id).unwrap().angle.abs() < 1e-9);
        rotate_single_layer(&mut scene, id, Point::new(200.0, 50.0), false);
        assert!((scene.get_layer(id).unwrap().angle - FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn test_discrete_rotation_snaps() {
        let mut scene = Scene::new();
        let id = scene.insert_layer(Layer::rectangle(0.0, 0.0, 100.0, 100.0)).unwrap();
        // About 20 degrees clockwise from up.
        let pointer = Point::new(50.0 + 100.0 * 20f64.to_radians().sin(), 50.0 - 100.0 * 20f64.to_radians().cos());
        rotate_single_layer(&mut scene, id, pointer, true);
        let angle = scene.get_layer(id).unwrap().angle;
        assert!((angle - SHIFT_LOCKING_ANGLE).abs() < 1e-9, "angle {angle}");
    }

    #[test]
    fn test_frames_do_not_rotate() {
        let mut scene = Scene::new();
        let id = scene
            .insert_layer(Layer::frame(0.0, 0.0, 100.0, 100.0, None))
            .unwrap();
        rotate_single_layer(&mut scene, id, Point::new(200.0, 50.0), false);
        assert!(scene.get_layer(id).unwrap().angle.abs() < f64::EPSILON);
    }

    #[test]
    fn test_label_follows_container_rotation() {
        let mut scene = Scene::new();
        let rect = scene.insert_layer(Layer::rectangle(0.0, 0.0, 100.0, 100.0)).unwrap();
        let text = scene.insert_layer(Layer::text(0.0, 0.0, 0.0, 0.0, "a", 20.0)).unwrap();
        bind_text_to_container(&mut scene, text, rect);
        rotate_single_layer(&mut scene, rect, Point::new(200.0, 50.0), false);
        assert!((scene.get_layer(text).unwrap().angle - FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn test_rotate_multiple_orbits_center() {
        let mut scene = Scene::new();
        let a = scene.insert_layer(Layer::rectangle(0.0, 0.0, 20.0, 20.0)).unwrap();
        let b = scene.insert_layer(Layer::rectangle(80.0, 0.0, 20.0, 20.0)).unwrap();
        let session = TransformSession::begin(&scene, &[a, b], Point::new(50.0, -50.0));
        let center = session.center();
        assert!((center - Point::new(50.0, 10.0)).hypot() < 1e-9);

        // Pointer to the right of the center: a quarter turn.
        for _ in 0..2 {
            rotate_multiple_layers(
                &mut scene,
                session.originals(),
                session.selected(),
                Point::new(150.0, 10.0),
                false,
                center,
            );
        }
        let a = scene.get_layer(a).unwrap();
        assert!((a.angle - FRAC_PI_2).abs() < 1e-9);
        // Center (10, 10) orbits to (50, -30).
        assert!((a.center() - Point::new(50.0, -30.0)).hypot() < 1e-9, "{:?}", a.center());
        let b = scene.get_layer(b).unwrap();
        assert!((b.center() - Point::new(50.0, 50.0)).hypot() < 1e-9, "{:?}", b.center());
    }
}
