use super::TransformSession;
use crate::binding::{BoundUpdateOptions, update_bound_layers};
use crate::config::ViewState;
use crate::layer::{Layer, LayerId, common_bounds};
use crate::linear_editor::grid_point;
use crate::mutation::LayerUpdate;
use crate::scene::Scene;
use kurbo::{Point, Vec2};
use std::collections::HashMap;

/// Offset that puts the top-left of the dragged box on the grid.
fn snapped_offset(top_left: Point, offset: Vec2, grid_size: Option<f64>) -> Vec2 {
    grid_point(top_left + offset, grid_size) - top_left
}

fn translate(scene: &mut Scene, originals: &HashMap<LayerId, Layer>, id: LayerId, offset: Vec2) {
    let Some(start) = originals
        .get(&id)
        .or_else(|| scene.get_non_deleted_layer(id))
        .map(|layer| Point::new(layer.x, layer.y))
    else {
        return;
    };
    let next = start + offset;
    scene.mutate_quiet(id, LayerUpdate::position(next.x, next.y));
}

/// Move the session's selection by `offset` from where it started.
/// Frames drag their children along, containers drag their labels.
pub(super) fn drag_from_originals(
    scene: &mut Scene,
    session: &TransformSession,
    offset: Vec2,
    grid_size: Option<f64>,
) {
    let mut moving: Vec<LayerId> = session.selected().to_vec();
    for &id in session.selected() {
        if !scene.get_non_deleted_layer(id).is_some_and(Layer::is_frame) {
            continue;
        }
        let children: Vec<LayerId> = scene
            .non_deleted_layers()
            .filter(|layer| layer.frame_id == Some(id) && !moving.contains(&layer.id))
            .map(|layer| layer.id)
            .collect();
        moving.extend(children);
    }

    let start_bounds = common_bounds(
        moving
            .iter()
            .filter_map(|id| session.original(*id).or_else(|| scene.get_non_deleted_layer(*id))),
    );
    let Some(start_bounds) = start_bounds else {
        return;
    };
    let offset = snapped_offset(start_bounds.origin(), offset, grid_size);

    for &id in &moving {
        translate(scene, session.originals(), id, offset);
        let label = scene
            .get_non_deleted_layer(id)
            .and_then(Layer::bound_text_id)
            .filter(|text_id| !moving.contains(text_id));
        if let Some(text_id) = label {
            translate(scene, session.originals(), text_id, offset);
        }
        update_bound_layers(
            scene,
            id,
            BoundUpdateOptions {
                new_size: None,
                simultaneously_updated: &moving,
            },
        );
    }
    scene.inform_mutation();
}

/// Move layers by `delta`, as a keyboard nudge does, then re-evaluate
/// bindings of the moved lines and of lines near the moved shapes.
pub fn drag_selected_layers(scene: &mut Scene, ids: &[LayerId], delta: Vec2, view: &ViewState) {
    let session = TransformSession::begin(scene, ids, Point::ZERO);
    drag_from_originals(scene, &session, delta, None);
    session.finish(scene, view);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindingEdge, bind_linear_layer};
    use crate::linear_editor::point_at_index_global;
    use crate::text::bind_text_to_container;

    #[test]
    fn test_drag_snaps_to_grid() {
        let mut scene = Scene::new();
        let id = scene.insert_layer(Layer::rectangle(3.0, 3.0, 10.0, 10.0)).unwrap();
        let mut view = ViewState::default();
        view.config.grid_size = Some(20.0);
        let session = TransformSession::begin(&scene, &[id], Point::new(5.0, 5.0));

        session.drag(&mut scene, Point::new(15.0, 15.0), &view);
        let layer = scene.get_layer(id).unwrap();
        assert!((layer.x - 20.0).abs() < 1e-9 && (layer.y - 20.0).abs() < 1e-9);

        // Always relative to the start, so going back restores the grid cell.
        session.drag(&mut scene, Point::new(5.0, 5.0), &view);
        assert!(scene.get_layer(id).unwrap().x.abs() < 1e-9);
    }

    #[test]
    fn test_drag_moves_frame_children_and_labels() {
        let mut scene = Scene::new();
        let frame = scene
            .insert_layer(Layer::frame(0.0, 0.0, 200.0, 200.0, None))
            .unwrap();
        let mut child = Layer::rectangle(10.0, 10.0, 100.0, 50.0);
        child.frame_id = Some(frame);
        let child = scene.insert_layer(child).unwrap();
        let text = scene.insert_layer(Layer::text(0.0, 0.0, 0.0, 0.0, "a", 20.0)).unwrap();
        bind_text_to_container(&mut scene, text, child);
        let label_x = scene.get_layer(text).unwrap().x;

        let session = TransformSession::begin(&scene, &[frame], Point::ZERO);
        session.drag(&mut scene, Point::new(30.0, 0.0), &ViewState::default());
        assert!((scene.get_layer(frame).unwrap().x - 30.0).abs() < 1e-9);
        assert!((scene.get_layer(child).unwrap().x - 40.0).abs() < 1e-9);
        assert!((scene.get_layer(text).unwrap().x - label_x - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_bound_arrow_follows_dragged_shape() {
        let mut scene = Scene::new();
        let rect = scene.insert_layer(Layer::rectangle(100.0, 0.0, 100.0, 100.0)).unwrap();
        let arrow = scene
            .insert_layer(Layer::arrow(0.0, 50.0, vec![Point::ZERO, Point::new(90.0, 0.0)]))
            .unwrap();
        bind_linear_layer(&mut scene, arrow, rect, BindingEdge::End);

        let session = TransformSession::begin(&scene, &[rect], Point::ZERO);
        session.drag(&mut scene, Point::new(50.0, 0.0), &ViewState::default());
        let tip = point_at_index_global(scene.get_layer(arrow).unwrap(), 1).unwrap();
        assert!((tip.x - 140.0).abs() < 1e-6, "tip {tip:?}");

        // Moving both keeps the arrow's own geometry.
        let session = TransformSession::begin(&scene, &[rect, arrow], Point::ZERO);
        session.drag(&mut scene, Point::new(0.0, 10.0), &ViewState::default());
        let layer = scene.get_layer(arrow).unwrap();
        assert!((layer.y - 60.0).abs() < 1e-9);
        assert!((layer.points()[1].x - 140.0).abs() < 1e-6);
    }
}
