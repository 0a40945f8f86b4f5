//! Resize, rotate and drag of selected layers.
//!
//! A gesture starts with [`TransformSession::begin`], which snapshots the
//! selection. Every pointer move is then applied relative to that snapshot,
//! so rounding errors do not accumulate over a long drag.

mod drag;
mod resize;
mod rotate;

pub use drag::drag_selected_layers;
pub use resize::{rescale_points, resize_multiple_layers, resize_single_layer, resize_single_text_layer};
pub use rotate::{rotate_multiple_layers, rotate_single_layer};

use crate::binding::{
    BoundUpdateOptions, bind_or_unbind_selected_layers, is_binding_enabled, unbind_linear_layers, update_bound_layers,
};
use crate::config::ViewState;
use crate::layer::{BoundLayerKind, Layer, LayerId, common_bounds};
use crate::mutation::LayerUpdate;
use crate::scene::Scene;
use kurbo::{Point, Size};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::PI;

/// Snapping step for shift-constrained rotation and line angles (15°).
pub const SHIFT_LOCKING_ANGLE: f64 = PI / 12.0;

/// Resize handle on the selection box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformHandle {
    N,
    S,
    E,
    W,
    NE,
    NW,
    SE,
    SW,
}

impl TransformHandle {
    pub fn is_north(self) -> bool {
        matches!(self, Self::N | Self::NE | Self::NW)
    }

    pub fn is_south(self) -> bool {
        matches!(self, Self::S | Self::SE | Self::SW)
    }

    pub fn is_east(self) -> bool {
        matches!(self, Self::E | Self::NE | Self::SE)
    }

    pub fn is_west(self) -> bool {
        matches!(self, Self::W | Self::NW | Self::SW)
    }

    pub fn is_corner(self) -> bool {
        matches!(self, Self::NE | Self::NW | Self::SE | Self::SW)
    }

    /// Handles on the top or bottom edge.
    pub fn is_vertical_side(self) -> bool {
        matches!(self, Self::N | Self::S)
    }

    /// Handles on the left or right edge.
    pub fn is_horizontal_side(self) -> bool {
        matches!(self, Self::E | Self::W)
    }
}

/// What a pointer move on the selection box does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformAction {
    Resize(TransformHandle),
    Rotate,
}

/// Modifier keys that change a transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformModifiers {
    /// Snap rotation to [`SHIFT_LOCKING_ANGLE`] steps.
    pub discrete_angle: bool,
    /// Keep the width/height ratio while resizing.
    pub keep_aspect_ratio: bool,
    /// Resize symmetrically around the center.
    pub from_center: bool,
}

/// Snapshot of a selection taken when a transform gesture starts.
#[derive(Debug, Clone)]
pub struct TransformSession {
    /// Pointer position at the start of the gesture.
    pub origin: Point,
    /// Selected layer ids in stacking order.
    selected: Vec<LayerId>,
    /// Layer states at the start (selection, bound text, frame children).
    originals: HashMap<LayerId, Layer>,
    /// Center of the selection box at the start; the multi-rotation pivot.
    center: Point,
}

impl TransformSession {
    /// Snapshot `ids` (and everything that moves along with them).
    pub fn begin(scene: &Scene, ids: &[LayerId], origin: Point) -> Self {
        let selected: Vec<LayerId> = scene
            .non_deleted_layers()
            .filter(|layer| ids.contains(&layer.id))
            .map(|layer| layer.id)
            .collect();

        let mut originals = HashMap::new();
        for &id in &selected {
            let Some(layer) = scene.get_non_deleted_layer(id) else {
                continue;
            };
            for bound in &layer.bound_layers {
                if bound.kind == BoundLayerKind::Text {
                    if let Some(text) = scene.get_non_deleted_layer(bound.id) {
                        originals.insert(text.id, text.clone());
                    }
                }
            }
            if layer.is_frame() {
                for child in scene.non_deleted_layers().filter(|l| l.frame_id == Some(id)) {
                    originals.insert(child.id, child.clone());
                }
            }
            originals.insert(id, layer.clone());
        }

        let center = common_bounds(selected.iter().filter_map(|id| originals.get(id)))
            .map(|rect| rect.center())
            .unwrap_or(origin);

        Self {
            origin,
            selected,
            originals,
            center,
        }
    }

    pub fn selected(&self) -> &[LayerId] {
        &self.selected
    }

    /// State of a layer when the gesture started.
    pub fn original(&self, id: LayerId) -> Option<&Layer> {
        self.originals.get(&id)
    }

    pub fn originals(&self) -> &HashMap<LayerId, Layer> {
        &self.originals
    }

    /// Pivot of a multi-layer rotation.
    pub fn center(&self) -> Point {
        self.center
    }

    /// Move the selection so it follows the pointer.
    pub fn drag(&self, scene: &mut Scene, pointer: Point, view: &ViewState) {
        drag::drag_from_originals(scene, self, pointer - self.origin, view.config.grid_size);
    }

    /// Apply a resize or rotation for the current pointer position.
    ///
    /// Returns `false` when the action does not apply to the selection.
    pub fn transform(
        &self,
        scene: &mut Scene,
        action: TransformAction,
        pointer: Point,
        modifiers: TransformModifiers,
    ) -> bool {
        match (self.selected.as_slice(), action) {
            ([], _) => false,
            ([id], TransformAction::Rotate) => {
                rotate_single_layer(scene, *id, pointer, modifiers.discrete_angle);
                true
            }
            ([id], TransformAction::Resize(handle)) => {
                let Some(original) = self.original(*id) else {
                    return false;
                };
                if original.is_text() {
                    if !handle.is_corner() {
                        return false;
                    }
                    resize_single_text_layer(scene, *id, handle, pointer);
                } else {
                    resize_single_layer(scene, original, handle, pointer, modifiers);
                }
                true
            }
            (_, TransformAction::Rotate) => {
                rotate_multiple_layers(
                    scene,
                    &self.originals,
                    &self.selected,
                    pointer,
                    modifiers.discrete_angle,
                    self.center,
                );
                true
            }
            (_, TransformAction::Resize(handle)) => {
                resize_multiple_layers(
                    scene,
                    &self.originals,
                    &self.selected,
                    handle,
                    pointer,
                    modifiers.from_center,
                );
                true
            }
        }
    }

    /// Finish the gesture: bind moved lines to shapes they now touch and
    /// drop bindings they left. With binding disabled, moved lines are
    /// unbound instead.
    pub fn finish(&self, scene: &mut Scene, view: &ViewState) {
        let targets: Vec<LayerId> = self
            .selected
            .iter()
            .copied()
            .filter(|id| scene.get_non_deleted_layer(*id).is_some_and(|l| l.container_id().is_none()))
            .collect();
        if is_binding_enabled(view) {
            bind_or_unbind_selected_layers(scene, &targets);
        } else {
            unbind_linear_layers(scene, &targets);
        }
    }
}

/// Apply `update` to a layer and re-project the lines bound to it.
///
/// Bound gaps are scaled against the size the layer had before the update;
/// lines in `simultaneously_updated` only get their bindings rewritten.
fn apply_with_bindings(
    scene: &mut Scene,
    id: LayerId,
    update: LayerUpdate,
    new_size: Option<Size>,
    simultaneously_updated: &[LayerId],
) {
    if new_size.is_some() {
        if let Some(layer) = scene.get_non_deleted_layer(id) {
            let mut frozen = simultaneously_updated.to_vec();
            frozen.extend(
                layer
                    .bound_layers
                    .iter()
                    .filter(|bound| bound.kind == BoundLayerKind::Arrow)
                    .map(|bound| bound.id),
            );
            update_bound_layers(
                scene,
                id,
                BoundUpdateOptions {
                    new_size,
                    simultaneously_updated: &frozen,
                },
            );
        }
    }
    scene.mutate_quiet(id, update);
    update_bound_layers(
        scene,
        id,
        BoundUpdateOptions {
            new_size: None,
            simultaneously_updated,
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_sides() {
        assert!(TransformHandle::NE.is_north() && TransformHandle::NE.is_east());
        assert!(!TransformHandle::S.is_corner());
        assert!(TransformHandle::S.is_vertical_side());
        assert!(TransformHandle::W.is_horizontal_side());
        let json = serde_json::to_string(&TransformHandle::SW).unwrap();
        assert_eq!(json, "\"sw\"");
    }

    #[test]
    fn test_session_snapshots_bound_text_and_frame_children() {
        let mut scene = Scene::new();
        let frame = scene
            .insert_layer(Layer::frame(0.0, 0.0, 200.0, 200.0, None))
            .unwrap();
        let mut child = Layer::rectangle(10.0, 10.0, 20.0, 20.0);
        child.frame_id = Some(frame);
        let child = scene.insert_layer(child).unwrap();
        let rect = scene.insert_layer(Layer::rectangle(300.0, 0.0, 100.0, 50.0)).unwrap();
        let text = scene
            .insert_layer(Layer::text(0.0, 0.0, 10.0, 10.0, "hi", 20.0))
            .unwrap();
        crate::text::bind_text_to_container(&mut scene, text, rect);

        let session = TransformSession::begin(&scene, &[rect, frame], Point::ZERO);
        assert_eq!(session.selected(), &[frame, rect]);
        assert!(session.original(child).is_some());
        assert!(session.original(text).is_some());
        assert!((session.center().x - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_transform_dispatch_rejects_text_side_handles() {
        let mut scene = Scene::new();
        let text = scene
            .insert_layer(Layer::text(0.0, 0.0, 50.0, 20.0, "hello", 20.0))
            .unwrap();
        let session = TransformSession::begin(&scene, &[text], Point::ZERO);
        let handled = session.transform(
            &mut scene,
            TransformAction::Resize(TransformHandle::E),
            Point::new(80.0, 10.0),
            TransformModifiers::default(),
        );
        assert!(!handled);
        assert!(session.transform(
            &mut scene,
            TransformAction::Resize(TransformHandle::SE),
            Point::new(100.0, 40.0),
            TransformModifiers::default(),
        ));
        assert!((scene.get_layer(text).unwrap().width - 100.0).abs() < 1e-9);
    }
}
