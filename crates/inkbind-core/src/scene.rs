//! The scene registry.
//!
//! Owns every layer of a drawing in stacking order (back to front), resolves
//! id references, caches outlines and notifies listeners after mutations.

use crate::error::{EngineError, EngineResult};
use crate::layer::{Layer, LayerId};
use crate::mutation::{MutationOutcome, LayerUpdate, mutate_layer};
use crate::outline::{Outline, OutlineCache, OutlineProvider, PreciseOutlineProvider};
use crate::text::{ApproxTextMeasurer, TextMeasurer};
use std::collections::HashMap;
use std::rc::Rc;

/// Callback run after layers in the scene changed.
pub type MutationListener = Box<dyn FnMut()>;

/// All layers of a drawing.
pub struct Scene {
    /// All layers, keyed by ID.
    layers: HashMap<LayerId, Layer>,
    /// Stacking order (back to front).
    order: Vec<LayerId>,
    outlines: OutlineCache,
    provider: Box<dyn OutlineProvider>,
    measurer: Box<dyn TextMeasurer>,
    listeners: Vec<MutationListener>,
    /// Incremented on every notification.
    scene_nonce: u32,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("layers", &self.order.len())
            .field("outlines", &self.outlines)
            .field("scene_nonce", &self.scene_nonce)
            .finish()
    }
}

impl Scene {
    /// Create an empty scene using exact outlines.
    pub fn new() -> Self {
        Self::with_provider(Box::new(PreciseOutlineProvider))
    }

    /// Create an empty scene with a custom outline provider.
    pub fn with_provider(provider: Box<dyn OutlineProvider>) -> Self {
        Self {
            layers: HashMap::new(),
            order: Vec::new(),
            outlines: OutlineCache::new(),
            provider,
            measurer: Box::new(ApproxTextMeasurer),
            listeners: Vec::new(),
            scene_nonce: 0,
        }
    }

    /// Use `measurer` for laying out bound text.
    pub fn with_text_measurer(mut self, measurer: Box<dyn TextMeasurer>) -> Self {
        self.measurer = measurer;
        self
    }

    pub fn text_measurer(&self) -> &dyn TextMeasurer {
        self.measurer.as_ref()
    }

    /// Build a scene from layers in stacking order.
    pub fn from_layers(layers: impl IntoIterator<Item = Layer>) -> EngineResult<Self> {
        let mut scene = Self::new();
        for layer in layers {
            scene.insert_layer(layer)?;
        }
        Ok(scene)
    }

    /// Add a layer on top of the stack.
    pub fn insert_layer(&mut self, layer: Layer) -> EngineResult<LayerId> {
        let id = layer.id;
        if self.layers.contains_key(&id) {
            return Err(EngineError::DuplicateLayer(id));
        }
        self.order.push(id);
        self.layers.insert(id, layer);
        Ok(id)
    }

    /// Get a layer by ID, deleted or not.
    pub fn get_layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(&id)
    }

    /// Get a layer by ID unless it is deleted.
    pub fn get_non_deleted_layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(&id).filter(|layer| !layer.is_deleted)
    }

    /// Layers in stacking order, including deleted ones.
    pub fn layers(&self) -> impl DoubleEndedIterator<Item = &Layer> {
        self.order.iter().filter_map(|id| self.layers.get(id))
    }

    /// Non-deleted layers in stacking order.
    pub fn non_deleted_layers(&self) -> impl DoubleEndedIterator<Item = &Layer> {
        self.layers().filter(|layer| !layer.is_deleted)
    }

    /// Layer ids in stacking order.
    pub fn layer_ids(&self) -> &[LayerId] {
        &self.order
    }

    /// Owned copies of all layers in stacking order.
    pub fn to_layers(&self) -> Vec<Layer> {
        self.layers().cloned().collect()
    }

    /// Replace the stacking order. Ids not present in the scene are
    /// dropped; layers missing from `order` keep their relative position at
    /// the end.
    pub fn reorder(&mut self, order: Vec<LayerId>) {
        let mut next: Vec<LayerId> = order
            .into_iter()
            .filter(|id| self.layers.contains_key(id))
            .collect();
        let rest: Vec<LayerId> = self
            .order
            .iter()
            .copied()
            .filter(|id| !next.contains(id))
            .collect();
        next.extend(rest);
        self.order = next;
        self.inform_mutation();
    }

    /// Apply an update through the mutation gateway and notify listeners.
    pub fn mutate(&mut self, id: LayerId, update: LayerUpdate) -> MutationOutcome {
        let outcome = self.mutate_quiet(id, update);
        if outcome.changed {
            self.inform_mutation();
        }
        outcome
    }

    /// Apply an update without notifying listeners, for batched edits.
    /// Call [`Scene::inform_mutation`] once the batch is done.
    pub fn mutate_quiet(&mut self, id: LayerId, update: LayerUpdate) -> MutationOutcome {
        let Some(layer) = self.layers.get_mut(&id) else {
            return MutationOutcome::default();
        };
        let outcome = mutate_layer(layer, update);
        if outcome.shape_changed {
            self.outlines.invalidate(id);
        }
        outcome
    }

    /// Notify listeners that the scene changed.
    pub fn inform_mutation(&mut self) {
        self.scene_nonce = self.scene_nonce.wrapping_add(1);
        log::trace!("Scene mutated (nonce {})", self.scene_nonce);
        for listener in &mut self.listeners {
            listener();
        }
    }

    /// Register a callback run after every notified mutation.
    pub fn add_listener(&mut self, listener: MutationListener) {
        self.listeners.push(listener);
    }

    pub fn scene_nonce(&self) -> u32 {
        self.scene_nonce
    }

    /// Cached outline of a layer.
    pub fn outline(&self, layer: &Layer) -> Option<Rc<Outline>> {
        self.outlines.get_or_generate(layer, self.provider.as_ref())
    }

    /// Check if the scene is empty.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Get the number of layers, deleted ones included.
    pub fn len(&self) -> usize {
        self.layers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_insert_and_lookup() {
        let mut scene = Scene::new();
        let rect = Layer::rectangle(0.0, 0.0, 10.0, 10.0);
        let id = scene.insert_layer(rect.clone()).unwrap();
        assert_eq!(scene.get_layer(id).unwrap().id, id);
        assert!(matches!(
            scene.insert_layer(rect),
            Err(EngineError::DuplicateLayer(_))
        ));
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn test_deleted_layers_are_filtered() {
        let mut scene = Scene::new();
        let a = scene.insert_layer(Layer::rectangle(0.0, 0.0, 1.0, 1.0)).unwrap();
        let b = scene.insert_layer(Layer::rectangle(0.0, 0.0, 1.0, 1.0)).unwrap();
        scene.mutate(
            a,
            LayerUpdate {
                is_deleted: Some(true),
                ..Default::default()
            },
        );
        assert!(scene.get_non_deleted_layer(a).is_none());
        assert!(scene.get_layer(a).is_some());
        let ids: Vec<LayerId> = scene.non_deleted_layers().map(|l| l.id).collect();
        assert_eq!(ids, vec![b]);
    }

    #[test]
    fn test_listeners_fire_only_on_change() {
        let calls = Rc::new(Cell::new(0));
        let mut scene = Scene::new();
        let counter = Rc::clone(&calls);
        scene.add_listener(Box::new(move || counter.set(counter.get() + 1)));
        let id = scene.insert_layer(Layer::rectangle(0.0, 0.0, 1.0, 1.0)).unwrap();

        scene.mutate(id, LayerUpdate::position(0.0, 0.0));
        assert_eq!(calls.get(), 0);
        scene.mutate(id, LayerUpdate::position(4.0, 0.0));
        assert_eq!(calls.get(), 1);
        scene.mutate_quiet(id, LayerUpdate::position(8.0, 0.0));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_resize_invalidates_outline() {
        let mut scene = Scene::new();
        let id = scene.insert_layer(Layer::rectangle(0.0, 0.0, 10.0, 10.0)).unwrap();
        let first = scene.outline(scene.get_layer(id).unwrap()).unwrap();

        scene.mutate(id, LayerUpdate::position(50.0, 50.0));
        let moved = scene.outline(scene.get_layer(id).unwrap()).unwrap();
        assert!(Rc::ptr_eq(&first, &moved));

        scene.mutate(
            id,
            LayerUpdate {
                width: Some(20.0),
                ..Default::default()
            },
        );
        let resized = scene.outline(scene.get_layer(id).unwrap()).unwrap();
        assert!(!Rc::ptr_eq(&first, &resized));
    }

    #[test]
    fn test_reorder_keeps_unlisted_layers() {
        let mut scene = Scene::new();
        let a = scene.insert_layer(Layer::rectangle(0.0, 0.0, 1.0, 1.0)).unwrap();
        let b = scene.insert_layer(Layer::rectangle(0.0, 0.0, 1.0, 1.0)).unwrap();
        let c = scene.insert_layer(Layer::rectangle(0.0, 0.0, 1.0, 1.0)).unwrap();
        scene.reorder(vec![c, a]);
        assert_eq!(scene.layer_ids(), &[c, a, b]);
    }
}
