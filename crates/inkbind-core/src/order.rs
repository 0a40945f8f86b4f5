//! Stacking order normalization.
//!
//! Members of a group are kept contiguous (nested groups contiguous within
//! their parent), and a bound label sits directly above its container.

use crate::layer::{Layer, LayerId};
use crate::scene::Scene;
use std::collections::{HashMap, HashSet};

/// Order a run of layers sharing a top-level group so that layers sharing
/// the first layer's inner groups come first, recursively.
fn order_inner_groups(layers: Vec<&Layer>) -> Vec<&Layer> {
    let Some((first, rest)) = layers.split_first() else {
        return Vec::new();
    };
    let signature = first.group_ids.as_slice();
    let (mut same, other): (Vec<&Layer>, Vec<&Layer>) = rest
        .iter()
        .copied()
        .partition(|layer| layer.group_ids.starts_with(signature));
    same.insert(0, *first);
    same.extend(order_inner_groups(other));
    same
}

fn normalize_group_order(layers: &[Layer]) -> Option<Vec<&Layer>> {
    let mut sorted: Vec<&Layer> = Vec::with_capacity(layers.len());
    let mut handled: HashSet<LayerId> = HashSet::new();

    for (index, layer) in layers.iter().enumerate() {
        if handled.contains(&layer.id) {
            continue;
        }
        // Group ids run from the innermost to the outermost group.
        let Some(top_group) = layer.group_ids.last() else {
            handled.insert(layer.id);
            sorted.push(layer);
            continue;
        };
        let members: Vec<&Layer> = layers[index..]
            .iter()
            .filter(|member| !handled.contains(&member.id) && member.group_ids.contains(top_group))
            .collect();
        handled.extend(members.iter().map(|member| member.id));
        sorted.extend(order_inner_groups(members));
    }

    (sorted.len() == layers.len()).then_some(sorted)
}

fn normalize_bound_text_order<'a>(layers: &[&'a Layer]) -> Option<Vec<&'a Layer>> {
    let present: HashMap<LayerId, &Layer> = layers.iter().map(|layer| (layer.id, *layer)).collect();
    // Labels that will be emitted right after their container.
    let attached: HashSet<LayerId> = layers
        .iter()
        .filter_map(|layer| {
            let container = layer.container_id().and_then(|id| present.get(&id))?;
            (container.bound_text_id() == Some(layer.id)).then_some(layer.id)
        })
        .collect();

    let mut sorted = Vec::with_capacity(layers.len());
    for layer in layers {
        if attached.contains(&layer.id) {
            continue;
        }
        sorted.push(*layer);
        if let Some(label) = layer.bound_text_id().filter(|id| attached.contains(id)) {
            if let Some(text) = present.get(&label) {
                sorted.push(*text);
            }
        }
    }
    (sorted.len() == layers.len()).then_some(sorted)
}

/// Reorder `layers` so groups are contiguous and labels follow their
/// containers.
///
/// If reordering would lose a layer, the input is returned unchanged.
pub fn normalize_layer_order(layers: Vec<Layer>) -> Vec<Layer> {
    let order: Option<Vec<LayerId>> = normalize_group_order(&layers)
        .and_then(|grouped| normalize_bound_text_order(&grouped))
        .map(|sorted| sorted.iter().map(|layer| layer.id).collect());
    let Some(order) = order else {
        log::error!("Layer order normalization lost layers, keeping the original order");
        return layers;
    };

    let mut by_id: HashMap<LayerId, Layer> = layers.into_iter().map(|layer| (layer.id, layer)).collect();
    order.into_iter().filter_map(|id| by_id.remove(&id)).collect()
}

/// Normalize the stacking order of every layer in `scene`.
pub fn normalize_scene_order(scene: &mut Scene) {
    let order: Vec<LayerId> = normalize_layer_order(scene.to_layers())
        .into_iter()
        .map(|layer| layer.id)
        .collect();
    if order.as_slice() != scene.layer_ids() {
        scene.reorder(order);
    }
}
