//! The mutation gateway.
//!
//! Layers are only ever changed through [`mutate_layer`]: it applies a
//! [`LayerUpdate`], skips fields whose value did not change, and on any real
//! change bumps `version`, `version_nonce` and `updated`.

use crate::geometry::bounds_of_points;
use crate::layer::{BoundLayer, Layer, LayerId, LayerKind, PointBinding};
use kurbo::Point;

#[cfg(not(target_arch = "wasm32"))]
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(target_arch = "wasm32")]
use web_time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Random 32-bit value for `version_nonce`.
pub(crate) fn random_nonce() -> u32 {
    uuid::Uuid::new_v4().as_u128() as u32
}

/// A partial update. `None` leaves the field untouched; for nullable fields
/// `Some(None)` clears them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerUpdate {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub angle: Option<f64>,
    /// New relative points. Width and height follow from them.
    pub points: Option<Vec<Point>>,
    pub start_binding: Option<Option<PointBinding>>,
    pub end_binding: Option<Option<PointBinding>>,
    pub last_committed_point: Option<Option<Point>>,
    pub bound_layers: Option<Vec<BoundLayer>>,
    pub is_deleted: Option<bool>,
    pub group_ids: Option<Vec<String>>,
    pub frame_id: Option<Option<LayerId>>,
    pub locked: Option<bool>,
    pub text: Option<String>,
    pub original_text: Option<String>,
    pub font_size: Option<f64>,
    pub container_id: Option<Option<LayerId>>,
    pub file_id: Option<Option<String>>,
    pub scale: Option<[f64; 2]>,
}

impl LayerUpdate {
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Default::default()
        }
    }

    pub fn points(points: Vec<Point>) -> Self {
        Self {
            points: Some(points),
            ..Default::default()
        }
    }

    pub fn bound_layers(bound_layers: Vec<BoundLayer>) -> Self {
        Self {
            bound_layers: Some(bound_layers),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// What an update actually changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationOutcome {
    /// At least one field changed and the version was bumped.
    pub changed: bool,
    /// A field the cached outline depends on changed.
    pub shape_changed: bool,
}

fn set<T: PartialEq>(slot: &mut T, value: Option<T>, changed: &mut bool) -> bool {
    match value {
        Some(value) if *slot != value => {
            *slot = value;
            *changed = true;
            true
        }
        _ => false,
    }
}

fn points_equal(a: &[Point], b: &[Point]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(p, q)| p.x == q.x && p.y == q.y)
}

fn warn_inapplicable(layer: &Layer, field: &str) {
    log::warn!(
        "Ignoring '{}' update on {} layer {}",
        field,
        layer.kind_name(),
        layer.id
    );
}

/// Apply `update` to `layer`.
///
/// Fields equal to their current value are skipped, so an empty update or
/// one restating the current state leaves the version untouched. Fields that
/// do not exist on the layer's kind are ignored with a warning.
pub fn mutate_layer(layer: &mut Layer, update: LayerUpdate) -> MutationOutcome {
    let mut changed = false;
    let mut shape_changed = false;

    let LayerUpdate {
        x,
        y,
        mut width,
        mut height,
        angle,
        points,
        start_binding,
        end_binding,
        last_committed_point,
        bound_layers,
        is_deleted,
        group_ids,
        frame_id,
        locked,
        text,
        original_text,
        font_size,
        container_id,
        file_id,
        scale,
    } = update;

    if let Some(points) = points {
        let slot = match &mut layer.kind {
            LayerKind::Line(data) | LayerKind::Arrow(data) => Some(&mut data.points),
            LayerKind::Freedraw(data) => Some(&mut data.points),
            _ => None,
        };
        match slot {
            Some(slot) => {
                if !points_equal(slot, &points) {
                    let size = bounds_of_points(&points).unwrap_or(kurbo::Rect::ZERO);
                    width = Some(size.width());
                    height = Some(size.height());
                    *slot = points;
                    changed = true;
                    shape_changed = true;
                }
            }
            None => warn_inapplicable(layer, "points"),
        }
    }

    set(&mut layer.x, x, &mut changed);
    set(&mut layer.y, y, &mut changed);
    shape_changed |= set(&mut layer.width, width, &mut changed);
    shape_changed |= set(&mut layer.height, height, &mut changed);
    set(&mut layer.angle, angle, &mut changed);
    set(&mut layer.bound_layers, bound_layers, &mut changed);
    set(&mut layer.is_deleted, is_deleted, &mut changed);
    set(&mut layer.group_ids, group_ids, &mut changed);
    set(&mut layer.frame_id, frame_id, &mut changed);
    set(&mut layer.locked, locked, &mut changed);

    if start_binding.is_some() || end_binding.is_some() || last_committed_point.is_some() {
        match layer.linear_data_mut() {
            Some(data) => {
                set(&mut data.start_binding, start_binding, &mut changed);
                set(&mut data.end_binding, end_binding, &mut changed);
                set(&mut data.last_committed_point, last_committed_point, &mut changed);
            }
            None => warn_inapplicable(layer, "binding"),
        }
    }

    if text.is_some() || original_text.is_some() || font_size.is_some() || container_id.is_some() {
        match &mut layer.kind {
            LayerKind::Text(data) => {
                set(&mut data.text, text, &mut changed);
                set(&mut data.original_text, original_text, &mut changed);
                set(&mut data.font_size, font_size, &mut changed);
                set(&mut data.container_id, container_id, &mut changed);
            }
            _ => warn_inapplicable(layer, "text"),
        }
    }

    if file_id.is_some() || scale.is_some() {
        match &mut layer.kind {
            LayerKind::Image(data) => {
                shape_changed |= set(&mut data.file_id, file_id, &mut changed);
                // Compared element-wise, like points.
                match scale {
                    Some(scale) if data.scale[0] != scale[0] || data.scale[1] != scale[1] => {
                        data.scale = scale;
                        changed = true;
                    }
                    _ => {}
                }
            }
            _ => warn_inapplicable(layer, "image"),
        }
    }

    if changed {
        bump_version(layer);
    }

    MutationOutcome {
        changed,
        shape_changed,
    }
}

fn bump_version(layer: &mut Layer) {
    layer.version = layer.version.wrapping_add(1);
    layer.version_nonce = random_nonce();
    layer.updated = now_millis();
}
