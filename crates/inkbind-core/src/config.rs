//! Editor configuration and the view state slice the engine reads.

use crate::error::{EngineError, EngineResult};
use crate::layer::LayerId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Tunables for interaction thresholds, in screen pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Whether arrows snap to shapes they touch.
    pub binding_enabled: bool,
    /// Grid spacing for point snapping (None = no grid).
    pub grid_size: Option<f64>,
    /// Pointer tolerance for hit testing.
    pub hit_threshold: f64,
    /// Size of a point handle in the linear editor.
    pub point_handle_size: f64,
    /// Distance a pointer must travel before a drag starts.
    pub dragging_threshold: f64,
    /// Distance under which the two ends of a path close into a loop.
    pub line_confirm_threshold: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            binding_enabled: true,
            grid_size: None,
            hit_threshold: 10.0,
            point_handle_size: 10.0,
            dragging_threshold: 10.0,
            line_confirm_threshold: 8.0,
        }
    }
}

impl EditorConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> EngineResult<()> {
        let positive = [
            ("hit_threshold", self.hit_threshold),
            ("point_handle_size", self.point_handle_size),
            ("dragging_threshold", self.dragging_threshold),
            ("line_confirm_threshold", self.line_confirm_threshold),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(EngineError::InvalidConfig(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        match self.grid_size {
            Some(grid) if !grid.is_finite() || grid <= 0.0 => Err(EngineError::InvalidConfig(
                format!("grid_size must be positive, got {grid}"),
            )),
            _ => Ok(()),
        }
    }
}

/// The part of the application state the engine consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewState {
    /// Current zoom factor (1.0 = 100%).
    pub zoom: f64,
    /// Currently selected layers.
    pub selected_layer_ids: HashSet<LayerId>,
    /// Layer open in the point editor, if any.
    pub editing_linear_layer: Option<LayerId>,
    /// Shape the arrow being drawn started on.
    pub start_bound_layer: Option<LayerId>,
    #[serde(default)]
    pub config: EditorConfig,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            selected_layer_ids: HashSet::new(),
            editing_linear_layer: None,
            start_bound_layer: None,
            config: EditorConfig::default(),
        }
    }
}

impl ViewState {
    /// Hit tolerance in scene units at the current zoom.
    pub fn hit_threshold(&self) -> f64 {
        self.config.hit_threshold / self.zoom
    }

    pub fn is_selected(&self, id: LayerId) -> bool {
        self.selected_layer_ids.contains(&id)
    }

    /// Replace the selection.
    pub fn select(&mut self, ids: impl IntoIterator<Item = LayerId>) {
        self.selected_layer_ids = ids.into_iter().collect();
    }
}
