//! Engine errors.
//!
//! Geometry, binding and transform operations never fail: they degrade to a
//! no-op. Errors only surface from registry and session construction.

use crate::layer::LayerId;
use thiserror::Error;

/// Errors raised by scene registration and editor construction.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Layer not found: {0}")]
    LayerNotFound(LayerId),
    #[error("Layer is not a line or arrow: {0}")]
    NotLinear(LayerId),
    #[error("Layer already registered: {0}")]
    DuplicateLayer(LayerId),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type for fallible engine entry points.
pub type EngineResult<T> = Result<T, EngineError>;
