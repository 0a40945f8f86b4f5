//! Inkbind Core Library
//!
//! Geometry engine of the inkbind whiteboard: hit testing, arrow binding,
//! the line point editor, resize/rotate/drag transforms, bound text layout
//! and stacking order normalization. Rendering and persistence live
//! elsewhere; layers are only changed through the mutation gateway.

pub mod binding;
pub mod config;
pub mod error;
pub mod geometry;
pub mod layer;
pub mod linear_editor;
pub mod mutation;
pub mod order;
pub mod outline;
pub mod scene;
pub mod text;
pub mod transform;

pub use binding::{
    BindingEdge, BindingTarget, BoundUpdateOptions, bind_or_unbind_linear_layer, fix_bindings_after_deletion,
    fix_bindings_after_duplication, update_bound_layers,
};
pub use config::{EditorConfig, ViewState};
pub use error::{EngineError, EngineResult};
pub use hit_test::{HitCheck, hit_test};
pub use layer::{BoundLayer, BoundLayerKind, Layer, LayerId, LayerKind, PointBinding};
pub use linear_editor::{LinearElementEditor, PointMove, PointerModifiers};
pub use mutation::{LayerUpdate, MutationOutcome, mutate_layer};
pub use order::normalize_layer_order;
pub use outline::{Outline, OutlineProvider, PathOp};
pub use scene::Scene;
pub use text::{ApproxTextMeasurer, TextMeasurer};
pub use transform::{SHIFT_LOCKING_ANGLE, TransformAction, TransformHandle, TransformModifiers, TransformSession};
