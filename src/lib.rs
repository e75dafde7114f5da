//! Core modules for the shardview runtime.
//!
//! The crate exposes the pieces of a cursor-reactive model viewer as plain
//! building blocks: a displacement model that pushes sub-meshes away from a
//! pointer hit point, a pointer reducer, a picking helper and a small frame
//! context tying them together.  Rendering backends live behind the
//! `render` module so the simulation stays testable without a GPU.

pub mod displacement;
pub mod model;
pub mod pointer;
pub mod raycast;
pub mod render;
pub mod scene;
pub mod viewer;
#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use displacement::{update_parts, DisplacementConfig, Part};
pub use model::{load_model, load_parts, parse_obj_parts, ModelError, PartMesh};
pub use pointer::{
    screen_to_ndc, CanvasBounds, PointerEvent, PointerState, PointerTracker, OFF_CANVAS,
};
pub use raycast::{nearest_hit, pointer_ray, HitResult, PointerRay};
pub use render::{CameraParams, LightParams, Renderer};
pub use scene::{CameraConfig, ParallaxConfig, ViewerScene};
pub use viewer::{PerspectiveCamera, Viewer};
