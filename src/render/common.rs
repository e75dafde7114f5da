use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Camera parameters consumed by the renderer's uniform buffer and by the
/// pointer ray caster.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraParams {
    pub view_proj: Mat4,
    pub position: Vec3,
}

/// Lighting state consumed by the renderer's uniform buffer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightParams {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}
