use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};

use crate::displacement::{update_parts, DisplacementConfig, Part};
use crate::pointer::PointerTracker;
use crate::raycast::{nearest_hit, pointer_ray};
use crate::render::{CameraParams, LightParams};
use crate::scene::{ParallaxConfig, ViewerScene};

/// Perspective camera derived from the scene description.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl PerspectiveCamera {
    /// View-projection for the camera displaced by `drift` (pointer parallax).
    pub fn params(&self, drift: Vec3) -> CameraParams {
        let position = self.position + drift;
        let view = Mat4::look_at_rh(position, self.target, Vec3::Y);
        let projection =
            Mat4::perspective_rh_gl(self.fov.to_radians(), self.aspect.max(0.01), self.near, self.far);
        CameraParams {
            view_proj: projection * view,
            position,
        }
    }
}

/// Everything one frame of the viewer needs, gathered into a single context
/// so the displacement model runs (and tests) without a rendering backend.
///
/// The host render loop drives it: pointer and resize handlers mutate the
/// shared tracker and camera between frames, `frame` advances the simulation
/// once per display refresh.
pub struct Viewer {
    parts: Option<Vec<Part>>,
    pointer: Arc<PointerTracker>,
    camera: PerspectiveCamera,
    light: LightParams,
    config: DisplacementConfig,
    root_position: Vec3,
    root_scale: Vec3,
    spin: f32,
    spin_speed: f32,
    parallax: Option<ParallaxConfig>,
    tilt: Vec2,
    camera_drift: Vec3,
}

impl Viewer {
    pub fn new(scene: &ViewerScene) -> Self {
        Self {
            parts: None,
            pointer: Arc::new(PointerTracker::new()),
            camera: PerspectiveCamera {
                position: scene.camera.position,
                target: Vec3::ZERO,
                fov: scene.camera.fov,
                aspect: 1.0,
                near: 0.1,
                far: 100.0,
            },
            light: scene.light,
            config: scene.displacement,
            root_position: scene.position,
            root_scale: scene.scale,
            spin: 0.0,
            spin_speed: scene.spin,
            parallax: scene.parallax,
            tilt: Vec2::ZERO,
            camera_drift: Vec3::ZERO,
        }
    }

    /// Shared pointer state, handed to the platform event adapters.
    pub fn pointer(&self) -> Arc<PointerTracker> {
        Arc::clone(&self.pointer)
    }

    pub fn config(&self) -> &DisplacementConfig {
        &self.config
    }

    pub fn light(&self) -> LightParams {
        self.light
    }

    /// Installs the parts produced by the asset loader. Until this happens
    /// every frame is a no-op.
    pub fn attach_parts(&mut self, parts: Vec<Part>) {
        log::info!("model attached with {} part(s)", parts.len());
        self.parts = Some(parts);
    }

    pub fn parts(&self) -> Option<&[Part]> {
        self.parts.as_deref()
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.aspect = if height == 0 {
            1.0
        } else {
            width as f32 / height as f32
        };
    }

    pub fn camera_params(&self) -> CameraParams {
        self.camera.params(self.camera_drift)
    }

    /// Model root transform: placement, accumulated spin, pointer tilt.
    pub fn root_transform(&self) -> Mat4 {
        Mat4::from_translation(self.root_position)
            * Mat4::from_rotation_y(self.spin + self.tilt.y)
            * Mat4::from_rotation_x(self.tilt.x)
            * Mat4::from_scale(self.root_scale)
    }

    /// Advances the viewer one frame: casts the pointer ray, displaces the
    /// parts, decays the pointer velocity and keeps the idle spin going.
    pub fn frame(&mut self) {
        let root = self.root_transform();
        let camera = self.camera_params();
        let pointer = self.pointer.snapshot();

        let Some(parts) = self.parts.as_mut() else {
            // Model still loading (or failed to): nothing to displace.
            return;
        };

        let hit = if pointer.is_off_canvas() {
            None
        } else {
            pointer_ray(pointer.position, &camera)
                .and_then(|ray| nearest_hit(&ray, parts, root))
                .map(|hit| hit.point)
        };

        update_parts(parts, hit, pointer.velocity, root, &self.config);
        self.pointer.decay(self.config.decay_factor);
        self.spin += self.spin_speed;
        self.ease_parallax(pointer.position, pointer.is_off_canvas());
    }

    /// Frame-wise approach to the pointer-proportional tilt and camera drift
    /// targets. Off-canvas the targets collapse back to zero.
    fn ease_parallax(&mut self, ndc: Vec2, off_canvas: bool) {
        let Some(parallax) = self.parallax else {
            return;
        };
        let (tilt_target, drift_target) = if off_canvas {
            (Vec2::ZERO, Vec3::ZERO)
        } else {
            (
                Vec2::new(-ndc.y * 0.6, ndc.x) * parallax.strength,
                Vec3::new(ndc.x, ndc.y * 0.75, 0.0) * parallax.strength,
            )
        };
        self.tilt = self.tilt.lerp(tilt_target, parallax.smoothing);
        self.camera_drift = self.camera_drift.lerp(drift_target, parallax.smoothing);
    }
}
