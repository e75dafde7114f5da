use anyhow::{anyhow, Result};
use glam::{Mat4, Vec3};
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use crate::displacement::Part;
use crate::render::common::{CameraParams, LightParams};

/// Minimal renderer backed by a 2D canvas for WebAssembly builds.
///
/// Parts are projected through the camera and drawn back-to-front as filled
/// circles sized by their bounding radius and depth.
pub struct Renderer {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    size: (u32, u32),
    camera: CameraParams,
}

impl Renderer {
    /// Creates a renderer that draws into the provided HTML canvas element.
    pub async fn new(canvas: HtmlCanvasElement) -> Result<Self> {
        let context = canvas
            .get_context("2d")
            .map_err(|err| anyhow!("failed to query canvas context: {err:?}"))?
            .ok_or_else(|| anyhow!("canvas does not support 2d context"))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| anyhow!("failed to cast canvas context"))?;

        let size = (canvas.width(), canvas.height());
        Ok(Self {
            canvas,
            context,
            size,
            camera: CameraParams {
                view_proj: Mat4::IDENTITY,
                position: Vec3::ZERO,
            },
        })
    }

    /// Updates the canvas dimensions to match the browser layout.
    pub fn resize(&mut self, new_size: (u32, u32)) {
        if new_size.0 == 0 || new_size.1 == 0 {
            return;
        }
        self.size = new_size;
        self.canvas.set_width(new_size.0);
        self.canvas.set_height(new_size.1);
    }

    /// Caches the camera for projection. The 2D renderer has no use for the
    /// light but keeps the API shared with the native renderer.
    pub fn update_globals(&mut self, camera: &CameraParams, _light: &LightParams) {
        self.camera = *camera;
    }

    /// Draws the parts at their current displaced positions.
    pub fn render(
        &mut self,
        parts: &[Part],
        root: Mat4,
        velocity: f32,
    ) -> Result<(), wasm_bindgen::JsValue> {
        self.clear_background();

        let width = self.size.0 as f64;
        let height = self.size.1 as f64;

        let mut sprites: Vec<(f64, f64, f64, f64, String)> = Vec::new();
        for (index, part) in parts.iter().enumerate() {
            let world = part.world_position(root);
            let clip = self.camera.view_proj * world.extend(1.0);
            if clip.w <= 0.0 {
                continue;
            }
            let ndc = clip.truncate() / clip.w;
            if ndc.z < -1.0 || ndc.z > 1.0 {
                continue;
            }
            let screen_x = ((ndc.x + 1.0) * 0.5) as f64 * width;
            let screen_y = ((1.0 - ndc.y) * 0.5) as f64 * height;
            let distance = (world - self.camera.position).length().max(0.1);
            let radius = (part.bounding_radius.max(0.05) / distance * width as f32 * 0.5) as f64;
            let hue = (index as f64 * 47.0) % 360.0;
            sprites.push((
                ndc.z as f64,
                screen_x,
                screen_y,
                radius.clamp(2.0, width / 2.0),
                format!("hsl({hue}, 60%, 55%)"),
            ));
        }

        // Painter's order: far parts first.
        sprites.sort_by(|a, b| b.0.total_cmp(&a.0));
        for (_, x, y, radius, color) in &sprites {
            self.context.begin_path();
            self.context.set_fill_style(&color.as_str().into());
            let _ = self
                .context
                .arc(*x, *y, *radius, 0.0, std::f64::consts::TAU);
            self.context.fill();
        }

        self.context.set_fill_style(&"white".into());
        let summary = format!("Parts: {}  Pointer velocity: {velocity:.2}", parts.len());
        let _ = self.context.fill_text(&summary, 10.0, 24.0);

        Ok(())
    }

    fn clear_background(&self) {
        self.context.set_fill_style(&"#06060a".into());
        self.context
            .fill_rect(0.0, 0.0, self.size.0 as f64, self.size.1 as f64);
    }
}
