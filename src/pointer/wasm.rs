use std::sync::Arc;

use glam::Vec2;
use gloo_events::EventListener;
use wasm_bindgen::JsCast;
use web_sys::{HtmlCanvasElement, MouseEvent};

use super::{CanvasBounds, PointerTracker};

/// Handles DOM pointer events and updates the shared [`PointerTracker`].
///
/// Movement is sampled in canvas-relative coordinates so the model reacts the
/// same whether the canvas fills the page or sits inside a layout.
pub struct DomPointerHandler {
    listeners: Vec<EventListener>,
}

impl DomPointerHandler {
    pub fn attach(
        canvas: &HtmlCanvasElement,
        tracker: Arc<PointerTracker>,
        velocity_scale: f32,
    ) -> Self {
        let mut listeners = Vec::new();

        {
            let tracker = Arc::clone(&tracker);
            let sampled = canvas.clone();
            listeners.push(EventListener::new(canvas, "mousemove", move |event| {
                let event = event.dyn_ref::<MouseEvent>().unwrap();
                let rect = sampled.get_bounding_client_rect();
                let bounds = CanvasBounds::new(
                    rect.left() as f32,
                    rect.top() as f32,
                    rect.width() as f32,
                    rect.height() as f32,
                );
                tracker.on_pointer_move(
                    Vec2::new(event.client_x() as f32, event.client_y() as f32),
                    bounds,
                    velocity_scale,
                );
            }));
        }

        {
            let tracker = Arc::clone(&tracker);
            listeners.push(EventListener::new(canvas, "mouseleave", move |_| {
                tracker.on_pointer_leave();
            }));
        }

        Self { listeners }
    }
}

impl Drop for DomPointerHandler {
    fn drop(&mut self) {
        self.listeners.clear();
    }
}
