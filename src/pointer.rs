#[cfg(target_arch = "wasm32")]
pub mod wasm;

use glam::Vec2;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Position reported while the pointer is outside the canvas. It sits well
/// outside the unit square, so no ray is ever cast from it.
pub const OFF_CANVAS: Vec2 = Vec2::new(10.0, 10.0);

/// Pointer events after screen coordinates have been converted to NDC.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Moved(Vec2),
    Left,
}

/// Pointer sample in normalized device coordinates plus a decaying speed
/// scalar. The state starts off-canvas so an untouched viewer never hits;
/// `previous` starts at the origin so the first move sample measures real
/// travel instead of the distance from the sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerState {
    pub position: Vec2,
    pub previous: Vec2,
    pub velocity: f32,
}

impl Default for PointerState {
    fn default() -> Self {
        Self {
            position: OFF_CANVAS,
            previous: Vec2::ZERO,
            velocity: 0.0,
        }
    }
}

impl PointerState {
    /// Folds one event into the state. Velocity is measured between
    /// consecutive move samples; leaving the canvas parks the position on the
    /// sentinel without touching the velocity, so recent motion still decays
    /// out over the following frames.
    pub fn apply(self, event: PointerEvent, velocity_scale: f32) -> Self {
        match event {
            PointerEvent::Moved(ndc) => Self {
                position: ndc,
                previous: ndc,
                velocity: ndc.distance(self.previous) * velocity_scale,
            },
            PointerEvent::Left => Self {
                position: OFF_CANVAS,
                ..self
            },
        }
    }

    /// Applies the per-frame multiplicative decay.
    pub fn decayed(self, factor: f32) -> Self {
        Self {
            velocity: self.velocity * factor,
            ..self
        }
    }

    /// True when the position lies outside the NDC unit square.
    pub fn is_off_canvas(&self) -> bool {
        self.position.x.abs() > 1.0 || self.position.y.abs() > 1.0
    }
}

/// Canvas placement used to turn screen pixels into NDC.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasBounds {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl CanvasBounds {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width: width.max(1.0),
            height: height.max(1.0),
        }
    }

    /// Bounds for a canvas that fills the viewport from the origin.
    pub fn from_size(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }
}

/// Converts a screen-space pointer position into NDC relative to the canvas,
/// with `y` pointing up.
pub fn screen_to_ndc(screen: Vec2, bounds: CanvasBounds) -> Vec2 {
    Vec2::new(
        ((screen.x - bounds.left) / bounds.width) * 2.0 - 1.0,
        -(((screen.y - bounds.top) / bounds.height) * 2.0 - 1.0),
    )
}

/// Shared pointer state, written by event handlers and read by the frame
/// loop.
#[derive(Debug, Default)]
pub struct PointerTracker {
    state: RwLock<PointerState>,
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_pointer_move(&self, screen: Vec2, bounds: CanvasBounds, velocity_scale: f32) {
        let ndc = screen_to_ndc(screen, bounds);
        let mut state = self.state.write();
        *state = state.apply(PointerEvent::Moved(ndc), velocity_scale);
    }

    pub fn on_pointer_leave(&self) {
        let mut state = self.state.write();
        *state = state.apply(PointerEvent::Left, 0.0);
    }

    pub fn decay(&self, factor: f32) {
        let mut state = self.state.write();
        *state = state.decayed(factor);
    }

    pub fn snapshot(&self) -> PointerState {
        *self.state.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_updates_velocity_from_sample_distance() {
        let state = PointerState {
            position: Vec2::ZERO,
            previous: Vec2::ZERO,
            velocity: 0.0,
        };
        let state = state.apply(PointerEvent::Moved(Vec2::new(0.1, 0.1)), 40.0);
        assert!((state.velocity - 0.02_f32.sqrt() * 40.0).abs() < 1e-4);
        assert!((state.velocity - 5.657).abs() < 1e-3);
        assert_eq!(state.previous, Vec2::new(0.1, 0.1));
    }

    #[test]
    fn first_move_from_default_state_keeps_velocity_bounded() {
        let state = PointerState::default().apply(PointerEvent::Moved(Vec2::ZERO), 40.0);
        assert_eq!(state.velocity, 0.0);

        // Velocity reflects travel from the origin, never from the sentinel.
        let state = PointerState::default().apply(PointerEvent::Moved(Vec2::new(0.5, 0.0)), 40.0);
        assert!((state.velocity - 20.0).abs() < 1e-5);
    }

    #[test]
    fn velocity_decays_geometrically_and_stays_nonnegative() {
        let mut state = PointerState {
            velocity: 8.0,
            ..PointerState::default()
        };
        let mut previous = state.velocity;
        for _ in 0..100 {
            state = state.decayed(0.9);
            assert!(state.velocity >= 0.0);
            assert!((state.velocity - previous * 0.9).abs() < 1e-6);
            previous = state.velocity;
        }
        assert!(state.velocity < 1e-3);
    }

    #[test]
    fn leave_parks_position_off_canvas() {
        let state = PointerState {
            position: Vec2::new(0.3, -0.2),
            previous: Vec2::new(0.3, -0.2),
            velocity: 2.0,
        };
        let state = state.apply(PointerEvent::Left, 0.0);
        assert_eq!(state.position, OFF_CANVAS);
        assert!(state.is_off_canvas());
        // Velocity keeps decaying on its own schedule.
        assert_eq!(state.velocity, 2.0);
        assert_eq!(state.previous, Vec2::new(0.3, -0.2));
    }

    #[test]
    fn screen_corners_map_to_ndc_corners() {
        let bounds = CanvasBounds::from_size(800.0, 600.0);
        assert_eq!(screen_to_ndc(Vec2::ZERO, bounds), Vec2::new(-1.0, 1.0));
        assert_eq!(
            screen_to_ndc(Vec2::new(800.0, 600.0), bounds),
            Vec2::new(1.0, -1.0)
        );
        assert_eq!(
            screen_to_ndc(Vec2::new(400.0, 300.0), bounds),
            Vec2::ZERO
        );
    }

    #[test]
    fn offset_canvas_is_accounted_for() {
        let bounds = CanvasBounds::new(100.0, 50.0, 200.0, 100.0);
        assert_eq!(
            screen_to_ndc(Vec2::new(200.0, 100.0), bounds),
            Vec2::ZERO
        );
    }

    #[test]
    fn tracker_round_trip() {
        let tracker = PointerTracker::new();
        assert!(tracker.snapshot().is_off_canvas());

        let bounds = CanvasBounds::from_size(100.0, 100.0);
        tracker.on_pointer_move(Vec2::new(50.0, 50.0), bounds, 40.0);
        assert!(!tracker.snapshot().is_off_canvas());

        tracker.decay(0.9);
        tracker.on_pointer_leave();
        assert!(tracker.snapshot().is_off_canvas());
    }
}
