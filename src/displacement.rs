use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::model::PartMesh;

/// Tuning constants for the cursor-reactive displacement model.
///
/// The browser build shipped several near-identical scripts that differed
/// only in these numbers; they are presets here and every field can still be
/// overridden from the scene file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplacementConfig {
    /// World-space influence radius around the hit point.
    pub radius: f32,
    /// Scales pointer velocity into displacement strength.
    pub gain: f32,
    /// Fraction of the remaining distance covered per frame, in `(0, 1)`.
    pub smoothing: f32,
    /// Converts normalized pointer travel into a velocity scalar.
    pub velocity_scale: f32,
    /// Multiplicative velocity decay applied once per frame.
    pub decay_factor: f32,
    /// Added to velocity so a slow pointer still nudges nearby parts.
    pub epsilon: f32,
}

impl DisplacementConfig {
    /// Tuning used by the crystal variant.
    pub const fn crystal() -> Self {
        Self {
            radius: 1.5,
            gain: 0.015,
            smoothing: 0.12,
            velocity_scale: 40.0,
            decay_factor: 0.9,
            epsilon: 0.0,
        }
    }

    /// Tuning used by the alien-soldier variant.
    pub const fn soldier() -> Self {
        Self {
            radius: 1.8,
            gain: 0.4,
            smoothing: 0.1,
            velocity_scale: 50.0,
            decay_factor: 0.92,
            epsilon: 0.01,
        }
    }

    /// Looks up a preset by the name used in scene files.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "crystal" => Some(Self::crystal()),
            "soldier" => Some(Self::soldier()),
            _ => None,
        }
    }
}

impl Default for DisplacementConfig {
    fn default() -> Self {
        Self::crystal()
    }
}

/// A renderable sub-mesh of the loaded model, displaced individually.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub name: String,
    /// Position at load time; never changes for the part's lifetime.
    pub rest_position: Vec3,
    /// Normalized rest position, the axis the part is pushed along.
    pub direction: Vec3,
    /// Updated every frame.
    pub current_position: Vec3,
    /// Radius of the bounding sphere around the rest position.
    pub bounding_radius: f32,
    pub mesh: PartMesh,
}

impl Part {
    /// Creates a part at rest. The direction is the normalized rest position;
    /// a part sitting at the origin gets a zero direction and never moves.
    pub fn new(name: impl Into<String>, rest_position: Vec3, mesh: PartMesh) -> Self {
        let bounding_radius = mesh.bounding_radius();
        Self {
            name: name.into(),
            rest_position,
            direction: rest_position.normalize_or_zero(),
            current_position: rest_position,
            bounding_radius,
            mesh,
        }
    }

    /// World-space position of the part under the given parent transform.
    pub fn world_position(&self, parent: Mat4) -> Vec3 {
        parent.transform_point3(self.current_position)
    }
}

/// Advances every part one frame toward its displaced (or rest) target.
///
/// `hit` is the world-space point where the pointer ray meets the model, if
/// any; `velocity` is the current pointer speed scalar. Parts are mutually
/// independent, so update order does not matter.
pub fn update_parts(
    parts: &mut [Part],
    hit: Option<Vec3>,
    velocity: f32,
    parent: Mat4,
    config: &DisplacementConfig,
) {
    for part in parts {
        let mut target = part.rest_position;

        if let Some(hit) = hit {
            let dist = part.world_position(parent).distance(hit);
            if dist < config.radius {
                let strength = (config.radius - dist) * (velocity + config.epsilon) * config.gain;
                target += part.direction * strength;
            }
        }

        part.current_position = part.current_position.lerp(target, config.smoothing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part_at(position: Vec3) -> Part {
        Part::new("shard", position, PartMesh::default())
    }

    #[test]
    fn hit_within_radius_displaces_along_direction() {
        let mut parts = vec![part_at(Vec3::new(1.0, 0.0, 0.0))];
        let config = DisplacementConfig::crystal();
        // Hit 0.5 units away: strength = (1.5 - 0.5) * 2 * 0.015 = 0.03.
        let hit = Vec3::new(1.5, 0.0, 0.0);
        update_parts(&mut parts, Some(hit), 2.0, Mat4::IDENTITY, &config);

        let target = Vec3::new(1.03, 0.0, 0.0);
        let expected = Vec3::new(1.0, 0.0, 0.0).lerp(target, config.smoothing);
        assert!((parts[0].current_position - expected).length() < 1e-6);
        assert!((expected.x - 1.0036).abs() < 1e-6);
    }

    #[test]
    fn lerp_moves_fraction_toward_target() {
        let mut part = part_at(Vec3::new(1.0, 0.0, 0.0));
        part.rest_position = Vec3::new(1.03, 0.0, 0.0);
        let config = DisplacementConfig::crystal();
        update_parts(
            std::slice::from_mut(&mut part),
            None,
            0.0,
            Mat4::IDENTITY,
            &config,
        );
        assert!((part.current_position.x - 1.0036).abs() < 1e-6);
    }

    #[test]
    fn parts_settle_monotonically_without_overshoot() {
        let mut parts = vec![part_at(Vec3::new(1.0, 0.0, 0.0))];
        parts[0].current_position = Vec3::new(2.0, 0.0, 0.0);
        let config = DisplacementConfig::crystal();

        let mut previous = parts[0]
            .current_position
            .distance(parts[0].rest_position);
        for _ in 0..200 {
            update_parts(&mut parts, None, 0.0, Mat4::IDENTITY, &config);
            let remaining = parts[0]
                .current_position
                .distance(parts[0].rest_position);
            assert!(remaining <= previous);
            assert!(parts[0].current_position.x >= parts[0].rest_position.x);
            previous = remaining;
        }
        assert!(previous < 1e-3);
    }

    #[test]
    fn strength_decreases_with_distance() {
        let config = DisplacementConfig::crystal();
        let velocity = 3.0;
        let strength = |dist: f32| (config.radius - dist) * velocity * config.gain;
        assert!(strength(0.2) > strength(0.8));
        assert!(strength(0.8) > strength(1.4));
    }

    #[test]
    fn displaced_target_lies_beyond_rest_for_positive_velocity() {
        let mut parts = vec![part_at(Vec3::new(0.0, 2.0, 0.0))];
        let config = DisplacementConfig::crystal();
        let hit = Vec3::new(0.0, 2.2, 0.0);
        update_parts(&mut parts, Some(hit), 1.0, Mat4::IDENTITY, &config);
        // Pushed outward along +Y, strictly past where pure settling would be.
        assert!(parts[0].current_position.y > 2.0);
        assert_eq!(parts[0].current_position.x, 0.0);
    }

    #[test]
    fn hit_exactly_at_radius_is_ignored() {
        let rest = Vec3::new(1.0, 0.0, 0.0);
        let mut parts = vec![part_at(rest)];
        let config = DisplacementConfig::crystal();
        let hit = Vec3::new(1.0 + config.radius, 0.0, 0.0);
        update_parts(&mut parts, Some(hit), 5.0, Mat4::IDENTITY, &config);
        assert_eq!(parts[0].current_position, rest);
    }

    #[test]
    fn parent_transform_feeds_the_distance_test() {
        // Part rests 10 units up but the parent drags it next to the hit.
        let mut parts = vec![part_at(Vec3::new(0.0, 10.0, 0.0))];
        let parent = Mat4::from_translation(Vec3::new(0.0, -10.0, 0.0));
        let config = DisplacementConfig::crystal();
        let hit = Vec3::new(0.5, 0.0, 0.0);
        update_parts(&mut parts, Some(hit), 1.0, parent, &config);
        assert!(parts[0].current_position.y > 10.0);
    }

    #[test]
    fn part_at_origin_never_moves() {
        let mut parts = vec![part_at(Vec3::ZERO)];
        let config = DisplacementConfig::crystal();
        update_parts(&mut parts, Some(Vec3::ZERO), 10.0, Mat4::IDENTITY, &config);
        assert_eq!(parts[0].current_position, Vec3::ZERO);
    }

    #[test]
    fn unknown_preset_is_none() {
        assert!(DisplacementConfig::preset("granite").is_none());
        assert_eq!(
            DisplacementConfig::preset("soldier"),
            Some(DisplacementConfig::soldier())
        );
    }
}
