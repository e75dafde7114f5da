use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::displacement::Part;
use crate::render::CameraParams;

/// Ray cast from the camera through a pointer position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerRay {
    pub origin: Vec3,
    pub direction: Vec3,
}

/// World-space intersection between the pointer ray and the nearest part.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitResult {
    pub point: Vec3,
    pub part_index: usize,
    pub distance: f32,
}

/// Unprojects an NDC pointer position through the camera into a world ray.
///
/// Returns `None` when the view-projection matrix cannot be inverted or the
/// unprojected endpoints collapse onto each other.
pub fn pointer_ray(ndc: Vec2, camera: &CameraParams) -> Option<PointerRay> {
    if camera.view_proj.determinant().abs() <= f32::EPSILON {
        return None;
    }
    let inverse = camera.view_proj.inverse();

    let near = inverse.project_point3(Vec3::new(ndc.x, ndc.y, -1.0));
    let far = inverse.project_point3(Vec3::new(ndc.x, ndc.y, 1.0));
    let direction = far - near;
    if direction.length_squared() <= f32::EPSILON {
        return None;
    }

    Some(PointerRay {
        origin: near,
        direction: direction.normalize(),
    })
}

/// Tests the ray against every part's bounding sphere and returns the nearest
/// hit. Spheres are centred on each part's current world position with the
/// bounding radius scaled by the largest parent axis.
pub fn nearest_hit(ray: &PointerRay, parts: &[Part], parent: Mat4) -> Option<HitResult> {
    let scale = largest_axis_scale(parent);
    let mut nearest: Option<HitResult> = None;

    for (index, part) in parts.iter().enumerate() {
        let center = part.world_position(parent);
        let Some(t) = ray_sphere(ray, center, part.bounding_radius * scale) else {
            continue;
        };
        if nearest.map_or(true, |hit| t < hit.distance) {
            nearest = Some(HitResult {
                point: ray.origin + ray.direction * t,
                part_index: index,
                distance: t,
            });
        }
    }

    nearest
}

/// Distance along the ray to the sphere, or `None` for a miss. An origin
/// inside the sphere hits at the exit point.
fn ray_sphere(ray: &PointerRay, center: Vec3, radius: f32) -> Option<f32> {
    if radius <= 0.0 {
        return None;
    }
    let oc = ray.origin - center;
    let b = oc.dot(ray.direction);
    let c = oc.length_squared() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let sqrt = discriminant.sqrt();
    let entry = -b - sqrt;
    if entry >= 0.0 {
        return Some(entry);
    }
    let exit = -b + sqrt;
    (exit >= 0.0).then_some(exit)
}

fn largest_axis_scale(parent: Mat4) -> f32 {
    parent
        .x_axis
        .truncate()
        .length()
        .max(parent.y_axis.truncate().length())
        .max(parent.z_axis.truncate().length())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PartMesh;

    fn sphere_part(name: &str, position: Vec3, radius: f32) -> Part {
        let mut part = Part::new(name, position, PartMesh::default());
        part.bounding_radius = radius;
        part
    }

    fn axis_ray() -> PointerRay {
        PointerRay {
            origin: Vec3::new(0.0, 0.0, 5.0),
            direction: Vec3::new(0.0, 0.0, -1.0),
        }
    }

    #[test]
    fn ray_hits_sphere_on_axis() {
        let t = ray_sphere(&axis_ray(), Vec3::ZERO, 1.0).unwrap();
        assert!((t - 4.0).abs() < 1e-5);
    }

    #[test]
    fn ray_misses_offset_sphere() {
        assert!(ray_sphere(&axis_ray(), Vec3::new(3.0, 0.0, 0.0), 1.0).is_none());
    }

    #[test]
    fn origin_inside_sphere_hits_exit() {
        let ray = PointerRay {
            origin: Vec3::ZERO,
            direction: Vec3::new(0.0, 0.0, -1.0),
        };
        let t = ray_sphere(&ray, Vec3::ZERO, 2.0).unwrap();
        assert!((t - 2.0).abs() < 1e-5);
    }

    #[test]
    fn nearest_of_two_parts_wins() {
        let parts = vec![
            sphere_part("far", Vec3::new(0.0, 0.0, -4.0), 0.5),
            sphere_part("near", Vec3::new(0.0, 0.0, 0.0), 0.5),
        ];
        let hit = nearest_hit(&axis_ray(), &parts, Mat4::IDENTITY).unwrap();
        assert_eq!(hit.part_index, 1);
        assert!((hit.point.z - 0.5).abs() < 1e-5);
    }

    #[test]
    fn parent_scale_grows_the_bounding_spheres() {
        let parts = vec![sphere_part("shard", Vec3::new(1.2, 0.0, 0.0), 0.5)];
        // Unscaled, the sphere clears the axis ray.
        assert!(nearest_hit(&axis_ray(), &parts, Mat4::IDENTITY).is_none());
        // Doubling the parent scale doubles both center offset and radius.
        let parent = Mat4::from_scale(Vec3::splat(2.0));
        let parts = vec![sphere_part("shard", Vec3::new(0.4, 0.0, 0.0), 0.5)];
        assert!(nearest_hit(&axis_ray(), &parts, parent).is_some());
    }

    #[test]
    fn pointer_ray_points_toward_scene_center() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 8.0), Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_rh_gl(45f32.to_radians(), 1.0, 0.1, 100.0);
        let camera = CameraParams {
            view_proj: projection * view,
            position: Vec3::new(0.0, 0.0, 8.0),
        };

        let ray = pointer_ray(Vec2::ZERO, &camera).unwrap();
        assert!(ray.direction.z < -0.99);
        assert!(ray.origin.z < 8.0 && ray.origin.z > 0.0);

        // Off-center pointer tilts the ray the same way.
        let ray = pointer_ray(Vec2::new(0.5, 0.0), &camera).unwrap();
        assert!(ray.direction.x > 0.0);
    }

    #[test]
    fn degenerate_camera_yields_no_ray() {
        let camera = CameraParams {
            view_proj: Mat4::ZERO,
            position: Vec3::ZERO,
        };
        assert!(pointer_ray(Vec2::ZERO, &camera).is_none());
    }
}
