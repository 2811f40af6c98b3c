use glam::{Affine3A, Quat, Vec3};

use crate::models::DmxTransform;

/// Closest point to `point` on the segment `[start, end]`. A zero-length
/// segment collapses to `start`.
pub fn closest_point_on_segment(start: Vec3, end: Vec3, point: Vec3) -> Vec3 {
    let segment = end - start;
    let length_sq = segment.length_squared();
    if length_sq <= f32::EPSILON {
        return start;
    }
    let t = ((point - start).dot(segment) / length_sq).clamp(0.0, 1.0);
    start + segment * t
}

pub fn distance_to_segment(start: Vec3, end: Vec3, point: Vec3) -> f32 {
    point.distance(closest_point_on_segment(start, end, point))
}

pub fn is_point_within_radius_of_segment(start: Vec3, end: Vec3, radius: f32, point: Vec3) -> bool {
    distance_to_segment(start, end, point) <= radius
}

/// Translation plus a rotation about +Y (degrees).
pub fn transform_to_affine(transform: &DmxTransform) -> Affine3A {
    Affine3A::from_rotation_translation(
        Quat::from_rotation_y(transform.y_rotation_angle.to_radians()),
        Vec3::new(
            transform.x_pos_meters,
            transform.y_pos_meters,
            transform.z_pos_meters,
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn projection_is_clamped_to_segment() {
        let start = Vec3::ZERO;
        let end = Vec3::new(2.0, 0.0, 0.0);
        assert!((distance_to_segment(start, end, Vec3::new(1.0, 1.0, 0.0)) - 1.0).abs() < EPS);
        assert!((distance_to_segment(start, end, Vec3::new(-3.0, 0.0, 4.0)) - 5.0).abs() < EPS);
        assert!((distance_to_segment(start, end, Vec3::new(5.0, 4.0, 0.0)) - 5.0).abs() < EPS);
    }

    #[test]
    fn degenerate_segment_is_a_point() {
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(closest_point_on_segment(p, p, Vec3::ZERO), p);
        assert!(is_point_within_radius_of_segment(p, p, 0.0, p));
    }

    #[test]
    fn radius_boundary_is_inclusive() {
        let start = Vec3::ZERO;
        let end = Vec3::Y;
        assert!(is_point_within_radius_of_segment(start, end, 0.5, Vec3::new(0.5, 0.5, 0.0)));
        assert!(!is_point_within_radius_of_segment(start, end, 0.49, Vec3::new(0.5, 0.5, 0.0)));
    }

    #[test]
    fn transform_rotates_about_y() {
        let affine = transform_to_affine(&DmxTransform {
            x_pos_meters: 1.0,
            y_pos_meters: 0.0,
            z_pos_meters: 0.0,
            y_rotation_angle: 90.0,
        });
        // +X rotated 90 degrees about Y lands on -Z
        let p = affine.transform_point3(Vec3::X);
        assert!((p - Vec3::new(1.0, 0.0, -1.0)).length() < EPS);
    }
}
