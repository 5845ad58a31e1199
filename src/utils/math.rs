//! Additional math helpers layered on top of `glam`.

use glam::{Quat, Vec3};

/// Converts angular velocity vector (radians/sec) into a quaternion delta.
pub fn angular_velocity_to_quat(angular: Vec3, dt: f32) -> Quat {
    let angle = angular.length() * dt;
    if angle.abs() < 1e-6 {
        return Quat::IDENTITY;
    }
    let axis = angular.normalize();
    Quat::from_axis_angle(axis, angle)
}

/// Intersects the segment `p1 -> p2` with a sphere.
///
/// Returns the entry fraction along the segment (in `[0, 1]`) and the outward
/// surface normal. Segments starting inside the sphere do not report a hit.
pub fn segment_sphere(p1: Vec3, p2: Vec3, center: Vec3, radius: f32) -> Option<(f32, Vec3)> {
    let d = p2 - p1;
    let a = d.length_squared();
    if a < f32::EPSILON {
        return None;
    }
    let m = p1 - center;
    let c = m.length_squared() - radius * radius;
    if c < 0.0 {
        return None;
    }
    let b = m.dot(d);
    let discriminant = b * b - a * c;
    if discriminant < 0.0 {
        return None;
    }
    let fraction = (-b - discriminant.sqrt()) / a;
    if !(0.0..=1.0).contains(&fraction) {
        return None;
    }
    let normal = (m + d * fraction).normalize_or_zero();
    Some((fraction, normal))
}

/// Intersects the segment `p1 -> p2` with an oriented box (slab test in the
/// box's local frame). Returns the entry fraction and world-space normal.
pub fn segment_box(
    p1: Vec3,
    p2: Vec3,
    center: Vec3,
    rotation: Quat,
    half_extents: Vec3,
) -> Option<(f32, Vec3)> {
    let inverse = rotation.inverse();
    let origin = inverse * (p1 - center);
    let dir = inverse * (p2 - p1);

    let mut t_min = 0.0_f32;
    let mut t_max = 1.0_f32;
    let mut normal = Vec3::ZERO;

    for i in 0..3 {
        let min = -half_extents[i];
        let max = half_extents[i];

        if dir[i].abs() < 1e-9 {
            if origin[i] < min || origin[i] > max {
                return None;
            }
            continue;
        }

        let inv_dir = 1.0 / dir[i];
        let mut t1 = (min - origin[i]) * inv_dir;
        let mut t2 = (max - origin[i]) * inv_dir;
        let mut axis_normal = Vec3::ZERO;
        axis_normal[i] = -1.0;

        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
            axis_normal = -axis_normal;
        }

        if t1 > t_min {
            t_min = t1;
            normal = axis_normal;
        }

        t_max = t_max.min(t2);
        if t_min > t_max {
            return None;
        }
    }

    // Zero normal means the segment started inside the box.
    if normal == Vec3::ZERO {
        return None;
    }

    Some((t_min, rotation * normal))
}
