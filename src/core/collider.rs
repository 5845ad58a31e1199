use super::{rigidbody::BodyHandle, types::{Aabb, Transform}};
use crate::utils::{
    allocator::Handle,
    math::{segment_box, segment_sphere},
};
use glam::Vec3;
use serde::{Deserialize, Serialize};

pub type ColliderHandle = Handle<Collider>;

/// Enumeration of supported collider geometries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColliderShape {
    Sphere { radius: f32 },
    Box { half_extents: Vec3 },
}

impl ColliderShape {
    /// World-space bounds of the shape placed at `transform`.
    pub fn aabb(&self, transform: &Transform) -> Aabb {
        match self {
            ColliderShape::Sphere { radius } => {
                Aabb::from_center_half_extents(transform.position, Vec3::splat(*radius))
            }
            ColliderShape::Box { half_extents } => {
                let rotation = glam::Mat3::from_quat(transform.rotation);
                let extent = rotation.x_axis.abs() * half_extents.x
                    + rotation.y_axis.abs() * half_extents.y
                    + rotation.z_axis.abs() * half_extents.z;
                Aabb::from_center_half_extents(transform.position, extent)
            }
        }
    }

    pub fn contains_point(&self, transform: &Transform, point: Vec3) -> bool {
        match self {
            ColliderShape::Sphere { radius } => {
                transform.position.distance_squared(point) <= radius * radius
            }
            ColliderShape::Box { half_extents } => {
                let local = transform.inverse_transform_point(point);
                local.abs().cmple(*half_extents).all()
            }
        }
    }

    /// Penetration of a sphere of `radius` at `point` into the shape.
    ///
    /// Returns the world-space normal pointing out of the shape and the depth.
    pub fn penetration(&self, transform: &Transform, point: Vec3, radius: f32) -> Option<(Vec3, f32)> {
        match self {
            ColliderShape::Sphere { radius: shape_radius } => {
                let delta = point - transform.position;
                let distance = delta.length();
                let depth = shape_radius + radius - distance;
                if depth <= 0.0 {
                    return None;
                }
                let normal = if distance > f32::EPSILON {
                    delta / distance
                } else {
                    Vec3::Y
                };
                Some((normal, depth))
            }
            ColliderShape::Box { half_extents } => {
                let local = transform.inverse_transform_point(point);
                let clamped = local.clamp(-*half_extents, *half_extents);

                if clamped == local {
                    // Centre is inside: push out through the nearest face.
                    let gap = *half_extents - local.abs();
                    let axis = if gap.x <= gap.y && gap.x <= gap.z {
                        0
                    } else if gap.y <= gap.z {
                        1
                    } else {
                        2
                    };
                    let mut normal = Vec3::ZERO;
                    normal[axis] = if local[axis] >= 0.0 { 1.0 } else { -1.0 };
                    return Some((transform.rotation * normal, gap[axis] + radius));
                }

                let delta = local - clamped;
                let distance = delta.length();
                if distance >= radius {
                    return None;
                }
                Some((transform.rotation * (delta / distance), radius - distance))
            }
        }
    }

    /// Segment cast returning the entry fraction and surface normal.
    pub fn ray_cast(&self, transform: &Transform, p1: Vec3, p2: Vec3) -> Option<(f32, Vec3)> {
        match self {
            ColliderShape::Sphere { radius } => segment_sphere(p1, p2, transform.position, *radius),
            ColliderShape::Box { half_extents } => {
                segment_box(p1, p2, transform.position, transform.rotation, *half_extents)
            }
        }
    }
}

/// Layer/mask pair deciding which colliders a particle system touches.
///
/// Two filters interact when each one's mask accepts the other's layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionFilter {
    pub layer: u32,
    pub mask: u32,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self {
            layer: 1,
            mask: u32::MAX,
        }
    }
}

impl CollisionFilter {
    pub fn matches(&self, other: &CollisionFilter) -> bool {
        (self.mask & other.layer) != 0 && (other.mask & self.layer) != 0
    }
}

/// Collider component attached to a rigid body.
#[derive(Debug, Clone)]
pub struct Collider {
    pub handle: ColliderHandle,
    pub body: BodyHandle,
    pub shape: ColliderShape,
    pub offset: Transform,
    pub is_trigger: bool,
    pub collision_filter: CollisionFilter,
}

impl Collider {
    pub fn builder() -> ColliderBuilder {
        ColliderBuilder::new()
    }

    pub fn world_transform(&self, body_transform: &Transform) -> Transform {
        body_transform.combine(&self.offset)
    }

    pub fn aabb(&self, body_transform: &Transform) -> Aabb {
        self.shape.aabb(&self.world_transform(body_transform))
    }
}

pub struct ColliderBuilder {
    shape: ColliderShape,
    offset: Transform,
    is_trigger: bool,
    filter: CollisionFilter,
}

impl Default for ColliderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ColliderBuilder {
    pub fn new() -> Self {
        Self {
            shape: ColliderShape::Sphere { radius: 1.0 },
            offset: Transform::default(),
            is_trigger: false,
            filter: CollisionFilter::default(),
        }
    }

    pub fn sphere(mut self, radius: f32) -> Self {
        self.shape = ColliderShape::Sphere { radius };
        self
    }

    pub fn cuboid(mut self, half_extents: Vec3) -> Self {
        self.shape = ColliderShape::Box { half_extents };
        self
    }

    pub fn offset(mut self, offset: Transform) -> Self {
        self.offset = offset;
        self
    }

    pub fn trigger(mut self, is_trigger: bool) -> Self {
        self.is_trigger = is_trigger;
        self
    }

    pub fn filter(mut self, filter: CollisionFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Finishes the collider for `body`. The handle is assigned on insertion.
    pub fn build(self, body: BodyHandle) -> Collider {
        Collider {
            handle: ColliderHandle::default(),
            body,
            shape: self.shape,
            offset: self.offset,
            is_trigger: self.is_trigger,
            collision_filter: self.filter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Quat;

    #[test]
    fn particle_inside_box_pushes_out_nearest_face() {
        let shape = ColliderShape::Box {
            half_extents: Vec3::new(2.0, 0.5, 2.0),
        };
        let (normal, depth) = shape
            .penetration(&Transform::default(), Vec3::new(0.0, 0.4, 0.0), 0.1)
            .expect("particle should penetrate");
        assert_eq!(normal, Vec3::Y);
        assert_relative_eq!(depth, 0.2, epsilon = 1e-5);
    }

    #[test]
    fn particle_grazing_sphere_does_not_penetrate() {
        let shape = ColliderShape::Sphere { radius: 1.0 };
        assert!(shape
            .penetration(&Transform::default(), Vec3::new(0.0, 1.2, 0.0), 0.1)
            .is_none());
    }

    #[test]
    fn rotated_box_aabb_grows() {
        let shape = ColliderShape::Box {
            half_extents: Vec3::ONE,
        };
        let transform = Transform {
            position: Vec3::ZERO,
            rotation: Quat::from_rotation_z(std::f32::consts::FRAC_PI_4),
        };
        let aabb = shape.aabb(&transform);
        assert_relative_eq!(aabb.max.x, std::f32::consts::SQRT_2, epsilon = 1e-5);
        assert_relative_eq!(aabb.max.z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn filters_need_mutual_acceptance() {
        let ground = CollisionFilter { layer: 0b01, mask: u32::MAX };
        let water = CollisionFilter { layer: 0b10, mask: 0b10 };
        assert!(!ground.matches(&water));
        assert!(CollisionFilter::default().matches(&ground));

        let collider = Collider::builder().filter(water).build(BodyHandle::default());
        assert_eq!(collider.collision_filter, water);
    }
}
