use super::types::{MassProperties, Transform, Velocity};
use crate::config::{DEFAULT_ANGULAR_DAMPING, DEFAULT_LINEAR_DAMPING};
use crate::utils::allocator::Handle;
use glam::{Mat3, Vec3};

pub type BodyHandle = Handle<RigidBody>;

/// Core rigid body description storing kinematic state and properties.
#[derive(Debug, Clone)]
pub struct RigidBody {
    pub handle: BodyHandle,
    pub transform: Transform,
    /// Pose captured right before the most recent integration pass.
    /// Continuous collision and render interpolation blend from here to `transform`.
    pub previous_transform: Transform,
    pub velocity: Velocity,
    pub acceleration: Vec3,
    pub mass_properties: MassProperties,
    pub gravity_scale: f32,
    pub is_static: bool,
    pub is_kinematic: bool,
    pub linear_velocity_damping: f32,
    pub angular_velocity_damping: f32,
    pub inverse_mass: f32,
    pub inverse_inertia: Mat3,
}

impl Default for RigidBody {
    fn default() -> Self {
        let mut body = Self {
            handle: BodyHandle::default(),
            transform: Transform::default(),
            previous_transform: Transform::default(),
            velocity: Velocity::default(),
            acceleration: Vec3::ZERO,
            mass_properties: MassProperties::default(),
            gravity_scale: 1.0,
            is_static: false,
            is_kinematic: false,
            linear_velocity_damping: DEFAULT_LINEAR_DAMPING,
            angular_velocity_damping: DEFAULT_ANGULAR_DAMPING,
            inverse_mass: 1.0,
            inverse_inertia: Mat3::IDENTITY,
        };
        body.recompute_inverses();
        body
    }
}

impl RigidBody {
    pub fn dynamic(position: Vec3) -> Self {
        let transform = Transform::from_position(position);
        Self {
            transform,
            previous_transform: transform,
            ..Self::default()
        }
    }

    pub fn fixed(position: Vec3) -> Self {
        let mut body = Self::dynamic(position);
        body.is_static = true;
        body.inverse_mass = 0.0;
        body.inverse_inertia = Mat3::ZERO;
        body
    }

    /// Moves under its own velocity but ignores forces and impulses.
    pub fn kinematic(position: Vec3) -> Self {
        let mut body = Self::dynamic(position);
        body.is_kinematic = true;
        body
    }

    pub fn is_dynamic(&self) -> bool {
        !self.is_static && !self.is_kinematic
    }

    pub fn set_velocity(&mut self, linear: Vec3, angular: Vec3) {
        self.velocity.linear = linear;
        self.velocity.angular = angular;
    }

    pub fn apply_force(&mut self, force: Vec3) {
        if !self.is_dynamic() {
            return;
        }
        self.acceleration += force * self.inverse_mass;
    }

    pub fn apply_impulse(&mut self, impulse: Vec3, position: Vec3) {
        if !self.is_dynamic() {
            return;
        }

        self.velocity.linear += impulse * self.inverse_mass;
        let torque = (position - self.transform.position).cross(impulse);
        self.velocity.angular += self.inverse_inertia * torque;
    }

    pub fn set_mass_properties(&mut self, props: MassProperties) {
        self.mass_properties = props;
        self.recompute_inverses();
    }

    /// Pose at `alpha` between the pre-step snapshot and the current pose.
    pub fn interpolated_transform(&self, alpha: f32) -> Transform {
        self.previous_transform
            .interpolate(&self.transform, alpha.clamp(0.0, 1.0))
    }

    fn recompute_inverses(&mut self) {
        if self.is_static {
            self.inverse_mass = 0.0;
            self.inverse_inertia = Mat3::ZERO;
            return;
        }
        self.inverse_mass = if self.mass_properties.mass.abs() < f32::EPSILON {
            0.0
        } else {
            1.0 / self.mass_properties.mass
        };
        let inverse_inertia = self.mass_properties.inertia.inverse();
        if inverse_inertia.determinant().abs() < f32::EPSILON {
            self.inverse_inertia = Mat3::IDENTITY;
        } else {
            self.inverse_inertia = inverse_inertia;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_body_ignores_impulses() {
        let mut body = RigidBody::fixed(Vec3::ZERO);
        body.apply_impulse(Vec3::X, Vec3::ZERO);
        assert_eq!(body.velocity.linear, Vec3::ZERO);
    }

    #[test]
    fn interpolation_blends_between_snapshot_and_pose() {
        let mut body = RigidBody::dynamic(Vec3::ZERO);
        body.transform.position = Vec3::new(2.0, 0.0, 0.0);
        let mid = body.interpolated_transform(0.5);
        assert_eq!(mid.position, Vec3::new(1.0, 0.0, 0.0));
    }
}
