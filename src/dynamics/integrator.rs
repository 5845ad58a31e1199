use glam::Vec3;

use crate::{
    core::rigidbody::RigidBody,
    error::PhysicsResult,
    utils::{allocator::Arena, math::angular_velocity_to_quat},
};

/// Rigid-body pipeline run once per world step after particles have been solved.
///
/// Implementations own constraint solving and integration. Forces (gravity,
/// particle reactions) have already been accumulated into each body's
/// `acceleration` and velocity when `solve` is called.
pub trait BodySolver: Send + Sync {
    fn name(&self) -> &str;

    fn solve(&mut self, bodies: &mut Arena<RigidBody>, dt: f32) -> PhysicsResult<()>;
}

/// Semi-implicit Euler integrator responsible for stepping rigid bodies forward in time.
#[derive(Debug, Clone)]
pub struct Integrator {
    pub substeps: u32,
}

impl Default for Integrator {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Integrator {
    pub fn new(substeps: u32) -> Self {
        Self {
            substeps: substeps.max(1),
        }
    }

    pub fn integrate_velocity(&self, body: &mut RigidBody, dt: f32) {
        if !body.is_dynamic() {
            return;
        }

        body.velocity.linear += body.acceleration * dt;

        body.velocity.linear *= (1.0 - body.linear_velocity_damping * dt).max(0.0);
        body.velocity.angular *= (1.0 - body.angular_velocity_damping * dt).max(0.0);
    }

    pub fn integrate_position(&self, body: &mut RigidBody, dt: f32) {
        if body.is_static {
            return;
        }

        body.transform.position += body.velocity.linear * dt;
        let delta = angular_velocity_to_quat(body.velocity.angular, dt);
        body.transform.rotation = (delta * body.transform.rotation).normalize();
    }
}

impl BodySolver for Integrator {
    fn name(&self) -> &str {
        "integrator"
    }

    fn solve(&mut self, bodies: &mut Arena<RigidBody>, dt: f32) -> PhysicsResult<()> {
        let sub_dt = dt / self.substeps as f32;
        for _ in 0..self.substeps {
            for body in bodies.values_mut() {
                self.integrate_velocity(body, sub_dt);
                self.integrate_position(body, sub_dt);
            }
        }
        for body in bodies.values_mut() {
            body.acceleration = Vec3::ZERO;
        }
        Ok(())
    }
}
