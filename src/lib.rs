//! Particle World – rigid bodies and particle systems in one simulation.
//!
//! A [`ParticleWorld`] wraps a rigid-body world and a registry of particle
//! systems. Stepping advances particles against the bodies' current pose, then
//! the bodies themselves; spatial queries visit colliders first and every
//! particle system after.

pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod error;
pub mod utils;
pub mod world;

pub use glam::{Quat, Vec3};

pub use collision::queries::{
    AllRayHits, ClosestRayHit, CollectHits, HitTarget, QueryCallback, QueryControl, RayCastCallback,
    RayCastControl, RayHit,
};
pub use config::{ParticleIterations, WorldSettings};
pub use crate::core::{
    collider::{Collider, ColliderHandle, ColliderShape, CollisionFilter},
    particle::{Particle, ParticleDef, ParticleSystem, ParticleSystemDef, ParticleSystemHandle},
    rigidbody::{BodyHandle, RigidBody},
    types::{Aabb, MassProperties, Transform, Velocity},
};
pub use dynamics::{
    integrator::{BodySolver, Integrator},
    iterations::{recommend_particle_iterations, IterationTuning},
};
pub use error::{PhysicsError, PhysicsResult};
pub use utils::{
    allocator::{Arena, GenerationalId, Handle},
    profiling::StepProfile,
};
pub use world::{ParticleWorld, ParticleSystemRegistry, RigidWorld, StepListener};

/// Upper bound on fixed steps taken by one [`PhysicsEngine::update`] call.
const MAX_STEPS_PER_UPDATE: u32 = 8;

/// High-level convenience wrapper that drives a [`ParticleWorld`] at a fixed timestep.
pub struct PhysicsEngine {
    world: ParticleWorld,
    time_step: f32,
    time_accumulated: f32,
}

impl PhysicsEngine {
    /// Creates an engine with default settings and the provided fixed timestep.
    pub fn new(time_step: f32) -> Self {
        Self::with_settings(WorldSettings::default(), time_step)
    }

    pub fn with_settings(settings: WorldSettings, time_step: f32) -> Self {
        Self {
            world: ParticleWorld::new(settings),
            time_step,
            time_accumulated: 0.0,
        }
    }

    pub fn time_step(&self) -> f32 {
        self.time_step
    }

    /// Adds frame time to the accumulator and runs as many fixed steps as it
    /// covers. Returns the number of steps taken.
    ///
    /// Leftover time beyond [`MAX_STEPS_PER_UPDATE`] steps is dropped so a
    /// long stall does not snowball into ever longer frames.
    pub fn update(&mut self, frame_time: f32) -> PhysicsResult<u32> {
        if !self.time_step.is_finite() || self.time_step <= 0.0 {
            return Err(PhysicsError::InvalidTimestep(self.time_step));
        }
        self.time_accumulated += frame_time.max(0.0);

        let mut steps = 0;
        while self.time_accumulated >= self.time_step {
            if steps == MAX_STEPS_PER_UPDATE {
                log::warn!(
                    "dropping {:.4}s of simulation time after {steps} steps",
                    self.time_accumulated
                );
                self.time_accumulated = 0.0;
                break;
            }
            self.time_accumulated -= self.time_step;
            self.world.step(self.time_step)?;
            steps += 1;
        }
        Ok(steps)
    }

    /// Fraction of a fixed step left in the accumulator, for rendering
    /// interpolation between `previous_transform` and `transform`. Zero when
    /// the time step is not a positive finite value.
    pub fn interpolation_alpha(&self) -> f32 {
        if !self.time_step.is_finite() || self.time_step <= 0.0 {
            return 0.0;
        }
        (self.time_accumulated / self.time_step).clamp(0.0, 1.0)
    }

    pub fn world(&self) -> &ParticleWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut ParticleWorld {
        &mut self.world
    }

    pub fn add_body(&mut self, body: RigidBody) -> PhysicsResult<BodyHandle> {
        self.world.create_body(body)
    }

    pub fn add_collider(&mut self, collider: Collider) -> PhysicsResult<ColliderHandle> {
        self.world.create_collider(collider)
    }

    pub fn add_particle_system(&mut self, def: ParticleSystemDef) -> PhysicsResult<ParticleSystemHandle> {
        self.world.attach_particle_system(def)
    }

    pub fn get_body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.world.body(handle)
    }

    pub fn get_body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.world.body_mut(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_runs_whole_steps_and_keeps_remainder() {
        let mut engine = PhysicsEngine::new(0.25);
        assert_eq!(engine.update(0.6).unwrap(), 2);
        approx::assert_relative_eq!(engine.interpolation_alpha(), 0.4, epsilon = 1e-4);
        assert_eq!(engine.update(0.2).unwrap(), 1);
    }

    #[test]
    fn update_caps_steps_after_a_stall() {
        let mut engine = PhysicsEngine::new(0.01);
        assert_eq!(engine.update(10.0).unwrap(), MAX_STEPS_PER_UPDATE);
        assert_eq!(engine.interpolation_alpha(), 0.0);
    }

    #[test]
    fn engine_rejects_non_positive_time_step() {
        let mut engine = PhysicsEngine::new(0.0);
        assert!(matches!(
            engine.update(1.0),
            Err(PhysicsError::InvalidTimestep(_))
        ));
        assert_eq!(engine.interpolation_alpha(), 0.0);

        let mut negative = PhysicsEngine::new(-0.5);
        assert!(negative.update(1.0).is_err());
        assert_eq!(negative.interpolation_alpha(), 0.0);
    }
}
