//! The coupled world: a [`RigidWorld`] plus every particle system sharing its space.
//!
//! Body operations pass straight through to the rigid side. Stepping
//! ([`step`]) and the spatial queries ([`fanout`]) are intercepted so particle
//! systems take part in both.

pub mod fanout;
pub mod registry;
pub mod rigid;
pub mod step;

use glam::Vec3;
use log::{debug, warn};

use crate::{
    config::{ParticleIterations, WorldSettings},
    core::{
        collider::{Collider, ColliderHandle},
        particle::{ParticleSystem, ParticleSystemDef, ParticleSystemHandle},
        rigidbody::{BodyHandle, RigidBody},
    },
    dynamics::{integrator::BodySolver, iterations::IterationTuning},
    error::{PhysicsError, PhysicsResult},
    utils::profiling::StepProfile,
};

pub use registry::{LinkError, ParticleSystemRegistry, RegistryIter};
pub use rigid::RigidWorld;
pub use step::StepListener;

/// Rigid bodies and particle systems advanced and queried together.
pub struct ParticleWorld {
    rigid: RigidWorld,
    registry: ParticleSystemRegistry,
    locked: bool,
    settings: WorldSettings,
    profile: StepProfile,
}

impl Default for ParticleWorld {
    fn default() -> Self {
        Self::new(WorldSettings::default())
    }
}

impl ParticleWorld {
    pub fn new(settings: WorldSettings) -> Self {
        Self {
            rigid: RigidWorld::new(&settings),
            registry: ParticleSystemRegistry::new(),
            locked: false,
            settings,
            profile: StepProfile::default(),
        }
    }

    pub fn with_gravity(gravity: Vec3) -> Self {
        Self::new(WorldSettings {
            gravity,
            ..WorldSettings::default()
        })
    }

    /// True while a step is in progress.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    fn ensure_unlocked(&self, operation: &'static str) -> PhysicsResult<()> {
        if self.locked {
            warn!("rejected `{operation}`: world is locked");
            return Err(PhysicsError::WorldLocked { operation });
        }
        Ok(())
    }

    pub fn gravity(&self) -> Vec3 {
        self.rigid.gravity()
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.settings.gravity = gravity;
        self.rigid.set_gravity(gravity);
    }

    pub fn particle_iterations(&self) -> ParticleIterations {
        self.settings.particle_iterations
    }

    pub fn set_particle_iterations(&mut self, iterations: ParticleIterations) {
        self.settings.particle_iterations = iterations;
    }

    pub fn iteration_tuning(&self) -> IterationTuning {
        self.settings.iteration_tuning
    }

    pub fn set_iteration_tuning(&mut self, tuning: IterationTuning) {
        self.settings.iteration_tuning = tuning;
    }

    pub fn set_frame_budget_ms(&mut self, budget_ms: f32) {
        self.settings.frame_budget_ms = budget_ms;
    }

    /// Particle sub-iterations recommended for `time_step` given the current
    /// gravity and the smallest radius over every registered system.
    pub fn recommended_particle_iterations(&self, time_step: f32) -> u32 {
        self.settings.iteration_tuning.recommend(
            self.rigid.gravity().length(),
            self.registry.min_radius(),
            time_step,
        )
    }

    /// Timing and counts recorded by the last successful step.
    pub fn last_step_profile(&self) -> &StepProfile {
        &self.profile
    }

    // -- rigid bodies -------------------------------------------------------

    pub fn rigid(&self) -> &RigidWorld {
        &self.rigid
    }

    pub fn set_body_solver<B>(&mut self, solver: B)
    where
        B: BodySolver + 'static,
    {
        self.rigid.set_body_solver(solver);
    }

    pub fn create_body(&mut self, body: RigidBody) -> PhysicsResult<BodyHandle> {
        self.ensure_unlocked("create a body")?;
        Ok(self.rigid.add_body(body))
    }

    pub fn destroy_body(&mut self, handle: BodyHandle) -> PhysicsResult<RigidBody> {
        self.ensure_unlocked("destroy a body")?;
        self.rigid
            .remove_body(handle)
            .ok_or(PhysicsError::UnknownBody(handle))
    }

    pub fn create_collider(&mut self, collider: Collider) -> PhysicsResult<ColliderHandle> {
        self.ensure_unlocked("create a collider")?;
        self.rigid.add_collider(collider)
    }

    pub fn destroy_collider(&mut self, handle: ColliderHandle) -> PhysicsResult<Collider> {
        self.ensure_unlocked("destroy a collider")?;
        self.rigid
            .remove_collider(handle)
            .ok_or(PhysicsError::UnknownCollider(handle))
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.rigid.body(handle)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.rigid.body_mut(handle)
    }

    pub fn collider(&self, handle: ColliderHandle) -> Option<&Collider> {
        self.rigid.collider(handle)
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &RigidBody)> + '_ {
        self.rigid.bodies()
    }

    pub fn body_count(&self) -> usize {
        self.rigid.body_count()
    }

    // -- particle systems ---------------------------------------------------

    /// Creates a particle system and links it in at the head of the list.
    pub fn attach_particle_system(&mut self, def: ParticleSystemDef) -> PhysicsResult<ParticleSystemHandle> {
        self.ensure_unlocked("attach a particle system")?;
        let handle = self.registry.attach(def);
        debug!(
            "attached particle system {handle} ({} live)",
            self.registry.len()
        );
        Ok(handle)
    }

    /// Unlinks a particle system and hands it back to the caller.
    pub fn detach_particle_system(&mut self, handle: ParticleSystemHandle) -> PhysicsResult<ParticleSystem> {
        self.ensure_unlocked("detach a particle system")?;
        let system = self
            .registry
            .detach(handle)
            .ok_or(PhysicsError::UnknownParticleSystem(handle))?;
        debug!(
            "detached particle system {handle} ({} live)",
            self.registry.len()
        );
        Ok(system)
    }

    pub fn particle_systems(&self) -> &ParticleSystemRegistry {
        &self.registry
    }

    pub fn particle_system_head(&self) -> Option<ParticleSystemHandle> {
        self.registry.head()
    }

    pub fn particle_system_count(&self) -> usize {
        self.registry.len()
    }

    pub fn particle_system(&self, handle: ParticleSystemHandle) -> Option<&ParticleSystem> {
        self.registry.get(handle)
    }

    /// Mutable access to one system's particles and parameters. The list itself
    /// can only change through attach/detach.
    pub fn particle_system_mut(&mut self, handle: ParticleSystemHandle) -> Option<&mut ParticleSystem> {
        self.registry.get_mut(handle)
    }
}
