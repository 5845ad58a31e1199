//! One world step: particles, then the body snapshot, then bodies.
//!
//! The world stays locked for the whole step. Unlocking is tied to
//! [`WorldLock`]'s drop, so it also happens when the body solver returns an
//! error or panics.

use std::ops::{Deref, DerefMut};
use std::time::Instant;

use log::{debug, warn};

use super::ParticleWorld;
use crate::{
    config::ParticleIterations,
    error::{PhysicsError, PhysicsResult},
    utils::{
        logging::{warn_if_frame_budget_exceeded, ScopedTimer},
        profiling::StepProfile,
    },
};

/// Hooks invoked while a step is in progress.
///
/// Both hooks receive the world while it is still locked: reads and particle
/// edits are fine, structural changes fail with [`PhysicsError::WorldLocked`].
pub trait StepListener {
    /// After every particle system solved, before bodies move.
    fn particles_solved(&mut self, _world: &mut ParticleWorld) {}

    /// After the body solver finished.
    fn bodies_solved(&mut self, _world: &mut ParticleWorld) {}
}

impl StepListener for () {}

/// Keeps the world locked for as long as it lives.
struct WorldLock<'a> {
    world: &'a mut ParticleWorld,
}

impl<'a> WorldLock<'a> {
    fn acquire(world: &'a mut ParticleWorld) -> Self {
        world.locked = true;
        Self { world }
    }
}

impl Deref for WorldLock<'_> {
    type Target = ParticleWorld;

    fn deref(&self) -> &ParticleWorld {
        self.world
    }
}

impl DerefMut for WorldLock<'_> {
    fn deref_mut(&mut self) -> &mut ParticleWorld {
        self.world
    }
}

impl Drop for WorldLock<'_> {
    fn drop(&mut self) {
        self.world.locked = false;
    }
}

struct ParticlePhase {
    particle_count: usize,
    contacts: usize,
}

impl ParticleWorld {
    /// Advances particles and bodies by `dt`.
    pub fn step(&mut self, dt: f32) -> PhysicsResult<()> {
        self.step_with_listener(dt, &mut ())
    }

    /// Advances the world by `dt`, calling `listener` between phases.
    pub fn step_with_listener<L>(&mut self, dt: f32, listener: &mut L) -> PhysicsResult<()>
    where
        L: StepListener + ?Sized,
    {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(PhysicsError::InvalidTimestep(dt));
        }
        self.ensure_unlocked("step")?;

        let started = Instant::now();
        let iterations = self.particle_iterations_for(dt);
        let mut profile = StepProfile {
            particle_iterations: iterations,
            particle_system_count: self.registry.len(),
            body_count: self.rigid.body_count(),
            ..StepProfile::default()
        };

        {
            let mut world = WorldLock::acquire(self);

            let particles = {
                let _timer = ScopedTimer::recording("particles::solve", &mut profile.particle_time);
                world.solve_particles(dt, iterations)
            };
            profile.particle_count = particles.particle_count;
            profile.particle_contacts = particles.contacts;
            listener.particles_solved(&mut world);

            {
                let _timer = ScopedTimer::recording("bodies::snapshot", &mut profile.snapshot_time);
                world.rigid.snapshot_transforms();
            }
            world.apply_particle_reactions();

            {
                let _timer = ScopedTimer::recording("bodies::solve", &mut profile.body_time);
                if let Err(err) = world.rigid.solve(dt) {
                    warn!("body solver failed, step aborted: {err}");
                    return Err(err);
                }
            }
            listener.bodies_solved(&mut world);
        }

        profile.total_time = started.elapsed();
        warn_if_frame_budget_exceeded(profile.total_time, self.settings.frame_budget_ms);
        debug!(
            "stepped {dt:.4}s: {} particles in {} systems x{} iterations, {} bodies",
            profile.particle_count,
            profile.particle_system_count,
            profile.particle_iterations,
            profile.body_count
        );
        self.profile = profile;
        Ok(())
    }

    /// Iteration count the next step of length `dt` will use.
    pub fn particle_iterations_for(&self, dt: f32) -> u32 {
        match self.settings.particle_iterations {
            ParticleIterations::Auto => self.recommended_particle_iterations(dt),
            ParticleIterations::Fixed(count) => count.max(1),
        }
    }

    /// Solves every particle system in list order against the bodies' current pose.
    fn solve_particles(&mut self, dt: f32, iterations: u32) -> ParticlePhase {
        let gravity = self.rigid.gravity();
        let mut phase = ParticlePhase {
            particle_count: 0,
            contacts: 0,
        };

        let mut cursor = self.registry.head();
        while let Some(handle) = cursor {
            let Some(system) = self.registry.get_mut(handle) else {
                break;
            };
            system.solve(dt, iterations, gravity, &self.rigid);
            phase.particle_count += system.particle_count();
            phase.contacts += system.last_contact_count();
            cursor = system.links.next;
        }
        phase
    }

    /// Hands the impulses particles exerted on bodies to the rigid side.
    fn apply_particle_reactions(&mut self) {
        let mut cursor = self.registry.head();
        while let Some(handle) = cursor {
            let Some(system) = self.registry.get_mut(handle) else {
                break;
            };
            let impulses = system.take_body_impulses();
            cursor = system.links.next;
            self.rigid.apply_impulses(&impulses);
        }
    }
}
