//! Particle system data: configuration, particle buffer and registry links.
//!
//! The solver lives in [`crate::dynamics::particle_solver`], the system-local
//! queries in [`crate::collision::particle_queries`].

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{
    collision::broadphase::{LazyGrid, SpatialGrid},
    config::{DEFAULT_PARTICLE_DENSITY, DEFAULT_PARTICLE_RADIUS, DEFAULT_PRESSURE_STRENGTH},
    core::{
        collider::{ColliderShape, CollisionFilter},
        rigidbody::BodyHandle,
        types::{Aabb, Transform},
    },
    error::{PhysicsError, PhysicsResult},
    utils::allocator::Handle,
};

pub type ParticleSystemHandle = Handle<ParticleSystem>;

/// Configuration of one particle system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSystemDef {
    pub radius: f32,
    pub gravity_scale: f32,
    pub density: f32,
    /// Fraction of velocity removed per second.
    pub damping: f32,
    /// Resolve only the deepest collider contact per particle and iteration,
    /// discarding secondary contacts that straddle collider seams.
    pub strict_contact_check: bool,
    /// Stiffness of the overlap relaxation between neighbouring particles.
    pub pressure_strength: f32,
    /// Upper bound on live particles; `None` means unbounded.
    pub max_count: Option<usize>,
    /// Colliders whose filter does not match this one are ignored by the contact pass.
    pub collision_filter: CollisionFilter,
}

impl Default for ParticleSystemDef {
    fn default() -> Self {
        Self {
            radius: DEFAULT_PARTICLE_RADIUS,
            gravity_scale: 1.0,
            density: DEFAULT_PARTICLE_DENSITY,
            damping: 0.0,
            strict_contact_check: false,
            pressure_strength: DEFAULT_PRESSURE_STRENGTH,
            max_count: None,
            collision_filter: CollisionFilter::default(),
        }
    }
}

impl ParticleSystemDef {
    pub fn with_radius(radius: f32) -> Self {
        Self {
            radius,
            ..Self::default()
        }
    }
}

/// One simulated particle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    pub color: [u8; 4],
    pub group: Option<u32>,
}

/// Parameters for a new particle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleDef {
    pub position: Vec3,
    pub velocity: Vec3,
    pub color: [u8; 4],
    pub group: Option<u32>,
}

impl Default for ParticleDef {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            color: [255, 255, 255, 255],
            group: None,
        }
    }
}

impl ParticleDef {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

/// Neighbour links owned by the world's particle-system list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RegistryLinks {
    pub(crate) prev: Option<ParticleSystemHandle>,
    pub(crate) next: Option<ParticleSystemHandle>,
}

/// Reaction impulse a particle contact exerted on a body during a solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyImpulse {
    pub body: BodyHandle,
    pub impulse: Vec3,
    pub point: Vec3,
}

/// An independently configured set of particles sharing the world with rigid bodies.
#[derive(Debug)]
pub struct ParticleSystem {
    pub(crate) handle: ParticleSystemHandle,
    pub(crate) def: ParticleSystemDef,
    pub(crate) particles: Vec<Particle>,
    pub(crate) links: RegistryLinks,
    pub(crate) grid: LazyGrid<usize>,
    pub(crate) body_impulses: Vec<BodyImpulse>,
    pub(crate) last_iterations: u32,
    pub(crate) last_contact_count: usize,
    pub(crate) parallel_enabled: bool,
}

impl ParticleSystem {
    pub(crate) fn new(handle: ParticleSystemHandle, def: ParticleSystemDef) -> Self {
        let grid = LazyGrid::new(Self::cell_size_for(def.radius));
        Self {
            handle,
            def,
            particles: Vec::new(),
            links: RegistryLinks::default(),
            grid,
            body_impulses: Vec::new(),
            last_iterations: 0,
            last_contact_count: 0,
            parallel_enabled: true,
        }
    }

    fn cell_size_for(radius: f32) -> f32 {
        (radius * 2.0).max(f32::EPSILON)
    }

    pub fn handle(&self) -> ParticleSystemHandle {
        self.handle
    }

    pub fn def(&self) -> &ParticleSystemDef {
        &self.def
    }

    pub fn radius(&self) -> f32 {
        self.def.radius
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.def.radius = radius;
        self.grid.set_cell_size(Self::cell_size_for(radius));
    }

    pub fn set_gravity_scale(&mut self, gravity_scale: f32) {
        self.def.gravity_scale = gravity_scale;
    }

    pub fn set_density(&mut self, density: f32) {
        self.def.density = density;
    }

    pub fn set_damping(&mut self, damping: f32) {
        self.def.damping = damping;
    }

    pub fn set_strict_contact_check(&mut self, strict: bool) {
        self.def.strict_contact_check = strict;
    }

    pub fn set_collision_filter(&mut self, filter: CollisionFilter) {
        self.def.collision_filter = filter;
    }

    /// Enables or disables rayon for per-particle passes. Without the
    /// `parallel` feature every pass is sequential regardless.
    pub fn set_parallel_enabled(&mut self, enabled: bool) {
        self.parallel_enabled = enabled;
    }

    pub fn parallel_enabled(&self) -> bool {
        self.parallel_enabled
    }

    /// Mass of a single particle: density times the volume of its bounding cube.
    pub fn particle_mass(&self) -> f32 {
        let diameter = self.def.radius * 2.0;
        self.def.density * diameter * diameter * diameter
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Mutable particle access. The broad-phase is refreshed lazily on the next query.
    pub fn particles_mut(&mut self) -> &mut [Particle] {
        self.grid.mark_dirty();
        &mut self.particles
    }

    pub fn particle(&self, index: usize) -> Option<&Particle> {
        self.particles.get(index)
    }

    pub fn create_particle(&mut self, def: ParticleDef) -> PhysicsResult<usize> {
        if let Some(max) = self.def.max_count {
            if self.particles.len() >= max {
                return Err(PhysicsError::ParticleCapacity { max });
            }
        }
        self.particles.push(Particle {
            position: def.position,
            velocity: def.velocity,
            color: def.color,
            group: def.group,
        });
        self.grid.mark_dirty();
        Ok(self.particles.len() - 1)
    }

    /// Removes one particle. The last particle takes over the freed index.
    pub fn destroy_particle(&mut self, index: usize) -> Option<Particle> {
        if index >= self.particles.len() {
            return None;
        }
        self.grid.mark_dirty();
        Some(self.particles.swap_remove(index))
    }

    /// Removes every particle whose centre lies inside `shape` and returns how
    /// many were destroyed. Surviving particles keep their relative order.
    pub fn destroy_particles_in_shape(&mut self, shape: &ColliderShape, transform: &Transform) -> usize {
        let before = self.particles.len();
        self.particles
            .retain(|particle| !shape.contains_point(transform, particle.position));
        let destroyed = before - self.particles.len();
        if destroyed > 0 {
            self.grid.mark_dirty();
        }
        destroyed
    }

    pub fn particles_in_group(&self, group: u32) -> impl Iterator<Item = (usize, &Particle)> + '_ {
        self.particles
            .iter()
            .enumerate()
            .filter(move |(_, particle)| particle.group == Some(group))
    }

    /// Bounds of all particle discs, or `None` when the system is empty.
    pub fn aabb(&self) -> Option<Aabb> {
        let first = self.particles.first()?;
        let mut bounds = Aabb::from_point(first.position);
        for particle in &self.particles[1..] {
            bounds = bounds.union(&Aabb::from_point(particle.position));
        }
        Some(bounds.expanded(self.def.radius))
    }

    /// Sub-iterations used by the most recent solve.
    pub fn last_iterations(&self) -> u32 {
        self.last_iterations
    }

    /// Particle–collider contacts resolved by the most recent solve.
    pub fn last_contact_count(&self) -> usize {
        self.last_contact_count
    }

    pub(crate) fn take_body_impulses(&mut self) -> Vec<BodyImpulse> {
        std::mem::take(&mut self.body_impulses)
    }

    /// Particle broad-phase, rebuilt from current positions if stale.
    pub(crate) fn broadphase(&self) -> parking_lot::RwLockReadGuard<'_, SpatialGrid<usize>> {
        self.grid.read_with(|grid| {
            for (index, particle) in self.particles.iter().enumerate() {
                grid.insert(index, &Aabb::from_point(particle.position));
            }
        })
    }
}
