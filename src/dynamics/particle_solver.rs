//! Position/velocity relaxation solver for a particle system.
//!
//! Each sub-iteration applies gravity and damping, pushes overlapping
//! neighbours apart, advects, then resolves contacts against colliders at the
//! rigid bodies' current pose. Reaction impulses on bodies are gathered for
//! the world to apply once bodies are allowed to move.

use std::collections::HashMap;

use glam::Vec3;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    core::{
        particle::{BodyImpulse, Particle, ParticleSystem},
        rigidbody::BodyHandle,
        types::Aabb,
    },
    world::rigid::RigidWorld,
};

/// One particle–collider contact found during an iteration.
#[derive(Debug, Clone, Copy)]
struct ParticleContact {
    body: BodyHandle,
    normal: Vec3,
    depth: f32,
    body_velocity: Vec3,
}

#[derive(Default)]
struct ImpulseAccumulator {
    impulse: Vec3,
    point_sum: Vec3,
    count: u32,
}

impl ParticleSystem {
    /// Advances every particle by `dt` using `iterations` sub-steps.
    pub fn solve(&mut self, dt: f32, iterations: u32, gravity: Vec3, rigid: &RigidWorld) {
        let iterations = iterations.max(1);
        self.last_iterations = iterations;
        self.last_contact_count = 0;
        self.body_impulses.clear();

        if self.particles.is_empty() || dt <= 0.0 {
            return;
        }

        let sub_dt = dt / iterations as f32;
        let mut reactions: HashMap<BodyHandle, ImpulseAccumulator> = HashMap::new();

        for _ in 0..iterations {
            self.apply_gravity_and_damping(gravity, sub_dt);
            self.relax_overlaps(sub_dt);
            self.advect(sub_dt);
            self.last_contact_count += self.resolve_collider_contacts(rigid, &mut reactions);
        }

        self.grid.mark_dirty();
        self.body_impulses = reactions
            .into_iter()
            .map(|(body, acc)| BodyImpulse {
                body,
                impulse: acc.impulse,
                point: acc.point_sum / acc.count.max(1) as f32,
            })
            .collect();
        // HashMap order is unspecified; keep the output deterministic.
        self.body_impulses.sort_by_key(|reaction| reaction.body);
    }

    fn apply_gravity_and_damping(&mut self, gravity: Vec3, sub_dt: f32) {
        let delta_v = gravity * self.def.gravity_scale * sub_dt;
        let damping = (1.0 - self.def.damping * sub_dt).max(0.0);
        self.for_each_particle(move |particle| {
            particle.velocity = (particle.velocity + delta_v) * damping;
        });
    }

    fn advect(&mut self, sub_dt: f32) {
        self.for_each_particle(move |particle| {
            particle.position += particle.velocity * sub_dt;
        });
    }

    /// Runs an independent per-particle update, on rayon when enabled.
    fn for_each_particle<F>(&mut self, update: F)
    where
        F: Fn(&mut Particle) + Send + Sync,
    {
        #[cfg(feature = "parallel")]
        if self.parallel_enabled {
            self.particles.par_iter_mut().for_each(update);
            return;
        }
        self.particles.iter_mut().for_each(update);
    }

    /// Pushes overlapping particle pairs apart with a velocity proportional to
    /// their overlap.
    fn relax_overlaps(&mut self, sub_dt: f32) {
        let strength = self.def.pressure_strength;
        if strength <= 0.0 || self.particles.len() < 2 {
            return;
        }

        self.grid.mark_dirty();
        let diameter = self.def.radius * 2.0;
        let mut deltas = vec![Vec3::ZERO; self.particles.len()];
        {
            let grid = self.broadphase();
            for (i, particle) in self.particles.iter().enumerate() {
                let bounds = Aabb::from_point(particle.position).expanded(diameter);
                for j in grid.query(&bounds) {
                    if j <= i {
                        continue;
                    }
                    let offset = self.particles[j].position - particle.position;
                    let distance = offset.length();
                    if distance >= diameter {
                        continue;
                    }
                    let normal = if distance > f32::EPSILON {
                        offset / distance
                    } else {
                        Vec3::Y
                    };
                    let push = normal * (0.5 * strength * (diameter - distance) / sub_dt);
                    deltas[i] -= push;
                    deltas[j] += push;
                }
            }
        }

        for (particle, delta) in self.particles.iter_mut().zip(deltas) {
            particle.velocity += delta;
        }
    }

    /// Projects particles out of colliders and removes approaching normal
    /// velocity. Returns the number of contacts resolved.
    fn resolve_collider_contacts(
        &mut self,
        rigid: &RigidWorld,
        reactions: &mut HashMap<BodyHandle, ImpulseAccumulator>,
    ) -> usize {
        let Some(bounds) = self.aabb() else {
            return 0;
        };
        let candidates = rigid.colliders_overlapping(&bounds);
        if candidates.is_empty() {
            return 0;
        }

        let radius = self.def.radius;
        let mass = self.particle_mass();
        let strict = self.def.strict_contact_check;
        let filter = self.def.collision_filter;
        let mut resolved = 0;
        let mut contacts: Vec<ParticleContact> = Vec::new();

        for particle in self.particles.iter_mut() {
            contacts.clear();
            let particle_bounds = Aabb::from_point(particle.position).expanded(radius);

            for &handle in &candidates {
                let Some((collider, body, pose)) = rigid.collider_pose(handle) else {
                    continue;
                };
                if collider.is_trigger
                    || !collider.collision_filter.matches(&filter)
                    || !collider.shape.aabb(&pose).overlaps(&particle_bounds)
                {
                    continue;
                }
                let Some((normal, depth)) = collider.shape.penetration(&pose, particle.position, radius)
                else {
                    continue;
                };
                let arm = particle.position - body.transform.position;
                contacts.push(ParticleContact {
                    body: body.handle,
                    normal,
                    depth,
                    body_velocity: body.velocity.linear + body.velocity.angular.cross(arm),
                });
            }

            if strict && contacts.len() > 1 {
                // Seams between colliders produce shallow secondary contacts; keep the deepest.
                let deepest = contacts
                    .iter()
                    .copied()
                    .max_by(|a, b| a.depth.total_cmp(&b.depth));
                contacts.clear();
                contacts.extend(deepest);
            }

            for contact in &contacts {
                particle.position += contact.normal * contact.depth;
                let approach = (particle.velocity - contact.body_velocity).dot(contact.normal);
                if approach < 0.0 {
                    particle.velocity -= contact.normal * approach;
                    let entry = reactions.entry(contact.body).or_default();
                    entry.impulse += contact.normal * (approach * mass);
                    entry.point_sum += particle.position - contact.normal * radius;
                    entry.count += 1;
                }
                resolved += 1;
            }
        }

        resolved
    }
}
