//! World-level spatial queries. Each query asks the rigid side first, then
//! every particle system in list order, with the same callback throughout.
//!
//! A callback returning [`QueryControl::Stop`] ends the whole query, not just
//! the part currently being searched. Ray casts carry one clip fraction across
//! every participant so a nearer particle hit shortens the ray for the rest.

use glam::Vec3;

use super::ParticleWorld;
use crate::{
    collision::queries::{
        AllRayHits, ClosestRayHit, CollectHits, HitTarget, QueryCallback, QueryControl, RayCastCallback,
        RayCastInput, RayHit,
    },
    core::{
        collider::ColliderShape,
        particle::ParticleSystem,
        rigidbody::BodyHandle,
        types::{Aabb, Transform},
    },
    world::rigid::RigidWorld,
};

impl ParticleWorld {
    fn fan_out<C, R, P>(&self, callback: &mut C, rigid: R, particles: P)
    where
        C: QueryCallback + ?Sized,
        R: FnOnce(&RigidWorld, &mut C) -> QueryControl,
        P: Fn(&ParticleSystem, &mut C) -> QueryControl,
    {
        if rigid(&self.rigid, callback) == QueryControl::Stop {
            return;
        }
        for system in self.registry.iter() {
            if !callback.should_query_particle_system(system) {
                continue;
            }
            if particles(system, callback) == QueryControl::Stop {
                return;
            }
        }
    }

    /// Reports colliders whose bounds overlap `aabb` and particles whose
    /// centres lie inside it.
    pub fn query_aabb<C: QueryCallback + ?Sized>(&self, aabb: &Aabb, callback: &mut C) {
        self.fan_out(
            callback,
            |rigid, cb| rigid.query_aabb(aabb, cb),
            |system, cb| system.query_aabb(aabb, cb),
        );
    }

    /// Reports colliders containing `point` and particles whose disc covers it.
    pub fn query_point<C: QueryCallback + ?Sized>(&self, point: Vec3, callback: &mut C) {
        self.fan_out(
            callback,
            |rigid, cb| rigid.query_point(point, cb),
            |system, cb| system.query_point(point, cb),
        );
    }

    /// Reports colliders whose bounds overlap `shape` at `transform`, and
    /// particles whose centres lie inside the shape.
    pub fn query_shape<C: QueryCallback + ?Sized>(&self, shape: &ColliderShape, transform: &Transform, callback: &mut C) {
        self.fan_out(
            callback,
            |rigid, cb| rigid.query_shape(shape, transform, cb),
            |system, cb| system.query_shape(shape, transform, cb),
        );
    }

    /// Casts the segment `p1 -> p2` against colliders and particles.
    pub fn ray_cast<C: RayCastCallback + ?Sized>(&self, p1: Vec3, p2: Vec3, callback: &mut C) {
        let mut input = RayCastInput::new(p1, p2);
        if !self.rigid.ray_cast(&mut input, callback) {
            return;
        }
        for system in self.registry.iter() {
            if !callback.should_query_particle_system(system) {
                continue;
            }
            if !system.ray_cast(&mut input, callback) {
                return;
            }
        }
    }

    /// Nearest hit along `p1 -> p2`, collider or particle.
    pub fn ray_cast_closest(&self, p1: Vec3, p2: Vec3) -> Option<RayHit> {
        let mut closest = ClosestRayHit::default();
        self.ray_cast(p1, p2, &mut closest);
        closest.hit
    }

    /// Every hit along `p1 -> p2`, nearest first.
    pub fn ray_cast_all(&self, p1: Vec3, p2: Vec3) -> Vec<RayHit> {
        let mut all = AllRayHits::default();
        self.ray_cast(p1, p2, &mut all);
        all.finish()
    }

    /// Everything overlapping `aabb`, colliders first.
    pub fn hits_in_aabb(&self, aabb: &Aabb) -> Vec<HitTarget> {
        let mut hits = CollectHits::new();
        self.query_aabb(aabb, &mut hits);
        hits.hits
    }

    /// Bodies with at least one collider overlapping `aabb`, without duplicates.
    pub fn bodies_in_aabb(&self, aabb: &Aabb) -> Vec<BodyHandle> {
        let mut hits = CollectHits::colliders_only();
        self.query_aabb(aabb, &mut hits);
        let mut bodies: Vec<BodyHandle> = hits
            .hits
            .iter()
            .filter_map(|hit| match *hit {
                HitTarget::Collider { body, .. } => Some(body),
                HitTarget::Particle { .. } => None,
            })
            .collect();
        bodies.sort();
        bodies.dedup();
        bodies
    }
}
