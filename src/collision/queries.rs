//! Callback protocol shared by every spatial query.
//!
//! Colliders and particles are reported through the same callback and told
//! apart by [`HitTarget`]. Region queries stop on [`QueryControl::Stop`]; ray
//! casts steer the search with [`RayCastControl`].

use glam::Vec3;

use crate::core::{
    collider::ColliderHandle,
    particle::{ParticleSystem, ParticleSystemHandle},
    rigidbody::BodyHandle,
};

/// What a query hit: a collider, or a particle inside a particle system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HitTarget {
    Collider {
        collider: ColliderHandle,
        body: BodyHandle,
    },
    Particle {
        system: ParticleSystemHandle,
        index: usize,
    },
}

impl HitTarget {
    pub fn is_particle(&self) -> bool {
        matches!(self, HitTarget::Particle { .. })
    }

    pub fn collider(&self) -> Option<ColliderHandle> {
        match self {
            HitTarget::Collider { collider, .. } => Some(*collider),
            HitTarget::Particle { .. } => None,
        }
    }

    pub fn particle(&self) -> Option<(ParticleSystemHandle, usize)> {
        match self {
            HitTarget::Particle { system, index } => Some((*system, *index)),
            HitTarget::Collider { .. } => None,
        }
    }
}

/// Returned by region/point/shape callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryControl {
    Continue,
    /// Ends the whole query, including systems not yet visited.
    Stop,
}

/// A single ray-cast intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub target: HitTarget,
    pub point: Vec3,
    pub normal: Vec3,
    /// Position along the segment, `0` at the start and `1` at the end.
    pub fraction: f32,
}

/// Returned by ray-cast callbacks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RayCastControl {
    /// Terminate the ray cast.
    Stop,
    /// Shorten the ray to this fraction and keep searching.
    Clip(f32),
    /// Ignore this hit and keep searching with the ray unchanged.
    Continue,
}

/// Receives region, point and shape query results.
pub trait QueryCallback {
    fn report(&mut self, hit: HitTarget) -> QueryControl;

    /// Whether `system` should be searched at all for this query.
    fn should_query_particle_system(&mut self, _system: &ParticleSystem) -> bool {
        true
    }
}

impl<F> QueryCallback for F
where
    F: FnMut(HitTarget) -> QueryControl,
{
    fn report(&mut self, hit: HitTarget) -> QueryControl {
        self(hit)
    }
}

/// Receives ray-cast intersections.
pub trait RayCastCallback {
    fn report(&mut self, hit: &RayHit) -> RayCastControl;

    /// Whether `system` should be searched at all for this ray.
    fn should_query_particle_system(&mut self, _system: &ParticleSystem) -> bool {
        true
    }
}

impl<F> RayCastCallback for F
where
    F: FnMut(&RayHit) -> RayCastControl,
{
    fn report(&mut self, hit: &RayHit) -> RayCastControl {
        self(hit)
    }
}

/// Segment cast state carried across colliders and every particle system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCastInput {
    pub p1: Vec3,
    pub p2: Vec3,
    pub max_fraction: f32,
}

impl RayCastInput {
    pub fn new(p1: Vec3, p2: Vec3) -> Self {
        Self {
            p1,
            p2,
            max_fraction: 1.0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.max_fraction <= 0.0
    }

    pub fn point_at(&self, fraction: f32) -> Vec3 {
        self.p1 + (self.p2 - self.p1) * fraction
    }

    /// End point of the segment after clipping.
    pub fn clipped_end(&self) -> Vec3 {
        self.point_at(self.max_fraction)
    }

    /// Hands `hit` to the callback if it is not beyond the current clip and
    /// applies the callback's decision. Returns `false` once the cast is over.
    pub fn report<C: RayCastCallback + ?Sized>(&mut self, callback: &mut C, hit: RayHit) -> bool {
        if hit.fraction > self.max_fraction {
            return true;
        }
        match callback.report(&hit) {
            RayCastControl::Stop => self.max_fraction = 0.0,
            RayCastControl::Clip(fraction) => {
                self.max_fraction = fraction.max(0.0).min(self.max_fraction);
            }
            RayCastControl::Continue => {}
        }
        !self.is_finished()
    }
}

/// Collects every hit of a region query.
#[derive(Debug, Default)]
pub struct CollectHits {
    pub hits: Vec<HitTarget>,
    pub include_particles: bool,
}

impl CollectHits {
    pub fn new() -> Self {
        Self {
            hits: Vec::new(),
            include_particles: true,
        }
    }

    pub fn colliders_only() -> Self {
        Self {
            hits: Vec::new(),
            include_particles: false,
        }
    }
}

impl QueryCallback for CollectHits {
    fn report(&mut self, hit: HitTarget) -> QueryControl {
        self.hits.push(hit);
        QueryControl::Continue
    }

    fn should_query_particle_system(&mut self, _system: &ParticleSystem) -> bool {
        self.include_particles
    }
}

/// Keeps the nearest ray hit by clipping the ray to every hit it sees.
#[derive(Debug, Default)]
pub struct ClosestRayHit {
    pub hit: Option<RayHit>,
}

impl RayCastCallback for ClosestRayHit {
    fn report(&mut self, hit: &RayHit) -> RayCastControl {
        self.hit = Some(*hit);
        RayCastControl::Clip(hit.fraction)
    }
}

/// Collects all ray hits unclipped, sorted nearest-first on [`finish`](Self::finish).
#[derive(Debug, Default)]
pub struct AllRayHits {
    pub hits: Vec<RayHit>,
}

impl AllRayHits {
    pub fn finish(mut self) -> Vec<RayHit> {
        self.hits.sort_by(|a, b| a.fraction.total_cmp(&b.fraction));
        self.hits
    }
}

impl RayCastCallback for AllRayHits {
    fn report(&mut self, hit: &RayHit) -> RayCastControl {
        self.hits.push(*hit);
        RayCastControl::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particle_hit(fraction: f32) -> RayHit {
        RayHit {
            target: HitTarget::Particle {
                system: ParticleSystemHandle::new(0, 0),
                index: 0,
            },
            point: Vec3::ZERO,
            normal: Vec3::Y,
            fraction,
        }
    }

    #[test]
    fn clip_never_extends_the_ray() {
        let mut input = RayCastInput::new(Vec3::ZERO, Vec3::X);
        let mut clip_to = |hit: &RayHit| RayCastControl::Clip(hit.fraction + 0.5);
        assert!(input.report(&mut clip_to, particle_hit(0.25)));
        assert_eq!(input.max_fraction, 0.75);
        assert!(input.report(&mut clip_to, particle_hit(0.5)));
        assert_eq!(input.max_fraction, 0.75);
    }

    #[test]
    fn hits_beyond_clip_are_not_reported() {
        let mut input = RayCastInput::new(Vec3::ZERO, Vec3::X);
        input.max_fraction = 0.5;
        let mut calls = 0;
        let mut count = |_: &RayHit| {
            calls += 1;
            RayCastControl::Continue
        };
        assert!(input.report(&mut count, particle_hit(0.6)));
        assert_eq!(calls, 0);
    }

    #[test]
    fn stop_finishes_the_cast() {
        let mut input = RayCastInput::new(Vec3::ZERO, Vec3::X);
        let mut stop = |_: &RayHit| RayCastControl::Stop;
        assert!(!input.report(&mut stop, particle_hit(0.9)));
        assert!(input.is_finished());
    }
}
