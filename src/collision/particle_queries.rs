//! Spatial queries answered by a single particle system's own broad-phase.

use glam::Vec3;

use crate::{
    collision::queries::{HitTarget, QueryCallback, QueryControl, RayCastCallback, RayCastInput, RayHit},
    core::{
        collider::ColliderShape,
        particle::ParticleSystem,
        types::{Aabb, Transform},
    },
    utils::math::segment_sphere,
};

impl ParticleSystem {
    fn report_particle<C: QueryCallback + ?Sized>(&self, callback: &mut C, index: usize) -> QueryControl {
        callback.report(HitTarget::Particle {
            system: self.handle,
            index,
        })
    }

    /// Reports every particle whose centre lies inside `aabb`.
    pub fn query_aabb<C: QueryCallback + ?Sized>(&self, aabb: &Aabb, callback: &mut C) -> QueryControl {
        let candidates = self.broadphase().query(aabb);
        for index in candidates {
            if !aabb.contains_point(self.particles[index].position) {
                continue;
            }
            if self.report_particle(callback, index) == QueryControl::Stop {
                return QueryControl::Stop;
            }
        }
        QueryControl::Continue
    }

    /// Reports every particle whose disc contains `point`.
    pub fn query_point<C: QueryCallback + ?Sized>(&self, point: Vec3, callback: &mut C) -> QueryControl {
        let radius = self.def.radius;
        let bounds = Aabb::from_point(point).expanded(radius);
        let candidates = self.broadphase().query(&bounds);
        for index in candidates {
            if self.particles[index].position.distance_squared(point) > radius * radius {
                continue;
            }
            if self.report_particle(callback, index) == QueryControl::Stop {
                return QueryControl::Stop;
            }
        }
        QueryControl::Continue
    }

    /// Reports every particle whose centre lies inside `shape` placed at `transform`.
    pub fn query_shape<C: QueryCallback + ?Sized>(
        &self,
        shape: &ColliderShape,
        transform: &Transform,
        callback: &mut C,
    ) -> QueryControl {
        let candidates = self.broadphase().query(&shape.aabb(transform));
        for index in candidates {
            if !shape.contains_point(transform, self.particles[index].position) {
                continue;
            }
            if self.report_particle(callback, index) == QueryControl::Stop {
                return QueryControl::Stop;
            }
        }
        QueryControl::Continue
    }

    /// Casts `input` against every particle disc, honouring and updating its
    /// clip fraction. Returns `false` once the callback ended the cast.
    pub fn ray_cast<C: RayCastCallback + ?Sized>(&self, input: &mut RayCastInput, callback: &mut C) -> bool {
        if input.is_finished() {
            return false;
        }
        let radius = self.def.radius;
        let bounds = Aabb::from_segment(input.p1, input.clipped_end()).expanded(radius);
        let candidates = self.broadphase().query(&bounds);

        for index in candidates {
            let center = self.particles[index].position;
            let Some((fraction, normal)) = segment_sphere(input.p1, input.p2, center, radius) else {
                continue;
            };
            let hit = RayHit {
                target: HitTarget::Particle {
                    system: self.handle,
                    index,
                },
                point: input.point_at(fraction),
                normal,
                fraction,
            };
            if !input.report(callback, hit) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collision::queries::{AllRayHits, CollectHits},
        core::particle::{ParticleDef, ParticleSystemDef, ParticleSystemHandle},
    };

    fn line_of_particles(count: usize, radius: f32) -> ParticleSystem {
        let mut system =
            ParticleSystem::new(ParticleSystemHandle::new(3, 1), ParticleSystemDef::with_radius(radius));
        for i in 0..count {
            system
                .create_particle(ParticleDef::at(Vec3::new(i as f32, 0.0, 0.0)))
                .unwrap();
        }
        system
    }

    #[test]
    fn aabb_query_reports_contained_centres() {
        let system = line_of_particles(6, 0.1);
        let mut hits = CollectHits::new();
        system.query_aabb(&Aabb::new(Vec3::new(1.5, -1.0, -1.0), Vec3::new(3.5, 1.0, 1.0)), &mut hits);
        let indices: Vec<usize> = hits.hits.iter().filter_map(|h| h.particle()).map(|(_, i)| i).collect();
        assert_eq!(indices, vec![2, 3]);
    }

    #[test]
    fn point_query_uses_particle_radius() {
        let system = line_of_particles(3, 0.25);
        let mut hits = CollectHits::new();
        system.query_point(Vec3::new(1.2, 0.0, 0.0), &mut hits);
        assert_eq!(hits.hits.len(), 1);
        hits.hits.clear();
        system.query_point(Vec3::new(1.5, 0.0, 0.0), &mut hits);
        assert!(hits.hits.is_empty());
    }

    #[test]
    fn stop_ends_particle_query() {
        let system = line_of_particles(5, 0.1);
        let mut seen = 0;
        let control = system.query_aabb(
            &Aabb::new(Vec3::splat(-10.0), Vec3::splat(10.0)),
            &mut |_: HitTarget| {
                seen += 1;
                QueryControl::Stop
            },
        );
        assert_eq!(control, QueryControl::Stop);
        assert_eq!(seen, 1);
    }

    #[test]
    fn ray_reports_particles_along_segment() {
        let system = line_of_particles(4, 0.2);
        let mut input = RayCastInput::new(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0));
        let mut all = AllRayHits::default();
        assert!(system.ray_cast(&mut input, &mut all));
        let hits = all.finish();
        assert_eq!(hits.len(), 4);
        assert_eq!(hits[0].target.particle(), Some((system.handle(), 0)));
        assert!(hits[0].normal.x < 0.0);
    }

    #[test]
    fn moved_particles_are_found_after_mutation() {
        let mut system = line_of_particles(2, 0.1);
        let mut hits = CollectHits::new();
        system.query_point(Vec3::new(5.0, 5.0, 5.0), &mut hits);
        assert!(hits.hits.is_empty());

        system.particles_mut()[1].position = Vec3::splat(5.0);
        system.query_point(Vec3::new(5.0, 5.0, 5.0), &mut hits);
        assert_eq!(hits.hits.len(), 1);
    }
}
