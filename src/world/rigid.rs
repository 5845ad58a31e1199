//! Rigid-body side of the world: bodies, colliders, gravity, a collider
//! broad-phase and the native spatial queries.

use glam::Vec3;

use crate::{
    collision::{
        broadphase::LazyGrid,
        queries::{HitTarget, QueryCallback, QueryControl, RayCastCallback, RayCastInput, RayHit},
    },
    config::WorldSettings,
    core::{
        collider::{Collider, ColliderHandle, ColliderShape},
        particle::BodyImpulse,
        rigidbody::{BodyHandle, RigidBody},
        types::{Aabb, Transform},
    },
    dynamics::integrator::{BodySolver, Integrator},
    error::{PhysicsError, PhysicsResult},
    utils::allocator::Arena,
};

/// Bodies, colliders and the solver that moves them.
pub struct RigidWorld {
    bodies: Arena<RigidBody>,
    colliders: Arena<Collider>,
    gravity: Vec3,
    broadphase: LazyGrid<ColliderHandle>,
    solver: Box<dyn BodySolver>,
}

impl RigidWorld {
    pub fn new(settings: &WorldSettings) -> Self {
        Self {
            bodies: Arena::new(),
            colliders: Arena::new(),
            gravity: settings.gravity,
            broadphase: LazyGrid::new(settings.broadphase_cell_size),
            solver: Box::new(Integrator::new(settings.body_substeps)),
        }
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    pub fn set_body_solver<B>(&mut self, solver: B)
    where
        B: BodySolver + 'static,
    {
        self.solver = Box::new(solver);
    }

    pub fn body_solver_name(&self) -> &str {
        self.solver.name()
    }

    pub fn add_body(&mut self, body: RigidBody) -> BodyHandle {
        self.broadphase.mark_dirty();
        self.bodies.insert_with(|handle| RigidBody { handle, ..body })
    }

    /// Removes a body together with every collider attached to it.
    pub fn remove_body(&mut self, handle: BodyHandle) -> Option<RigidBody> {
        let body = self.bodies.remove(handle)?;
        let attached: Vec<ColliderHandle> = self
            .colliders
            .iter()
            .filter(|(_, collider)| collider.body == handle)
            .map(|(collider_handle, _)| collider_handle)
            .collect();
        for collider in attached {
            self.colliders.remove(collider);
        }
        self.broadphase.mark_dirty();
        Some(body)
    }

    pub fn add_collider(&mut self, collider: Collider) -> PhysicsResult<ColliderHandle> {
        if !self.bodies.contains(collider.body) {
            return Err(PhysicsError::UnknownBody(collider.body));
        }
        self.broadphase.mark_dirty();
        Ok(self
            .colliders
            .insert_with(|handle| Collider { handle, ..collider }))
    }

    pub fn remove_collider(&mut self, handle: ColliderHandle) -> Option<Collider> {
        let collider = self.colliders.remove(handle)?;
        self.broadphase.mark_dirty();
        Some(collider)
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    /// Mutable body access. The broad-phase is refreshed before the next query.
    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.broadphase.mark_dirty();
        self.bodies.get_mut(handle)
    }

    pub fn collider(&self, handle: ColliderHandle) -> Option<&Collider> {
        self.colliders.get(handle)
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &RigidBody)> + '_ {
        self.bodies.iter()
    }

    pub fn colliders(&self) -> impl Iterator<Item = (ColliderHandle, &Collider)> + '_ {
        self.colliders.iter()
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    /// Collider, owning body and the collider's world pose.
    pub fn collider_pose(&self, handle: ColliderHandle) -> Option<(&Collider, &RigidBody, Transform)> {
        let collider = self.colliders.get(handle)?;
        let body = self.bodies.get(collider.body)?;
        Some((collider, body, collider.world_transform(&body.transform)))
    }

    /// Broad-phase candidates whose world bounds overlap `aabb`.
    pub fn colliders_overlapping(&self, aabb: &Aabb) -> Vec<ColliderHandle> {
        let candidates = self
            .broadphase
            .read_with(|grid| {
                for (handle, collider) in self.colliders.iter() {
                    if let Some(body) = self.bodies.get(collider.body) {
                        grid.insert(handle, &collider.aabb(&body.transform));
                    }
                }
            })
            .query(aabb);

        candidates
            .into_iter()
            .filter(|&handle| {
                self.collider_pose(handle)
                    .map(|(collider, _, pose)| collider.shape.aabb(&pose).overlaps(aabb))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Copies every body's current pose into its previous-pose slot.
    pub fn snapshot_transforms(&mut self) {
        for body in self.bodies.values_mut() {
            body.previous_transform = body.transform;
        }
    }

    /// Applies reaction impulses gathered by particle systems. Unknown bodies are skipped.
    pub fn apply_impulses(&mut self, impulses: &[BodyImpulse]) {
        for reaction in impulses {
            if let Some(body) = self.bodies.get_mut(reaction.body) {
                body.apply_impulse(reaction.impulse, reaction.point);
            }
        }
    }

    /// Runs the body pipeline for one step: gravity, then the body solver.
    ///
    /// The collider broad-phase is invalidated only when a non-static body
    /// ended up away from its last snapshot.
    pub fn solve(&mut self, dt: f32) -> PhysicsResult<()> {
        for body in self.bodies.values_mut() {
            if body.is_dynamic() {
                body.acceleration += self.gravity * body.gravity_scale;
            }
        }
        let result = self.solver.solve(&mut self.bodies, dt);
        let moved = self
            .bodies
            .values()
            .any(|body| !body.is_static && body.transform != body.previous_transform);
        if moved {
            self.broadphase.mark_dirty();
        }
        result
    }

    /// Whether the collider broad-phase will be rebuilt by the next query.
    pub fn broadphase_is_stale(&self) -> bool {
        self.broadphase.is_dirty()
    }

    /// Reports colliders whose world bounds overlap `aabb`.
    pub fn query_aabb<C: QueryCallback + ?Sized>(&self, aabb: &Aabb, callback: &mut C) -> QueryControl {
        for handle in self.colliders_overlapping(aabb) {
            if self.report_collider(handle, callback) == QueryControl::Stop {
                return QueryControl::Stop;
            }
        }
        QueryControl::Continue
    }

    /// Reports colliders whose shape contains `point`.
    pub fn query_point<C: QueryCallback + ?Sized>(&self, point: Vec3, callback: &mut C) -> QueryControl {
        for handle in self.colliders_overlapping(&Aabb::from_point(point)) {
            let Some((collider, _, pose)) = self.collider_pose(handle) else {
                continue;
            };
            if !collider.shape.contains_point(&pose, point) {
                continue;
            }
            if self.report_collider(handle, callback) == QueryControl::Stop {
                return QueryControl::Stop;
            }
        }
        QueryControl::Continue
    }

    /// Reports colliders whose world bounds overlap the bounds of `shape` at `transform`.
    pub fn query_shape<C: QueryCallback + ?Sized>(
        &self,
        shape: &ColliderShape,
        transform: &Transform,
        callback: &mut C,
    ) -> QueryControl {
        self.query_aabb(&shape.aabb(transform), callback)
    }

    /// Casts `input` against every collider, honouring and updating its clip
    /// fraction. Returns `false` once the callback ended the cast.
    pub fn ray_cast<C: RayCastCallback + ?Sized>(&self, input: &mut RayCastInput, callback: &mut C) -> bool {
        if input.is_finished() {
            return false;
        }
        let bounds = Aabb::from_segment(input.p1, input.clipped_end());
        for handle in self.colliders_overlapping(&bounds) {
            let Some((collider, body, pose)) = self.collider_pose(handle) else {
                continue;
            };
            let Some((fraction, normal)) = collider.shape.ray_cast(&pose, input.p1, input.p2) else {
                continue;
            };
            let hit = RayHit {
                target: HitTarget::Collider {
                    collider: handle,
                    body: body.handle,
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

    fn report_collider<C: QueryCallback + ?Sized>(&self, handle: ColliderHandle, callback: &mut C) -> QueryControl {
        let Some(collider) = self.colliders.get(handle) else {
            return QueryControl::Continue;
        };
        callback.report(HitTarget::Collider {
            collider: handle,
            body: collider.body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::queries::{ClosestRayHit, CollectHits};

    fn world_with_spheres(positions: &[Vec3]) -> (RigidWorld, Vec<ColliderHandle>) {
        let mut world = RigidWorld::new(&WorldSettings::default());
        let handles = positions
            .iter()
            .map(|&position| {
                let body = world.add_body(RigidBody::fixed(position));
                world
                    .add_collider(Collider::builder().sphere(0.5).build(body))
                    .unwrap()
            })
            .collect();
        (world, handles)
    }

    #[test]
    fn removing_body_removes_its_colliders() {
        let (mut world, colliders) = world_with_spheres(&[Vec3::ZERO, Vec3::X * 3.0]);
        let body = world.collider(colliders[0]).unwrap().body;
        world.remove_body(body).unwrap();
        assert_eq!(world.collider_count(), 1);
        assert!(world.collider(colliders[0]).is_none());
    }

    #[test]
    fn collider_needs_live_body() {
        let mut world = RigidWorld::new(&WorldSettings::default());
        let body = world.add_body(RigidBody::dynamic(Vec3::ZERO));
        world.remove_body(body);
        let err = world
            .add_collider(Collider::builder().build(body))
            .unwrap_err();
        assert_eq!(err, PhysicsError::UnknownBody(body));
    }

    #[test]
    fn queries_follow_moved_bodies() {
        let (mut world, colliders) = world_with_spheres(&[Vec3::ZERO]);
        let body = world.collider(colliders[0]).unwrap().body;
        world.body_mut(body).unwrap().transform.position = Vec3::new(20.0, 0.0, 0.0);

        let mut hits = CollectHits::new();
        world.query_point(Vec3::ZERO, &mut hits);
        assert!(hits.hits.is_empty());
        world.query_point(Vec3::new(20.2, 0.0, 0.0), &mut hits);
        assert_eq!(hits.hits.len(), 1);
    }

    #[test]
    fn ray_cast_clips_to_nearest_collider() {
        let (world, colliders) =
            world_with_spheres(&[Vec3::new(0.0, 0.0, 8.0), Vec3::new(0.0, 0.0, 4.0)]);
        let mut input = RayCastInput::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 10.0));
        let mut closest = ClosestRayHit::default();
        world.ray_cast(&mut input, &mut closest);

        let hit = closest.hit.expect("ray should hit");
        assert_eq!(hit.target.collider(), Some(colliders[1]));
        assert!((hit.fraction - 0.35).abs() < 1e-5);
    }

    #[test]
    fn snapshot_copies_current_pose() {
        let mut world = RigidWorld::new(&WorldSettings::default());
        let body = world.add_body(RigidBody::dynamic(Vec3::ZERO));
        world.body_mut(body).unwrap().transform.position = Vec3::ONE;
        world.snapshot_transforms();
        assert_eq!(world.body(body).unwrap().previous_transform.position, Vec3::ONE);
    }

    #[test]
    fn static_scenery_keeps_broadphase_across_steps() {
        let mut world = RigidWorld::new(&WorldSettings::default());
        let ground = world.add_body(RigidBody::fixed(Vec3::ZERO));
        let collider = world
            .add_collider(
                Collider::builder()
                    .cuboid(Vec3::new(4000.0, 1.0, 4000.0))
                    .build(ground),
            )
            .unwrap();
        let region = Aabb::from_center_half_extents(Vec3::new(0.0, 1.0, 0.0), Vec3::splat(0.5));
        assert_eq!(world.colliders_overlapping(&region), vec![collider]);
        assert!(!world.broadphase_is_stale());

        for _ in 0..3 {
            world.snapshot_transforms();
            world.solve(1.0 / 60.0).unwrap();
            assert!(!world.broadphase_is_stale());
            assert_eq!(world.colliders_overlapping(&region), vec![collider]);
        }

        let ball = world.add_body(RigidBody::dynamic(Vec3::new(0.0, 5.0, 0.0)));
        world
            .add_collider(Collider::builder().sphere(0.5).build(ball))
            .unwrap();
        world.snapshot_transforms();
        world.solve(1.0 / 60.0).unwrap();
        assert!(world.broadphase_is_stale());
    }
}
