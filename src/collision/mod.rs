//! Collision-side modules: broad-phase grids, the query callback protocol and
//! particle-system queries.

pub mod broadphase;
pub mod particle_queries;
pub mod queries;

pub use broadphase::{LazyGrid, SpatialGrid};
pub use queries::{
    AllRayHits, ClosestRayHit, CollectHits, HitTarget, QueryCallback, QueryControl,
    RayCastCallback, RayCastControl, RayCastInput, RayHit,
};
