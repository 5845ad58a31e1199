//! Core types describing bodies, colliders, particle systems and shared math data.

pub mod collider;
pub mod particle;
pub mod rigidbody;
pub mod types;

pub use collider::{Collider, ColliderBuilder, ColliderHandle, ColliderShape, CollisionFilter};
pub use particle::{
    BodyImpulse, Particle, ParticleDef, ParticleSystem, ParticleSystemDef, ParticleSystemHandle,
};
pub use rigidbody::{BodyHandle, RigidBody};
pub use types::{Aabb, MassProperties, Transform, Velocity};
