//! Error type shared by the world, registry and solvers.

use crate::{
    core::{collider::Collider, particle::ParticleSystem, rigidbody::RigidBody},
    utils::allocator::Handle,
};

/// Failures surfaced by world operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PhysicsError {
    #[error("world is locked: cannot {operation} while a step is in progress")]
    WorldLocked { operation: &'static str },

    #[error("unknown particle system {0}")]
    UnknownParticleSystem(Handle<ParticleSystem>),

    #[error("unknown rigid body {0}")]
    UnknownBody(Handle<RigidBody>),

    #[error("unknown collider {0}")]
    UnknownCollider(Handle<Collider>),

    #[error("invalid timestep {0}: must be finite and positive")]
    InvalidTimestep(f32),

    #[error("particle system is full ({max} particles)")]
    ParticleCapacity { max: usize },

    #[error("body solver `{solver}` failed: {message}")]
    Solver { solver: String, message: String },
}

pub type PhysicsResult<T> = Result<T, PhysicsError>;
