//! Simulation dynamics: rigid-body integration, the particle solver and the
//! particle iteration heuristic.

pub mod integrator;
pub mod iterations;
pub mod particle_solver;

pub use integrator::{BodySolver, Integrator};
pub use iterations::{recommend_particle_iterations, IterationTuning};
