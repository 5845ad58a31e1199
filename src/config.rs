//! Global configuration constants and world settings.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::dynamics::iterations::IterationTuning;

/// Default gravity vector applied in the physics world (Y-up).
pub const DEFAULT_GRAVITY: [f32; 3] = [0.0, -9.81, 0.0];

/// Default integration timestep (in seconds).
pub const DEFAULT_TIME_STEP: f32 = 1.0 / 60.0;

/// Integrator substeps per rigid-body solve.
pub const DEFAULT_BODY_SUBSTEPS: u32 = 1;

/// Default damping applied to linear velocity.
pub const DEFAULT_LINEAR_DAMPING: f32 = 0.02;

/// Default damping applied to angular velocity.
pub const DEFAULT_ANGULAR_DAMPING: f32 = 0.02;

/// Default cell size for the rigid-body broad-phase uniform grid.
pub const DEFAULT_BROADPHASE_CELL_SIZE: f32 = 5.0;

/// Default particle radius.
pub const DEFAULT_PARTICLE_RADIUS: f32 = 1.0;

/// Default particle density (mass per unit volume).
pub const DEFAULT_PARTICLE_DENSITY: f32 = 1.0;

/// Default stiffness of the particle overlap relaxation.
pub const DEFAULT_PRESSURE_STRENGTH: f32 = 0.05;

/// Smallest radius for which the iteration heuristic stays meaningful.
pub const PARTICLE_RADIUS_THRESHOLD: f32 = 0.01;

/// Upper bound on recommended particle iterations; more is possible but costly.
pub const MAX_RECOMMENDED_PARTICLE_ITERATIONS: u32 = 8;

/// Frame budget used when warning about slow steps.
pub const DEFAULT_FRAME_BUDGET_MS: f32 = 16.0;

/// How many particle sub-iterations a step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParticleIterations {
    /// Use the iteration heuristic for the current gravity, radii and timestep.
    #[default]
    Auto,
    /// Always run exactly this many (clamped to at least one).
    Fixed(u32),
}

/// Construction-time settings for a [`ParticleWorld`](crate::world::ParticleWorld).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    pub gravity: Vec3,
    pub broadphase_cell_size: f32,
    pub body_substeps: u32,
    pub particle_iterations: ParticleIterations,
    pub iteration_tuning: IterationTuning,
    pub frame_budget_ms: f32,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            gravity: Vec3::from_slice(&DEFAULT_GRAVITY),
            broadphase_cell_size: DEFAULT_BROADPHASE_CELL_SIZE,
            body_substeps: DEFAULT_BODY_SUBSTEPS,
            particle_iterations: ParticleIterations::default(),
            iteration_tuning: IterationTuning::default(),
            frame_budget_ms: DEFAULT_FRAME_BUDGET_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_settings_fill_in_defaults() {
        let settings: WorldSettings = serde_json::from_str(
            r#"{ "gravity": [0.0, -10.0, 0.0], "particle_iterations": { "fixed": 3 } }"#,
        )
        .expect("settings should parse");

        assert_eq!(settings.gravity, Vec3::new(0.0, -10.0, 0.0));
        assert_eq!(settings.particle_iterations, ParticleIterations::Fixed(3));
        assert_eq!(settings.broadphase_cell_size, DEFAULT_BROADPHASE_CELL_SIZE);
        assert_eq!(
            settings.iteration_tuning.max_iterations,
            MAX_RECOMMENDED_PARTICLE_ITERATIONS
        );
    }
}
