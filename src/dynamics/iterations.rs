//! Particle sub-iteration heuristic.
//!
//! Explicit particle integration needs more passes per step as the
//! configuration gets stiffer: smaller particles, stronger gravity or a longer
//! timestep. The count is `ceil(sqrt(g / (threshold * r)) * dt)`, clamped into
//! `[1, max_iterations]`.

use serde::{Deserialize, Serialize};

use crate::config::{MAX_RECOMMENDED_PARTICLE_ITERATIONS, PARTICLE_RADIUS_THRESHOLD};

/// Tuning constants of the particle solver's stability model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IterationTuning {
    pub radius_threshold: f32,
    pub max_iterations: u32,
}

impl Default for IterationTuning {
    fn default() -> Self {
        Self {
            radius_threshold: PARTICLE_RADIUS_THRESHOLD,
            max_iterations: MAX_RECOMMENDED_PARTICLE_ITERATIONS,
        }
    }
}

impl IterationTuning {
    /// Recommended particle sub-iterations.
    ///
    /// `min_radius` is the smallest radius over every registered system, or
    /// `None` when no system is registered, in which case the answer is 1.
    pub fn recommend(&self, gravity_magnitude: f32, min_radius: Option<f32>, time_step: f32) -> u32 {
        let Some(radius) = min_radius else {
            return 1;
        };
        let max = self.max_iterations.max(1);

        let raw = ((gravity_magnitude.abs() / (self.radius_threshold * radius)).sqrt() * time_step).ceil();
        if raw.is_nan() {
            return 1;
        }
        // Saturating float-to-int cast keeps infinities in range.
        (raw as u32).clamp(1, max)
    }
}

/// [`IterationTuning::recommend`] with the default tuning.
pub fn recommend_particle_iterations(gravity_magnitude: f32, min_radius: Option<f32>, time_step: f32) -> u32 {
    IterationTuning::default().recommend(gravity_magnitude, min_radius, time_step)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn no_systems_means_one_iteration() {
        for gravity in [0.0, 9.81, 1.0e6, f32::INFINITY] {
            for dt in [0.0, DT, 1.0, 100.0] {
                assert_eq!(recommend_particle_iterations(gravity, None, dt), 1);
            }
        }
    }

    #[test]
    fn smaller_radius_never_needs_fewer_iterations() {
        let mut previous = 0;
        let mut radius = 2.0_f32;
        while radius > 1.0e-4 {
            let iterations = recommend_particle_iterations(10.0, Some(radius), DT);
            assert!(iterations >= previous, "radius {radius}: {iterations} < {previous}");
            previous = iterations;
            radius *= 0.8;
        }
        assert_eq!(previous, MAX_RECOMMENDED_PARTICLE_ITERATIONS);
    }

    #[test]
    fn known_values() {
        // sqrt(10 / (0.01 * 0.1)) / 60 = 100 / 60 -> 2
        assert_eq!(recommend_particle_iterations(10.0, Some(0.1), DT), 2);
        // sqrt(10 / (0.01 * 0.05)) / 60 ≈ 2.36 -> 3
        assert_eq!(recommend_particle_iterations(10.0, Some(0.05), DT), 3);
    }

    #[test]
    fn degenerate_inputs_stay_in_range() {
        assert_eq!(recommend_particle_iterations(0.0, Some(0.1), DT), 1);
        assert_eq!(recommend_particle_iterations(10.0, Some(0.0), DT), 8);
        assert_eq!(recommend_particle_iterations(0.0, Some(0.0), DT), 1);
        assert_eq!(recommend_particle_iterations(10.0, Some(0.1), -DT), 1);
    }

    #[test]
    fn custom_tuning_caps_iterations() {
        let tuning = IterationTuning {
            radius_threshold: 0.01,
            max_iterations: 3,
        };
        assert_eq!(tuning.recommend(1000.0, Some(0.001), 1.0), 3);
    }
}
