use std::time::Duration;

/// Timing and size data gathered for the most recent world step.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepProfile {
    pub particle_time: Duration,
    pub snapshot_time: Duration,
    pub body_time: Duration,
    pub total_time: Duration,

    pub particle_iterations: u32,
    pub particle_system_count: usize,
    pub particle_count: usize,
    pub body_count: usize,
    pub particle_contacts: usize,
}

impl StepProfile {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn report(&self) {
        let total_us = self.total_time.as_micros() as f32;
        if total_us < 1.0 {
            return;
        }

        log::info!(
            "step: {} bodies, {} particles in {} systems ({} iterations, {} contacts)",
            self.body_count,
            self.particle_count,
            self.particle_system_count,
            self.particle_iterations,
            self.particle_contacts
        );
        log::info!(
            "  total {:.2} ms | particles {:.1}% | snapshot {:.1}% | bodies {:.1}%",
            self.total_time.as_secs_f32() * 1000.0,
            (self.particle_time.as_micros() as f32 / total_us) * 100.0,
            (self.snapshot_time.as_micros() as f32 / total_us) * 100.0,
            (self.body_time.as_micros() as f32 / total_us) * 100.0
        );
    }
}
