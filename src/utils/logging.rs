use log::{log_enabled, warn, Level};
use std::time::{Duration, Instant};

/// Scoped timer for the phases of a world step.
///
/// Traces start/end when the `trace` level is enabled and, when given an
/// output slot, accumulates the elapsed time into it on drop.
pub struct ScopedTimer<'a> {
    label: &'a str,
    start: Instant,
    output: Option<&'a mut Duration>,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(label: &'a str) -> Self {
        if log_enabled!(Level::Trace) {
            log::trace!("⏱️ start {label}");
        }
        Self {
            label,
            start: Instant::now(),
            output: None,
        }
    }

    pub fn recording(label: &'a str, output: &'a mut Duration) -> Self {
        let mut timer = Self::new(label);
        timer.output = Some(output);
        timer
    }
}

impl<'a> Drop for ScopedTimer<'a> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        if let Some(output) = self.output.as_deref_mut() {
            *output += elapsed;
        }
        if log_enabled!(Level::Trace) {
            log::trace!("⏱️ end {} ({} µs)", self.label, elapsed.as_micros());
        }
    }
}

/// Warns when a step exceeded its frame budget.
pub fn warn_if_frame_budget_exceeded(duration: Duration, budget_ms: f32) {
    if duration.as_secs_f32() * 1000.0 > budget_ms {
        warn!(
            "Step exceeded budget: {:.2} ms > {:.2} ms",
            duration.as_secs_f32() * 1000.0,
            budget_ms
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_timer_accumulates() {
        let mut total = Duration::ZERO;
        {
            let _timer = ScopedTimer::recording("test", &mut total);
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(total >= Duration::from_millis(1));
    }
}
