//! Time management for the game loop.

use std::time::{Duration, Instant};

/// Manages frame timing and delta time calculation.
#[derive(Debug)]
pub struct Time {
    /// Time when the engine started.
    start_time: Instant,
    /// Time of the last frame.
    last_frame: Instant,
    /// Unclamped duration of the last frame.
    raw_delta: Duration,
    /// Duration of the last frame after clamping to `max_delta`.
    delta: Duration,
    /// Upper bound applied to `delta` so a stalled frame can't explode the simulation.
    max_delta: Duration,
    /// Total elapsed time since start.
    elapsed: Duration,
    /// Frame count since start.
    frame_count: u64,
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

impl Time {
    /// Create a new time manager with a 100 ms frame delta cap.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start_time: now,
            last_frame: now,
            raw_delta: Duration::ZERO,
            delta: Duration::ZERO,
            max_delta: Duration::from_millis(100),
            elapsed: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Set the largest frame delta `delta_seconds` will ever report.
    pub fn set_max_delta(&mut self, seconds: f32) {
        self.max_delta = Duration::from_secs_f32(seconds.max(0.0));
    }

    /// Update timing at the start of a new frame.
    pub fn update(&mut self) {
        let now = Instant::now();
        self.raw_delta = now - self.last_frame;
        self.delta = self.raw_delta.min(self.max_delta);
        self.last_frame = now;
        self.elapsed = now - self.start_time;
        self.frame_count += 1;
    }

    /// Get the clamped delta time in seconds.
    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Get the clamped delta time as a Duration.
    pub fn delta(&self) -> Duration {
        self.delta
    }

    /// Real time since the previous frame, without the stall clamp.
    /// Deferred tasks run on this so their delays stay in wall-clock time.
    pub fn raw_delta_seconds(&self) -> f32 {
        self.raw_delta.as_secs_f32()
    }

    /// Get total elapsed time in seconds.
    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }

    /// Get the current frame count.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Get the current FPS (averaged over last frame).
    pub fn fps(&self) -> f32 {
        if self.raw_delta.as_secs_f32() > 0.0 {
            1.0 / self.raw_delta.as_secs_f32()
        } else {
            0.0
        }
    }
}

/// Fixed-step accumulator for the physics integrator.
///
/// Frame time is accumulated and drained in `step` sized slices, at most
/// `max_substeps` per frame. Whatever is left over once the substep budget is
/// spent is discarded down to a partial step, so a long stall never queues up a
/// backlog of physics work.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    step: f32,
    max_substeps: u32,
    accumulator: f32,
}

impl Default for FixedTimestep {
    fn default() -> Self {
        Self::new(1.0 / 60.0, 8)
    }
}

impl FixedTimestep {
    pub fn new(step: f32, max_substeps: u32) -> Self {
        Self {
            step: step.max(f32::EPSILON),
            max_substeps: max_substeps.max(1),
            accumulator: 0.0,
        }
    }

    /// Size of one physics step in seconds.
    pub fn step_seconds(&self) -> f32 {
        self.step
    }

    pub fn max_substeps(&self) -> u32 {
        self.max_substeps
    }

    /// Time accumulated but not yet consumed by a step.
    pub fn accumulated(&self) -> f32 {
        self.accumulator
    }

    /// Feed a frame delta and return how many fixed steps to run this frame.
    pub fn advance(&mut self, frame_delta: f32) -> u32 {
        if frame_delta.is_finite() && frame_delta > 0.0 {
            self.accumulator += frame_delta;
        }

        let mut steps = 0;
        while self.accumulator >= self.step && steps < self.max_substeps {
            self.accumulator -= self.step;
            steps += 1;
        }
        self.accumulator %= self.step;
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_step_runs_whole_steps_and_keeps_remainder() {
        let mut clock = FixedTimestep::new(0.01, 8);
        assert_eq!(clock.advance(0.025), 2);
        assert!((clock.accumulated() - 0.005).abs() < 1e-5);
        assert_eq!(clock.advance(0.005), 1);
    }

    #[test]
    fn fixed_step_caps_substeps_and_discards_backlog() {
        let mut clock = FixedTimestep::new(1.0 / 60.0, 8);
        assert_eq!(clock.advance(1.0), 8);
        assert!(clock.accumulated() < clock.step_seconds());
    }

    #[test]
    fn fixed_step_ignores_bad_deltas() {
        let mut clock = FixedTimestep::default();
        assert_eq!(clock.advance(f32::NAN), 0);
        assert_eq!(clock.advance(-1.0), 0);
        assert_eq!(clock.accumulated(), 0.0);
    }
}
