use std::time::Duration;

/// Ticks allowed per frame before the accumulator drops the backlog.
pub const MAX_TICKS_PER_FRAME: u32 = 5;

/// Turns variable frame times into a whole number of fixed simulation ticks.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    step: Duration,
    accumulator: Duration,
}

impl FixedTimestep {
    /// A non-positive `step_secs` falls back to 0.02 s.
    pub fn new(step_secs: f32) -> Self {
        let step_secs = if step_secs.is_finite() && step_secs > 0.0 { step_secs } else { 0.02 };
        Self {
            step: Duration::from_secs_f32(step_secs),
            accumulator: Duration::ZERO,
        }
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    /// Adds `dt` and returns how many ticks are due. At most [`MAX_TICKS_PER_FRAME`] are
    /// returned, the rest of a long stall is discarded.
    pub fn advance(&mut self, dt: Duration) -> u32 {
        self.accumulator += dt;
        let mut ticks = 0;
        while self.accumulator >= self.step {
            self.accumulator -= self.step;
            ticks += 1;
            if ticks == MAX_TICKS_PER_FRAME && self.accumulator >= self.step {
                log::debug!("Dropping {:?} of simulation backlog", self.accumulator);
                self.accumulator = Duration::ZERO;
            }
        }
        ticks
    }

    pub fn reset(&mut self) {
        self.accumulator = Duration::ZERO;
    }
}
