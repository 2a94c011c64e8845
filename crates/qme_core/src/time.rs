//! Engine clock and fixed-step pacing.
//!
//! The simulation never reads wall-clock time on its own: every tick is
//! handed a [`Clock`] and reads it once. [`SimClock`] is the deterministic
//! implementation advanced by the tick driver (and by tests).
//! [`TickTimer`] converts real elapsed time into a number of fixed steps
//! when the runner is paced in real time.

use std::time::Instant;

/// Milliseconds since the start of the simulation.
pub type Timestamp = u64;

pub trait Clock {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimClock {
    now: Timestamp,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(now: Timestamp) -> Self {
        Self { now }
    }

    pub fn advance(&mut self, ms: u64) {
        self.now += ms;
    }
}

impl Clock for SimClock {
    fn now(&self) -> Timestamp {
        self.now
    }
}

pub struct TickTimer {
    pub fixed_dt: f64,
    pub max_accumulator: f64,
    accumulator: f64,
    pub fixed_step_count: u64,
    pub frame_count: u64,
    pub steps_this_frame: u32,
    pub real_dt: f64,
    last_instant: Instant,
}

impl TickTimer {
    pub fn new(tick_ms: u64) -> Self {
        Self {
            fixed_dt: tick_ms as f64 / 1000.0,
            max_accumulator: 0.25,
            accumulator: 0.0,
            fixed_step_count: 0,
            frame_count: 0,
            steps_this_frame: 0,
            real_dt: 0.0,
            last_instant: Instant::now(),
        }
    }

    pub fn begin_frame(&mut self) {
        let now = Instant::now();
        let real_dt = now.duration_since(self.last_instant).as_secs_f64();
        self.last_instant = now;
        self.feed(real_dt);
    }

    /// Adds `real_dt` seconds to the accumulator.
    pub fn feed(&mut self, real_dt: f64) {
        self.real_dt = real_dt;

        // Spiral-of-death cap
        if self.real_dt > self.max_accumulator {
            log::warn!(
                "Frame took {:.1}ms, capping accumulator to {}ms",
                self.real_dt * 1000.0,
                self.max_accumulator * 1000.0
            );
            self.real_dt = self.max_accumulator;
        }

        self.accumulator += self.real_dt;
        self.steps_this_frame = 0;
        self.frame_count += 1;
    }

    pub fn should_step(&mut self) -> bool {
        if self.accumulator >= self.fixed_dt {
            self.accumulator -= self.fixed_dt;
            self.fixed_step_count += 1;
            self.steps_this_frame += 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_clock_only_moves_when_advanced() {
        let mut clock = SimClock::starting_at(100);
        assert_eq!(clock.now(), 100);
        assert_eq!(clock.now(), 100);
        clock.advance(16);
        assert_eq!(clock.now(), 116);
    }

    #[test]
    fn tick_timer_consumes_whole_steps() {
        let mut timer = TickTimer::new(10);
        timer.feed(0.035);
        let mut steps = 0;
        while timer.should_step() {
            steps += 1;
        }
        assert_eq!(steps, 3);
        assert_eq!(timer.fixed_step_count, 3);
    }

    #[test]
    fn tick_timer_caps_long_frames() {
        let mut timer = TickTimer::new(10);
        timer.feed(5.0);
        assert!((timer.real_dt - timer.max_accumulator).abs() < 1e-9);
        let mut steps = 0;
        while timer.should_step() {
            steps += 1;
        }
        // 0.25s of 10ms steps, give or take float rounding on the last one.
        assert!((24..=25).contains(&steps), "unexpected step count {steps}");
    }
}
