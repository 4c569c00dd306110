//! Fixed timestep clock.
//!
//! Host frames arrive with arbitrary deltas. [`FixedStepClock`] accumulates
//! them and reports how many fixed ticks to run, plus the interpolation
//! fraction left over for rendering.
//!
//! ```text
//! frame_dt ──clamp(max_frame_dt)──► accumulator
//!   while accumulator >= fixed_dt && ticks < max_steps: tick(); accumulator -= fixed_dt
//!   if still >= fixed_dt: accumulator %= fixed_dt      (stall catch-up folded)
//!   alpha = accumulator / fixed_dt                     in [0, 1)
//! ```

use crate::config::{clamp_tick_hz, SimConfig};
use bevy_ecs::prelude::*;

/// Largest `f32` strictly below 1.
const ALPHA_MAX: f32 = 1.0 - f32::EPSILON / 2.0;

/// Simulation time as seen by systems. Advanced once per tick.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SimTime {
    /// Ticks completed so far (wraps).
    pub tick: u32,
    /// Length of the current tick in seconds.
    pub fixed_dt: f64,
    /// Simulated seconds elapsed.
    pub elapsed: f64,
}

impl SimTime {
    pub fn new(fixed_dt: f64) -> Self {
        Self {
            tick: 0,
            fixed_dt,
            elapsed: 0.0,
        }
    }

    pub fn advance(&mut self) {
        self.tick = self.tick.wrapping_add(1);
        self.elapsed += self.fixed_dt;
    }

    pub fn elapsed_ms(&self) -> u64 {
        (self.elapsed * 1000.0) as u64
    }
}

/// Outcome of one [`FixedStepClock::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub ticks: u32,
    pub alpha: f32,
}

#[derive(Debug, Clone)]
pub struct FixedStepClock {
    accumulator: f64,
    fixed_dt: f64,
    max_frame_dt: f64,
    max_steps: u32,
}

impl FixedStepClock {
    pub fn new(tick_hz: f64, max_frame_dt: f64, max_steps: u32) -> Self {
        Self {
            accumulator: 0.0,
            fixed_dt: 1.0 / clamp_tick_hz(tick_hz),
            max_frame_dt: max_frame_dt.max(0.0),
            max_steps: max_steps.max(1),
        }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(config.tick_hz, config.max_frame_dt, config.max_steps_per_frame)
    }

    /// Accumulate `frame_dt` seconds and run `tick` once per elapsed interval.
    pub fn advance<F: FnMut()>(&mut self, frame_dt: f64, mut tick: F) -> StepReport {
        let frame_dt = if frame_dt.is_finite() {
            frame_dt.clamp(0.0, self.max_frame_dt)
        } else {
            0.0
        };
        self.accumulator += frame_dt;

        let mut ticks = 0;
        while self.accumulator >= self.fixed_dt && ticks < self.max_steps {
            tick();
            self.accumulator -= self.fixed_dt;
            ticks += 1;
        }

        if self.accumulator >= self.fixed_dt {
            tracing::debug!(
                ticks,
                backlog = self.accumulator / self.fixed_dt,
                "tick cap reached, folding accumulator"
            );
            self.accumulator %= self.fixed_dt;
        }

        StepReport {
            ticks,
            alpha: self.alpha(),
        }
    }

    /// Leftover fraction of a tick, in `[0, 1)`.
    pub fn alpha(&self) -> f32 {
        ((self.accumulator / self.fixed_dt) as f32).clamp(0.0, ALPHA_MAX)
    }

    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    pub fn fixed_dt(&self) -> f64 {
        self.fixed_dt
    }

    /// Change the tick rate; `hz` is clamped to `[1, 480]`.
    pub fn set_tick_hz(&mut self, hz: f64) {
        self.fixed_dt = 1.0 / clamp_tick_hz(hz);
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}
