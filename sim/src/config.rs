//! Simulation configuration.

use crate::error::ConfigError;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Lowest accepted tick rate in Hz.
pub const MIN_TICK_HZ: f64 = 1.0;
/// Highest accepted tick rate in Hz.
pub const MAX_TICK_HZ: f64 = 480.0;

/// Configuration for the simulation core.
///
/// Out-of-range values are clamped by [`SimConfig::sanitized`], never rejected.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed simulation rate in Hz, clamped to `[1, 480]`.
    pub tick_hz: f64,
    /// Largest frame delta accepted per `advance` call, in seconds.
    pub max_frame_dt: f64,
    /// Hard cap on ticks executed by a single `advance` call.
    pub max_steps_per_frame: u32,
    /// Hot Z layers used for observers without an override.
    pub hot_z_layers: i32,
    /// Warm Z layers used for observers without an override.
    pub warm_z_layers: i32,
    /// Upper bound on a derived per-axis chunk radius.
    pub max_chunk_radius: i32,
    /// World units per tile, used to scale grid positions in snapshots.
    pub tile_world_size: f32,
    /// Start with auto-advance suppressed.
    pub start_paused: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_hz: 60.0,
            max_frame_dt: 0.25,
            max_steps_per_frame: 8,
            hot_z_layers: 0,
            warm_z_layers: 1,
            max_chunk_radius: 8,
            tile_world_size: 1.0,
            start_paused: false,
        }
    }
}

impl SimConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    /// Serialize the config to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Clamp every field into its valid range.
    pub fn sanitized(mut self) -> Self {
        self.tick_hz = clamp_tick_hz(self.tick_hz);
        if !self.max_frame_dt.is_finite() || self.max_frame_dt <= 0.0 {
            self.max_frame_dt = Self::default().max_frame_dt;
        }
        self.max_steps_per_frame = self.max_steps_per_frame.max(1);
        self.hot_z_layers = self.hot_z_layers.max(0);
        self.warm_z_layers = self.warm_z_layers.max(0);
        self.max_chunk_radius = self.max_chunk_radius.max(0);
        if !self.tile_world_size.is_finite() || self.tile_world_size <= 0.0 {
            self.tile_world_size = 1.0;
        }
        self
    }

    /// Fixed interval in seconds for the configured rate.
    pub fn fixed_dt(&self) -> f64 {
        1.0 / clamp_tick_hz(self.tick_hz)
    }
}

/// Clamp a tick rate into `[MIN_TICK_HZ, MAX_TICK_HZ]`. NaN maps to the minimum.
pub fn clamp_tick_hz(hz: f64) -> f64 {
    if hz.is_nan() {
        return MIN_TICK_HZ;
    }
    hz.clamp(MIN_TICK_HZ, MAX_TICK_HZ)
}
