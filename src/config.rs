use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// World-wide knobs for the tick system.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbilitySystemConfig {
    /// Multiplies the frame delta handed to every hub.
    pub time_scale: f32,
    /// Skips hub ticks entirely while set. Activations and effect applications still work.
    pub paused: bool,
}

impl Default for AbilitySystemConfig {
    fn default() -> Self {
        Self { time_scale: 1.0, paused: false }
    }
}

impl AbilitySystemConfig {
    /// The delta a hub should be ticked with for a frame of `delta_secs`.
    pub fn scaled_delta(&self, delta_secs: f32) -> f32 {
        if self.paused {
            0.0
        } else {
            (delta_secs * self.time_scale).max(0.0)
        }
    }
}

/// Per-hub limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubSettings {
    /// Upper bound on executions of one periodic effect within a single tick. Any
    /// backlog past it is dropped.
    pub max_periodic_executions_per_tick: u32,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self { max_periodic_executions_per_tick: 32 }
    }
}
