//! Tunable rules parameters

use serde::{Deserialize, Serialize};

/// How `change_control` effects interact with the reset-to-base step of the
/// layer system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ControlPolicy {
    /// Control changes are timestamped layer-2 effects re-applied after every
    /// reset, so they last exactly as long as the effect does.
    #[default]
    Layered,
    /// Control changes also overwrite the base controller, so they survive
    /// the removal of the effect that caused them.
    Sticky,
}

/// Game-wide rules parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub starting_life: i32,
    pub max_hand_size: usize,
    /// Land plays per turn before static effects add more
    pub land_plays_per_turn: u32,
    pub poison_limit: u32,
    pub commander_damage_limit: u32,
    /// Cap on fixed-point iterations of the layer system
    pub layer_iteration_limit: usize,
    /// Cap on repeated state-based action sweeps
    pub sba_iteration_limit: usize,
    /// The starting player skips the draw of turn 1
    pub skip_first_draw: bool,
    pub control_policy: ControlPolicy,
    pub rng_seed: u64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        RulesConfig {
            starting_life: 20,
            max_hand_size: 7,
            land_plays_per_turn: 1,
            poison_limit: 10,
            commander_damage_limit: 21,
            layer_iteration_limit: 5,
            sba_iteration_limit: 64,
            skip_first_draw: false,
            control_policy: ControlPolicy::Layered,
            rng_seed: 0,
        }
    }
}

impl RulesConfig {
    pub fn with_starting_life(mut self, life: i32) -> Self {
        self.starting_life = life;
        self
    }

    pub fn with_max_hand_size(mut self, size: usize) -> Self {
        self.max_hand_size = size;
        self
    }

    pub fn with_layer_iteration_limit(mut self, limit: usize) -> Self {
        self.layer_iteration_limit = limit.max(1);
        self
    }

    pub fn with_skip_first_draw(mut self, skip: bool) -> Self {
        self.skip_first_draw = skip;
        self
    }

    pub fn with_control_policy(mut self, policy: ControlPolicy) -> Self {
        self.control_policy = policy;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = seed;
        self
    }
}
