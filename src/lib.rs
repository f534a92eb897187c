//! MTG rules engine
//!
//! The runtime core of a Magic: The Gathering simulator: turn structure and
//! priority, the spell/ability stack, layered continuous effects,
//! state-based actions, combat, and mana payment. Card text is consumed as
//! already-parsed ability graphs.

pub mod abilities;
pub mod config;
pub mod core;
pub mod error;
pub mod game;
pub mod zones;

pub use config::{ControlPolicy, RulesConfig};
pub use error::{Result, RulesError};
