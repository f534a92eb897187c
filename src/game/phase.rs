//! Turn phases, steps and turn state

use crate::core::PlayerId;
use crate::game::combat::CombatState;
use crate::game::priority::PriorityManager;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Beginning,
    PreCombatMain,
    Combat,
    PostCombatMain,
    Ending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Step {
    // Beginning Phase
    Untap,
    Upkeep,
    Draw,

    // Pre-Combat Main Phase
    Main1,

    // Combat Phase
    BeginCombat,
    DeclareAttackers,
    DeclareBlockers,
    CombatDamage,
    EndCombat,

    // Post-Combat Main Phase
    Main2,

    // Ending Phase
    End,
    Cleanup,
}

impl Step {
    pub fn phase(&self) -> Phase {
        match self {
            Step::Untap | Step::Upkeep | Step::Draw => Phase::Beginning,
            Step::Main1 => Phase::PreCombatMain,
            Step::BeginCombat
            | Step::DeclareAttackers
            | Step::DeclareBlockers
            | Step::CombatDamage
            | Step::EndCombat => Phase::Combat,
            Step::Main2 => Phase::PostCombatMain,
            Step::End | Step::Cleanup => Phase::Ending,
        }
    }

    /// Next step in turn order, `None` after cleanup
    pub fn next(&self) -> Option<Step> {
        match self {
            Step::Untap => Some(Step::Upkeep),
            Step::Upkeep => Some(Step::Draw),
            Step::Draw => Some(Step::Main1),
            Step::Main1 => Some(Step::BeginCombat),
            Step::BeginCombat => Some(Step::DeclareAttackers),
            Step::DeclareAttackers => Some(Step::DeclareBlockers),
            Step::DeclareBlockers => Some(Step::CombatDamage),
            Step::CombatDamage => Some(Step::EndCombat),
            Step::EndCombat => Some(Step::Main2),
            Step::Main2 => Some(Step::End),
            Step::End => Some(Step::Cleanup),
            Step::Cleanup => None,
        }
    }

    pub fn is_main(&self) -> bool {
        matches!(self, Step::Main1 | Step::Main2)
    }

    /// Untap never grants priority; cleanup only when triggers arose
    pub fn grants_priority(&self) -> bool {
        !matches!(self, Step::Untap | Step::Cleanup)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Untap => "untap",
            Step::Upkeep => "upkeep",
            Step::Draw => "draw",
            Step::Main1 => "precombat main",
            Step::BeginCombat => "beginning of combat",
            Step::DeclareAttackers => "declare attackers",
            Step::DeclareBlockers => "declare blockers",
            Step::CombatDamage => "combat damage",
            Step::EndCombat => "end of combat",
            Step::Main2 => "postcombat main",
            Step::End => "end",
            Step::Cleanup => "cleanup",
        };
        write!(f, "{name}")
    }
}

/// Whose turn it is, where in the turn we are, and who may act
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnState {
    /// Starts at 1
    pub turn_number: u32,
    pub step: Step,
    pub active_player: PlayerId,
    /// Index into `GameState::players`
    pub active_player_idx: usize,
    pub priority: PriorityManager,
    pub combat: Option<CombatState>,
    pub started: bool,
}

impl TurnState {
    pub fn new(players: Vec<PlayerId>) -> Self {
        let active_player = players.first().copied().unwrap_or(PlayerId::new(0));
        TurnState {
            turn_number: 1,
            step: Step::Untap,
            active_player,
            active_player_idx: 0,
            priority: PriorityManager::new(players),
            combat: None,
            started: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.step.phase()
    }

    pub fn priority_player(&self) -> Option<PlayerId> {
        self.priority.current()
    }
}
