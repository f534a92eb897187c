//! Player state

use crate::core::entity::{ObjectId, PlayerId};
use crate::core::mana::ManaPool;
use crate::core::types::PlayerName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub name: PlayerName,
    pub life: i32,
    pub poison: u32,
    pub mana_pool: ManaPool,

    pub commander_id: Option<ObjectId>,
    /// Number of times the commander was cast from the command zone
    pub commander_tax: u32,
    /// Combat damage received from each commander
    pub commander_damage: BTreeMap<ObjectId, u32>,

    pub has_lost: bool,
    pub removed_from_game: bool,
    /// Set when a draw is attempted from an empty library; checked by SBA
    pub drew_from_empty_library: bool,

    pub lands_played_this_turn: u32,
    /// Land plays available this turn, recomputed with continuous effects
    pub land_plays_allowed: u32,
}

impl PlayerState {
    pub fn new(id: PlayerId, name: impl Into<PlayerName>, starting_life: i32) -> Self {
        PlayerState {
            id,
            name: name.into(),
            life: starting_life,
            poison: 0,
            mana_pool: ManaPool::new(),
            commander_id: None,
            commander_tax: 0,
            commander_damage: BTreeMap::new(),
            has_lost: false,
            removed_from_game: false,
            drew_from_empty_library: false,
            lands_played_this_turn: 0,
            land_plays_allowed: 1,
        }
    }

    /// Still taking part in the game
    pub fn is_active(&self) -> bool {
        !self.has_lost && !self.removed_from_game
    }

    pub fn gain_life(&mut self, amount: i32) {
        self.life += amount;
    }

    pub fn lose_life(&mut self, amount: i32) {
        self.life -= amount;
    }

    pub fn can_play_land(&self) -> bool {
        self.lands_played_this_turn < self.land_plays_allowed
    }

    pub fn commander_damage_from(&self, commander: ObjectId) -> u32 {
        self.commander_damage.get(&commander).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_creation() {
        let player = PlayerState::new(PlayerId::new(1), "Alice", 20);
        assert_eq!(player.name.as_str(), "Alice");
        assert_eq!(player.life, 20);
        assert!(player.is_active());
        assert!(player.can_play_land());
    }

    #[test]
    fn test_life_changes_do_not_decide_loss() {
        let mut player = PlayerState::new(PlayerId::new(1), "Bob", 3);
        player.lose_life(5);
        assert_eq!(player.life, -2);
        // Losing the game is a state-based action
        assert!(!player.has_lost);
    }
}
