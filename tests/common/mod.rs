//! Shared setup for the integration tests

#![allow(dead_code)]

use mtg_rules_engine::abilities::AbilityGraph;
use mtg_rules_engine::core::{CardDefinition, ObjectId, PlayerId};
use mtg_rules_engine::game::{GameState, PriorityOutcome, Step};
use mtg_rules_engine::zones::Zone;
use mtg_rules_engine::RulesConfig;
use std::collections::BTreeMap;

/// A two-player game with a stocked library for each player, not yet started
pub fn two_player_game(config: RulesConfig) -> (GameState, PlayerId, PlayerId) {
    let mut game = GameState::new_two_player("Alice", "Bob", config);
    game.logger.enable_capture();
    let (alice, bob) = (game.players[0].id, game.players[1].id);
    for owner in [alice, bob] {
        for name in ["Island", "Forest", "Mountain", "Plains", "Swamp"].iter().cycle().take(15) {
            game.create_object(&CardDefinition::basic_land(name), owner, Zone::Library)
                .unwrap();
        }
    }
    (game, alice, bob)
}

pub fn creature(game: &mut GameState, owner: PlayerId, name: &str, power: i32, toughness: i32) -> ObjectId {
    game.create_object(
        &CardDefinition::creature(name, "{1}", power, toughness),
        owner,
        Zone::Battlefield,
    )
    .unwrap()
}

pub fn graph(json: &str) -> AbilityGraph {
    AbilityGraph::from_json(json).unwrap()
}

/// Pass priority until the game reaches `step` on `turn`, declaring no
/// attackers or blockers along the way
pub fn advance_to(game: &mut GameState, turn: u32, step: Step) {
    while game.turn.turn_number < turn || game.turn.step != step {
        assert!(!game.is_game_over(), "game ended before turn {turn} {step}");
        declare_nothing_if_needed(game);
        let player = game.turn.priority_player().unwrap();
        game.pass_priority(player).unwrap();
    }
}

/// Declarations the current step is waiting on, made empty
pub fn declare_nothing_if_needed(game: &mut GameState) {
    let Some(combat) = game.turn.combat.clone() else {
        return;
    };
    match game.turn.step {
        Step::DeclareAttackers if !combat.attackers_declared => {
            let active = game.turn.active_player;
            game.declare_attackers(active, &[], None, None).unwrap();
        }
        Step::DeclareBlockers if !combat.blockers_declared => {
            game.declare_blockers(combat.defending_player, &BTreeMap::new())
                .unwrap();
        }
        _ => {}
    }
}

/// Every player passes in turn until something other than a plain pass
/// happens
pub fn pass_round(game: &mut GameState) -> PriorityOutcome {
    loop {
        let player = game.turn.priority_player().unwrap();
        let outcome = game.pass_priority(player).unwrap();
        if !matches!(outcome, PriorityOutcome::Passed { .. }) {
            return outcome;
        }
    }
}
