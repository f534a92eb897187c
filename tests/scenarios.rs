//! Whole-turn scenarios driven through the public rules API
//!
//! Each test starts a real game and reaches its situation by passing
//! priority and declaring, the way a client would.

mod common;

use common::{advance_to, creature, declare_nothing_if_needed, graph, pass_round, two_player_game};
use mtg_rules_engine::abilities::{ResolveContext, TargetRef};
use mtg_rules_engine::core::{CardDefinition, CardType, Keyword};
use mtg_rules_engine::game::{
    CastOptions, CombatDamagePass, DamageAssignments, EventKind, GameState, PriorityOutcome, Step,
};
use mtg_rules_engine::zones::Zone;
use mtg_rules_engine::{RulesConfig, RulesError};
use similar_asserts::assert_eq;
use std::collections::BTreeMap;

fn life(game: &GameState) -> (i32, i32) {
    (game.players[0].life, game.players[1].life)
}

#[test]
fn test_blocked_attacker_trades_damage() {
    let (mut game, alice, bob) = two_player_game(RulesConfig::default());
    let ogre = creature(&mut game, alice, "Ogre", 3, 3);
    let bear = creature(&mut game, bob, "Bear", 2, 2);
    game.start_game().unwrap();

    advance_to(&mut game, 1, Step::DeclareAttackers);
    game.declare_attackers(alice, &[ogre], None, None).unwrap();
    assert!(game.object(ogre).unwrap().is_tapped());
    pass_round(&mut game);
    assert_eq!(game.turn.step, Step::DeclareBlockers);

    let blocks = BTreeMap::from([(bear, ogre)]);
    game.declare_blockers(bob, &blocks).unwrap();
    pass_round(&mut game);
    assert_eq!(game.turn.step, Step::CombatDamage);
    let outcome = pass_round(&mut game);

    assert_eq!(
        outcome,
        PriorityOutcome::StepAdvanced {
            turn: 1,
            step: Step::EndCombat
        }
    );
    assert_eq!(game.zone_of(bear).unwrap(), Zone::Graveyard);
    assert_eq!(game.object(ogre).unwrap().status.damage, 2);
    assert_eq!(life(&game), (20, 20));
}

#[test]
fn test_unblocked_lifelink() {
    let (mut game, alice, _bob) = two_player_game(RulesConfig::default());
    let def = CardDefinition::creature("Vampire", "{1}{B}", 3, 3).with_keyword(Keyword::Lifelink);
    let vampire = game.create_object(&def, alice, Zone::Battlefield).unwrap();
    game.start_game().unwrap();

    advance_to(&mut game, 1, Step::DeclareAttackers);
    game.declare_attackers(alice, &[vampire], None, None).unwrap();
    advance_to(&mut game, 1, Step::Main2);
    assert_eq!(life(&game), (23, 17));
}

#[test]
fn test_first_strike_kills_before_regular_damage() {
    let (mut game, alice, bob) = two_player_game(RulesConfig::default());
    let def = CardDefinition::creature("Knight", "{W}{W}", 2, 2).with_keyword(Keyword::FirstStrike);
    let knight = game.create_object(&def, alice, Zone::Battlefield).unwrap();
    let bear = creature(&mut game, bob, "Bear", 2, 2);
    game.start_game().unwrap();

    advance_to(&mut game, 1, Step::DeclareAttackers);
    game.declare_attackers(alice, &[knight], None, None).unwrap();
    pass_round(&mut game);
    game.declare_blockers(bob, &BTreeMap::from([(bear, knight)])).unwrap();
    pass_round(&mut game);

    assert_eq!(game.next_damage_pass().unwrap(), Some(CombatDamagePass::FirstStrike));
    game.assign_combat_damage(alice, &DamageAssignments::new(), None)
        .unwrap();
    assert_eq!(game.zone_of(bear).unwrap(), Zone::Graveyard);
    assert_eq!(game.next_damage_pass().unwrap(), Some(CombatDamagePass::Regular));

    pass_round(&mut game);
    assert_eq!(game.object(knight).unwrap().status.damage, 0);
    assert_eq!(game.zone_of(knight).unwrap(), Zone::Battlefield);
}

#[test]
fn test_trample_assignment_must_be_lethal_first() {
    let (mut game, alice, bob) = two_player_game(RulesConfig::default());
    let def = CardDefinition::creature("Wurm", "{4}{G}", 5, 5).with_keyword(Keyword::Trample);
    let wurm = game.create_object(&def, alice, Zone::Battlefield).unwrap();
    let bear = creature(&mut game, bob, "Bear", 2, 2);
    game.start_game().unwrap();

    advance_to(&mut game, 1, Step::DeclareAttackers);
    game.declare_attackers(alice, &[wurm], None, None).unwrap();
    pass_round(&mut game);
    game.declare_blockers(bob, &BTreeMap::from([(bear, wurm)])).unwrap();
    pass_round(&mut game);

    let short = DamageAssignments::from([(
        wurm,
        vec![(TargetRef::Object(bear), 1), (TargetRef::Player(bob), 4)],
    )]);
    let err = game.assign_combat_damage(alice, &short, None).unwrap_err();
    assert!(matches!(err, RulesError::InvalidAction(_)));
    assert_eq!(life(&game), (20, 20));

    let lethal = DamageAssignments::from([(
        wurm,
        vec![(TargetRef::Object(bear), 2), (TargetRef::Player(bob), 3)],
    )]);
    game.assign_combat_damage(alice, &lethal, None).unwrap();
    assert_eq!(life(&game), (20, 17));
    assert_eq!(game.zone_of(bear).unwrap(), Zone::Graveyard);
}

#[test]
fn test_only_defender_declares_blockers() {
    let (mut game, alice, bob) = two_player_game(RulesConfig::default());
    let ogre = creature(&mut game, alice, "Ogre", 3, 3);
    let bear = creature(&mut game, bob, "Bear", 2, 2);
    game.start_game().unwrap();

    advance_to(&mut game, 1, Step::DeclareAttackers);
    game.declare_attackers(alice, &[ogre], None, None).unwrap();
    pass_round(&mut game);
    let err = game
        .declare_blockers(alice, &BTreeMap::from([(bear, ogre)]))
        .unwrap_err();
    assert!(matches!(err, RulesError::Permission(_)));

    // Passing before blocks are declared is refused too
    let err = game.pass_priority(alice).unwrap_err();
    assert!(matches!(err, RulesError::Permission(_)));
}

#[test]
fn test_game_ends_when_life_runs_out() {
    let (mut game, alice, bob) = two_player_game(RulesConfig::default());
    let giant = creature(&mut game, alice, "Giant", 10, 10);
    game.start_game().unwrap();

    advance_to(&mut game, 1, Step::DeclareAttackers);
    game.declare_attackers(alice, &[giant], None, None).unwrap();
    advance_to(&mut game, 2, Step::Upkeep);
    assert_eq!(game.turn.active_player, bob);
    assert_eq!(life(&game), (20, 10));

    advance_to(&mut game, 3, Step::DeclareAttackers);
    game.declare_attackers(alice, &[giant], None, None).unwrap();
    pass_round(&mut game);
    game.declare_blockers(bob, &BTreeMap::new()).unwrap();
    pass_round(&mut game);
    let outcome = pass_round(&mut game);

    assert_eq!(outcome, PriorityOutcome::GameOver { winner: Some(alice) });
    assert!(game.is_game_over());
    assert!(game.player(bob).unwrap().has_lost);
    assert!(matches!(game.pass_priority(alice), Err(RulesError::Permission(_))));
}

#[test]
fn test_enters_trigger_after_creature_resolves() {
    let (mut game, alice, _bob) = two_player_game(RulesConfig::default());
    let def = CardDefinition::creature("Elvish Visionary", "{0}", 1, 1).with_ability(graph(
        r#"{"abilityType": "triggered", "rootNodeId": 1,
            "nodes": [
                {"id": 1, "type": "TRIGGER", "data": {"event": "enters_battlefield", "filter": "self"}},
                {"id": 2, "type": "EFFECT", "data": {"type": "draw"}}
            ],
            "edges": [{"from_": 1, "to": 2}]}"#,
    ));
    let card = game.create_object(&def, alice, Zone::Hand).unwrap();
    game.start_game().unwrap();
    advance_to(&mut game, 1, Step::Main1);

    let hand_before = game.zone_cards(alice, Zone::Hand).unwrap().len();
    game.cast_spell(alice, card, CastOptions::default()).unwrap();
    assert!(matches!(pass_round(&mut game), PriorityOutcome::Resolved { .. }));
    assert_eq!(game.zone_of(card).unwrap(), Zone::Battlefield);
    assert_eq!(game.stack.len(), 1);

    assert!(matches!(pass_round(&mut game), PriorityOutcome::Resolved { .. }));
    // The creature left the hand and the trigger drew a card
    assert_eq!(game.zone_cards(alice, Zone::Hand).unwrap().len(), hand_before);
    assert!(game.stack.is_empty());
}

#[test]
fn test_anthem_and_dies_on_zero_toughness() {
    let (mut game, alice, bob) = two_player_game(RulesConfig::default());
    let anthem = CardDefinition::new("Glorious Anthem")
        .with_cost("{0}")
        .with_types(&[CardType::Enchantment])
        .with_ability(graph(
            r#"{"abilityType": "static", "rootNodeId": 1,
                "nodes": [{"id": 1, "type": "STATIC", "data":
                    {"effect": "modify_pt", "affects": "creatures_you_control", "power": 1, "toughness": 1}}]}"#,
        ));
    let bear = creature(&mut game, alice, "Bear", 2, 2);
    let card = game.create_object(&anthem, alice, Zone::Hand).unwrap();
    game.start_game().unwrap();
    advance_to(&mut game, 1, Step::Main1);

    game.cast_spell(alice, card, CastOptions::default()).unwrap();
    pass_round(&mut game);
    assert_eq!(game.object(bear).unwrap().power(), 3);
    assert_eq!(game.object(bear).unwrap().toughness(), 3);

    // Two damage only kills it once the anthem is gone
    let shock = CardDefinition::new("Shock")
        .with_cost("{0}")
        .with_types(&[CardType::Instant])
        .with_ability(graph(
            r#"{"abilityType": "spell", "rootNodeId": 1,
                "nodes": [{"id": 1, "type": "EFFECT", "data": {"type": "damage", "amount": 2}}]}"#,
        ));
    let bolt = game.create_object(&shock, bob, Zone::Hand).unwrap();
    game.pass_priority(alice).unwrap();
    let ctx = ResolveContext::new().with_target("target", bear);
    game.cast_spell(bob, bolt, CastOptions::with_context(ctx)).unwrap();
    pass_round(&mut game);
    assert_eq!(game.zone_of(bear).unwrap(), Zone::Battlefield);
    assert_eq!(game.object(bear).unwrap().status.damage, 2);

    game.move_object(card, Zone::Exile).unwrap();
    game.settle().unwrap();
    assert_eq!(game.zone_of(bear).unwrap(), Zone::Graveyard);
}

#[test]
fn test_same_seed_same_game() {
    let config = RulesConfig::default().with_seed(7);
    let play = |config: RulesConfig| {
        let (mut game, alice, bob) = two_player_game(config);
        game.shuffle_library(alice).unwrap();
        game.shuffle_library(bob).unwrap();
        game.start_game().unwrap();
        advance_to(&mut game, 4, Step::Main1);
        let names = |p| {
            game.zone_cards(p, Zone::Hand)
                .unwrap()
                .into_iter()
                .map(|id| game.object(id).unwrap().name().to_string())
                .collect::<Vec<_>>()
        };
        (names(alice), names(bob))
    };
    assert_eq!(play(config.clone()), play(config));
}

#[test]
fn test_serialized_game_resumes() {
    let (mut game, alice, _bob) = two_player_game(RulesConfig::default());
    let ogre = creature(&mut game, alice, "Ogre", 3, 3);
    game.start_game().unwrap();
    advance_to(&mut game, 1, Step::Main1);

    let json = serde_json::to_string(&game).unwrap();
    let mut restored: GameState = serde_json::from_str(&json).unwrap();
    restored.register_all_triggers().unwrap();

    assert_eq!(restored.turn.step, Step::Main1);
    assert_eq!(restored.object(ogre).unwrap().name(), "Ogre");
    advance_to(&mut restored, 1, Step::DeclareAttackers);
    restored.declare_attackers(alice, &[ogre], None, None).unwrap();
    advance_to(&mut restored, 1, Step::Main2);
    assert_eq!(restored.player(restored.players[1].id).unwrap().life, 17);
}

fn instant(name: &str, effect: &str) -> CardDefinition {
    CardDefinition::new(name)
        .with_cost("{0}")
        .with_types(&[CardType::Instant])
        .with_ability(graph(&format!(
            r#"{{"abilityType": "spell", "rootNodeId": 1,
                "nodes": [{{"id": 1, "type": "EFFECT", "data": {effect}}}]}}"#
        )))
}

#[test]
fn test_countered_creature_never_enters() {
    let (mut game, alice, bob) = two_player_game(RulesConfig::default());
    let bears = CardDefinition::creature("Grizzly Bears", "{0}", 2, 2);
    let bears = game.create_object(&bears, alice, Zone::Hand).unwrap();
    let cancel = instant("Cancel", r#"{"type": "counter_spell"}"#);
    let cancel = game.create_object(&cancel, bob, Zone::Hand).unwrap();
    game.start_game().unwrap();
    advance_to(&mut game, 1, Step::Main1);

    game.cast_spell(alice, bears, CastOptions::default()).unwrap();
    assert_eq!(game.turn.priority_player(), Some(bob));
    let ctx = ResolveContext::new().with_target("target", bears);
    game.cast_spell(bob, cancel, CastOptions::with_context(ctx)).unwrap();
    assert_eq!(game.stack.len(), 2);

    assert!(matches!(pass_round(&mut game), PriorityOutcome::Resolved { .. }));
    assert!(game.stack.is_empty());
    assert_eq!(game.zone_of(bears).unwrap(), Zone::Graveyard);
    assert_eq!(game.zone_of(cancel).unwrap(), Zone::Graveyard);
    assert!(!game
        .event_log
        .iter()
        .any(|e| e.kind == EventKind::EntersBattlefield && e.object_id == Some(bears)));
}

#[test]
fn test_aura_phases_out_and_in_with_its_host() {
    let (mut game, alice, _bob) = two_player_game(RulesConfig::default());
    let bear = creature(&mut game, alice, "Bear", 2, 2);
    let aura = CardDefinition::new("Rancor")
        .with_cost("{G}")
        .with_types(&[CardType::Enchantment])
        .with_subtypes(&["Aura"]);
    let aura = game.create_object(&aura, alice, Zone::Battlefield).unwrap();
    game.attach(aura, bear).unwrap();
    let veil = instant("Vanishing Veil", r#"{"type": "phase_out"}"#);
    let veil = game.create_object(&veil, alice, Zone::Hand).unwrap();
    game.start_game().unwrap();
    advance_to(&mut game, 1, Step::Main1);

    let ctx = ResolveContext::new().with_target("target", bear);
    game.cast_spell(alice, veil, CastOptions::with_context(ctx)).unwrap();
    pass_round(&mut game);
    for id in [bear, aura] {
        let obj = game.object(id).unwrap();
        assert_eq!(obj.zone, Zone::Battlefield);
        assert!(obj.status.phased_out);
    }
    assert_eq!(game.attachments.get(&aura), Some(&bear));

    // Still gone through the opponent's turn, back on the controller's next
    advance_to(&mut game, 2, Step::Main1);
    assert!(game.object(bear).unwrap().status.phased_out);
    advance_to(&mut game, 3, Step::Upkeep);
    for id in [bear, aura] {
        assert!(!game.object(id).unwrap().status.phased_out);
    }
    assert_eq!(game.attachments.get(&aura), Some(&bear));
}

#[test]
fn test_deathtouch_trample_assigns_one_to_blocker() {
    let (mut game, alice, bob) = two_player_game(RulesConfig::default());
    let def = CardDefinition::creature("Viper Wurm", "{4}{G}", 5, 5)
        .with_keyword(Keyword::Deathtouch)
        .with_keyword(Keyword::Trample);
    let wurm = game.create_object(&def, alice, Zone::Battlefield).unwrap();
    let wall = creature(&mut game, bob, "Wall", 0, 4);
    game.start_game().unwrap();

    advance_to(&mut game, 1, Step::DeclareAttackers);
    game.declare_attackers(alice, &[wurm], None, None).unwrap();
    pass_round(&mut game);
    game.declare_blockers(bob, &BTreeMap::from([(wall, wurm)])).unwrap();
    pass_round(&mut game);
    assert_eq!(game.turn.step, Step::CombatDamage);

    let assignment = DamageAssignments::from([(
        wurm,
        vec![(TargetRef::Object(wall), 1), (TargetRef::Player(bob), 4)],
    )]);
    game.assign_combat_damage(alice, &assignment, None).unwrap();
    assert_eq!(life(&game), (20, 16));
    assert_eq!(game.zone_of(wall).unwrap(), Zone::Graveyard);
}

#[test]
fn test_commander_damage_over_three_combats_loses() {
    let config = RulesConfig::default().with_starting_life(40);
    let (mut game, alice, bob) = two_player_game(config);
    let general = creature(&mut game, alice, "General", 7, 7);
    game.set_commander(alice, general).unwrap();
    game.start_game().unwrap();

    for turn in [1, 3] {
        advance_to(&mut game, turn, Step::DeclareAttackers);
        game.declare_attackers(alice, &[general], None, None).unwrap();
        advance_to(&mut game, turn, Step::Main2);
    }
    assert_eq!(game.player(bob).unwrap().commander_damage_from(general), 14);
    assert!(!game.is_game_over());

    advance_to(&mut game, 5, Step::DeclareAttackers);
    game.declare_attackers(alice, &[general], None, None).unwrap();
    let mut outcome = None;
    while !game.is_game_over() {
        declare_nothing_if_needed(&mut game);
        let player = game.turn.priority_player().unwrap();
        outcome = Some(game.pass_priority(player).unwrap());
    }

    assert_eq!(outcome, Some(PriorityOutcome::GameOver { winner: Some(alice) }));
    let bob_state = game.player(bob).unwrap();
    assert!(bob_state.has_lost);
    assert_eq!(bob_state.commander_damage_from(general), 21);
    assert_eq!(bob_state.life, 19);
}
