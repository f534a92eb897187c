//! Performance benchmarks for the rules engine
//!
//! Measures the two sweeps every action pays for:
//!
//! 1. **Layers** - recompute continuous effects on a crowded battlefield
//! 2. **SBA** - a settle with nothing to do, and one that kills a board
//! 3. **Turns** - pass priority through whole turns of an idle game
//!
//! Run without the `verbose-logging` feature to leave formatting out of
//! the numbers.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mtg_rules_engine::abilities::AbilityGraph;
use mtg_rules_engine::core::{CardDefinition, PlayerId};
use mtg_rules_engine::game::{GameState, Step};
use mtg_rules_engine::zones::Zone;
use mtg_rules_engine::RulesConfig;
use std::time::Duration;

fn anthem() -> CardDefinition {
    let graph = AbilityGraph::from_json(
        r#"{"abilityType": "static", "rootNodeId": 1,
            "nodes": [{"id": 1, "type": "STATIC", "data":
                {"effect": "modify_pt", "affects": "other_creatures_you_control", "power": 1, "toughness": 1}}]}"#,
    )
    .unwrap();
    CardDefinition::creature("Lord", "{1}{W}", 2, 2).with_ability(graph)
}

/// A game with `creatures` vanilla creatures and a lord for each player
fn crowded_board(creatures: usize) -> (GameState, PlayerId, PlayerId) {
    let mut game = GameState::new_two_player("Alice", "Bob", RulesConfig::default());
    let (alice, bob) = (game.players[0].id, game.players[1].id);
    let bear = CardDefinition::creature("Bear", "{1}{G}", 2, 2);
    for owner in [alice, bob] {
        game.create_object(&anthem(), owner, Zone::Battlefield).unwrap();
        for _ in 0..creatures {
            game.create_object(&bear, owner, Zone::Battlefield).unwrap();
        }
    }
    (game, alice, bob)
}

fn bench_layers(c: &mut Criterion) {
    let mut group = c.benchmark_group("layers");
    for creatures in [10usize, 50, 200] {
        let (mut game, _, _) = crowded_board(creatures);
        group.bench_with_input(BenchmarkId::new("recompute", creatures), &creatures, |b, _| {
            b.iter(|| {
                game.recompute_continuous_effects().unwrap();
                black_box(&game);
            });
        });
    }
    group.finish();
}

fn bench_sba(c: &mut Criterion) {
    let mut group = c.benchmark_group("sba");
    for creatures in [10usize, 50, 200] {
        let (mut game, _, _) = crowded_board(creatures);
        group.bench_with_input(BenchmarkId::new("settle_idle", creatures), &creatures, |b, _| {
            b.iter(|| game.settle().unwrap());
        });

        let (board, _, _) = crowded_board(creatures);
        group.bench_with_input(BenchmarkId::new("board_wipe", creatures), &creatures, |b, _| {
            b.iter_batched(
                || {
                    let mut game = board.clone();
                    for id in game.battlefield.cards.clone() {
                        game.object_mut(id).unwrap().status.damage = 10;
                    }
                    game
                },
                |mut game| {
                    game.settle().unwrap();
                    black_box(game)
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_turns(c: &mut Criterion) {
    let mut group = c.benchmark_group("turns");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(10));

    let (mut template, alice, bob) = crowded_board(20);
    for owner in [alice, bob] {
        for _ in 0..40 {
            template
                .create_object(&CardDefinition::basic_land("Forest"), owner, Zone::Library)
                .unwrap();
        }
    }

    group.bench_function("ten_idle_turns", |b| {
        b.iter_batched(
            || template.clone(),
            |mut game| {
                game.start_game().unwrap();
                while game.turn.turn_number <= 10 {
                    if let Some(combat) = game.turn.combat.clone() {
                        if game.turn.step == Step::DeclareAttackers && !combat.attackers_declared {
                            let active = game.turn.active_player;
                            game.declare_attackers(active, &[], None, None).unwrap();
                        }
                    }
                    let player = game.turn.priority_player().unwrap();
                    game.pass_priority(player).unwrap();
                }
                black_box(game)
            },
            criterion::BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_layers, bench_sba, bench_turns);
criterion_main!(benches);
