//! Ability graph fixtures
//!
//! Every `.json` file under `tests/fixtures/graphs/` holds a `graph` and what
//! compiling it should produce. The dir_test macro generates one test per
//! file, so a new fixture needs no registration.

use dir_test::{dir_test, Fixture};
use mtg_rules_engine::abilities::{AbilityGraph, RuntimeAbility};
use serde::Deserialize;
use similar_asserts::assert_eq;

#[derive(Debug, Deserialize)]
struct Expected {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    ability_type: Option<String>,
    #[serde(default)]
    effects: Vec<String>,
    #[serde(default)]
    target_keys: Vec<String>,
    #[serde(default)]
    conditions: usize,
    #[serde(default)]
    mana_ability: bool,
}

#[derive(Debug, Deserialize)]
struct GraphFixture {
    graph: serde_json::Value,
    expect: Expected,
}

#[dir_test(
    dir: "$CARGO_MANIFEST_DIR/tests/fixtures/graphs",
    glob: "**/*.json",
)]
fn test_graph_fixture(fixture: Fixture<&str>) {
    let case: GraphFixture = serde_json::from_str(fixture.content())
        .unwrap_or_else(|e| panic!("{}: bad fixture: {e}", fixture.path()));
    let compiled = AbilityGraph::from_value(case.graph).and_then(|g| RuntimeAbility::compile(&g));

    if case.expect.error {
        assert!(compiled.is_err(), "{} should not compile", fixture.path());
        return;
    }
    let ability = compiled.unwrap_or_else(|e| panic!("{}: {e}", fixture.path()));

    let ability_type = serde_json::to_value(ability.ability_type).unwrap();
    assert_eq!(ability_type.as_str(), case.expect.ability_type.as_deref());
    let effects: Vec<String> = ability.effects.iter().map(|e| e.name().to_string()).collect();
    assert_eq!(effects, case.expect.effects, "effects of {}", fixture.path());
    let keys: Vec<String> = ability.target_keys().into_iter().collect();
    assert_eq!(keys, case.expect.target_keys, "target keys of {}", fixture.path());
    assert_eq!(ability.conditions.len(), case.expect.conditions);
    assert_eq!(ability.is_mana_ability(), case.expect.mana_ability);
}
