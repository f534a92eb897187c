//! Effect node kinds
//!
//! Effect nodes are decoded from their `data` object by the `type` tag. Types
//! the engine does not know decode to `Effect::Unhandled` so a card with an
//! unsupported clause still resolves its other nodes.

use crate::abilities::context::ResolveContext;
use crate::abilities::targeting::TargetSpec;
use crate::core::{CardType, Color, CounterType, Keyword, ObjectId, PlayerId, Subtype};
use crate::zones::Zone;
use crate::{Result, RulesError};
use serde::{Deserialize, Serialize};

/// A number written literally or by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Fixed(i32),
    /// `X`, `previous` (amount of the previous effect), or a numeric choice key
    Named(String),
}

impl Amount {
    pub fn one() -> Self {
        Amount::Fixed(1)
    }

    pub fn resolve(&self, ctx: &ResolveContext) -> i32 {
        match self {
            Amount::Fixed(n) => *n,
            Amount::Named(name) => match name.as_str() {
                "X" | "x" => ctx.x_value as i32,
                "previous" => ctx.previous_results.last().map_or(0, |r| r.amount),
                "previous_count" => ctx
                    .previous_results
                    .last()
                    .map_or(0, |r| r.objects.len() as i32),
                key => ctx.choice_number(key).unwrap_or(0) as i32,
            },
        }
    }
}

fn default_library() -> Zone {
    Zone::Library
}

fn default_search_key() -> String {
    "search".to_string()
}

fn default_discard_key() -> String {
    "discard".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    Damage {
        amount: Amount,
        #[serde(default = "TargetSpec::target")]
        target: TargetSpec,
    },
    Draw {
        #[serde(default = "Amount::one")]
        amount: Amount,
        #[serde(default = "TargetSpec::you", alias = "target")]
        player: TargetSpec,
    },
    /// Positive amounts gain life, negative amounts lose it
    Life {
        amount: Amount,
        #[serde(default = "TargetSpec::you", alias = "target")]
        player: TargetSpec,
    },
    Mana {
        /// Symbols to add, e.g. `{G}{G}` or `{C}`
        #[serde(default)]
        mana: String,
        /// Mana of any color
        #[serde(default)]
        any: u32,
        #[serde(default = "TargetSpec::you")]
        player: TargetSpec,
    },
    Token {
        #[serde(default = "Amount::one")]
        count: Amount,
        name: String,
        #[serde(default)]
        power: i32,
        #[serde(default)]
        toughness: i32,
        #[serde(default)]
        types: Vec<CardType>,
        #[serde(default)]
        subtypes: Vec<Subtype>,
        #[serde(default)]
        colors: Vec<Color>,
        #[serde(default)]
        keywords: Vec<Keyword>,
        #[serde(default = "TargetSpec::you")]
        controller: TargetSpec,
    },
    /// Negative amounts remove counters
    Counters {
        #[serde(alias = "counter")]
        kind: CounterType,
        #[serde(default = "Amount::one")]
        amount: Amount,
        #[serde(default = "TargetSpec::target")]
        target: TargetSpec,
    },
    Tap {
        #[serde(default = "TargetSpec::target")]
        target: TargetSpec,
    },
    Untap {
        #[serde(default = "TargetSpec::target")]
        target: TargetSpec,
    },
    Destroy {
        #[serde(default = "TargetSpec::target")]
        target: TargetSpec,
    },
    Exile {
        #[serde(default = "TargetSpec::target")]
        target: TargetSpec,
    },
    /// Return to the owner's hand
    Return {
        #[serde(default = "TargetSpec::target")]
        target: TargetSpec,
    },
    Sacrifice {
        #[serde(default = "TargetSpec::source")]
        target: TargetSpec,
    },
    /// Find the cards supplied under `key` in a zone and record them
    Search {
        #[serde(default = "default_library")]
        zone: Zone,
        #[serde(default = "TargetSpec::you")]
        player: TargetSpec,
        #[serde(default = "default_search_key")]
        key: String,
        #[serde(default)]
        types: Vec<CardType>,
        #[serde(default)]
        max: Option<u32>,
        /// Move found cards here right away
        #[serde(default)]
        to: Option<Zone>,
        #[serde(default)]
        shuffle: bool,
    },
    PutOntoBattlefield {
        #[serde(rename = "fromEffect", alias = "from_effect")]
        from_effect: usize,
        #[serde(default)]
        tapped: bool,
    },
    Attach {
        #[serde(rename = "fromEffect", alias = "from_effect", default)]
        from_effect: Option<usize>,
        #[serde(default = "TargetSpec::source")]
        object: TargetSpec,
        #[serde(default = "TargetSpec::target")]
        to: TargetSpec,
    },
    Fight {
        #[serde(default = "TargetSpec::source")]
        first: TargetSpec,
        #[serde(default = "TargetSpec::target")]
        second: TargetSpec,
    },
    Mill {
        #[serde(default = "Amount::one")]
        amount: Amount,
        #[serde(default = "TargetSpec::you", alias = "target")]
        player: TargetSpec,
    },
    /// Cards listed in the `key` choice are discarded first, then the
    /// newest cards in hand
    Discard {
        #[serde(default = "Amount::one")]
        amount: Amount,
        #[serde(default = "TargetSpec::you", alias = "target")]
        player: TargetSpec,
        #[serde(default = "default_discard_key")]
        key: String,
    },
    /// Cards listed in the `scry_bottom` choice go to the bottom
    Scry {
        #[serde(default = "Amount::one")]
        amount: Amount,
    },
    LookAt {
        #[serde(default = "Amount::one")]
        amount: Amount,
        #[serde(default = "TargetSpec::you", alias = "target")]
        player: TargetSpec,
    },
    Reveal {
        #[serde(default = "Amount::one")]
        amount: Amount,
        #[serde(default = "TargetSpec::you", alias = "target")]
        player: TargetSpec,
    },
    CopySpell {
        #[serde(default = "TargetSpec::target")]
        target: TargetSpec,
    },
    CounterSpell {
        #[serde(default = "TargetSpec::target")]
        target: TargetSpec,
    },
    Regenerate {
        #[serde(default = "TargetSpec::source")]
        target: TargetSpec,
    },
    PhaseOut {
        #[serde(default = "TargetSpec::target")]
        target: TargetSpec,
    },
    Transform {
        #[serde(default = "TargetSpec::source")]
        target: TargetSpec,
    },
    Flicker {
        #[serde(default = "TargetSpec::target")]
        target: TargetSpec,
    },
    ChangeControl {
        #[serde(default = "TargetSpec::target")]
        target: TargetSpec,
        #[serde(default = "TargetSpec::you", alias = "to")]
        new_controller: TargetSpec,
        #[serde(default, alias = "untilEndOfTurn")]
        until_end_of_turn: bool,
    },
    PreventDamage {
        #[serde(default = "TargetSpec::target")]
        target: TargetSpec,
        /// Damage prevented per use; unlimited when absent
        #[serde(default)]
        amount: Option<u32>,
        #[serde(default)]
        uses: Option<u32>,
        /// Only damage from this source is prevented
        #[serde(default)]
        source: Option<TargetSpec>,
        #[serde(rename = "effectId", alias = "effect_id", default)]
        effect_id: Option<String>,
    },
    RedirectDamage {
        /// Damage that would be dealt to this is redirected
        #[serde(default = "TargetSpec::you")]
        target: TargetSpec,
        #[serde(default = "TargetSpec::source")]
        to: TargetSpec,
        #[serde(default)]
        amount: Option<u32>,
        #[serde(default)]
        uses: Option<u32>,
        #[serde(default)]
        source: Option<TargetSpec>,
        #[serde(rename = "effectId", alias = "effect_id", default)]
        effect_id: Option<String>,
    },
    AddPoison {
        #[serde(default = "Amount::one")]
        amount: Amount,
        #[serde(default = "TargetSpec::target_player", alias = "target")]
        player: TargetSpec,
    },
    /// P/T change until end of turn
    Pump {
        #[serde(default = "TargetSpec::target")]
        target: TargetSpec,
        #[serde(default)]
        power: i32,
        #[serde(default)]
        toughness: i32,
    },
    GrantKeyword {
        #[serde(default = "TargetSpec::target")]
        target: TargetSpec,
        keyword: Keyword,
    },
    Shuffle {
        #[serde(default = "TargetSpec::you")]
        player: TargetSpec,
    },
    Unhandled {
        name: String,
    },
}

const EFFECT_TYPES: &[&str] = &[
    "damage",
    "draw",
    "life",
    "mana",
    "token",
    "counters",
    "tap",
    "untap",
    "destroy",
    "exile",
    "return",
    "sacrifice",
    "search",
    "put_onto_battlefield",
    "attach",
    "fight",
    "mill",
    "discard",
    "scry",
    "look_at",
    "reveal",
    "copy_spell",
    "counter_spell",
    "regenerate",
    "phase_out",
    "transform",
    "flicker",
    "change_control",
    "prevent_damage",
    "redirect_damage",
    "add_poison",
    "pump",
    "grant_keyword",
    "shuffle",
    "unhandled",
];

impl Effect {
    /// Decode an EFFECT node's data. Unknown types become `Unhandled`;
    /// known types with malformed fields are a parse error.
    pub fn decode(data: &serde_json::Value) -> Result<Effect> {
        let kind = data
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| RulesError::Parse(format!("effect node without a type: {data}")))?;
        if !EFFECT_TYPES.contains(&kind) {
            return Ok(Effect::Unhandled {
                name: kind.to_string(),
            });
        }
        serde_json::from_value(data.clone())
            .map_err(|e| RulesError::Parse(format!("effect '{kind}': {e}")))
    }

    pub fn name(&self) -> &str {
        match self {
            Effect::Damage { .. } => "damage",
            Effect::Draw { .. } => "draw",
            Effect::Life { .. } => "life",
            Effect::Mana { .. } => "mana",
            Effect::Token { .. } => "token",
            Effect::Counters { .. } => "counters",
            Effect::Tap { .. } => "tap",
            Effect::Untap { .. } => "untap",
            Effect::Destroy { .. } => "destroy",
            Effect::Exile { .. } => "exile",
            Effect::Return { .. } => "return",
            Effect::Sacrifice { .. } => "sacrifice",
            Effect::Search { .. } => "search",
            Effect::PutOntoBattlefield { .. } => "put_onto_battlefield",
            Effect::Attach { .. } => "attach",
            Effect::Fight { .. } => "fight",
            Effect::Mill { .. } => "mill",
            Effect::Discard { .. } => "discard",
            Effect::Scry { .. } => "scry",
            Effect::LookAt { .. } => "look_at",
            Effect::Reveal { .. } => "reveal",
            Effect::CopySpell { .. } => "copy_spell",
            Effect::CounterSpell { .. } => "counter_spell",
            Effect::Regenerate { .. } => "regenerate",
            Effect::PhaseOut { .. } => "phase_out",
            Effect::Transform { .. } => "transform",
            Effect::Flicker { .. } => "flicker",
            Effect::ChangeControl { .. } => "change_control",
            Effect::PreventDamage { .. } => "prevent_damage",
            Effect::RedirectDamage { .. } => "redirect_damage",
            Effect::AddPoison { .. } => "add_poison",
            Effect::Pump { .. } => "pump",
            Effect::GrantKeyword { .. } => "grant_keyword",
            Effect::Shuffle { .. } => "shuffle",
            Effect::Unhandled { name } => name,
        }
    }

    /// Every specifier the effect reads
    pub fn target_specs(&self) -> Vec<&TargetSpec> {
        match self {
            Effect::Damage { target, .. }
            | Effect::Counters { target, .. }
            | Effect::Tap { target }
            | Effect::Untap { target }
            | Effect::Destroy { target }
            | Effect::Exile { target }
            | Effect::Return { target }
            | Effect::Sacrifice { target }
            | Effect::CopySpell { target }
            | Effect::CounterSpell { target }
            | Effect::Regenerate { target }
            | Effect::PhaseOut { target }
            | Effect::Transform { target }
            | Effect::Flicker { target }
            | Effect::Pump { target, .. }
            | Effect::GrantKeyword { target, .. } => vec![target],
            Effect::Draw { player, .. }
            | Effect::Life { player, .. }
            | Effect::Mana { player, .. }
            | Effect::Search { player, .. }
            | Effect::Mill { player, .. }
            | Effect::Discard { player, .. }
            | Effect::LookAt { player, .. }
            | Effect::Reveal { player, .. }
            | Effect::AddPoison { player, .. }
            | Effect::Shuffle { player } => vec![player],
            Effect::Token { controller, .. } => vec![controller],
            Effect::Attach { object, to, .. } => vec![object, to],
            Effect::Fight { first, second } => vec![first, second],
            Effect::ChangeControl {
                target,
                new_controller,
                ..
            } => vec![target, new_controller],
            Effect::PreventDamage { target, source, .. } => {
                let mut specs = vec![target];
                specs.extend(source.as_ref());
                specs
            }
            Effect::RedirectDamage {
                target, to, source, ..
            } => {
                let mut specs = vec![target, to];
                specs.extend(source.as_ref());
                specs
            }
            Effect::PutOntoBattlefield { .. } | Effect::Scry { .. } | Effect::Unhandled { .. } => {
                Vec::new()
            }
        }
    }

    /// Whether resolving this effect reads chosen targets
    pub fn uses_targets(&self) -> bool {
        self.target_specs().iter().any(|s| s.target_key().is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectStatus {
    Applied,
    /// Nothing to act on (all references gone or illegal)
    Skipped,
    Unhandled,
}

/// What one effect node did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectOutcome {
    pub effect: String,
    pub status: EffectStatus,
    #[serde(default)]
    pub objects: Vec<ObjectId>,
    #[serde(default)]
    pub players: Vec<PlayerId>,
    #[serde(default)]
    pub amount: i32,
}

impl EffectOutcome {
    pub fn applied(effect: &str) -> Self {
        EffectOutcome {
            effect: effect.to_string(),
            status: EffectStatus::Applied,
            objects: Vec::new(),
            players: Vec::new(),
            amount: 0,
        }
    }

    pub fn skipped(effect: &str) -> Self {
        EffectOutcome {
            status: EffectStatus::Skipped,
            ..EffectOutcome::applied(effect)
        }
    }

    pub fn with_objects(mut self, objects: Vec<ObjectId>) -> Self {
        self.objects = objects;
        self
    }

    pub fn with_players(mut self, players: Vec<PlayerId>) -> Self {
        self.players = players;
        self
    }

    pub fn with_amount(mut self, amount: i32) -> Self {
        self.amount = amount;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_damage_with_defaults() {
        let effect = Effect::decode(&json!({"type": "damage", "amount": 3})).unwrap();
        assert_eq!(
            effect,
            Effect::Damage {
                amount: Amount::Fixed(3),
                target: TargetSpec::target()
            }
        );
        assert!(effect.uses_targets());
    }

    #[test]
    fn test_decode_unknown_type() {
        let effect = Effect::decode(&json!({"type": "venture_into_dungeon"})).unwrap();
        assert_eq!(effect.name(), "venture_into_dungeon");
        assert!(matches!(effect, Effect::Unhandled { .. }));
    }

    #[test]
    fn test_decode_malformed_known_type() {
        let err = Effect::decode(&json!({"type": "grant_keyword"})).unwrap_err();
        assert!(matches!(err, RulesError::Parse(_)));
    }

    #[test]
    fn test_decode_camel_case_fields() {
        let effect =
            Effect::decode(&json!({"type": "put_onto_battlefield", "fromEffect": 0, "tapped": true}))
                .unwrap();
        assert_eq!(
            effect,
            Effect::PutOntoBattlefield {
                from_effect: 0,
                tapped: true
            }
        );
        assert!(!effect.uses_targets());
    }

    #[test]
    fn test_amount_resolution() {
        let mut ctx = ResolveContext::new().with_x(4);
        assert_eq!(Amount::Named("X".to_string()).resolve(&ctx), 4);
        ctx.previous_results
            .push(EffectOutcome::applied("damage").with_amount(2));
        assert_eq!(Amount::Named("previous".to_string()).resolve(&ctx), 2);
        assert_eq!(Amount::Fixed(-1).resolve(&ctx), -1);
    }
}
