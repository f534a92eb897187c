//! Trigger, activation and condition node data

use crate::core::{CardType, CounterType, Subtype};
use crate::game::events::EventKind;
use crate::{Result, RulesError};
use serde::{Deserialize, Serialize};

/// Which events of the trigger's kind fire it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerFilter {
    #[default]
    Any,
    /// The event is about the ability's own source
    #[serde(rename = "self", alias = "source")]
    SelfObject,
    /// The event is about some other object
    Another,
    /// The event's player (or object controller) is the ability's controller
    #[serde(alias = "controller")]
    You,
    Opponent,
}

/// TRIGGER node data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSpec {
    pub event: EventKind,
    #[serde(default)]
    pub filter: TriggerFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timing {
    #[default]
    Instant,
    Sorcery,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationLimit {
    #[serde(default = "ActivationLimit::default_scope")]
    pub scope: String,
    pub count: u32,
}

impl ActivationLimit {
    fn default_scope() -> String {
        "turn".to_string()
    }
}

/// ACTIVATED node data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationCost {
    pub mana: Option<String>,
    pub tap: bool,
    #[serde(alias = "sacrificeSelf")]
    pub sacrifice_self: bool,
    pub life: u32,
    /// Loyalty change for planeswalker abilities: `+1`, `-3`
    pub loyalty: Option<i32>,
    #[serde(alias = "removeCounters")]
    pub remove_counters: Option<(CounterType, u32)>,
    pub timing: Timing,
    pub limit: Option<ActivationLimit>,
    /// Rules text of the activation restriction, if any
    pub text: String,
}

impl ActivationCost {
    pub fn is_sorcery_speed(&self) -> bool {
        self.timing == Timing::Sorcery
            || self
                .text
                .to_ascii_lowercase()
                .contains("activate only as a sorcery")
    }
}

/// CONDITION node data, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    SourceOnBattlefield,
    SourceTapped,
    SourceUntapped,
    YourTurn,
    LifeAtLeast {
        amount: i32,
    },
    LifeAtMost {
        amount: i32,
    },
    OpponentLifeAtMost {
        amount: i32,
    },
    ControlsAtLeast {
        #[serde(rename = "cardType", alias = "card_type")]
        card_type: CardType,
        #[serde(default = "one")]
        count: u32,
    },
    ControlsSubtype {
        subtype: Subtype,
    },
    HandEmpty,
    GraveyardAtLeast {
        count: u32,
    },
    Unknown {
        name: String,
    },
}

fn one() -> u32 {
    1
}

const CONDITION_KINDS: &[&str] = &[
    "source_on_battlefield",
    "source_tapped",
    "source_untapped",
    "your_turn",
    "life_at_least",
    "life_at_most",
    "opponent_life_at_most",
    "controls_at_least",
    "controls_subtype",
    "hand_empty",
    "graveyard_at_least",
    "unknown",
];

impl Condition {
    pub fn decode(data: &serde_json::Value) -> Result<Condition> {
        let kind = data
            .get("kind")
            .and_then(|k| k.as_str())
            .ok_or_else(|| RulesError::Parse(format!("condition node without a kind: {data}")))?;
        if !CONDITION_KINDS.contains(&kind) {
            return Ok(Condition::Unknown {
                name: kind.to_string(),
            });
        }
        serde_json::from_value(data.clone())
            .map_err(|e| RulesError::Parse(format!("condition '{kind}': {e}")))
    }
}
