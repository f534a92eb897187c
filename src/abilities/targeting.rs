//! Target references, target specifiers and target requirements

use crate::core::{ObjectId, PlayerId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A chosen target
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetRef {
    Object(ObjectId),
    Player(PlayerId),
}

impl TargetRef {
    pub fn object(&self) -> Option<ObjectId> {
        match self {
            TargetRef::Object(id) => Some(*id),
            TargetRef::Player(_) => None,
        }
    }

    pub fn player(&self) -> Option<PlayerId> {
        match self {
            TargetRef::Player(id) => Some(*id),
            TargetRef::Object(_) => None,
        }
    }
}

impl From<ObjectId> for TargetRef {
    fn from(id: ObjectId) -> Self {
        TargetRef::Object(id)
    }
}

impl From<PlayerId> for TargetRef {
    fn from(id: PlayerId) -> Self {
        TargetRef::Player(id)
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetRef::Object(id) => write!(f, "object {id}"),
            TargetRef::Player(id) => write!(f, "player {id}"),
        }
    }
}

/// How an effect node names what it acts on
///
/// Written in graphs as a string: `self`, `you`, `target`, `targets[1]`,
/// `triggering`, `opponent`, `each_opponent`, `each_player`, `attached`,
/// `effect[0]`, or any other target key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TargetSpec {
    Source,
    Controller,
    Triggering,
    Opponent,
    EachOpponent,
    EachPlayer,
    /// Whatever the source is attached to
    Attached,
    /// Objects produced by an earlier effect node of the same resolution
    FromEffect(usize),
    /// Every reference stored under a target key
    Key(String),
    /// One reference stored under a target key
    Indexed(String, usize),
}

impl TargetSpec {
    pub fn target() -> Self {
        TargetSpec::Key("target".to_string())
    }

    pub fn target_player() -> Self {
        TargetSpec::Key("target_player".to_string())
    }

    pub fn source() -> Self {
        TargetSpec::Source
    }

    pub fn you() -> Self {
        TargetSpec::Controller
    }

    /// The target key this specifier reads, if it reads one
    pub fn target_key(&self) -> Option<&str> {
        match self {
            TargetSpec::Key(key) | TargetSpec::Indexed(key, _) => Some(key),
            _ => None,
        }
    }
}

fn parse_indexed(s: &str) -> Option<(&str, usize)> {
    let (name, rest) = s.split_once('[')?;
    let index = rest.strip_suffix(']')?.trim().parse().ok()?;
    Some((name, index))
}

impl From<String> for TargetSpec {
    fn from(s: String) -> Self {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "self" | "source" | "this" => return TargetSpec::Source,
            "you" | "controller" => return TargetSpec::Controller,
            "triggering" | "triggering_source" => return TargetSpec::Triggering,
            "opponent" => return TargetSpec::Opponent,
            "each_opponent" | "opponents" => return TargetSpec::EachOpponent,
            "each_player" | "players" => return TargetSpec::EachPlayer,
            "attached" | "enchanted" | "equipped" => return TargetSpec::Attached,
            _ => {}
        }
        match parse_indexed(trimmed) {
            Some(("effect", index)) => TargetSpec::FromEffect(index),
            Some((name, index)) => TargetSpec::Indexed(name.to_string(), index),
            None => TargetSpec::Key(trimmed.to_string()),
        }
    }
}

impl From<&str> for TargetSpec {
    fn from(s: &str) -> Self {
        TargetSpec::from(s.to_string())
    }
}

impl From<TargetSpec> for String {
    fn from(spec: TargetSpec) -> String {
        spec.to_string()
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetSpec::Source => write!(f, "self"),
            TargetSpec::Controller => write!(f, "you"),
            TargetSpec::Triggering => write!(f, "triggering"),
            TargetSpec::Opponent => write!(f, "opponent"),
            TargetSpec::EachOpponent => write!(f, "each_opponent"),
            TargetSpec::EachPlayer => write!(f, "each_player"),
            TargetSpec::Attached => write!(f, "attached"),
            TargetSpec::FromEffect(i) => write!(f, "effect[{i}]"),
            TargetSpec::Key(key) => write!(f, "{key}"),
            TargetSpec::Indexed(key, i) => write!(f, "{key}[{i}]"),
        }
    }
}

/// What kind of thing a target key may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// A creature, planeswalker or player
    #[default]
    Any,
    Creature,
    Planeswalker,
    CreatureOrPlaneswalker,
    Artifact,
    Enchantment,
    Land,
    Permanent,
    Player,
    Spell,
    CardInGraveyard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerFilter {
    #[default]
    Any,
    You,
    Opponent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TargetRequirement {
    #[serde(default)]
    pub kind: TargetKind,
    #[serde(default)]
    pub controller: ControllerFilter,
}

impl TargetRequirement {
    pub fn new(kind: TargetKind) -> Self {
        TargetRequirement {
            kind,
            controller: ControllerFilter::Any,
        }
    }
}
