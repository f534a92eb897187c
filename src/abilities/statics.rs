//! Static abilities and the layered modifications they produce

use crate::core::{CardType, Color, ColorSet, Keyword, ObjectId, PlayerId, Subtype};
use crate::{Result, RulesError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which permanents a static effect applies to, relative to its source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Affected {
    Source,
    Attached,
    CreaturesYouControl,
    OtherCreaturesYouControl,
    CreaturesOpponentsControl,
    AllCreatures,
    OtherCreatures,
    PermanentsYouControl,
    LandsYouControl,
    ArtifactsYouControl,
    CreaturesWithSubtype(Subtype),
}

impl Affected {
    fn source() -> Self {
        Affected::Source
    }
}

impl FromStr for Affected {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        if let Some(subtype) = text.strip_prefix("creatures_with_subtype:") {
            return Ok(Affected::CreaturesWithSubtype(Subtype::from(subtype.trim())));
        }
        match text {
            "self" | "source" => Ok(Affected::Source),
            "attached" | "enchanted" | "equipped" => Ok(Affected::Attached),
            "creatures_you_control" => Ok(Affected::CreaturesYouControl),
            "other_creatures_you_control" => Ok(Affected::OtherCreaturesYouControl),
            "creatures_opponents_control" => Ok(Affected::CreaturesOpponentsControl),
            "all_creatures" | "creatures" => Ok(Affected::AllCreatures),
            "other_creatures" => Ok(Affected::OtherCreatures),
            "permanents_you_control" => Ok(Affected::PermanentsYouControl),
            "lands_you_control" => Ok(Affected::LandsYouControl),
            "artifacts_you_control" => Ok(Affected::ArtifactsYouControl),
            other => Err(RulesError::Parse(format!("unknown selector '{other}'"))),
        }
    }
}

impl TryFrom<String> for Affected {
    type Error = RulesError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Affected> for String {
    fn from(a: Affected) -> String {
        a.to_string()
    }
}

impl fmt::Display for Affected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Affected::Source => write!(f, "self"),
            Affected::Attached => write!(f, "attached"),
            Affected::CreaturesYouControl => write!(f, "creatures_you_control"),
            Affected::OtherCreaturesYouControl => write!(f, "other_creatures_you_control"),
            Affected::CreaturesOpponentsControl => write!(f, "creatures_opponents_control"),
            Affected::AllCreatures => write!(f, "all_creatures"),
            Affected::OtherCreatures => write!(f, "other_creatures"),
            Affected::PermanentsYouControl => write!(f, "permanents_you_control"),
            Affected::LandsYouControl => write!(f, "lands_you_control"),
            Affected::ArtifactsYouControl => write!(f, "artifacts_you_control"),
            Affected::CreaturesWithSubtype(s) => write!(f, "creatures_with_subtype:{s}"),
        }
    }
}

/// A modification as written in a STATIC node, tagged by `effect`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Modification {
    /// The source's controller controls the affected permanents
    GainControl,
    AddTypes {
        types: Vec<CardType>,
    },
    RemoveTypes {
        types: Vec<CardType>,
    },
    SetTypes {
        types: Vec<CardType>,
    },
    AddSubtypes {
        subtypes: Vec<Subtype>,
    },
    AddColors {
        colors: Vec<Color>,
    },
    SetColors {
        colors: Vec<Color>,
    },
    AddKeywords {
        keywords: Vec<Keyword>,
    },
    RemoveKeywords {
        keywords: Vec<Keyword>,
    },
    /// Power and toughness each equal the number of permanents matching
    /// `count`, plus offsets
    CharacteristicPt {
        count: Affected,
        #[serde(default)]
        power_offset: i32,
        #[serde(default)]
        toughness_offset: i32,
    },
    SetPt {
        power: i32,
        toughness: i32,
    },
    ModifyPt {
        power: i32,
        toughness: i32,
    },
    /// Additional land plays each turn for the source's controller
    ExtraLandPlays {
        count: u32,
    },
}

impl Modification {
    /// The layered operation for a source controlled by `controller`, or
    /// `None` for modifications that live outside the layer system
    pub fn to_op(&self, source: ObjectId, controller: PlayerId) -> Option<LayerOp> {
        let op = match self {
            Modification::GainControl => LayerOp::SetController(controller),
            Modification::AddTypes { types } => LayerOp::AddTypes(types.clone()),
            Modification::RemoveTypes { types } => LayerOp::RemoveTypes(types.clone()),
            Modification::SetTypes { types } => LayerOp::SetTypes(types.clone()),
            Modification::AddSubtypes { subtypes } => LayerOp::AddSubtypes(subtypes.clone()),
            Modification::AddColors { colors } => {
                LayerOp::AddColors(colors.iter().copied().collect())
            }
            Modification::SetColors { colors } => {
                LayerOp::SetColors(colors.iter().copied().collect())
            }
            Modification::AddKeywords { keywords } => LayerOp::AddKeywords(keywords.clone()),
            Modification::RemoveKeywords { keywords } => LayerOp::RemoveKeywords(keywords.clone()),
            Modification::CharacteristicPt {
                count,
                power_offset,
                toughness_offset,
            } => LayerOp::CharacteristicPt {
                count: count.clone(),
                source,
                controller,
                power_offset: *power_offset,
                toughness_offset: *toughness_offset,
            },
            Modification::SetPt { power, toughness } => LayerOp::SetPt(*power, *toughness),
            Modification::ModifyPt { power, toughness } => LayerOp::ModifyPt(*power, *toughness),
            Modification::ExtraLandPlays { .. } => return None,
        };
        Some(op)
    }
}

/// STATIC node data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticEffect {
    #[serde(default = "Affected::source")]
    pub affects: Affected,
    #[serde(flatten)]
    pub modification: Modification,
}

/// Layers in application order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Layer {
    Control,
    Type,
    Color,
    Ability,
    PtCharacteristic,
    PtSet,
    PtModify,
}

impl Layer {
    pub const ORDER: [Layer; 7] = [
        Layer::Control,
        Layer::Type,
        Layer::Color,
        Layer::Ability,
        Layer::PtCharacteristic,
        Layer::PtSet,
        Layer::PtModify,
    ];
}

/// A concrete modification applied by the layer system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerOp {
    SetController(PlayerId),
    AddTypes(Vec<CardType>),
    RemoveTypes(Vec<CardType>),
    SetTypes(Vec<CardType>),
    AddSubtypes(Vec<Subtype>),
    AddColors(ColorSet),
    SetColors(ColorSet),
    AddKeywords(Vec<Keyword>),
    RemoveKeywords(Vec<Keyword>),
    CharacteristicPt {
        count: Affected,
        source: ObjectId,
        controller: PlayerId,
        power_offset: i32,
        toughness_offset: i32,
    },
    SetPt(i32, i32),
    ModifyPt(i32, i32),
}

impl LayerOp {
    pub fn layer(&self) -> Layer {
        match self {
            LayerOp::SetController(_) => Layer::Control,
            LayerOp::AddTypes(_)
            | LayerOp::RemoveTypes(_)
            | LayerOp::SetTypes(_)
            | LayerOp::AddSubtypes(_) => Layer::Type,
            LayerOp::AddColors(_) | LayerOp::SetColors(_) => Layer::Color,
            LayerOp::AddKeywords(_) | LayerOp::RemoveKeywords(_) => Layer::Ability,
            LayerOp::CharacteristicPt { .. } => Layer::PtCharacteristic,
            LayerOp::SetPt(..) => Layer::PtSet,
            LayerOp::ModifyPt(..) => Layer::PtModify,
        }
    }
}
